// stream-enriched: connects to the enriched article stream and logs each
// article until interrupted.

use std::env;
use std::sync::Arc;

use finlight_client::{ClientConfig, EnrichedArticleStream, install_interrupt_hook};
use tracing::info;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let api_key = env::var("FINLIGHT_API_KEY").expect("FINLIGHT_API_KEY must be set");

    let config = ClientConfig::new(api_key)
        .build()
        .unwrap_or_else(|e| {
            eprintln!("FATAL: invalid config: {e}");
            std::process::exit(1);
        });

    let params = serde_json::json!({ "tickers": ["AAPL", "MSFT"] });

    let handle = EnrichedArticleStream::spawn(Arc::new(config), params, |article| {
        info!(link = %article.link, title = %article.title, "article received");
    });

    install_interrupt_hook(handle).await;
}
