//! Client library for the Finlight financial-news platform.
//!
//! Three independent surfaces:
//! - [`rest`]: a request/response REST facade (`FinlightClient`).
//! - [`webhook`]: a signed-webhook verifier (`WebhookVerifier`).
//! - [`stream`]: the supervised WebSocket streaming client — handshake,
//!   heartbeat, reconnection with backoff, admission/preemption, and
//!   duplicate suppression (`EnrichedArticleStream`, `RawArticleStream`).

mod config;
mod error;
pub mod rest;
pub mod stream;
pub mod webhook;

pub use config::{ClientConfig, ClientConfigBuilder, CloseHook, CloseInfo};
pub use error::FinlightError;
pub use rest::FinlightClient;
pub use stream::{Company, EnrichedArticle, EnrichedArticleStream, RawArticle, RawArticleStream, StreamHandle};
pub use webhook::WebhookVerifier;

/// Install a `Ctrl+C` handler that stops `handle` and then exits the process.
///
/// Opt-in only: library code never installs signal handlers on its own.
/// Intended for binaries (see `demos/`) that want the supervised stream to
/// unwind gracefully (closing its transport with code 1000) before exit,
/// rather than the process dying mid-handshake.
pub async fn install_interrupt_hook(handle: StreamHandle) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("interrupt received, stopping stream");
        handle.stop().await;
    }
    std::process::exit(0);
}
