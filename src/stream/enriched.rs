//! The enriched article stream: sentiment, confidence, companies, and dedup.

use std::sync::Arc;

use serde_json::Value;

use crate::config::ClientConfig;
use crate::stream::article::{EnrichedArticle, transform_enriched};
use crate::stream::supervisor::{self, Capability, StreamHandle};

/// A supervised connection to the enriched article stream.
///
/// Duplicate articles (keyed on `link`) delivered across a reconnect are
/// dropped before reaching `on_article` (§4.7).
pub struct EnrichedArticleStream;

impl EnrichedArticleStream {
    /// Start the supervised stream. `params` is the subscription body sent
    /// on every (re)connect, before `clientNonce` is merged in.
    pub fn spawn(
        config: Arc<ClientConfig>,
        params: Value,
        on_article: impl Fn(EnrichedArticle) + Send + Sync + 'static,
    ) -> StreamHandle {
        let capability = Capability {
            path_suffix: "",
            log_prefix: "enriched",
            transform: Arc::new(transform_enriched),
            identifier: Some(Arc::new(|a: &EnrichedArticle| a.link.clone())),
        };
        supervisor::spawn(config, capability, params, Arc::new(on_article))
    }
}
