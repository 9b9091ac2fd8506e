//! The raw article stream: unenriched fields only, no dedup.

use std::sync::Arc;

use serde_json::Value;

use crate::config::ClientConfig;
use crate::stream::article::{RawArticle, transform_raw};
use crate::stream::supervisor::{self, Capability, StreamHandle};

/// A supervised connection to the raw article stream.
///
/// Unlike [`crate::stream::enriched::EnrichedArticleStream`], this variant
/// performs no duplicate suppression — the raw feed carries no stable
/// identifier suitable for it (§4.9).
pub struct RawArticleStream;

impl RawArticleStream {
    pub fn spawn(
        config: Arc<ClientConfig>,
        params: Value,
        on_article: impl Fn(RawArticle) + Send + Sync + 'static,
    ) -> StreamHandle {
        let capability = Capability {
            path_suffix: "/raw",
            log_prefix: "raw",
            transform: Arc::new(transform_raw),
            identifier: None,
        };
        supervisor::spawn(config, capability, params, Arc::new(on_article))
    }
}
