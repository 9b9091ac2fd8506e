//! The supervised streaming client: handshake, heartbeat, reconnection,
//! admission/preemption, and duplicate suppression.

pub mod article;
mod backoff;
mod dedup;
pub mod enriched;
mod protocol;
pub mod raw;
mod supervisor;

pub use article::{Company, EnrichedArticle, RawArticle};
pub use enriched::EnrichedArticleStream;
pub use raw::RawArticleStream;
pub use supervisor::StreamHandle;
