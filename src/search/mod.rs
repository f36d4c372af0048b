//! Search-index collaborator.
//!
//! The indexer only needs two calls from a search service: insert one
//! document (the service picks the id) and refresh an index so everything
//! submitted so far becomes searchable. [`SearchIndex`] captures exactly
//! that.
//!
//! * [`elastic::ElasticsearchIndex`] — Elasticsearch / Elastic Cloud over HTTP.
//! * [`memory::InMemoryIndex`] — process-local index with refresh-gated
//!   visibility and failure injection.

pub mod elastic;
pub mod memory;

use futures::future::BoxFuture;
use serde_json::Value;

pub use elastic::ElasticsearchIndex;
pub use memory::InMemoryIndex;

/// A document store that can accept documents and make them searchable.
pub trait SearchIndex: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Insert `document` into `index` without an explicit id.
    ///
    /// Returns the id assigned by the service.
    fn index_document<'a>(
        &'a self,
        index: &'a str,
        document: &'a Value,
    ) -> BoxFuture<'a, Result<String, String>>;

    /// Make all documents submitted to `index` visible to queries.
    fn refresh<'a>(&'a self, index: &'a str) -> BoxFuture<'a, Result<(), String>>;
}
