//! Process-local search index.
//!
//! Mirrors the visibility model of a real search service: documents are
//! stored on submission but only become searchable after
//! [`SearchIndex::refresh`]. Submissions can be made to fail on demand so
//! callers can exercise per-document failure reporting.

use super::SearchIndex;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
struct IndexState {
    documents: Vec<(String, Value)>,
    /// Number of leading documents visible to search.
    visible: usize,
}

/// A [`SearchIndex`] held entirely in memory.
#[derive(Default)]
pub struct InMemoryIndex {
    indices: Mutex<HashMap<String, IndexState>>,
    fail_on_content: Vec<String>,
    fail_refresh: AtomicBool,
    next_id: AtomicUsize,
    submissions: AtomicUsize,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every document whose `content` contains `needle`.
    pub fn fail_on_content(mut self, needle: impl Into<String>) -> Self {
        self.fail_on_content.push(needle.into());
        self
    }

    /// Make every refresh call fail.
    pub fn fail_refresh(self) -> Self {
        self.fail_refresh.store(true, Ordering::SeqCst);
        self
    }

    /// Number of `index_document` calls, successful or not.
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    /// All stored documents of `index`, visible or not, in submission order.
    pub fn documents(&self, index: &str) -> Vec<Value> {
        let guard = self.indices.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .get(index)
            .map(|s| s.documents.iter().map(|(_, d)| d.clone()).collect())
            .unwrap_or_default()
    }

    /// Documents visible to search in `index`.
    pub fn visible_count(&self, index: &str) -> usize {
        let guard = self.indices.lock().unwrap_or_else(|e| e.into_inner());
        guard.get(index).map(|s| s.visible).unwrap_or(0)
    }

    /// Visible documents whose `content` field contains `needle`,
    /// as `(id, document)` pairs.
    pub fn search(&self, index: &str, needle: &str) -> Vec<(String, Value)> {
        let guard = self.indices.lock().unwrap_or_else(|e| e.into_inner());
        let Some(state) = guard.get(index) else {
            return Vec::new();
        };
        state.documents[..state.visible]
            .iter()
            .filter(|(_, doc)| content_of(doc).is_some_and(|c| c.contains(needle)))
            .cloned()
            .collect()
    }
}

fn content_of(doc: &Value) -> Option<&str> {
    doc.get("content").and_then(Value::as_str)
}

impl SearchIndex for InMemoryIndex {
    fn name(&self) -> &str {
        "memory"
    }

    fn index_document<'a>(
        &'a self,
        index: &'a str,
        document: &'a Value,
    ) -> BoxFuture<'a, Result<String, String>> {
        Box::pin(async move {
            self.submissions.fetch_add(1, Ordering::SeqCst);

            if !document.is_object() {
                return Err("document must be a JSON object".to_string());
            }
            if let Some(content) = content_of(document) {
                if let Some(needle) = self.fail_on_content.iter().find(|n| content.contains(n.as_str())) {
                    return Err(format!("rejected: content matches '{needle}'"));
                }
            }

            let id = format!("doc-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
            let mut guard = self.indices.lock().unwrap_or_else(|e| e.into_inner());
            guard
                .entry(index.to_string())
                .or_default()
                .documents
                .push((id.clone(), document.clone()));
            Ok(id)
        })
    }

    fn refresh<'a>(&'a self, index: &'a str) -> BoxFuture<'a, Result<(), String>> {
        Box::pin(async move {
            if self.fail_refresh.load(Ordering::SeqCst) {
                return Err(format!("refresh of '{index}' failed"));
            }
            let mut guard = self.indices.lock().unwrap_or_else(|e| e.into_inner());
            let state = guard.entry(index.to_string()).or_default();
            state.visible = state.documents.len();
            Ok(())
        })
    }
}
