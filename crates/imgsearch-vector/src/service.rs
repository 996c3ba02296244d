use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use imgsearch_core::error::Result;
use imgsearch_core::types::{IndexEntry, IndexSpec, Namespace, QueryMatch};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryRequest {
    pub vector: Vec<f32>,
    pub top_k: usize,
    pub include_metadata: bool,
    pub include_values: bool,
}

/// A vector store holding named indexes. Every method is one round-trip
/// to the backing service.
#[async_trait]
pub trait IndexService: Send + Sync {
    async fn create_index(&self, spec: &IndexSpec) -> Result<()>;

    /// Spec of an existing index, `Error::IndexNotFound` otherwise.
    async fn describe_index(&self, name: &str) -> Result<IndexSpec>;

    /// Insert or fully replace `entries`; returns how many were written.
    async fn upsert(&self, index: &str, namespace: &Namespace, entries: &[IndexEntry]) -> Result<usize>;

    async fn query(&self, index: &str, namespace: &Namespace, request: &QueryRequest) -> Result<Vec<QueryMatch>>;
}

#[async_trait]
impl<T: IndexService + ?Sized> IndexService for Box<T> {
    async fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        (**self).create_index(spec).await
    }

    async fn describe_index(&self, name: &str) -> Result<IndexSpec> {
        (**self).describe_index(name).await
    }

    async fn upsert(&self, index: &str, namespace: &Namespace, entries: &[IndexEntry]) -> Result<usize> {
        (**self).upsert(index, namespace, entries).await
    }

    async fn query(&self, index: &str, namespace: &Namespace, request: &QueryRequest) -> Result<Vec<QueryMatch>> {
        (**self).query(index, namespace, request).await
    }
}
