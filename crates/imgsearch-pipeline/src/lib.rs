//! Orchestration: source batches in, vectors upserted; text in, ranked matches out.

use serde::Serialize;
use tracing::{info, warn};

use imgsearch_core::error::{Error, Result};
use imgsearch_core::types::{IndexEntry, Namespace, QueryMatch};
use imgsearch_embed::EmbeddingEngine;
use imgsearch_source::{to_common_format, SourceBatch};
use imgsearch_vector::{IndexService, VectorIndexClient};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub indexed: usize,
    pub rejected: usize,
    pub upsert_calls: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexingReport {
    pub batches: usize,
    pub indexed: usize,
    pub rejected: usize,
    pub upsert_calls: usize,
}

impl IndexingReport {
    fn absorb(&mut self, batch: BatchReport) {
        self.batches += 1;
        self.indexed += batch.indexed;
        self.rejected += batch.rejected;
        self.upsert_calls += batch.upsert_calls;
    }
}

pub struct IndexingPipeline<'a, S> {
    engine: &'a EmbeddingEngine,
    index: &'a VectorIndexClient<S>,
}

impl<'a, S: IndexService> IndexingPipeline<'a, S> {
    pub fn new(engine: &'a EmbeddingEngine, index: &'a VectorIndexClient<S>) -> Self {
        Self { engine, index }
    }

    /// Embed one batch and upsert it. Batches with no decodable image make no calls.
    pub async fn index_batch(&self, batch: SourceBatch, namespace: &Namespace) -> Result<BatchReport> {
        let rejected = batch.rejected.len();
        if batch.is_empty() {
            info!(origin = %batch.origin, rejected, "nothing to embed in batch");
            return Ok(BatchReport { rejected, ..Default::default() });
        }
        let origin = batch.origin.clone();
        let (images, metadata) = batch.into_parts();
        let rgb: Vec<_> = images.iter().map(to_common_format).collect();
        let vectors = self.engine.embed_images(&rgb)?;

        let mut entries = Vec::with_capacity(metadata.len());
        for (values, meta) in vectors.into_iter().zip(metadata) {
            entries.push(IndexEntry { id: meta.id.clone(), values, metadata: meta.to_json()? });
        }
        let summary = self.index.upsert(entries, namespace).await?;
        info!(%origin, indexed = summary.upserted, rejected, %namespace, "indexed batch");
        Ok(BatchReport { indexed: summary.upserted, rejected, upsert_calls: summary.calls })
    }

    /// Index every batch in order. The first failure stops the run and names the batch.
    pub async fn index_all<I>(&self, batches: I, namespace: &Namespace) -> Result<IndexingReport>
    where
        I: IntoIterator<Item = Result<SourceBatch>>,
    {
        let mut report = IndexingReport::default();
        for (n, batch) in batches.into_iter().enumerate() {
            let outcome = match batch {
                Ok(batch) => self.index_batch(batch, namespace).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(batch_report) => report.absorb(batch_report),
                Err(source) => {
                    warn!(batch = n, error = %source, "indexing aborted");
                    return Err(Error::Batch { batch: n, source: Box::new(source) });
                }
            }
        }
        info!(
            batches = report.batches,
            indexed = report.indexed,
            rejected = report.rejected,
            upsert_calls = report.upsert_calls,
            "indexing finished"
        );
        Ok(report)
    }
}

pub struct SearchPipeline<'a, S> {
    engine: &'a EmbeddingEngine,
    index: &'a VectorIndexClient<S>,
}

impl<'a, S: IndexService> SearchPipeline<'a, S> {
    pub fn new(engine: &'a EmbeddingEngine, index: &'a VectorIndexClient<S>) -> Self {
        Self { engine, index }
    }

    pub async fn search(&self, text: &str, k: usize, namespace: &Namespace) -> Result<Vec<QueryMatch>> {
        let vector = self
            .engine
            .embed_text(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("no vector for query".into()))?;
        self.index.query(vector, k, namespace).await
    }

    /// Id of the single best match, if the namespace has any records.
    pub async fn top_match(&self, text: &str, namespace: &Namespace) -> Result<Option<String>> {
        Ok(self.search(text, 1, namespace).await?.into_iter().next().map(|m| m.id))
    }
}
