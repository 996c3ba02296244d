use tracing::{debug, info};

use imgsearch_core::batch::{chunked, non_zero};
use imgsearch_core::error::{Error, Result};
use imgsearch_core::types::{DistanceMetric, IndexEntry, IndexSpec, Namespace, QueryMatch};

use crate::service::{IndexService, QueryRequest};

/// Upper bound on entries per upsert call.
pub const UPSERT_CHUNK_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub calls: usize,
    pub upserted: usize,
}

/// Handle on one index of an [`IndexService`].
pub struct VectorIndexClient<S> {
    service: S,
    spec: IndexSpec,
}

impl<S: IndexService> VectorIndexClient<S> {
    /// Create a new index on `service`. Fails with `IndexExists` if the name is taken.
    pub async fn create_index(service: &S, name: &str, dimension: usize, metric: DistanceMetric) -> Result<IndexSpec> {
        let spec = IndexSpec::new(name, dimension, metric)?;
        service.create_index(&spec).await?;
        info!(index = %spec.name, dimension, metric = %metric, "created index");
        Ok(spec)
    }

    /// Bind to an existing index, caching its spec for dimension checks.
    pub async fn connect(service: S, name: &str) -> Result<Self> {
        let spec = service.describe_index(name).await?;
        Ok(Self { service, spec })
    }

    pub fn spec(&self) -> &IndexSpec {
        &self.spec
    }

    fn check_dim(&self, actual: usize) -> Result<()> {
        if actual != self.spec.dimension {
            return Err(Error::DimensionMismatch { expected: self.spec.dimension, actual });
        }
        Ok(())
    }

    /// Write `entries` in chunks of [`UPSERT_CHUNK_SIZE`], one call per chunk, in order.
    ///
    /// A failing chunk stops the upsert; chunks before it stay committed and
    /// are counted in the returned `Error::Index`.
    pub async fn upsert(&self, entries: Vec<IndexEntry>, namespace: &Namespace) -> Result<UpsertSummary> {
        let mut summary = UpsertSummary::default();
        for (chunk, group) in chunked(entries, non_zero(UPSERT_CHUNK_SIZE)).enumerate() {
            let outcome = match group.iter().find(|e| e.values.len() != self.spec.dimension) {
                Some(bad) => Err(Error::DimensionMismatch { expected: self.spec.dimension, actual: bad.values.len() }),
                None => self.service.upsert(&self.spec.name, namespace, &group).await,
            };
            match outcome {
                Ok(n) => {
                    debug!(index = %self.spec.name, %namespace, chunk, entries = n, "upserted chunk");
                    summary.calls += 1;
                    summary.upserted += n;
                }
                Err(source) => {
                    return Err(Error::Index { chunk, committed: summary.upserted, source: Box::new(source) });
                }
            }
        }
        Ok(summary)
    }

    /// Top `k` matches for `vector` within `namespace`, best first, metadata included.
    pub async fn query(&self, vector: Vec<f32>, k: usize, namespace: &Namespace) -> Result<Vec<QueryMatch>> {
        if k == 0 {
            return Err(Error::InvalidArgument("k must be at least 1".into()));
        }
        self.check_dim(vector.len())?;
        let request = QueryRequest { vector, top_k: k, include_metadata: true, include_values: false };
        let mut matches = self.service.query(&self.spec.name, namespace, &request).await?;
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(k);
        Ok(matches)
    }
}
