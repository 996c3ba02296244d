//! Local index service backed by an embedded LanceDB database.

use std::collections::HashSet;
use std::sync::Arc;

use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, DistanceType};
use tracing::info;

use imgsearch_core::error::{Error, Result};
use imgsearch_core::types::{DistanceMetric, IndexEntry, IndexSpec, Namespace, QueryMatch};

use crate::schema::{build_index_schema, ID_COL, METADATA_COL, NAMESPACE_COL, VECTOR_COL};
use crate::service::{IndexService, QueryRequest};
use crate::table::{ensure_table, get_meta, open_db, quote, set_meta, table_exists, META_TABLE};

pub struct LanceIndexService {
    conn: Connection,
}

impl LanceIndexService {
    pub async fn open(uri: &str) -> Result<Self> {
        Ok(Self { conn: open_db(uri).await? })
    }

    fn meta_key(name: &str) -> String {
        format!("index:{name}")
    }

    async fn stored_spec(&self, name: &str) -> Result<Option<IndexSpec>> {
        match get_meta(&self.conn, &Self::meta_key(name)).await? {
            Some(raw) => {
                let stored: IndexSpec = serde_json::from_str(&raw)
                    .map_err(|e| Error::Backend(format!("corrupt spec for index '{name}': {e}")))?;
                IndexSpec::new(stored.name, stored.dimension, stored.metric).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn require_spec(&self, name: &str) -> Result<IndexSpec> {
        self.stored_spec(name).await?.ok_or_else(|| Error::IndexNotFound(name.to_string()))
    }
}

fn distance_type(metric: DistanceMetric) -> DistanceType {
    match metric {
        DistanceMetric::Cosine => DistanceType::Cosine,
        DistanceMetric::Euclidean => DistanceType::L2,
        DistanceMetric::Dotproduct => DistanceType::Dot,
    }
}

/// Higher is better for every metric.
fn score(metric: DistanceMetric, distance: f32) -> f32 {
    match metric {
        DistanceMetric::Cosine | DistanceMetric::Dotproduct => 1.0 - distance,
        DistanceMetric::Euclidean => -distance,
    }
}

fn entries_to_record_batch(dimension: usize, namespace: &Namespace, entries: &[&IndexEntry]) -> Result<RecordBatch> {
    let mut namespaces = Vec::with_capacity(entries.len());
    let mut ids = Vec::with_capacity(entries.len());
    let mut metadata = Vec::with_capacity(entries.len());
    let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(entries.len());
    for e in entries {
        namespaces.push(namespace.as_str().to_string());
        ids.push(e.id.clone());
        metadata.push(serde_json::to_string(&e.metadata).map_err(|err| Error::Metadata(err.to_string()))?);
        vectors.push(Some(e.values.iter().map(|&x| Some(x)).collect()));
    }
    RecordBatch::try_new(
        build_index_schema(dimension),
        vec![
            Arc::new(StringArray::from(namespaces)),
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(metadata)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dimension as i32)),
        ],
    )
    .map_err(Error::backend)
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| Error::Backend(format!("result column '{name}' missing")))
}

#[async_trait]
impl IndexService for LanceIndexService {
    async fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        if spec.name == META_TABLE {
            return Err(Error::Config(format!("'{META_TABLE}' is reserved")));
        }
        if self.stored_spec(&spec.name).await?.is_some() || table_exists(&self.conn, &spec.name).await? {
            return Err(Error::IndexExists(spec.name.clone()));
        }
        ensure_table(&self.conn, &spec.name, build_index_schema(spec.dimension)).await?;
        let raw = serde_json::to_string(spec).map_err(|e| Error::Backend(e.to_string()))?;
        set_meta(&self.conn, &Self::meta_key(&spec.name), &raw).await?;
        info!(index = %spec.name, "created LanceDB table");
        Ok(())
    }

    async fn describe_index(&self, name: &str) -> Result<IndexSpec> {
        self.require_spec(name).await
    }

    async fn upsert(&self, index: &str, namespace: &Namespace, entries: &[IndexEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }
        let spec = self.require_spec(index).await?;
        // last write wins for ids repeated within one call
        let mut seen = HashSet::new();
        let mut unique: Vec<&IndexEntry> = entries.iter().rev().filter(|e| seen.insert(e.id.as_str())).collect();
        unique.reverse();

        let rb = entries_to_record_batch(spec.dimension, namespace, &unique)?;
        let schema = rb.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(rb)].into_iter(), schema));
        let table = self.conn.open_table(index).execute().await.map_err(Error::backend)?;
        let mut mi = table.merge_insert(&[NAMESPACE_COL, ID_COL]);
        mi.when_matched_update_all(None).when_not_matched_insert_all();
        mi.execute(reader).await.map_err(Error::backend)?;
        Ok(unique.len())
    }

    async fn query(&self, index: &str, namespace: &Namespace, request: &QueryRequest) -> Result<Vec<QueryMatch>> {
        let spec = self.require_spec(index).await?;
        let table = self.conn.open_table(index).execute().await.map_err(Error::backend)?;
        let mut columns = vec![ID_COL];
        if request.include_metadata {
            columns.push(METADATA_COL);
        }
        if request.include_values {
            columns.push(VECTOR_COL);
        }
        let mut stream = table
            .vector_search(request.vector.clone())
            .map_err(Error::backend)?
            .distance_type(distance_type(spec.metric))
            .only_if(format!("{NAMESPACE_COL} = {}", quote(namespace.as_str())))
            .select(Select::columns(columns.as_slice()))
            .limit(request.top_k)
            .execute()
            .await
            .map_err(Error::backend)?;

        let mut matches = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(Error::backend)? {
            let ids = column::<StringArray>(&batch, ID_COL)?;
            let distances = column::<Float32Array>(&batch, "_distance")?;
            let meta = if request.include_metadata { Some(column::<StringArray>(&batch, METADATA_COL)?) } else { None };
            for i in 0..batch.num_rows() {
                let metadata = match meta {
                    Some(col) => serde_json::from_str(col.value(i))
                        .map_err(|e| Error::Backend(format!("corrupt metadata for '{}': {e}", ids.value(i))))?,
                    None => Default::default(),
                };
                matches.push(QueryMatch { id: ids.value(i).to_string(), score: score(spec.metric, distances.value(i)), metadata });
            }
        }
        Ok(matches)
    }
}
