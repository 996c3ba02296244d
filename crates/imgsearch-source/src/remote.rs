//! Correlates downloaded image payloads with a pre-existing metadata catalog.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use imgsearch_core::batch::{chunked, non_zero, Chunked};
use imgsearch_core::error::{Error, Result};
use imgsearch_core::partition::{partition, RejectReason, Rejection};
use imgsearch_core::types::{Extra, ImageMetadata, ImageRecord, ImageSourceKind};
use tracing::{info, warn};

use crate::decode::registry;
use crate::SourceBatch;

pub const REMOTE_BATCH_SIZE: usize = 10;

/// A raw download: the catalog id it belongs to and the undecoded bytes.
#[derive(Debug, Clone)]
pub struct RemoteImage {
    pub id: String,
    pub bytes: Vec<u8>,
}

/// What the remote store already knows about an image before download.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntry {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub external_ref: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Catalog indexed by id. Ids must be unique.
#[derive(Debug, Default)]
pub struct MetadataCatalog {
    entries: HashMap<String, CatalogEntry>,
}

impl MetadataCatalog {
    pub fn new(entries: impl IntoIterator<Item = CatalogEntry>) -> Result<Self> {
        let mut map = HashMap::new();
        for entry in entries {
            if map.contains_key(&entry.id) {
                return Err(Error::DuplicateId(entry.id));
            }
            map.insert(entry.id.clone(), entry);
        }
        Ok(Self { entries: map })
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build batches of [`REMOTE_BATCH_SIZE`] from download responses.
///
/// A duplicate id inside `catalog` fails the whole call; responses without a
/// catalog entry are rejected individually.
pub fn load_from_remote_batch(
    responses: Vec<RemoteImage>,
    catalog: Vec<CatalogEntry>,
) -> Result<RemoteBatches> {
    let catalog = MetadataCatalog::new(catalog)?;
    info!("Processing {} responses", responses.len());
    Ok(RemoteBatches {
        responses: chunked(responses, non_zero(REMOTE_BATCH_SIZE)),
        catalog,
        seen: HashSet::new(),
        batch: 0,
    })
}

pub struct RemoteBatches {
    responses: Chunked<std::vec::IntoIter<RemoteImage>>,
    catalog: MetadataCatalog,
    seen: HashSet<String>,
    batch: usize,
}

impl Iterator for RemoteBatches {
    type Item = SourceBatch;

    fn next(&mut self) -> Option<SourceBatch> {
        let group = self.responses.next()?;
        let batch = self.batch;
        self.batch += 1;
        let catalog = &self.catalog;
        let seen = &mut self.seen;
        let loaded = partition(group, |response| {
            let Some(entry) = catalog.get(&response.id) else {
                return Err(Rejection::new(response.id, RejectReason::UnknownId));
            };
            if !seen.insert(response.id.clone()) {
                return Err(Rejection::new(response.id, RejectReason::DuplicateId));
            }
            decode_remote(response, entry)
        });
        for r in &loaded.rejected {
            warn!(id = %r.item, reason = %r.reason, "skipped download");
        }
        Some(SourceBatch {
            origin: format!("remote batch {batch}"),
            records: loaded.accepted,
            rejected: loaded.rejected,
        })
    }
}

fn decode_remote(response: RemoteImage, entry: &CatalogEntry) -> std::result::Result<ImageRecord, Rejection> {
    let reject = |reason| Rejection::new(response.id.clone(), reason);
    let (format, pixels) = registry().decode(&response.bytes).map_err(reject)?;
    let metadata = ImageMetadata {
        id: entry.id.clone(),
        name: entry.name.clone(),
        source: ImageSourceKind::RemoteDownload,
        image_height: pixels.height(),
        image_width: pixels.width(),
        file_type: format,
        file_size: entry.file_size.unwrap_or(response.bytes.len() as u64),
        local_file_path: None,
        external_ref: Some(entry.external_ref.clone().unwrap_or_else(|| entry.id.clone())),
        extra: entry.extra.clone(),
    }
    .validated()
    .map_err(|e| reject(RejectReason::Decode(e.to_string())))?;
    Ok(ImageRecord { pixels, metadata })
}
