//! Normalizes images from the local filesystem and from remote download
//! responses into batches of decoded rasters with aligned metadata.

pub mod convert;
pub mod decode;
pub mod folder;
pub mod remote;
pub mod sniff;

use image::DynamicImage;
use imgsearch_core::partition::Rejection;
use imgsearch_core::types::{ImageMetadata, ImageRecord};

pub use convert::{materialize_temp_file, to_common_format, TempImageFile};
pub use folder::{load_from_folder, FolderBatches};
pub use remote::{load_from_remote_batch, CatalogEntry, MetadataCatalog, RemoteBatches, RemoteImage, REMOTE_BATCH_SIZE};

/// One unit of work for the indexer.
///
/// Each record carries its own metadata, so images and metadata cannot drift
/// out of alignment. Items dropped while building the batch are kept in
/// `rejected` with the reason.
#[derive(Debug, Default)]
pub struct SourceBatch {
    pub origin: String,
    pub records: Vec<ImageRecord>,
    pub rejected: Vec<Rejection>,
}

impl SourceBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Split into equally long, identically ordered image and metadata lists.
    pub fn into_parts(self) -> (Vec<DynamicImage>, Vec<ImageMetadata>) {
        self.records.into_iter().map(|r| (r.pixels, r.metadata)).unzip()
    }
}
