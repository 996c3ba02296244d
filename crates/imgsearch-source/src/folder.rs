//! Recursive directory loader.

use std::collections::{HashSet, VecDeque};
use std::fs::{self, File};
use std::io::{self, Read};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use imgsearch_core::batch::chunked;
use imgsearch_core::error::{Error, Result};
use imgsearch_core::partition::{partition, RejectReason, Rejection};
use imgsearch_core::types::{ImageMetadata, ImageRecord, ImageSourceKind};
use tracing::{info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::decode::registry;
use crate::sniff::sniff_format;
use crate::SourceBatch;

/// Bytes read before deciding whether a file is worth loading.
const SNIFF_LEN: u64 = 256;

/// Walk `root` and yield batches of at most `batch_size` images per directory.
///
/// Fails immediately if `root` is missing or not a directory. Problems below
/// the root are reported per file or per directory inside the batches.
pub fn load_from_folder(root: impl AsRef<Path>, batch_size: usize) -> Result<FolderBatches> {
    let root = root.as_ref();
    let batch_size = NonZeroUsize::new(batch_size)
        .ok_or_else(|| Error::Config("batch_size must be positive".into()))?;
    let meta = fs::metadata(root).map_err(|e| Error::io(root, e))?;
    if !meta.is_dir() {
        return Err(Error::io(root, io::Error::other("not a directory")));
    }
    let dirs = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter();
    Ok(FolderBatches {
        // the root may be a symlink to a directory
        dirs: Box::new(dirs.filter_entry(|e| e.depth() == 0 || e.file_type().is_dir())),
        pending: VecDeque::new(),
        carry: Vec::new(),
        unreadable: HashSet::new(),
        batch_size,
        failed: false,
    })
}

pub struct FolderBatches {
    dirs: Box<dyn Iterator<Item = walkdir::Result<walkdir::DirEntry>> + Send>,
    pending: VecDeque<(PathBuf, Vec<PathBuf>)>,
    // rejections from unreadable directories, attached to the next batch
    carry: Vec<Rejection>,
    // directories already rejected, so the walker's own error is not reported twice
    unreadable: HashSet<PathBuf>,
    batch_size: NonZeroUsize,
    failed: bool,
}

impl FolderBatches {
    /// Queue the files of the next readable directory. `Ok(false)` when the walk is done.
    fn advance_dir(&mut self) -> Result<bool> {
        loop {
            let entry = match self.dirs.next() {
                None => return Ok(false),
                Some(Ok(entry)) => entry,
                Some(Err(err)) if err.depth() == 0 => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                    return Err(Error::io(path, io::Error::from(err)));
                }
                Some(Err(err)) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                    if self.unreadable.insert(path.clone()) {
                        warn!(path = %path.display(), error = %err, "skipping unreadable directory");
                        self.carry.push(Rejection::new(path.display().to_string(), RejectReason::Io(err.to_string())));
                    }
                    continue;
                }
            };
            let dir = entry.path();
            let files = match list_files(dir) {
                Ok(files) => files,
                Err(err) if entry.depth() == 0 => return Err(Error::io(dir, err)),
                Err(err) => {
                    if self.unreadable.insert(dir.to_path_buf()) {
                        warn!(path = %dir.display(), error = %err, "skipping unreadable directory");
                        self.carry.push(Rejection::new(dir.display().to_string(), RejectReason::Io(err.to_string())));
                    }
                    continue;
                }
            };
            info!("Processing {} files in {}", files.len(), dir.display());
            if files.is_empty() {
                continue;
            }
            for group in chunked(files, self.batch_size) {
                self.pending.push_back((dir.to_path_buf(), group));
            }
            return Ok(true);
        }
    }
}

impl Iterator for FolderBatches {
    type Item = Result<SourceBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        while self.pending.is_empty() {
            match self.advance_dir() {
                Ok(true) => {}
                Ok(false) if self.carry.is_empty() => return None,
                Ok(false) => {
                    let rejected = std::mem::take(&mut self.carry);
                    return Some(Ok(SourceBatch { origin: "walk".into(), records: Vec::new(), rejected }));
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
        let (dir, files) = self.pending.pop_front()?;
        let mut loaded = partition(files, |path| load_local_file(&path));
        for r in &loaded.rejected {
            warn!(file = %r.item, reason = %r.reason, "skipped file");
        }
        let mut rejected = std::mem::take(&mut self.carry);
        rejected.append(&mut loaded.rejected);
        Some(Ok(SourceBatch {
            origin: dir.display().to_string(),
            records: loaded.accepted,
            rejected,
        }))
    }
}

fn list_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Sniff and decode one file. Anything that is not a decodable image is rejected.
///
/// Only the first [`SNIFF_LEN`] bytes are read unless the header names a
/// format we can decode.
pub fn load_local_file(path: &Path) -> std::result::Result<ImageRecord, Rejection> {
    let item = path.display().to_string();
    let reject = |reason| Rejection::new(item.clone(), reason);
    let io_err = |e: io::Error| Rejection::new(item.clone(), RejectReason::Io(e.to_string()));

    let mut file = File::open(path).map_err(io_err)?;
    let file_size = file.metadata().map_err(io_err)?.len();
    let mut bytes = Vec::new();
    (&mut file).take(SNIFF_LEN).read_to_end(&mut bytes).map_err(io_err)?;
    let format = sniff_format(&bytes).map_err(reject)?;
    if !registry().supports(format) {
        return Err(reject(RejectReason::UnsupportedFormat(format.to_string())));
    }
    file.read_to_end(&mut bytes).map_err(io_err)?;
    let pixels = registry().decode_as(format, &bytes).map_err(reject)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let metadata = ImageMetadata {
        id: Uuid::new_v4().to_string(),
        name,
        source: ImageSourceKind::LocalFileSystem,
        image_height: pixels.height(),
        image_width: pixels.width(),
        file_type: format,
        file_size,
        local_file_path: Some(item.clone()),
        external_ref: None,
        extra: Default::default(),
    }
    .validated()
    .map_err(|e| reject(RejectReason::Decode(e.to_string())))?;

    Ok(ImageRecord { pixels, metadata })
}
