use std::path::{Path, PathBuf};
use std::time::Instant;

use image::RgbImage;
use tracing::{debug, info};

use imgsearch_core::config::{expand_path, EmbeddingSettings};
use imgsearch_core::error::{Error, Result};
use imgsearch_core::traits::Embedder;

pub mod clip;
pub mod device;
pub mod fake;
pub mod norm;
pub mod preprocess;
pub mod tokenize;

pub use clip::ClipEmbedder;
pub use fake::FakeEmbedder;

/// Output width of CLIP ViT-B/32.
pub const CLIP_EMBEDDING_DIM: usize = 512;

/// Checked front door to an [`Embedder`]: rejects empty input and verifies
/// that every call returns one vector of `dim()` entries per input, in order.
pub struct EmbeddingEngine {
    inner: Box<dyn Embedder>,
}

impl EmbeddingEngine {
    pub fn new(inner: Box<dyn Embedder>) -> Self {
        Self { inner }
    }

    /// Fake embedder when `embedding.use_fake` or `APP_USE_FAKE_EMBEDDINGS` is set,
    /// CLIP from the resolved model directory otherwise.
    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self> {
        if settings.use_fake || fake_requested() {
            info!("Using FakeEmbedder");
            return Ok(Self::new(Box::new(FakeEmbedder::new(CLIP_EMBEDDING_DIM))));
        }
        let dir = resolve_model_dir(settings.model_dir.as_deref())?;
        let clip = ClipEmbedder::new(&dir).map_err(|e| Error::Embedding(format!("{e:#}")))?;
        Ok(Self::new(Box::new(clip)))
    }

    pub fn dim(&self) -> usize {
        self.inner.dim()
    }

    pub fn embed_images(&self, images: &[RgbImage]) -> Result<Vec<Vec<f32>>> {
        if images.is_empty() {
            return Err(Error::Embedding("no images to embed".into()));
        }
        let start = Instant::now();
        let vectors = self.inner.embed_images(images)?;
        self.check(images.len(), &vectors)?;
        debug!(count = images.len(), elapsed_ms = start.elapsed().as_millis() as u64, "embedded images");
        Ok(vectors)
    }

    pub fn embed_text(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Err(Error::Embedding("no texts to embed".into()));
        }
        let start = Instant::now();
        let vectors = self.inner.embed_texts(texts)?;
        self.check(texts.len(), &vectors)?;
        debug!(count = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "embedded texts");
        Ok(vectors)
    }

    fn check(&self, expected: usize, vectors: &[Vec<f32>]) -> Result<()> {
        if vectors.len() != expected {
            return Err(Error::Embedding(format!("expected {expected} vectors, model returned {}", vectors.len())));
        }
        let dim = self.dim();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
            return Err(Error::Embedding(format!("expected {dim}-d vectors, model returned {}-d", bad.len())));
        }
        Ok(())
    }
}

fn fake_requested() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Engine with default settings; honours `APP_USE_FAKE_EMBEDDINGS`.
pub fn get_default_embedder() -> Result<EmbeddingEngine> {
    EmbeddingEngine::from_settings(&EmbeddingSettings::default())
}

/// Find the CLIP model directory: the configured path, then `APP_MODEL_DIR`,
/// then `MODEL_DIR`, then `models/clip-vit-base-patch32` next to or above the
/// working directory.
pub fn resolve_model_dir(configured: Option<&str>) -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    candidates.extend(configured.map(expand_path));
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            candidates.push(expand_path(dir));
        }
    }
    candidates.push(Path::new("../models/clip-vit-base-patch32").to_path_buf());
    candidates.push(Path::new("models/clip-vit-base-patch32").to_path_buf());

    match candidates.into_iter().find(|p| p.exists()) {
        Some(dir) => {
            info!("Using model dir: {}", dir.display());
            Ok(dir)
        }
        None => Err(Error::Config("Could not locate the CLIP model directory (set embedding.model_dir)".into())),
    }
}
