use image::RgbImage;

use crate::error::Result;

/// Projects images and text into one shared vector space.
///
/// Implementations hold no per-call mutable state, so a single instance can
/// serve any number of sequential calls.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_images(&self, images: &[RgbImage]) -> Result<Vec<Vec<f32>>>;
    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}
