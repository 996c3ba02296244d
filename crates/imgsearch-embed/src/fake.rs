use std::hash::{Hash, Hasher};

use image::RgbImage;
use twox_hash::XxHash64;

use imgsearch_core::error::Result;
use imgsearch_core::traits::Embedder;

/// Deterministic vectors with no model behind them. Text tokens are hashed
/// into buckets; images accumulate pixel intensity per `(pixel, channel)` bucket.
pub struct FakeEmbedder {
    dim: usize,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn text_vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        normalize(v)
    }

    fn image_vector(&self, image: &RgbImage) -> Vec<f32> {
        let mut v = vec![1e-3f32; self.dim];
        for (i, px) in image.pixels().enumerate() {
            for (c, value) in px.0.iter().enumerate() {
                v[(i * 3 + c) % self.dim] += *value as f32 / 255.0;
            }
        }
        normalize(v)
    }
}

fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
    for x in &mut v {
        *x /= norm;
    }
    v
}

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_images(&self, images: &[RgbImage]) -> Result<Vec<Vec<f32>>> {
        Ok(images.iter().map(|img| self.image_vector(img)).collect())
    }

    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.text_vector(t)).collect())
    }
}
