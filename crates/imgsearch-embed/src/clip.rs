use anyhow::{anyhow, Context, Result};
use std::path::Path;

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use candle_transformers::models::clip::{ClipConfig, ClipModel};
use image::RgbImage;
use tokenizers::Tokenizer;
use tracing::info;

use imgsearch_core::error::{Error, Result as CoreResult};
use imgsearch_core::traits::Embedder;

use crate::device::select_device;
use crate::norm::{l2_normalize, to_rows};
use crate::preprocess::images_to_tensor;
use crate::tokenize::tokenize_batch;

const EOS_TOKEN: &str = "<|endoftext|>";

/// CLIP ViT-B/32 running through candle. Weights are memory-mapped once.
pub struct ClipEmbedder {
    model: ClipModel,
    tokenizer: Tokenizer,
    device: Device,
    image_size: usize,
    max_len: usize,
    eos_id: u32,
    dim: usize,
}

impl ClipEmbedder {
    /// Load `model.safetensors` and `tokenizer.json` from `model_dir`.
    pub fn new(model_dir: &Path) -> Result<Self> {
        let device = select_device();
        info!("Loading CLIP model from {}", model_dir.display());

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let eos_id = tokenizer
            .get_vocab(true)
            .get(EOS_TOKEN)
            .copied()
            .ok_or_else(|| anyhow!("tokenizer has no {EOS_TOKEN} token"))?;

        let config = ClipConfig::vit_base_patch32();
        let weights_path = model_dir.join("model.safetensors");
        // SAFETY: the weights file is not modified while mapped.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[&weights_path], DType::F32, &device) }
            .with_context(|| format!("Failed to map {}", weights_path.display()))?;
        let model = ClipModel::new(vb, &config)?;
        info!("CLIP model loaded");

        Ok(Self {
            model,
            tokenizer,
            device,
            image_size: config.image_size,
            max_len: config.text_config.max_position_embeddings,
            eos_id,
            dim: config.text_config.projection_dim,
        })
    }

    fn image_features(&self, images: &[RgbImage]) -> Result<Vec<Vec<f32>>> {
        let pixels = images_to_tensor(images, self.image_size, &self.device)?;
        let features = self.model.get_image_features(&pixels)?;
        to_rows(&l2_normalize(&features)?)
    }

    fn text_features(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let ids = tokenize_batch(&self.tokenizer, texts, self.max_len, self.eos_id, &self.device)?;
        let features = self.model.get_text_features(&ids)?;
        to_rows(&l2_normalize(&features)?)
    }
}

impl Embedder for ClipEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_images(&self, images: &[RgbImage]) -> CoreResult<Vec<Vec<f32>>> {
        self.image_features(images).map_err(|e| Error::Embedding(format!("{e:#}")))
    }

    fn embed_texts(&self, texts: &[String]) -> CoreResult<Vec<Vec<f32>>> {
        self.text_features(texts).map_err(|e| Error::Embedding(format!("{e:#}")))
    }
}
