//! Process-wide decoder registry.
//!
//! The registry is built once on first use. The `image` crate covers the
//! common raster codecs; HEIC is served by libheif when the `heic` feature is
//! enabled.

use std::sync::OnceLock;

use image::DynamicImage;
use imgsearch_core::partition::RejectReason;
use imgsearch_core::types::ImageFormat;
use tracing::debug;

use crate::sniff::sniff_format;

pub trait ImageDecoder: Send + Sync {
    fn supports(&self, format: ImageFormat) -> bool;
    fn decode(&self, bytes: &[u8], format: ImageFormat) -> Result<DynamicImage, String>;
}

/// Decoders backed by the `image` crate.
struct CodecDecoder;

impl ImageDecoder for CodecDecoder {
    fn supports(&self, format: ImageFormat) -> bool {
        format.codec().is_some()
    }

    fn decode(&self, bytes: &[u8], format: ImageFormat) -> Result<DynamicImage, String> {
        let codec = format.codec().ok_or_else(|| format!("no codec for {format}"))?;
        image::load_from_memory_with_format(bytes, codec).map_err(|e| e.to_string())
    }
}

#[cfg(feature = "heic")]
struct HeicDecoder;

#[cfg(feature = "heic")]
impl ImageDecoder for HeicDecoder {
    fn supports(&self, format: ImageFormat) -> bool {
        format == ImageFormat::Heic
    }

    fn decode(&self, bytes: &[u8], _format: ImageFormat) -> Result<DynamicImage, String> {
        use image::{RgbImage, RgbaImage};
        use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

        let lib = LibHeif::new();
        let ctx = HeifContext::read_from_bytes(bytes).map_err(|e| e.to_string())?;
        let handle = ctx.primary_image_handle().map_err(|e| e.to_string())?;
        let has_alpha = handle.has_alpha_channel();
        let chroma = if has_alpha { RgbChroma::Rgba } else { RgbChroma::Rgb };
        let decoded = lib
            .decode(&handle, ColorSpace::Rgb(chroma), None)
            .map_err(|e| e.to_string())?;
        let planes = decoded.planes();
        let plane = planes.interleaved.ok_or("heic: no interleaved plane")?;
        let channels = if has_alpha { 4 } else { 3 };
        let row_len = plane.width as usize * channels;
        let mut raw = Vec::with_capacity(row_len * plane.height as usize);
        for row in plane.data.chunks(plane.stride).take(plane.height as usize) {
            raw.extend_from_slice(&row[..row_len]);
        }
        let image = if has_alpha {
            RgbaImage::from_raw(plane.width, plane.height, raw).map(DynamicImage::ImageRgba8)
        } else {
            RgbImage::from_raw(plane.width, plane.height, raw).map(DynamicImage::ImageRgb8)
        };
        image.ok_or_else(|| "heic: plane size does not match dimensions".to_string())
    }
}

pub struct DecoderRegistry {
    decoders: Vec<Box<dyn ImageDecoder>>,
}

impl DecoderRegistry {
    fn with_builtin() -> Self {
        #[allow(unused_mut)]
        let mut decoders: Vec<Box<dyn ImageDecoder>> = vec![Box::new(CodecDecoder)];
        #[cfg(feature = "heic")]
        decoders.push(Box::new(HeicDecoder));
        debug!(decoders = decoders.len(), "image decoder registry initialised");
        Self { decoders }
    }

    pub fn supports(&self, format: ImageFormat) -> bool {
        self.decoders.iter().any(|d| d.supports(format))
    }

    /// Sniff the real format of `bytes` and decode them.
    pub fn decode(&self, bytes: &[u8]) -> Result<(ImageFormat, DynamicImage), RejectReason> {
        let format = sniff_format(bytes)?;
        Ok((format, self.decode_as(format, bytes)?))
    }

    /// Decode `bytes` already known to be `format`.
    pub fn decode_as(&self, format: ImageFormat, bytes: &[u8]) -> Result<DynamicImage, RejectReason> {
        let decoder = self
            .decoders
            .iter()
            .find(|d| d.supports(format))
            .ok_or_else(|| RejectReason::UnsupportedFormat(format.to_string()))?;
        decoder.decode(bytes, format).map_err(RejectReason::Decode)
    }
}

static REGISTRY: OnceLock<DecoderRegistry> = OnceLock::new();

pub fn registry() -> &'static DecoderRegistry {
    REGISTRY.get_or_init(DecoderRegistry::with_builtin)
}
