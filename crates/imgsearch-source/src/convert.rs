//! Color-layout normalization and re-encoding to temporary files.

use std::io::{self, BufWriter, Seek, SeekFrom, Write};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, RgbImage};
use imgsearch_core::error::{Error, Result};
use imgsearch_core::types::ImageFormat;
use tempfile::NamedTempFile;

/// Drop alpha and palette transparency, yielding 3-channel 8-bit RGB.
pub fn to_common_format(image: &DynamicImage) -> RgbImage {
    match image {
        DynamicImage::ImageRgb8(rgb) => rgb.clone(),
        other => other.to_rgb8(),
    }
}

/// An encoded copy of an image on disk. The file is removed when this value is dropped.
#[derive(Debug)]
pub struct TempImageFile {
    pub file: NamedTempFile,
    pub format: ImageFormat,
}

/// Encode `image` into a fresh temporary file.
///
/// Images with an alpha channel are written as PNG with the best compression
/// so transparency survives; everything else becomes JPEG at `quality`
/// (clamped to `1..=100`). The returned file is flushed and rewound.
pub fn materialize_temp_file(image: &DynamicImage, quality: u8) -> Result<TempImageFile> {
    let has_alpha = image.color().has_alpha();
    let (suffix, format) = if has_alpha { (".png", ImageFormat::Png) } else { (".jpeg", ImageFormat::Jpeg) };

    let mut file = tempfile::Builder::new()
        .prefix("imgsearch-")
        .suffix(suffix)
        .tempfile()
        .map_err(|e| Error::io(std::env::temp_dir(), e))?;
    let path = file.path().to_path_buf();

    {
        let mut writer = BufWriter::new(file.as_file_mut());
        let encoded = if has_alpha {
            let encoder = PngEncoder::new_with_quality(&mut writer, CompressionType::Best, FilterType::Adaptive);
            image.write_with_encoder(encoder)
        } else {
            let encoder = JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100));
            DynamicImage::ImageRgb8(to_common_format(image)).write_with_encoder(encoder)
        };
        encoded.map_err(|e| Error::io(&path, io::Error::other(e)))?;
        writer.flush().map_err(|e| Error::io(&path, e))?;
    }

    let handle = file.as_file_mut();
    handle.sync_all().map_err(|e| Error::io(&path, e))?;
    handle.seek(SeekFrom::Start(0)).map_err(|e| Error::io(&path, e))?;
    Ok(TempImageFile { file, format })
}
