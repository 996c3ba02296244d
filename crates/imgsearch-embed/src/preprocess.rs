use anyhow::{ensure, Result};
use candle_core::{DType, Device, Tensor};
use image::imageops::{self, FilterType};
use image::RgbImage;

pub const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
pub const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_6, 0.275_777_1];

/// Resize the shorter edge to `size`, then center-crop to `size`×`size`.
pub fn resize_center_crop(image: &RgbImage, size: u32) -> RgbImage {
    let (w, h) = image.dimensions();
    let scale = size as f32 / w.min(h).max(1) as f32;
    let new_w = ((w as f32 * scale).round() as u32).max(size);
    let new_h = ((h as f32 * scale).round() as u32).max(size);
    let resized = imageops::resize(image, new_w, new_h, FilterType::Triangle);
    let x = (new_w - size) / 2;
    let y = (new_h - size) / 2;
    imageops::crop_imm(&resized, x, y, size, size).to_image()
}

/// Stack images into one normalized `[B, 3, size, size]` tensor.
pub fn images_to_tensor(images: &[RgbImage], size: usize, device: &Device) -> Result<Tensor> {
    ensure!(!images.is_empty(), "image batch is empty");
    let mut planes = Vec::with_capacity(images.len());
    for image in images {
        let cropped = resize_center_crop(image, size as u32);
        let t = Tensor::from_vec(cropped.into_raw(), (size, size, 3), &Device::Cpu)?
            .permute((2, 0, 1))?
            .to_dtype(DType::F32)?;
        planes.push((t / 255.)?);
    }
    let batch = Tensor::stack(&planes, 0)?;
    let mean = Tensor::new(&CLIP_MEAN, &Device::Cpu)?.reshape((1, 3, 1, 1))?;
    let std = Tensor::new(&CLIP_STD, &Device::Cpu)?.reshape((1, 3, 1, 1))?;
    let normalized = batch.broadcast_sub(&mean)?.broadcast_div(&std)?;
    Ok(normalized.to_device(device)?)
}
