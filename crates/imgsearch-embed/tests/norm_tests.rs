use candle_core::{Device, Tensor};
use image::{Rgb, RgbImage};

use imgsearch_embed::norm::{l2_normalize, to_rows};
use imgsearch_embed::preprocess::{images_to_tensor, resize_center_crop};
use imgsearch_embed::tokenize::pad_batch;

#[test]
fn rows_are_unit_length() {
    let t = Tensor::new(&[[3f32, 4.0], [0.0, 2.0]], &Device::Cpu).unwrap();
    let rows = to_rows(&l2_normalize(&t).unwrap()).unwrap();
    assert!((rows[0][0] - 0.6).abs() < 1e-6 && (rows[0][1] - 0.8).abs() < 1e-6);
    assert!((rows[1][1] - 1.0).abs() < 1e-6);
}

#[test]
fn padding_and_truncation_keep_end_token() {
    let (flat, len) = pad_batch(vec![vec![1, 2, 9], vec![1, 9]], 77, 9);
    assert_eq!(len, 3);
    assert_eq!(flat, vec![1, 2, 9, 1, 9, 9]);

    let (flat, len) = pad_batch(vec![vec![1, 2, 3, 4, 9]], 3, 9);
    assert_eq!(len, 3);
    assert_eq!(flat, vec![1, 2, 9]);
}

#[test]
fn preprocessing_crops_to_square_nchw() {
    let wide = RgbImage::from_pixel(300, 100, Rgb([255, 0, 0]));
    assert_eq!(resize_center_crop(&wide, 224).dimensions(), (224, 224));

    let tall = RgbImage::from_pixel(10, 40, Rgb([0, 0, 255]));
    let t = images_to_tensor(&[wide, tall], 224, &Device::Cpu).unwrap();
    assert_eq!(t.dims(), &[2, 3, 224, 224]);
}
