use anyhow::{ensure, Result};
use candle_core::{DType, Device, Tensor};

/// Row-wise L2 normalization of a `[B, D]` tensor.
pub fn l2_normalize(emb: &Tensor) -> Result<Tensor> {
    ensure!(emb.dims().len() == 2, "embeddings must be [B,D], got {:?}", emb.dims());
    let eps_val = match emb.dtype() { DType::F16 => 1e-6f32, _ => 1e-12f32 };
    let eps = Tensor::new(&[eps_val], emb.device())?.to_dtype(emb.dtype())?.unsqueeze(0)?;
    let norm = emb.sqr()?.sum_keepdim(1)?.sqrt()?;
    let norm = norm.broadcast_add(&eps)?;
    Ok(emb.broadcast_div(&norm)?)
}

/// Copy a `[B, D]` tensor back to host memory as one vector per row.
pub fn to_rows(emb: &Tensor) -> Result<Vec<Vec<f32>>> {
    Ok(emb.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec2::<f32>()?)
}
