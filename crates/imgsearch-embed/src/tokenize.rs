use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

/// Truncate every sequence to `max_len` and right-pad with `eos_id` to the
/// longest one, returning the flattened ids and the padded length.
///
/// CLIP pools the text at the end-of-text token, so a truncated sequence has
/// its last id replaced by `eos_id`.
pub fn pad_batch(sequences: Vec<Vec<u32>>, max_len: usize, eos_id: u32) -> (Vec<u32>, usize) {
    let len = sequences.iter().map(|s| s.len().min(max_len)).max().unwrap_or(0);
    let mut flat = Vec::with_capacity(sequences.len() * len);
    for mut ids in sequences {
        if ids.len() > max_len {
            ids.truncate(max_len);
            if let Some(last) = ids.last_mut() { *last = eos_id; }
        }
        ids.resize(len, eos_id);
        flat.extend(ids);
    }
    (flat, len)
}

/// Tokenize `texts` into one padded `[B, T]` id tensor on `device`.
pub fn tokenize_batch(tokenizer: &Tokenizer, texts: &[String], max_len: usize, eos_id: u32, device: &Device) -> Result<Tensor> {
    let encodings = tokenizer
        .encode_batch(texts.to_vec(), true)
        .map_err(|e| anyhow!("Tokenization failed: {}", e))?;
    let sequences: Vec<Vec<u32>> = encodings.iter().map(|e| e.get_ids().to_vec()).collect();
    let (flat, len) = pad_batch(sequences, max_len, eos_id);
    Ok(Tensor::from_vec(flat, (texts.len(), len), device)?)
}
