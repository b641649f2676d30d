use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

/// XLM-R padding token id.
pub const PAD_ID: u32 = 1;

/// Tokenize `texts` into `[B, T]` id and attention-mask tensors, where `T` is
/// the longest encoding capped at `max_len`. Shorter rows are padded with
/// `PAD_ID` and masked out.
pub fn tokenize_batch(tokenizer: &Tokenizer, texts: &[String], max_len: usize, device: &Device) -> Result<(Tensor, Tensor)> {
    if texts.is_empty() {
        return Err(anyhow!("cannot tokenize an empty batch"));
    }
    let mut rows = Vec::with_capacity(texts.len());
    for text in texts {
        let enc = tokenizer.encode(text.as_str(), true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        let take = enc.get_ids().len().min(max_len);
        rows.push((enc.get_ids()[..take].to_vec(), enc.get_attention_mask()[..take].to_vec()));
    }
    let width = rows.iter().map(|(ids, _)| ids.len()).max().unwrap_or(0).max(1);

    let mut ids = Vec::with_capacity(rows.len() * width);
    let mut mask = Vec::with_capacity(rows.len() * width);
    for (row_ids, row_mask) in rows {
        let pad = width - row_ids.len();
        ids.extend(row_ids.into_iter().chain(std::iter::repeat(PAD_ID).take(pad)));
        mask.extend(row_mask.into_iter().chain(std::iter::repeat(0).take(pad)));
    }
    let batch = texts.len();
    let input_ids = Tensor::from_vec(ids, (batch, width), device)?;
    let attention_mask = Tensor::from_vec(mask, (batch, width), device)?;
    Ok((input_ids, attention_mask))
}
