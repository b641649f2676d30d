use anyhow::{ensure, Context, Result};
use candle_core::Tensor;

/// Mean of the unmasked token states, scaled to unit length: `[B,T,H] -> [B,H]`.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let (batch, _tokens, width) = hidden.dims3().context("hidden states must be [batch, tokens, width]")?;
    // [B,T] -> [B,T,1] in the hidden dtype
    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?.unsqueeze(2)?;
    let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
    let counts = mask.sum(1)?.clamp(1e-9, f64::MAX)?;
    let mean = summed.broadcast_div(&counts)?;
    let norms = mean.sqr()?.sum_keepdim(1)?.sqrt()?.clamp(1e-12, f64::MAX)?;
    let pooled = mean.broadcast_div(&norms)?;
    ensure!(pooled.dims() == [batch, width], "pooled shape {:?} != [{}, {}]", pooled.dims(), batch, width);
    Ok(pooled)
}
