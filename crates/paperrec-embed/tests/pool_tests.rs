use candle_core::{DType, Device, Tensor};
use paperrec_embed::masked_mean_l2;

fn l2(v: &[f32]) -> Vec<f32> {
    let n = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.iter().map(|x| x / n).collect()
}

#[test]
fn padding_tokens_do_not_contribute() {
    let dev = Device::Cpu;
    // One sequence, two tokens, hidden dim 4; the second token is padding.
    let h = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], (1, 2, 4), &dev).unwrap();
    let mask = Tensor::from_slice(&[1u32, 0], (1, 2), &dev).unwrap().to_dtype(DType::F32).unwrap();
    let out: Vec<Vec<f32>> = masked_mean_l2(&h, &mask).unwrap().to_vec2().unwrap();
    for (a, b) in out[0].iter().zip(l2(&[1.0, 2.0, 3.0, 4.0])) {
        assert!((a - b).abs() < 1e-5, "a={} b={}", a, b);
    }
}

#[test]
fn unmasked_tokens_are_averaged() {
    let dev = Device::Cpu;
    let h = Tensor::from_slice(&[1.0f32, 0.0, 3.0, 2.0], (1, 2, 2), &dev).unwrap();
    let mask = Tensor::from_slice(&[1u32, 1], (1, 2), &dev).unwrap();
    let out: Vec<Vec<f32>> = masked_mean_l2(&h, &mask).unwrap().to_vec2().unwrap();
    // mean = [2, 1]
    for (a, b) in out[0].iter().zip(l2(&[2.0, 1.0])) {
        assert!((a - b).abs() < 1e-5, "a={} b={}", a, b);
    }
}

#[test]
fn rejects_non_3d_hidden_states() {
    let dev = Device::Cpu;
    let h = Tensor::from_slice(&[1.0f32, 2.0], (1, 2), &dev).unwrap();
    let mask = Tensor::from_slice(&[1u32], (1, 1), &dev).unwrap();
    assert!(masked_mean_l2(&h, &mask).is_err());
}
