use candle_core::Device;
use tracing::{debug, info};

/// Metal when built with the `metal` feature, then CUDA when candle was built
/// with it, else CPU.
pub fn select_device() -> Device {
    #[cfg(feature = "metal")]
    match Device::new_metal(0) {
        Ok(dev) => {
            info!("Embedding device: Metal");
            return dev;
        }
        Err(e) => debug!("Metal unavailable: {}", e),
    }
    match Device::cuda_if_available(0) {
        Ok(dev) if dev.is_cuda() => {
            info!("Embedding device: CUDA");
            dev
        }
        Ok(_) => {
            info!("Embedding device: CPU");
            Device::Cpu
        }
        Err(e) => {
            debug!("CUDA unavailable: {}", e);
            info!("Embedding device: CPU");
            Device::Cpu
        }
    }
}
