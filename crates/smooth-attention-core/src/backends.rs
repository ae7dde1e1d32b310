//! Backend selection
//!
//! The module is generic over any Burn backend; these re-exports cover the
//! ones this crate can be built against. Enable one via feature flags:
//!
//! - `ndarray`: CPU backend (default, no GPU required)
//! - `tch`: PyTorch backend via libtorch (CUDA, MPS)
//! - `wgpu`: WebGPU backend (Vulkan/Metal/DX12)
//!
//! The device is always passed explicitly to construction and to input
//! tensors; nothing here holds global state.
//!
//! ```ignore
//! use smooth_attention_core::backends::{DefaultBackend, default_device};
//! use smooth_attention_core::SmoothAttentionConfig;
//!
//! let device = default_device();
//! let attn = SmoothAttentionConfig::resnet18().with_seed(0).init::<DefaultBackend>(&device)?;
//! ```

#[cfg(feature = "ndarray")]
pub use burn_ndarray::{NdArray, NdArrayDevice};

#[cfg(feature = "tch")]
pub use burn_tch::{LibTorch, LibTorchDevice};

#[cfg(feature = "wgpu")]
pub use burn_wgpu::{Wgpu, WgpuDevice};

/// Default backend when the ndarray feature is enabled
#[cfg(feature = "ndarray")]
pub type DefaultBackend = NdArray<f32>;

/// Default backend when using the tch feature
#[cfg(all(feature = "tch", not(feature = "ndarray")))]
pub type DefaultBackend = LibTorch<f32>;

/// Default backend when using the wgpu feature
#[cfg(all(feature = "wgpu", not(any(feature = "ndarray", feature = "tch"))))]
pub type DefaultBackend = Wgpu;

/// Default device for the enabled backend
#[cfg(feature = "ndarray")]
pub fn default_device() -> NdArrayDevice {
    NdArrayDevice::default()
}

/// Default device for the enabled backend
#[cfg(all(feature = "tch", not(feature = "ndarray")))]
pub fn default_device() -> LibTorchDevice {
    if burn_tch::is_cuda_available() {
        LibTorchDevice::Cuda(0)
    } else {
        LibTorchDevice::Cpu
    }
}

/// Default device for the enabled backend
#[cfg(all(feature = "wgpu", not(any(feature = "ndarray", feature = "tch"))))]
pub fn default_device() -> WgpuDevice {
    WgpuDevice::default()
}

/// Name of [`DefaultBackend`]
#[cfg(feature = "ndarray")]
pub const BACKEND_NAME: &str = "ndarray";

/// Name of [`DefaultBackend`]
#[cfg(all(feature = "tch", not(feature = "ndarray")))]
pub const BACKEND_NAME: &str = "tch";

/// Name of [`DefaultBackend`]
#[cfg(all(feature = "wgpu", not(any(feature = "ndarray", feature = "tch"))))]
pub const BACKEND_NAME: &str = "wgpu";
