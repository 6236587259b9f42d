//! Backends the embedding can be trained on.

pub use burn::tensor::backend::{AutodiffBackend, Backend};

/// CPU training backend; needs no GPU and is what the tests use.
pub type CpuBackend = burn::backend::Autodiff<burn::backend::NdArray<f32>>;

/// GPU training backend through WGPU.
#[cfg(feature = "gpu")]
pub type GpuBackend = burn::backend::Autodiff<burn::backend::Wgpu<f32, i32>>;
