pub use crate::backend::{AutodiffBackend, CpuBackend};
pub use crate::chart::{plot_loss, BitmapPlotter, ChartConfig, Plotter};
pub use crate::config::{GraphParams, ManifoldParams, OptimizationParams, UmapConfig};
pub use crate::dataset::{load_iris, Dataset};
pub use crate::error::UmapError;
pub use crate::sweep::{draw_umap, print_summary, run_sweep, sweep_runs, DrawOptions};
pub use crate::{FittedUmap, Umap};

#[cfg(feature = "gpu")]
pub use crate::backend::GpuBackend;

/// Embed `data` in 2-D on the CPU backend with default parameters.
///
/// # Example
/// ```no_run
/// use umap_sweep::prelude::*;
///
/// let iris = load_iris();
/// let embedding = umap(&iris.data).unwrap();
/// assert_eq!(embedding.len(), 150);
/// ```
pub fn umap(data: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, UmapError> {
    Umap::<CpuBackend>::new(UmapConfig::default()).fit_transform(data)
}
