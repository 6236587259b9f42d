use serde::{Deserialize, Serialize};

use crate::error::{Result, UmapError};

/// Parameters of the high-dimensional k-NN graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphParams {
    /// Number of nearest neighbours per point, the point itself included.
    /// Must be at least 2 and smaller than the number of samples.
    pub n_neighbors: usize,

    /// Number of nearest neighbours assumed to be fully connected.
    pub local_connectivity: f64,

    /// Interpolation between fuzzy union (1.0) and fuzzy intersection (0.0)
    /// when symmetrising the graph.
    pub set_op_mix_ratio: f64,
}

impl Default for GraphParams {
    fn default() -> Self {
        Self {
            n_neighbors: 15,
            local_connectivity: 1.0,
            set_op_mix_ratio: 1.0,
        }
    }
}

/// Shape of the low-dimensional similarity kernel `1 / (1 + a·d^(2b))`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifoldParams {
    /// Tightest allowed packing of points in the embedding.
    pub min_dist: f64,

    /// Effective scale of the embedded points.
    pub spread: f64,

    /// Explicit kernel parameters. Both must be set to skip the curve fit.
    pub a: Option<f64>,
    pub b: Option<f64>,
}

impl Default for ManifoldParams {
    fn default() -> Self {
        Self {
            min_dist: 0.1,
            spread: 1.0,
            a: None,
            b: None,
        }
    }
}

/// Optimizer and stopping settings for training the embedding network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationParams {
    /// The total number of epochs to run.
    pub n_epochs: usize,

    /// The learning rate for the Adam optimizer.
    pub learning_rate: f64,

    /// Adam first moment decay.
    pub beta1: f64,

    /// Adam second moment decay.
    pub beta2: f64,

    /// L2 weight decay penalty.
    pub penalty: f64,

    /// Random non-neighbour pairs drawn per graph edge each epoch.
    pub negative_sample_rate: usize,

    /// Weight of the repulsive term relative to the attractive term.
    pub repulsion_strength: f64,

    /// Stop after this many epochs without improvement. `None` disables early stopping.
    pub patience: Option<usize>,

    /// Stop once the loss drops below this value.
    pub min_desired_loss: Option<f64>,

    /// Wall-clock limit for training, in seconds.
    pub timeout: Option<u64>,

    /// Seed for network initialisation and negative sampling.
    pub seed: u64,

    /// Show a progress bar and log training milestones.
    pub verbose: bool,
}

impl Default for OptimizationParams {
    fn default() -> Self {
        Self {
            n_epochs: 200,
            learning_rate: 1e-3,
            beta1: 0.9,
            beta2: 0.999,
            penalty: 1e-5,
            negative_sample_rate: 5,
            repulsion_strength: 1.0,
            patience: None,
            min_desired_loss: None,
            timeout: None,
            seed: 42,
            verbose: cfg!(feature = "verbose"),
        }
    }
}

/// Complete configuration of a UMAP embedding.
///
/// ```
/// use umap_sweep::config::{GraphParams, UmapConfig};
///
/// let config = UmapConfig {
///     graph: GraphParams {
///         n_neighbors: 30,
///         ..Default::default()
///     },
///     ..Default::default()
/// };
/// assert_eq!(config.n_components, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UmapConfig {
    /// Number of output dimensions.
    pub n_components: usize,

    /// Hidden layer widths of the embedding network.
    pub hidden_sizes: Vec<usize>,

    pub graph: GraphParams,
    pub manifold: ManifoldParams,
    pub optimization: OptimizationParams,
}

impl Default for UmapConfig {
    fn default() -> Self {
        Self {
            n_components: 2,
            hidden_sizes: vec![100, 100, 100],
            graph: GraphParams::default(),
            manifold: ManifoldParams::default(),
            optimization: OptimizationParams::default(),
        }
    }
}

impl UmapConfig {
    /// Check the parameters that do not depend on the data.
    pub fn validate(&self) -> Result<()> {
        if self.n_components == 0 {
            return Err(UmapError::InvalidComponents);
        }
        if self.graph.n_neighbors < 2 {
            return Err(UmapError::TooFewNeighbors(self.graph.n_neighbors));
        }
        if !(0.0..=1.0).contains(&self.graph.set_op_mix_ratio) {
            return Err(UmapError::InvalidConfig(format!(
                "set_op_mix_ratio must lie in [0, 1], got {}",
                self.graph.set_op_mix_ratio
            )));
        }
        if !(self.graph.local_connectivity >= 1.0) {
            return Err(UmapError::InvalidConfig(format!(
                "local_connectivity must be at least 1, got {}",
                self.graph.local_connectivity
            )));
        }

        let spread = self.manifold.spread;
        if !spread.is_finite() || spread <= 0.0 {
            return Err(UmapError::InvalidSpread(spread));
        }
        let min_dist = self.manifold.min_dist;
        if !(0.0..=spread).contains(&min_dist) {
            return Err(UmapError::InvalidMinDist { min_dist, spread });
        }

        if self.hidden_sizes.contains(&0) {
            return Err(UmapError::InvalidConfig(
                "hidden layer widths must be positive".into(),
            ));
        }

        let opt = &self.optimization;
        if opt.n_epochs == 0 {
            return Err(UmapError::InvalidConfig("n_epochs must be positive".into()));
        }
        if !(opt.learning_rate > 0.0) {
            return Err(UmapError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                opt.learning_rate
            )));
        }

        Ok(())
    }

    /// Check the parameters against a dataset with `n_samples` rows.
    pub fn validate_for(&self, n_samples: usize) -> Result<()> {
        self.validate()?;
        if self.graph.n_neighbors >= n_samples {
            return Err(UmapError::NeighborsExceedSamples {
                n_neighbors: self.graph.n_neighbors,
                n_samples,
            });
        }
        Ok(())
    }
}
