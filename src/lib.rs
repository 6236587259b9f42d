use burn::{
    module::AutodiffModule,
    tensor::{backend::AutodiffBackend, Device},
};
use log::debug;

use config::UmapConfig;
use curve::find_ab_params;
use error::{Result, UmapError};
use graph::fuzzy_simplicial_set;
use model::{NetworkConfig, UmapNetwork};
use train::train;
use utils::{convert_tensor_to_vector, convert_vector_to_tensor, matrix_shape, FeatureScaling};

pub mod backend;
pub mod chart;
pub mod config;
pub mod curve;
pub mod dataset;
pub mod error;
pub mod graph;
pub mod model;
pub mod prelude;
pub mod sweep;
pub mod train;
pub mod utils;

/// A configured, not yet fitted, UMAP transform.
#[derive(Debug, Clone)]
pub struct Umap<B: AutodiffBackend> {
    config: UmapConfig,
    device: Device<B>,
}

impl<B: AutodiffBackend> Umap<B> {
    /// Use the backend's default device.
    pub fn new(config: UmapConfig) -> Self {
        Self::with_device(config, Default::default())
    }

    pub fn with_device(config: UmapConfig, device: Device<B>) -> Self {
        Self { config, device }
    }

    /// Fit the embedding to `data`.
    ///
    /// # Arguments
    /// * `data` - One row per sample, every row the same length.
    ///
    /// # Returns
    /// The trained transform and the embedding of `data`. Fails when the
    /// configuration is invalid for this data, e.g. when `n_neighbors` is not
    /// smaller than the number of samples.
    pub fn fit(&self, data: &[Vec<f64>]) -> Result<FittedUmap<B>> {
        let (num_samples, num_features) = matrix_shape(data)?;
        self.config.validate_for(num_samples)?;

        let graph_params = &self.config.graph;
        let manifold = &self.config.manifold;
        let optimization = &self.config.optimization;

        B::seed(optimization.seed);

        let mut graph = fuzzy_simplicial_set(
            data,
            graph_params.n_neighbors,
            graph_params.local_connectivity,
            graph_params.set_op_mix_ratio,
        );
        graph.prune(optimization.n_epochs);
        debug!(
            "fuzzy graph: {} vertices, {} directed edges",
            graph.n_vertices,
            graph.edges.len()
        );

        let kernel = match (manifold.a, manifold.b) {
            (Some(a), Some(b)) => (a, b),
            _ => find_ab_params(manifold.spread, manifold.min_dist),
        };

        let scaling = FeatureScaling::fit(data);
        let inputs = convert_vector_to_tensor::<B>(
            scaling.transform(data),
            num_samples,
            num_features,
            &self.device,
        );

        let network_config = NetworkConfig::new(
            num_features,
            self.config.hidden_sizes.clone(),
            self.config.n_components,
        );
        let network = UmapNetwork::<B>::new(&network_config, &self.device);

        let outcome = train(
            network,
            inputs.clone(),
            &graph,
            kernel,
            optimization,
            &self.device,
        );

        let model = outcome.model.valid();
        let inputs = inputs.inner();
        let device = inputs.device();
        let embedding = convert_tensor_to_vector(model.forward(inputs))?;

        Ok(FittedUmap {
            model,
            device,
            scaling,
            embedding,
            losses: outcome.losses,
            best_loss: outcome.best_loss,
            epochs: outcome.epochs,
            kernel,
        })
    }

    /// Fit to `data` and return its embedding, `n_samples × n_components`.
    pub fn fit_transform(&self, data: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        Ok(self.fit(data)?.into_embedding())
    }
}

/// A trained UMAP transform together with the embedding of its training data.
pub struct FittedUmap<B: AutodiffBackend> {
    model: UmapNetwork<B::InnerBackend>,
    device: Device<B::InnerBackend>,
    scaling: FeatureScaling,
    embedding: Vec<Vec<f64>>,
    losses: Vec<f64>,
    best_loss: f64,
    epochs: usize,
    kernel: (f64, f64),
}

impl<B: AutodiffBackend> FittedUmap<B> {
    pub fn embedding(&self) -> &[Vec<f64>] {
        &self.embedding
    }

    pub fn into_embedding(self) -> Vec<Vec<f64>> {
        self.embedding
    }

    /// Loss per completed epoch.
    pub fn losses(&self) -> &[f64] {
        &self.losses
    }

    pub fn best_loss(&self) -> f64 {
        self.best_loss
    }

    pub fn epochs(&self) -> usize {
        self.epochs
    }

    /// The `(a, b)` kernel parameters the embedding was trained with.
    pub fn curve_params(&self) -> (f64, f64) {
        self.kernel
    }

    /// Embed new rows with the trained network.
    pub fn transform(&self, data: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        let (num_samples, num_features) = matrix_shape(data)?;
        let expected = self.scaling.num_features();
        if num_features != expected {
            return Err(UmapError::RaggedRow {
                row: 0,
                found: num_features,
                expected,
            });
        }

        let inputs = convert_vector_to_tensor(
            self.scaling.transform(data),
            num_samples,
            num_features,
            &self.device,
        );
        convert_tensor_to_vector(self.model.forward(inputs))
    }
}
