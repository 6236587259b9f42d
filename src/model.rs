use burn::prelude::*;
use nn::{Linear, LinearConfig, Relu};
use serde::{Deserialize, Serialize};

/// Multi-layer perceptron mapping input features to embedding coordinates.
///
/// Hidden layers use ReLU; the output layer is linear.
#[derive(Module, Debug)]
pub struct UmapNetwork<B: Backend> {
    layers: Vec<Linear<B>>,
    activation: Relu,
}

impl<B: Backend> UmapNetwork<B> {
    /// Creates a network with one linear layer per hidden size plus the output layer.
    ///
    /// # Arguments
    /// * `config` - Input size, hidden layer sizes, and output size.
    /// * `device` - The device the weights are initialized on.
    ///
    /// # Returns
    /// A freshly initialized `UmapNetwork`.
    pub fn new(config: &NetworkConfig, device: &Device<B>) -> Self {
        let mut layers = Vec::with_capacity(config.hidden_sizes.len() + 1);
        let mut input_size = config.input_size;

        for &hidden_size in &config.hidden_sizes {
            layers.push(
                LinearConfig::new(input_size, hidden_size)
                    .with_bias(true)
                    .init(device),
            );
            input_size = hidden_size;
        }

        layers.push(
            LinearConfig::new(input_size, config.output_size)
                .with_bias(true)
                .init(device),
        );

        UmapNetwork {
            layers,
            activation: Relu::new(),
        }
    }

    /// Perform a forward pass through the network.
    ///
    /// # Arguments
    /// * `input` - A `[n_samples, input_size]` tensor of (scaled) features.
    ///
    /// # Returns
    /// A `[n_samples, output_size]` tensor of embedding coordinates.
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let last = self.layers.len() - 1;
        let mut x = input;

        for (i, layer) in self.layers.iter().enumerate() {
            x = layer.forward(x);
            if i < last {
                x = self.activation.forward(x);
            }
        }

        x
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }
}

/// Layer sizes of a [`UmapNetwork`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub input_size: usize,
    pub hidden_sizes: Vec<usize>,
    pub output_size: usize,
}

impl NetworkConfig {
    pub fn new(input_size: usize, hidden_sizes: Vec<usize>, output_size: usize) -> Self {
        Self {
            input_size,
            hidden_sizes,
            output_size,
        }
    }
}
