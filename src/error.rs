use thiserror::Error;

/// Errors raised while configuring, fitting, or plotting an embedding.
#[derive(Debug, Error)]
pub enum UmapError {
    #[error("n_neighbors must be at least 2, got {0}")]
    TooFewNeighbors(usize),

    #[error("n_neighbors ({n_neighbors}) must be smaller than the number of samples ({n_samples})")]
    NeighborsExceedSamples {
        n_neighbors: usize,
        n_samples: usize,
    },

    #[error("min_dist must lie in [0, spread = {spread}], got {min_dist}")]
    InvalidMinDist { min_dist: f64, spread: f64 },

    #[error("spread must be a positive finite number, got {0}")]
    InvalidSpread(f64),

    #[error("n_components must be at least 1")]
    InvalidComponents,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("input data is empty")]
    EmptyData,

    #[error("row {row} has {found} features, expected {expected}")]
    RaggedRow {
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("got {labels} labels for {samples} samples")]
    LabelMismatch { labels: usize, samples: usize },

    #[error("a scatter plot needs 2 columns, the embedding has {0}")]
    NotTwoDimensional(usize),

    #[error("failed to read tensor data: {0}")]
    Tensor(String),

    #[error("failed to render chart: {0}")]
    Plot(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, UmapError>;
