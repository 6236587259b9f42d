use burn::{
    prelude::Backend,
    tensor::{Device, Tensor, TensorData},
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, UmapError};

/// Per-feature mean and standard deviation used to z-score inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaling {
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

impl FeatureScaling {
    /// Compute the statistics of each column. Constant columns get a unit
    /// standard deviation so scaling never divides by zero.
    pub fn fit(data: &[Vec<f64>]) -> Self {
        let num_samples = data.len().max(1) as f64;
        let num_features = data.first().map_or(0, Vec::len);

        let means: Vec<f64> = (0..num_features)
            .map(|j| data.iter().map(|row| row[j]).sum::<f64>() / num_samples)
            .collect();

        let stds = means
            .iter()
            .enumerate()
            .map(|(j, mean)| {
                let var = data.iter().map(|row| (row[j] - mean).powi(2)).sum::<f64>() / num_samples;
                let std = var.sqrt();
                if std > 1e-12 {
                    std
                } else {
                    1.0
                }
            })
            .collect();

        Self { means, stds }
    }

    pub fn num_features(&self) -> usize {
        self.means.len()
    }

    /// Z-score `data` into a flat row-major buffer.
    pub fn transform(&self, data: &[Vec<f64>]) -> Vec<f64> {
        data.iter()
            .flat_map(|row| {
                row.iter()
                    .zip(self.means.iter().zip(&self.stds))
                    .map(|(value, (mean, std))| (value - mean) / std)
            })
            .collect()
    }
}

/// Check that `data` is a non-empty rectangular matrix and return its
/// `(num_samples, num_features)`.
pub fn matrix_shape(data: &[Vec<f64>]) -> Result<(usize, usize)> {
    let num_features = match data.first() {
        Some(row) if !row.is_empty() => row.len(),
        _ => return Err(UmapError::EmptyData),
    };
    if let Some((row, found)) = data
        .iter()
        .map(Vec::len)
        .enumerate()
        .find(|&(_, len)| len != num_features)
    {
        return Err(UmapError::RaggedRow {
            row,
            found,
            expected: num_features,
        });
    }
    Ok((data.len(), num_features))
}

pub fn convert_vector_to_tensor<B: Backend>(
    data: Vec<f64>,
    num_samples: usize,
    num_features: usize,
    device: &Device<B>,
) -> Tensor<B, 2> {
    let data: Vec<f32> = data.into_iter().map(|v| v as f32).collect();
    let tensor_data = TensorData::new(data, [num_samples, num_features]);
    Tensor::<B, 2>::from_data(tensor_data, device)
}

/// Read a 2-D tensor back into rows.
///
/// # Arguments
/// * `data` - A `[n_samples, n_components]` tensor, typically the network output.
///
/// # Returns
/// One `Vec<f64>` per tensor row. Non-finite values become 0.0.
pub fn convert_tensor_to_vector<B: Backend>(data: Tensor<B, 2>) -> Result<Vec<Vec<f64>>> {
    let n_components = data.dims()[1];
    rows_from_data(data.into_data().convert::<f32>(), n_components)
}

fn rows_from_data(data: TensorData, n_components: usize) -> Result<Vec<Vec<f64>>> {
    let values: Vec<f32> = data
        .to_vec::<f32>()
        .map_err(|err| UmapError::Tensor(format!("{err:?}")))?;

    let rows = values
        .chunks(n_components.max(1))
        .map(|chunk| {
            chunk
                .iter()
                .map(|&value| {
                    let value = f64::from(value);
                    if value.is_finite() {
                        value
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect();
    Ok(rows)
}

// Elapsed time as HH:MM:SS
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
