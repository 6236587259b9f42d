//! The embedding-and-plot routine and the fixed hyperparameter sweep.

use std::time::{Duration, Instant};

use log::info;
use prettytable::{row, Table};

use crate::{
    backend::AutodiffBackend,
    chart::Plotter,
    config::{GraphParams, ManifoldParams, OptimizationParams, UmapConfig},
    dataset::Dataset,
    error::{Result, UmapError},
    utils::format_duration,
    FittedUmap, Umap,
};

pub const DEFAULT_N_NEIGHBORS: usize = 15;
pub const DEFAULT_MIN_DIST: f64 = 0.1;

/// Marker size of every scatter point.
pub const MARKER_SIZE: u32 = 1;

/// Arguments of [`draw_umap`] beyond the data itself.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawOptions {
    pub n_neighbors: usize,
    pub min_dist: f64,
    /// Names the figure. The plot title is always the hyperparameter caption.
    pub title: String,
    /// Close every open figure before drawing.
    pub close: bool,
    pub optimization: OptimizationParams,
}

impl Default for DrawOptions {
    fn default() -> Self {
        DrawOptions {
            n_neighbors: DEFAULT_N_NEIGHBORS,
            min_dist: DEFAULT_MIN_DIST,
            title: String::new(),
            close: true,
            optimization: OptimizationParams::default(),
        }
    }
}

impl DrawOptions {
    pub fn with_n_neighbors(mut self, n_neighbors: usize) -> Self {
        self.n_neighbors = n_neighbors;
        self
    }

    pub fn with_min_dist(mut self, min_dist: f64) -> Self {
        self.min_dist = min_dist;
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_close(mut self, close: bool) -> Self {
        self.close = close;
        self
    }

    pub fn with_optimization(mut self, optimization: OptimizationParams) -> Self {
        self.optimization = optimization;
        self
    }

    /// `nn = {n_neighbors}, d = {min_dist}`, with `min_dist` always written
    /// as a float (`1.0`, never `1`).
    pub fn caption(&self) -> String {
        format!("nn = {}, d = {}", self.n_neighbors, float_repr(self.min_dist))
    }

    /// The 2-component embedding configuration these options describe.
    pub fn umap_config(&self) -> UmapConfig {
        UmapConfig {
            n_components: 2,
            graph: GraphParams {
                n_neighbors: self.n_neighbors,
                ..Default::default()
            },
            manifold: ManifoldParams {
                min_dist: self.min_dist,
                ..Default::default()
            },
            optimization: self.optimization.clone(),
            ..Default::default()
        }
    }
}

/// Shortest round-trip form of `value`, keeping a fractional part on whole numbers.
fn float_repr(value: f64) -> String {
    let text = value.to_string();
    if text.contains(['.', 'e', 'i', 'N']) {
        text
    } else {
        format!("{text}.0")
    }
}

/// Embed `data` in 2-D and draw it on `plotter`, coloured by `labels`.
///
/// # Arguments
/// * `plotter` - The plot context to draw on.
/// * `data` - One row per sample.
/// * `labels` - Class of each row, used for point colours.
/// * `options` - Hyperparameters, figure name, and whether to close open figures first.
///
/// # Returns
/// The fitted embedding. Errors from the embedding (e.g. `n_neighbors` not
/// smaller than the number of rows) are returned before anything is drawn.
pub fn draw_umap<B, P>(
    plotter: &mut P,
    data: &[Vec<f64>],
    labels: &[usize],
    options: &DrawOptions,
) -> Result<FittedUmap<B>>
where
    B: AutodiffBackend,
    P: Plotter + ?Sized,
{
    if labels.len() != data.len() {
        return Err(UmapError::LabelMismatch {
            labels: labels.len(),
            samples: data.len(),
        });
    }

    let fitted = Umap::<B>::new(options.umap_config()).fit(data)?;

    if options.close {
        plotter.close_all();
    }
    plotter.scatter(fitted.embedding(), labels, MARKER_SIZE)?;
    plotter.set_title(&options.caption());
    if !options.title.is_empty() {
        plotter.set_name(&options.title);
    }
    plotter.show()?;

    Ok(fitted)
}

/// The six runs of the sweep, in order: `min_dist` ∈ {0.001, 0.1, 0.99},
/// then `n_neighbors` ∈ {3, 5, 30}.
pub fn sweep_runs() -> Vec<DrawOptions> {
    let min_dist_sweep = [0.001, 0.1, 0.99]
        .into_iter()
        .map(|d| DrawOptions::default().with_min_dist(d));
    let n_neighbors_sweep = [3, 5, 30]
        .into_iter()
        .map(|n| DrawOptions::default().with_n_neighbors(n));

    min_dist_sweep.chain(n_neighbors_sweep).collect()
}

/// Outcome of one sweep run.
#[derive(Debug, Clone)]
pub struct SweepRecord {
    pub caption: String,
    pub n_neighbors: usize,
    pub min_dist: f64,
    pub curve_params: (f64, f64),
    pub epochs: usize,
    pub best_loss: f64,
    pub elapsed: Duration,
    pub losses: Vec<f64>,
}

/// Run every sweep entry against `dataset`, in order, stopping at the first
/// error. `optimization` applies to every run.
pub fn run_sweep<B, P>(
    plotter: &mut P,
    dataset: &Dataset,
    optimization: &OptimizationParams,
) -> Result<Vec<SweepRecord>>
where
    B: AutodiffBackend,
    P: Plotter + ?Sized,
{
    let runs = sweep_runs();
    let total = runs.len();
    let mut records = Vec::with_capacity(total);

    for (i, options) in runs.into_iter().enumerate() {
        let options = options.with_optimization(optimization.clone());
        let caption = options.caption();
        info!("[{}/{total}] {caption}", i + 1);

        let start = Instant::now();
        let fitted = draw_umap::<B, P>(plotter, &dataset.data, &dataset.labels, &options)?;

        records.push(SweepRecord {
            caption,
            n_neighbors: options.n_neighbors,
            min_dist: options.min_dist,
            curve_params: fitted.curve_params(),
            epochs: fitted.epochs(),
            best_loss: fitted.best_loss(),
            elapsed: start.elapsed(),
            losses: fitted.losses().to_vec(),
        });
    }

    Ok(records)
}

pub fn summary_table(records: &[SweepRecord]) -> Table {
    let mut table = Table::new();
    table.add_row(row!["Run", "Title", "a", "b", "Epochs", "Best loss", "Elapsed"]);

    for (i, record) in records.iter().enumerate() {
        let (a, b) = record.curve_params;
        table.add_row(row![
            i + 1,
            record.caption,
            format!("{a:.4}"),
            format!("{b:.4}"),
            record.epochs,
            format!("{:.6}", record.best_loss),
            format_duration(record.elapsed),
        ]);
    }

    table
}

pub fn print_summary(records: &[SweepRecord]) {
    summary_table(records).printstd();
}
