use std::{
    collections::BTreeSet,
    fs,
    ops::Range,
    path::{Path, PathBuf},
};

use hsl::HSL;
use log::info;
use plotters::prelude::*;

use crate::error::{Result, UmapError};

/// The default caption for figures without a title
const CAPTION: &str = "umap-sweep";

/// The default directory figures are written to
const PATH: &str = "figures";

const WIDTH: u32 = 1000;
const HEIGHT: u32 = 1000;

/// Output settings for rendered figures.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartConfig {
    /// Caption used when a figure has no title.
    pub caption: String,
    /// Directory the PNG files are written to.
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl ChartConfig {
    pub fn builder() -> ChartConfigBuilder {
        ChartConfigBuilder::default()
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        ChartConfig {
            caption: CAPTION.to_string(),
            path: PathBuf::from(PATH),
            width: WIDTH,
            height: HEIGHT,
        }
    }
}

/// Builder for [`ChartConfig`]; unset fields keep their defaults.
#[derive(Debug, Default)]
pub struct ChartConfigBuilder {
    caption: Option<String>,
    path: Option<PathBuf>,
    width: Option<u32>,
    height: Option<u32>,
}

impl ChartConfigBuilder {
    pub fn caption(mut self, caption: &str) -> Self {
        self.caption = Some(caption.to_string());
        self
    }

    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    pub fn build(self) -> ChartConfig {
        ChartConfig {
            caption: self.caption.unwrap_or_else(|| CAPTION.to_string()),
            path: self.path.unwrap_or_else(|| PathBuf::from(PATH)),
            width: self.width.unwrap_or(WIDTH),
            height: self.height.unwrap_or(HEIGHT),
        }
    }
}

/// Explicit plot context: a set of open figures, one of them current.
///
/// Mirrors the usual interactive-plotting workflow: `scatter` draws on the
/// current figure (opening one if none is open), `set_title` titles it, and
/// `show` displays whatever changed and releases the current figure, so the
/// next `scatter` opens a new one.
pub trait Plotter {
    /// Close every open figure.
    fn close_all(&mut self);

    /// Draw 2-D `points` coloured by `labels` on the current figure.
    fn scatter(&mut self, points: &[Vec<f64>], labels: &[usize], marker_size: u32) -> Result<()>;

    fn set_title(&mut self, title: &str);

    /// Name the current figure; renderers that write files use it as the file stem.
    fn set_name(&mut self, name: &str);

    fn show(&mut self) -> Result<()>;
}

/// One batch of scatter points drawn on a figure.
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterSeries {
    pub points: Vec<(f64, f64)>,
    pub labels: Vec<usize>,
    pub marker_size: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub name: String,
    pub title: Option<String>,
    pub series: Vec<ScatterSeries>,
    dirty: bool,
}

impl Figure {
    fn new(name: String) -> Self {
        Figure {
            name,
            title: None,
            series: Vec::new(),
            dirty: true,
        }
    }
}

/// Renders figures to PNG files with the plotters bitmap backend.
#[derive(Debug)]
pub struct BitmapPlotter {
    config: ChartConfig,
    figures: Vec<Figure>,
    current: Option<usize>,
    created: usize,
    rendered: Vec<PathBuf>,
}

impl BitmapPlotter {
    /// Creates a plotter with no open figures.
    ///
    /// # Arguments
    /// * `config` - Output directory, image size, and fallback caption.
    pub fn new(config: ChartConfig) -> Self {
        BitmapPlotter {
            config,
            figures: Vec::new(),
            current: None,
            created: 0,
            rendered: Vec::new(),
        }
    }

    pub fn open_figures(&self) -> &[Figure] {
        &self.figures
    }

    /// Every file written by [`Plotter::show`], in order.
    pub fn rendered(&self) -> &[PathBuf] {
        &self.rendered
    }

    fn current_figure(&mut self) -> &mut Figure {
        let index = match self.current {
            Some(index) => index,
            None => {
                self.created += 1;
                self.figures
                    .push(Figure::new(format!("figure_{:02}", self.created)));
                let index = self.figures.len() - 1;
                self.current = Some(index);
                index
            }
        };
        let figure = &mut self.figures[index];
        figure.dirty = true;
        figure
    }
}

impl Default for BitmapPlotter {
    fn default() -> Self {
        Self::new(ChartConfig::default())
    }
}

impl Plotter for BitmapPlotter {
    fn close_all(&mut self) {
        self.figures.clear();
        self.current = None;
    }

    fn scatter(&mut self, points: &[Vec<f64>], labels: &[usize], marker_size: u32) -> Result<()> {
        if labels.len() != points.len() {
            return Err(UmapError::LabelMismatch {
                labels: labels.len(),
                samples: points.len(),
            });
        }
        if let Some(row) = points.iter().find(|row| row.len() != 2) {
            return Err(UmapError::NotTwoDimensional(row.len()));
        }

        let series = ScatterSeries {
            points: points.iter().map(|row| (row[0], row[1])).collect(),
            labels: labels.to_vec(),
            marker_size,
        };
        self.current_figure().series.push(series);
        Ok(())
    }

    fn set_title(&mut self, title: &str) {
        self.current_figure().title = Some(title.to_string());
    }

    fn set_name(&mut self, name: &str) {
        self.current_figure().name = name.to_string();
    }

    fn show(&mut self) -> Result<()> {
        // A shown figure is finished; later drawing never lands on it.
        self.current = None;
        fs::create_dir_all(&self.config.path)?;

        for figure in self.figures.iter_mut().filter(|f| f.dirty) {
            let path = self.config.path.join(format!("{}.png", figure.name));
            render_figure(figure, &path, &self.config)?;
            info!("wrote {}", path.display());
            figure.dirty = false;
            self.rendered.push(path);
        }
        Ok(())
    }
}

fn plot_error<E: std::fmt::Display>(err: E) -> UmapError {
    UmapError::Plot(err.to_string())
}

/// Evenly spaced hues, one per distinct label, in label order.
pub fn label_palette(labels: &[usize]) -> Vec<(usize, RGBColor)> {
    let unique: BTreeSet<usize> = labels.iter().copied().collect();
    let count = unique.len().max(1) as f64;

    unique
        .into_iter()
        .enumerate()
        .map(|(i, label)| {
            let color = HSL {
                h: i as f64 * 360.0 / count,
                s: 0.7,
                l: 0.6,
            }
            .to_rgb();
            (label, RGBColor(color.0, color.1, color.2))
        })
        .collect()
}

/// Axis ranges covering every finite point, padded by 5%.
fn axis_ranges(series: &[ScatterSeries]) -> (Range<f64>, Range<f64>) {
    let finite = series
        .iter()
        .flat_map(|s| s.points.iter())
        .filter(|(x, y)| x.is_finite() && y.is_finite());

    let mut bounds: Option<(f64, f64, f64, f64)> = None;
    for &(x, y) in finite {
        bounds = Some(match bounds {
            None => (x, x, y, y),
            Some((min_x, max_x, min_y, max_y)) => {
                (min_x.min(x), max_x.max(x), min_y.min(y), max_y.max(y))
            }
        });
    }
    let (min_x, max_x, min_y, max_y) = bounds.unwrap_or((0.0, 1.0, 0.0, 1.0));

    (padded(min_x, max_x), padded(min_y, max_y))
}

fn padded(min: f64, max: f64) -> Range<f64> {
    let span = max - min;
    if span <= f64::EPSILON {
        return (min - 1.0)..(max + 1.0);
    }
    (min - 0.05 * span)..(max + 0.05 * span)
}

fn render_figure(figure: &Figure, path: &Path, config: &ChartConfig) -> Result<()> {
    let root = BitMapBackend::new(path, (config.width, config.height)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    let (x_range, y_range) = axis_ranges(&figure.series);
    let caption = figure
        .title
        .clone()
        .unwrap_or_else(|| config.caption.clone());

    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 30))
        .margin(40)
        .x_label_area_size(30)
        .y_label_area_size(30)
        .build_cartesian_2d(x_range, y_range)
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .x_labels(10)
        .y_labels(10)
        .draw()
        .map_err(plot_error)?;

    let all_labels: Vec<usize> = figure
        .series
        .iter()
        .flat_map(|s| s.labels.iter().copied())
        .collect();
    let palette = label_palette(&all_labels);

    for series in &figure.series {
        chart
            .draw_series(series.points.iter().zip(&series.labels).map(|(&point, label)| {
                let color = palette
                    .iter()
                    .find(|(l, _)| l == label)
                    .map(|(_, color)| *color)
                    .unwrap_or(RED);
                Circle::new(point, series.marker_size, color.filled())
            }))
            .map_err(plot_error)?;
    }

    root.present().map_err(plot_error)?;
    Ok(())
}

/// Plot the loss curve over epochs and save it to a file
///
/// # Arguments
/// * `losses` - Loss per epoch; non-finite values are skipped
/// * `output_path` - Path of the PNG to write
///
/// # Returns
/// `UmapError::Plot` when plotters fails to draw or encode the image.
pub fn plot_loss(losses: &[f64], output_path: impl AsRef<Path>) -> Result<()> {
    let finite: Vec<f64> = losses.iter().copied().filter(|l| l.is_finite()).collect();
    let min_loss = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max_loss = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let y_range = if finite.is_empty() {
        0.0..1.0
    } else {
        // 10% padding around the observed range
        let min = min_loss - 0.1 * min_loss.abs();
        let max = max_loss + 0.1 * max_loss.abs();
        if max - min <= f64::EPSILON {
            (min - 1.0)..(max + 1.0)
        } else {
            min..max
        }
    };

    let root = BitMapBackend::new(output_path.as_ref(), (800, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Loss Over Epochs", ("sans-serif", 30))
        .set_label_area_size(LabelAreaPosition::Left, 80)
        .set_label_area_size(LabelAreaPosition::Bottom, 50)
        .build_cartesian_2d(0..losses.len().max(1) as u32, y_range)
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .y_desc("Loss")
        .x_desc("Epochs")
        .y_labels(10)
        .draw()
        .map_err(plot_error)?;

    chart
        .draw_series(LineSeries::new(
            losses
                .iter()
                .enumerate()
                .filter(|(_, l)| l.is_finite())
                .map(|(x, &l)| (x as u32, l)),
            &BLUE,
        ))
        .map_err(plot_error)?;

    root.present().map_err(plot_error)?;
    Ok(())
}
