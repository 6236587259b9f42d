/// Integration tests for umap-sweep.
///
/// These tests use `burn::backend::NdArray` (CPU) so no GPU is required.
/// They cover:
///   - The embedding-and-plot routine against a recording plot context
///   - The fixed six-run sweep
///   - Fitting, transforming, and validation errors of `Umap`
///   - Utilities (scaling, tensor conversion, duration formatting)
///   - Network construction and forward-pass shapes
///   - PNG rendering through `BitmapPlotter`
use burn::backend::NdArray;
use burn::tensor::{Tensor, TensorData};
use std::time::Duration;
use umap_sweep::{
    backend::CpuBackend,
    chart::{plot_loss, BitmapPlotter, ChartConfig, Plotter},
    config::{OptimizationParams, UmapConfig},
    dataset::load_iris,
    error::UmapError,
    graph::fuzzy_simplicial_set,
    model::{NetworkConfig, UmapNetwork},
    sweep::{draw_umap, run_sweep, summary_table, sweep_runs, DrawOptions, MARKER_SIZE},
    utils::{
        convert_tensor_to_vector, convert_vector_to_tensor, format_duration, matrix_shape,
        FeatureScaling,
    },
    Umap,
};

// ---------------------------------------------------------------------------
// Backend alias
// ---------------------------------------------------------------------------
type B = NdArray<f32>;

fn cpu() -> burn::backend::ndarray::NdArrayDevice {
    burn::backend::ndarray::NdArrayDevice::Cpu
}

/// Short training keeps the suite fast; shapes and titles do not depend on it.
fn quick() -> OptimizationParams {
    OptimizationParams {
        n_epochs: 10,
        verbose: false,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Recording plot context
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq)]
enum Event {
    CloseAll,
    Scatter {
        rows: usize,
        widths: Vec<usize>,
        labels: Vec<usize>,
        marker_size: u32,
    },
    Title(String),
    Name(String),
    Show,
}

#[derive(Debug, Default)]
struct RecordingPlotter {
    events: Vec<Event>,
}

impl RecordingPlotter {
    fn titles(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Title(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    fn scatters(&self) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| matches!(e, Event::Scatter { .. }))
            .collect()
    }
}

impl Plotter for RecordingPlotter {
    fn close_all(&mut self) {
        self.events.push(Event::CloseAll);
    }

    fn scatter(
        &mut self,
        points: &[Vec<f64>],
        labels: &[usize],
        marker_size: u32,
    ) -> Result<(), UmapError> {
        let mut widths: Vec<usize> = points.iter().map(Vec::len).collect();
        widths.dedup();
        self.events.push(Event::Scatter {
            rows: points.len(),
            widths,
            labels: labels.to_vec(),
            marker_size,
        });
        Ok(())
    }

    fn set_title(&mut self, title: &str) {
        self.events.push(Event::Title(title.to_string()));
    }

    fn set_name(&mut self, name: &str) {
        self.events.push(Event::Name(name.to_string()));
    }

    fn show(&mut self) -> Result<(), UmapError> {
        self.events.push(Event::Show);
        Ok(())
    }
}

fn assert_iris_embedding(rows: &[Vec<f64>]) {
    assert_eq!(rows.len(), 150, "one embedding row per sample");
    assert!(rows.iter().all(|r| r.len() == 2), "embedding must be 2-D");
    assert!(
        rows.iter().flatten().all(|v| v.is_finite()),
        "embedding contains non-finite values"
    );
}

fn draw(options: DrawOptions) -> (RecordingPlotter, Vec<Vec<f64>>) {
    let iris = load_iris();
    let mut plotter = RecordingPlotter::default();
    let fitted = draw_umap::<CpuBackend, _>(
        &mut plotter,
        &iris.data,
        &iris.labels,
        &options.with_optimization(quick()),
    )
    .expect("draw_umap failed");
    (plotter, fitted.into_embedding())
}

// ===========================================================================
// draw_umap
// ===========================================================================

#[test]
fn draw_umap_min_dist_tight() {
    let (plotter, embedding) = draw(DrawOptions::default().with_min_dist(0.001));
    assert_iris_embedding(&embedding);
    assert_eq!(plotter.titles(), vec!["nn = 15, d = 0.001"]);
}

#[test]
fn draw_umap_min_dist_loose() {
    let (plotter, embedding) = draw(DrawOptions::default().with_min_dist(0.99));
    assert_iris_embedding(&embedding);
    assert_eq!(plotter.titles(), vec!["nn = 15, d = 0.99"]);
}

#[test]
fn draw_umap_few_neighbors() {
    let (plotter, embedding) = draw(DrawOptions::default().with_n_neighbors(3));
    assert_iris_embedding(&embedding);
    assert_eq!(plotter.titles(), vec!["nn = 3, d = 0.1"]);
}

#[test]
fn draw_umap_many_neighbors() {
    let (plotter, embedding) = draw(DrawOptions::default().with_n_neighbors(30));
    assert_iris_embedding(&embedding);
    assert_eq!(plotter.titles(), vec!["nn = 30, d = 0.1"]);
}

#[test]
fn draw_umap_event_order_with_close() {
    let (plotter, _) = draw(DrawOptions::default());
    let iris = load_iris();
    assert_eq!(
        plotter.events,
        vec![
            Event::CloseAll,
            Event::Scatter {
                rows: 150,
                widths: vec![2],
                labels: iris.labels.clone(),
                marker_size: MARKER_SIZE,
            },
            Event::Title("nn = 15, d = 0.1".into()),
            Event::Show,
        ]
    );
    assert_eq!(MARKER_SIZE, 1);
}

#[test]
fn draw_umap_without_close_keeps_figures() {
    let (plotter, _) = draw(DrawOptions::default().with_close(false));
    assert!(!plotter.events.contains(&Event::CloseAll));
    assert_eq!(plotter.scatters().len(), 1);
}

#[test]
fn draw_umap_title_names_the_figure_only() {
    let (plotter, _) = draw(DrawOptions::default().with_title("baseline"));
    assert_eq!(plotter.titles(), vec!["nn = 15, d = 0.1"]);
    assert!(plotter.events.contains(&Event::Name("baseline".into())));
}

#[test]
fn draw_umap_neighbors_at_or_above_sample_count_fails_before_drawing() {
    let iris = load_iris();
    for n_neighbors in [150, 151, 200] {
        let mut plotter = RecordingPlotter::default();
        let options = DrawOptions::default()
            .with_n_neighbors(n_neighbors)
            .with_optimization(quick());
        let result = draw_umap::<CpuBackend, _>(&mut plotter, &iris.data, &iris.labels, &options);
        match result {
            Err(UmapError::NeighborsExceedSamples {
                n_neighbors: n,
                n_samples: 150,
            }) => assert_eq!(n, n_neighbors),
            Err(other) => panic!("n_neighbors={n_neighbors}: unexpected error {other}"),
            Ok(_) => panic!("n_neighbors={n_neighbors}: expected an error"),
        }
        assert!(plotter.events.is_empty(), "nothing may be drawn on failure");
    }
}

#[test]
fn draw_umap_rejects_label_mismatch() {
    let iris = load_iris();
    let mut plotter = RecordingPlotter::default();
    let options = DrawOptions::default().with_optimization(quick());
    let result = draw_umap::<CpuBackend, _>(&mut plotter, &iris.data, &iris.labels[..10], &options);
    assert!(matches!(
        result,
        Err(UmapError::LabelMismatch {
            labels: 10,
            samples: 150
        })
    ));
}

#[test]
fn default_options_match_explicit_defaults() {
    let implicit = DrawOptions::default();
    let explicit = DrawOptions::default()
        .with_n_neighbors(15)
        .with_min_dist(0.1);
    assert_eq!(implicit, explicit);
    assert_eq!(implicit.umap_config(), explicit.umap_config());
    assert_eq!(implicit.caption(), "nn = 15, d = 0.1");

    let config = implicit.umap_config();
    assert_eq!(config.n_components, 2);
    assert_eq!(config.graph.n_neighbors, 15);
    assert_eq!(config.manifold.min_dist, 0.1);
    assert!(implicit.close);
}

#[test]
fn caption_writes_min_dist_as_a_float() {
    let caption = |d: f64| DrawOptions::default().with_min_dist(d).caption();
    assert_eq!(caption(0.0), "nn = 15, d = 0.0");
    assert_eq!(caption(1.0), "nn = 15, d = 1.0");
    assert_eq!(caption(0.5), "nn = 15, d = 0.5");
    assert_eq!(caption(0.001), "nn = 15, d = 0.001");
    assert_eq!(
        DrawOptions::default().with_n_neighbors(3).caption(),
        "nn = 3, d = 0.1"
    );
}

// ===========================================================================
// Sweep
// ===========================================================================

#[test]
fn sweep_runs_are_fixed() {
    let captions: Vec<String> = sweep_runs().iter().map(DrawOptions::caption).collect();
    assert_eq!(
        captions,
        vec![
            "nn = 15, d = 0.001",
            "nn = 15, d = 0.1",
            "nn = 15, d = 0.99",
            "nn = 3, d = 0.1",
            "nn = 5, d = 0.1",
            "nn = 30, d = 0.1",
        ]
    );
    assert!(sweep_runs().iter().all(|o| o.close));
}

#[test]
fn run_sweep_draws_six_two_dimensional_plots() {
    let iris = load_iris();
    let mut plotter = RecordingPlotter::default();
    let optimization = OptimizationParams {
        n_epochs: 5,
        verbose: false,
        ..Default::default()
    };
    let records = run_sweep::<CpuBackend, _>(&mut plotter, &iris, &optimization).unwrap();

    assert_eq!(records.len(), 6);
    assert_eq!(plotter.scatters().len(), 6);
    for scatter in plotter.scatters() {
        match scatter {
            Event::Scatter { rows, widths, .. } => {
                assert_eq!(*rows, 150);
                assert_eq!(widths, &vec![2]);
            }
            _ => unreachable!(),
        }
    }
    assert_eq!(
        plotter.titles(),
        records.iter().map(|r| r.caption.clone()).collect::<Vec<_>>()
    );
    assert_eq!(
        plotter.events.iter().filter(|e| **e == Event::CloseAll).count(),
        6
    );
    assert!(records.iter().all(|r| r.epochs > 0 && r.epochs <= 5));

    let table = summary_table(&records);
    assert_eq!(table.len(), 7, "header plus one row per run");
}

// ===========================================================================
// Umap
// ===========================================================================

fn quick_config() -> UmapConfig {
    UmapConfig {
        optimization: quick(),
        ..Default::default()
    }
}

#[test]
fn fit_transform_shape() {
    let iris = load_iris();
    let embedding = Umap::<CpuBackend>::new(quick_config())
        .fit_transform(&iris.data)
        .unwrap();
    assert_iris_embedding(&embedding);
}

#[test]
fn fitted_umap_reports_training() {
    let iris = load_iris();
    let fitted = Umap::<CpuBackend>::new(quick_config()).fit(&iris.data).unwrap();
    assert_eq!(fitted.losses().len(), fitted.epochs());
    assert!(fitted.epochs() > 0 && fitted.epochs() <= 10);
    assert!(fitted.losses().iter().all(|l| l.is_finite()));
    assert!(fitted.best_loss() <= fitted.losses()[0]);

    let (a, b) = fitted.curve_params();
    assert!((a - 1.577).abs() < 0.05 && (b - 0.895).abs() < 0.05);
}

#[test]
fn fitted_umap_transforms_new_rows() {
    let iris = load_iris();
    let fitted = Umap::<CpuBackend>::new(quick_config()).fit(&iris.data).unwrap();

    let embedded = fitted.transform(&iris.data[..5]).unwrap();
    assert_eq!(embedded.len(), 5);
    assert!(embedded.iter().all(|r| r.len() == 2));

    let wrong = vec![vec![1.0, 2.0]];
    assert!(matches!(
        fitted.transform(&wrong),
        Err(UmapError::RaggedRow {
            found: 2,
            expected: 4,
            ..
        })
    ));
}

#[test]
fn explicit_kernel_skips_curve_fit() {
    let iris = load_iris();
    let mut config = quick_config();
    config.manifold.a = Some(1.0);
    config.manifold.b = Some(1.0);
    let fitted = Umap::<CpuBackend>::new(config).fit(&iris.data).unwrap();
    assert_eq!(fitted.curve_params(), (1.0, 1.0));
}

#[test]
fn fit_rejects_empty_and_ragged_data() {
    let umap = Umap::<CpuBackend>::new(quick_config());
    assert!(matches!(umap.fit(&[]), Err(UmapError::EmptyData)));

    let mut data = load_iris().data;
    data[7].pop();
    assert!(matches!(
        umap.fit(&data),
        Err(UmapError::RaggedRow {
            row: 7,
            found: 3,
            expected: 4
        })
    ));
}

#[test]
fn fit_rejects_invalid_min_dist() {
    let mut config = quick_config();
    config.manifold.min_dist = 1.5;
    let result = Umap::<CpuBackend>::new(config).fit(&load_iris().data);
    assert!(matches!(result, Err(UmapError::InvalidMinDist { .. })));
}

#[test]
fn iris_graph_connects_every_sample() {
    let iris = load_iris();
    for k in [3, 5, 15, 30] {
        let graph = fuzzy_simplicial_set(&iris.data, k, 1.0, 1.0);
        for v in 0..150 {
            assert!(graph.degree(v) > 0, "k={k}: sample {v} is isolated");
        }
    }
}

// ===========================================================================
// Utilities
// ===========================================================================

#[test]
fn format_duration_values() {
    assert_eq!(format_duration(Duration::from_secs(0)), "00:00:00");
    assert_eq!(format_duration(Duration::from_secs(125)), "00:02:05");
    assert_eq!(format_duration(Duration::from_secs(3723)), "01:02:03");
}

#[test]
fn feature_scaling_zero_mean_unit_std() {
    let data = vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0], vec![5.0]];
    let scaling = FeatureScaling::fit(&data);
    let scaled = scaling.transform(&data);

    let mean: f64 = scaled.iter().sum::<f64>() / scaled.len() as f64;
    let var: f64 = scaled.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / scaled.len() as f64;
    approx::assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-10);
    approx::assert_abs_diff_eq!(var.sqrt(), 1.0, epsilon = 1e-10);
}

#[test]
fn feature_scaling_constant_column_does_not_nan() {
    let data = vec![vec![5.0, 1.0], vec![5.0, 2.0], vec![5.0, 3.0]];
    let scaled = FeatureScaling::fit(&data).transform(&data);
    assert!(scaled.iter().all(|v| v.is_finite()));
}

#[test]
fn matrix_shape_checks() {
    assert_eq!(matrix_shape(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap(), (2, 2));
    assert!(matches!(matrix_shape(&[vec![]]), Err(UmapError::EmptyData)));
}

#[test]
fn tensor_round_trip() {
    let device = cpu();
    let orig: Vec<f64> = (0..12).map(|i| i as f64).collect();
    let tensor: Tensor<B, 2> = convert_vector_to_tensor(orig.clone(), 4, 3, &device);
    assert_eq!(tensor.dims(), [4, 3]);
    let back = convert_tensor_to_vector(tensor).unwrap();
    assert_eq!(back.len(), 4);
    for (a, b) in orig.iter().zip(back.iter().flatten()) {
        assert!((a - b).abs() < 1e-5, "round-trip mismatch: {a} vs {b}");
    }
}

#[test]
fn convert_tensor_nan_replaced_by_zero() {
    let device = cpu();
    let data = vec![f32::NAN, 0.0, 0.0, 0.0];
    let t: Tensor<B, 2> = Tensor::from_data(TensorData::new(data, [2, 2]), &device);
    let v = convert_tensor_to_vector(t).unwrap();
    assert_eq!(v[0][0], 0.0, "NaN should be replaced by 0.0");
}

// ===========================================================================
// UmapNetwork
// ===========================================================================

fn make_network(input: usize, hidden: Vec<usize>, output: usize) -> UmapNetwork<B> {
    UmapNetwork::new(&NetworkConfig::new(input, hidden, output), &cpu())
}

#[test]
fn network_forward_output_shape() {
    let network = make_network(4, vec![100, 100, 100], 2);
    assert_eq!(network.num_layers(), 4);
    let input: Tensor<B, 2> =
        Tensor::from_data(TensorData::new(vec![0.5f32; 150 * 4], [150, 4]), &cpu());
    assert_eq!(network.forward(input).dims(), [150, 2]);
}

#[test]
fn network_without_hidden_layers_is_linear() {
    let network = make_network(4, vec![], 2);
    assert_eq!(network.num_layers(), 1);
    let input: Tensor<B, 2> = Tensor::from_data(TensorData::new(vec![1.0f32; 4], [1, 4]), &cpu());
    assert_eq!(network.forward(input).dims(), [1, 2]);
}

#[test]
fn network_forward_deterministic() {
    let network = make_network(4, vec![12], 2);
    let data: Vec<f32> = vec![0.1, 0.2, 0.3, 0.4];
    let make_input = || -> Tensor<B, 2> { Tensor::from_data(TensorData::new(data.clone(), [1, 4]), &cpu()) };
    let out1 = network.forward(make_input()).to_data().to_vec::<f32>().unwrap();
    let out2 = network.forward(make_input()).to_data().to_vec::<f32>().unwrap();
    assert_eq!(out1, out2);
}

// ===========================================================================
// Rendering
// ===========================================================================

/// Text rendering needs a system font; without one plotters reports a
/// drawing error, which must surface as `UmapError::Plot`.
fn rendered_or_font_error(result: Result<(), UmapError>) -> bool {
    match result {
        Ok(()) => true,
        Err(UmapError::Plot(_)) => false,
        Err(other) => panic!("unexpected error: {other}"),
    }
}

#[test]
fn bitmap_plotter_writes_named_png() {
    let dir = tempfile::tempdir().unwrap();
    let config = ChartConfig::builder().path(dir.path()).width(300).height(300).build();
    let mut plotter = BitmapPlotter::new(config);

    let points = vec![vec![0.0, 0.0], vec![1.0, 1.0], vec![2.0, 0.5]];
    plotter.scatter(&points, &[0, 1, 2], 1).unwrap();
    plotter.set_title("nn = 15, d = 0.1");
    plotter.set_name("sample");

    if rendered_or_font_error(plotter.show()) {
        let expected = dir.path().join("sample.png");
        assert_eq!(plotter.rendered(), &[expected.clone()]);
        assert!(expected.exists());

        // Nothing changed, nothing re-rendered.
        plotter.show().unwrap();
        assert_eq!(plotter.rendered().len(), 1);
    }
}

#[test]
fn draw_umap_without_close_opens_a_new_figure_per_call() {
    let dir = tempfile::tempdir().unwrap();
    let config = ChartConfig::builder().path(dir.path()).width(300).height(300).build();
    let mut plotter = BitmapPlotter::new(config);
    let iris = load_iris();

    let first = DrawOptions::default().with_optimization(quick());
    let second = DrawOptions::default()
        .with_n_neighbors(5)
        .with_close(false)
        .with_optimization(quick());

    let first_shown = rendered_or_font_error(
        draw_umap::<CpuBackend, _>(&mut plotter, &iris.data, &iris.labels, &first).map(|_| ()),
    );
    let second_shown = rendered_or_font_error(
        draw_umap::<CpuBackend, _>(&mut plotter, &iris.data, &iris.labels, &second).map(|_| ()),
    );

    let figures = plotter.open_figures();
    assert_eq!(figures.len(), 2);
    assert_ne!(figures[0].name, figures[1].name);
    assert_eq!(figures[0].title.as_deref(), Some("nn = 15, d = 0.1"));
    assert_eq!(figures[1].title.as_deref(), Some("nn = 5, d = 0.1"));
    assert!(figures.iter().all(|f| f.series.len() == 1));

    if first_shown && second_shown {
        let rendered = plotter.rendered();
        assert_eq!(rendered.len(), 2);
        assert_ne!(rendered[0], rendered[1]);
        assert!(rendered.iter().all(|path| path.exists()));
    }
}

#[test]
fn plot_loss_writes_png() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("losses.png");
    let losses = vec![3.0, 2.5, 2.0, 1.8, 1.7];
    if rendered_or_font_error(plot_loss(&losses, &path)) {
        assert!(path.exists());
    }
}
