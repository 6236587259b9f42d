//! Training of the embedding network on the fuzzy cross-entropy loss.
//!
//! Every epoch embeds all points at once, then gathers the endpoints of
//! every graph edge (attraction) and of freshly drawn random pairs
//! (repulsion). With `q = 1 / (1 + a·d^(2b))` the loss is
//!
//! ```text
//! Σ w·(−log q) / Σ w  +  repulsion_strength · mean(−log(1 − q))
//! ```

use std::time::{Duration, Instant};

use burn::{
    module::Module,
    optim::{decay::WeightDecayConfig, AdamConfig, GradientsParams, Optimizer},
    tensor::{backend::AutodiffBackend, cast::ToElement, Device, Int, Tensor, TensorData},
};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{config::OptimizationParams, graph::FuzzyGraph, model::UmapNetwork, utils::format_duration};

const PROBABILITY_FLOOR: f32 = 1e-6;
const DISTANCE_FLOOR: f32 = 1e-8;

/// The trained network with its loss history.
pub struct TrainingOutcome<B: AutodiffBackend> {
    /// Network weights from the epoch with the lowest loss.
    pub model: UmapNetwork<B>,
    pub losses: Vec<f64>,
    pub best_loss: f64,
    pub epochs: usize,
}

/// Train `model` so that its embedding of `inputs` reproduces `graph`.
///
/// # Arguments
/// * `model` - The network to train.
/// * `inputs` - One (scaled) row per graph vertex.
/// * `graph` - The pruned fuzzy graph; its edges are the attractive pairs.
/// * `kernel` - The fitted `(a, b)` pair of `1 / (1 + a·d^(2b))`.
/// * `params` - Epochs, Adam settings, sampling rate, and stopping rules.
/// * `device` - The device tensors are created on.
///
/// # Returns
/// The network holding the best-scoring weights, with the loss history.
pub fn train<B: AutodiffBackend>(
    mut model: UmapNetwork<B>,
    inputs: Tensor<B, 2>,
    graph: &FuzzyGraph,
    kernel: (f64, f64),
    params: &OptimizationParams,
    device: &Device<B>,
) -> TrainingOutcome<B> {
    let num_samples = graph.n_vertices;
    let kernel_a = kernel.0 as f32;
    let kernel_b = kernel.1 as f32;
    let verbose = params.verbose;

    if graph.edges.is_empty() {
        warn!("fuzzy graph has no edges, skipping training");
        return TrainingOutcome {
            model,
            losses: Vec::new(),
            best_loss: f64::INFINITY,
            epochs: 0,
        };
    }

    // ── Positive edges: fixed for the whole run ──────────────────────────────
    let n_pos = graph.edges.len();
    let weight_sum: f64 = graph.edges.iter().map(|e| e.weight).sum();
    let pos_heads: Vec<i64> = graph.edges.iter().map(|e| e.head as i64).collect();
    let pos_tails: Vec<i64> = graph.edges.iter().map(|e| e.tail as i64).collect();
    let weights: Vec<f32> = graph
        .edges
        .iter()
        .map(|e| (e.weight / weight_sum) as f32)
        .collect();
    let weights = Tensor::<B, 1>::from_data(TensorData::new(weights, [n_pos]), device);

    let n_neg = match params.negative_sample_rate {
        0 => 0,
        rate => (n_pos * rate).max(num_samples),
    };
    let n_total = n_pos + n_neg;

    if verbose {
        info!(
            "training: samples={num_samples} edges={n_pos} negatives/epoch={n_neg} epochs={} lr={:.0e}",
            params.n_epochs, params.learning_rate
        );
        info!("kernel: a={kernel_a:.4} b={kernel_b:.4} (q = 1 / (1 + a·d^(2b)))");
    }

    let mut rng = StdRng::seed_from_u64(params.seed);

    let mut optim = AdamConfig::new()
        .with_weight_decay(Some(WeightDecayConfig::new(params.penalty as f32)))
        .with_beta_1(params.beta1 as f32)
        .with_beta_2(params.beta2 as f32)
        .init();

    let pb = verbose.then(|| {
        let pb = ProgressBar::new(params.n_epochs as u64);
        let style = ProgressStyle::default_bar()
            .template("{bar:40} | {msg}")
            .map(|style| style.progress_chars("=>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb
    });

    let start_time = Instant::now();
    let mut losses: Vec<f64> = Vec::with_capacity(params.n_epochs);
    let mut best_loss = f64::INFINITY;
    let mut best_record = model.clone().into_record();
    let mut epochs_without_improvement = 0usize;
    let mut epoch = 0usize;

    while epoch < params.n_epochs {
        // ── Fresh negative samples, appended after the positive edges ────────
        let mut heads = pos_heads.clone();
        let mut tails = pos_tails.clone();
        heads.reserve(n_neg);
        tails.reserve(n_neg);
        for _ in 0..n_neg {
            let i = rng.random_range(0..num_samples);
            let mut j = rng.random_range(0..num_samples - 1);
            if j >= i {
                j += 1;
            }
            heads.push(i as i64);
            tails.push(j as i64);
        }
        let heads = Tensor::<B, 1, Int>::from_data(TensorData::new(heads, [n_total]), device);
        let tails = Tensor::<B, 1, Int>::from_data(TensorData::new(tails, [n_total]), device);

        // ── Forward: embed every point, then gather the pair endpoints ───────
        let embeddings = model.forward(inputs.clone());
        let head_emb = embeddings.clone().select(0, heads);
        let tail_emb = embeddings.select(0, tails);
        let diff = head_emb - tail_emb;
        let dist_sq: Tensor<B, 1> = (diff.clone() * diff).sum_dim(1).reshape([n_total]);

        // Attraction: −log(q) along graph edges, weighted by membership.
        let dist_pow_pos = dist_sq
            .clone()
            .slice([0..n_pos])
            .clamp_min(DISTANCE_FLOOR)
            .powf_scalar(kernel_b);
        let q_pos = (dist_pow_pos * kernel_a + 1.0f32).recip();
        let attraction = (q_pos.clamp_min(PROBABILITY_FLOOR).log().neg() * weights.clone()).sum();

        // Repulsion: −log(1 − q) where 1 − q = a·d^(2b) / (1 + a·d^(2b)).
        let loss = if n_neg > 0 {
            let dist_pow_neg = dist_sq
                .slice([n_pos..n_total])
                .clamp_min(DISTANCE_FLOOR)
                .powf_scalar(kernel_b);
            let a_dpow_neg = dist_pow_neg * kernel_a;
            let one_minus_q = a_dpow_neg.clone() / (a_dpow_neg + 1.0f32);
            let repulsion = one_minus_q.clamp_min(PROBABILITY_FLOOR).log().neg().mean();
            attraction + repulsion.mul_scalar(params.repulsion_strength as f32)
        } else {
            attraction
        };

        let current_loss = loss.clone().into_scalar().to_f64();
        if !current_loss.is_finite() {
            warn!("loss became {current_loss} at epoch {epoch}, stopping early");
            break;
        }

        // ── Backward + optimizer step ────────────────────────────────────────
        let grads = GradientsParams::from_grads(loss.backward(), &model);
        if current_loss < best_loss {
            best_loss = current_loss;
            best_record = model.clone().into_record();
            epochs_without_improvement = 0;
        } else {
            epochs_without_improvement += 1;
        }
        model = optim.step(params.learning_rate, model, grads);

        losses.push(current_loss);
        epoch += 1;

        let elapsed = start_time.elapsed();
        if let Some(pb) = &pb {
            pb.inc(1);
            pb.set_message(format!(
                "Elapsed: {} | Epoch: {epoch}/{} | Loss: {current_loss:.6} | Best: {best_loss:.6}",
                format_duration(elapsed),
                params.n_epochs,
            ));
        }

        if let Some(timeout) = params.timeout {
            if elapsed >= Duration::from_secs(timeout) {
                debug!("timeout ({timeout}s) reached at epoch {epoch}");
                break;
            }
        }

        if let Some(patience) = params.patience {
            if epochs_without_improvement >= patience {
                debug!("no improvement for {patience} epochs, best loss {best_loss:.6}");
                break;
            }
        }

        if let Some(min_desired_loss) = params.min_desired_loss {
            if current_loss < min_desired_loss {
                debug!("desired loss {min_desired_loss:.6} reached at epoch {epoch}");
                break;
            }
        }
    }

    if let Some(pb) = pb {
        pb.finish();
    }

    // Weights that scored `best_loss`, taken before that epoch's step.
    model = model.load_record(best_record);

    if verbose {
        info!(
            "training complete: {epoch} epochs in {}, best loss {best_loss:.6}",
            format_duration(start_time.elapsed()),
        );
    }

    TrainingOutcome {
        model,
        losses,
        best_loss,
        epochs: epoch,
    }
}
