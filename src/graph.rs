//! High-dimensional neighbourhood graph (the fuzzy simplicial set).
//!
//! Built on the CPU once per fit: dense pairwise distances, k nearest
//! neighbours per point, a per-point distance scale, and finally a
//! symmetrised, weighted edge list that the training loop attracts along.

use rayon::prelude::*;

/// Binary search steps when solving for a point's distance scale.
const SMOOTH_K_STEPS: usize = 64;
const SMOOTH_K_TOLERANCE: f64 = 1e-5;

/// Lower bound on sigma, relative to the mean neighbour distance.
const MIN_K_DIST_SCALE: f64 = 1e-3;

/// A weighted, directed edge of the fuzzy graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub head: usize,
    pub tail: usize,
    pub weight: f64,
}

/// Symmetric fuzzy graph over the input samples. Every undirected edge is
/// stored in both directions; there are no self loops.
#[derive(Debug, Clone)]
pub struct FuzzyGraph {
    pub n_vertices: usize,
    pub edges: Vec<Edge>,
    /// Distance to the nearest non-identical neighbour, per point.
    pub rhos: Vec<f64>,
    /// Normalising distance scale, per point.
    pub sigmas: Vec<f64>,
}

impl FuzzyGraph {
    pub fn max_weight(&self) -> f64 {
        self.edges.iter().map(|e| e.weight).fold(0.0, f64::max)
    }

    /// Drop edges too weak to be sampled even once in `n_epochs` epochs.
    pub fn prune(&mut self, n_epochs: usize) {
        let threshold = self.max_weight() / n_epochs.max(1) as f64;
        self.edges.retain(|e| e.weight >= threshold);
    }

    /// Number of outgoing edges of `vertex`.
    pub fn degree(&self, vertex: usize) -> usize {
        self.edges.iter().filter(|e| e.head == vertex).count()
    }
}

/// Dense row-major `n × n` Euclidean distance matrix.
pub fn pairwise_distances(data: &[Vec<f64>]) -> Vec<f64> {
    let n = data.len();
    let mut distances = vec![0.0; n * n];
    distances
        .par_chunks_mut(n.max(1))
        .enumerate()
        .for_each(|(i, row)| {
            for (j, out) in row.iter_mut().enumerate() {
                *out = data[i]
                    .iter()
                    .zip(&data[j])
                    .map(|(a, b)| (a - b).powi(2))
                    .sum::<f64>()
                    .sqrt();
            }
        });
    distances
}

/// The `k` nearest neighbours of every row of a dense distance matrix.
///
/// Each point is its own first neighbour (even when it has exact duplicates);
/// remaining ties are broken by index. Returns `(indices, distances)`, both
/// row-major `n × k`.
pub fn nearest_neighbors(distances: &[f64], n: usize, k: usize) -> (Vec<usize>, Vec<f64>) {
    let rows: Vec<(Vec<usize>, Vec<f64>)> = (0..n)
        .into_par_iter()
        .map(|i| {
            let row = &distances[i * n..(i + 1) * n];
            let mut order: Vec<usize> = (0..n).collect();
            order.sort_by(|&x, &y| {
                row[x]
                    .total_cmp(&row[y])
                    .then_with(|| (x != i).cmp(&(y != i)))
                    .then_with(|| x.cmp(&y))
            });
            order.truncate(k);
            let dists = order.iter().map(|&j| row[j]).collect();
            (order, dists)
        })
        .collect();

    let mut indices = Vec::with_capacity(n * k);
    let mut dists = Vec::with_capacity(n * k);
    for (idx, d) in rows {
        indices.extend(idx);
        dists.extend(d);
    }
    (indices, dists)
}

/// Per-point `(sigmas, rhos)` for row-major `n × k` neighbour distances.
///
/// `rho` is the distance to the `local_connectivity`-th non-zero neighbour
/// (interpolated for fractional values). `sigma` solves
/// `Σ_{j≥1} exp(-max(0, d_j - rho) / sigma) = log2(k)` by bisection.
pub fn smooth_knn_dist(knn_dists: &[f64], k: usize, local_connectivity: f64) -> (Vec<f64>, Vec<f64>) {
    let n = knn_dists.len() / k.max(1);
    let target = (k as f64).log2();
    let mean_distances = if knn_dists.is_empty() {
        0.0
    } else {
        knn_dists.iter().sum::<f64>() / knn_dists.len() as f64
    };

    let mut sigmas = Vec::with_capacity(n);
    let mut rhos = Vec::with_capacity(n);

    for row in knn_dists.chunks(k) {
        let non_zero: Vec<f64> = row.iter().copied().filter(|&d| d > 0.0).collect();

        let mut rho = 0.0;
        if non_zero.len() as f64 >= local_connectivity {
            let index = local_connectivity.floor() as usize;
            let interpolation = local_connectivity - index as f64;
            if index > 0 {
                rho = non_zero[index - 1];
                if interpolation > SMOOTH_K_TOLERANCE {
                    if let Some(next) = non_zero.get(index) {
                        rho += interpolation * (next - non_zero[index - 1]);
                    }
                }
            } else {
                rho = interpolation * non_zero[0];
            }
        } else if let Some(max) = non_zero.iter().copied().reduce(f64::max) {
            rho = max;
        }

        let mut lo = 0.0;
        let mut hi = f64::INFINITY;
        let mut mid = 1.0;
        for _ in 0..SMOOTH_K_STEPS {
            let psum: f64 = row
                .iter()
                .skip(1)
                .map(|&d| {
                    let d = d - rho;
                    if d > 0.0 {
                        (-(d / mid)).exp()
                    } else {
                        1.0
                    }
                })
                .sum();

            if (psum - target).abs() < SMOOTH_K_TOLERANCE {
                break;
            }
            if psum > target {
                hi = mid;
                mid = (lo + hi) / 2.0;
            } else {
                lo = mid;
                if hi == f64::INFINITY {
                    mid *= 2.0;
                } else {
                    mid = (lo + hi) / 2.0;
                }
            }
        }

        let mut sigma = mid;
        let floor = if rho > 0.0 {
            MIN_K_DIST_SCALE * row.iter().sum::<f64>() / row.len() as f64
        } else {
            MIN_K_DIST_SCALE * mean_distances
        };
        if sigma < floor {
            sigma = floor;
        }

        sigmas.push(sigma);
        rhos.push(rho);
    }

    (sigmas, rhos)
}

/// Build the symmetrised fuzzy graph of `data` over its `k` nearest neighbours.
///
/// Directed memberships are `exp(-(d - rho) / sigma)` (1 when `d <= rho`),
/// combined as `mix·(A + Aᵀ - A∘Aᵀ) + (1 - mix)·(A∘Aᵀ)`.
///
/// Callers must ensure `2 <= k < data.len()`.
pub fn fuzzy_simplicial_set(
    data: &[Vec<f64>],
    k: usize,
    local_connectivity: f64,
    set_op_mix_ratio: f64,
) -> FuzzyGraph {
    let n = data.len();
    let distances = pairwise_distances(data);
    let (knn_indices, knn_dists) = nearest_neighbors(&distances, n, k);
    let (sigmas, rhos) = smooth_knn_dist(&knn_dists, k, local_connectivity);

    let mut membership = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..k {
            let neighbor = knn_indices[i * k + j];
            let d = knn_dists[i * k + j];
            let value = if neighbor == i {
                0.0
            } else if d - rhos[i] <= 0.0 || sigmas[i] == 0.0 {
                1.0
            } else {
                (-((d - rhos[i]) / sigmas[i])).exp()
            };
            membership[i * n + neighbor] = value;
        }
    }

    let mut edges = Vec::new();
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let forward = membership[i * n + j];
            let backward = membership[j * n + i];
            let product = forward * backward;
            let weight = set_op_mix_ratio * (forward + backward - product)
                + (1.0 - set_op_mix_ratio) * product;
            if weight > 0.0 {
                edges.push(Edge {
                    head: i,
                    tail: j,
                    weight,
                });
            }
        }
    }

    FuzzyGraph {
        n_vertices: n,
        edges,
        rhos,
        sigmas,
    }
}
