//! Fit of the low-dimensional similarity kernel.
//!
//! The embedding measures closeness with `q(d) = 1 / (1 + a·d^(2b))`. The
//! parameters `a` and `b` are chosen so that `q` best matches (least squares)
//! an offset exponential decay: `1` up to `min_dist`, then
//! `exp(-(d - min_dist) / spread)`.

/// Number of sample points on `[0, 3·spread]`.
const SAMPLES: usize = 300;

const MAX_ITERATIONS: usize = 500;

/// Fit `(a, b)` for the given `spread` and `min_dist` with Levenberg–Marquardt,
/// starting from `a = b = 1`.
///
/// For the common `spread = 1.0, min_dist = 0.1` this gives roughly
/// `a = 1.577, b = 0.895`.
pub fn find_ab_params(spread: f64, min_dist: f64) -> (f64, f64) {
    let xs: Vec<f64> = (0..SAMPLES)
        .map(|i| i as f64 * 3.0 * spread / (SAMPLES - 1) as f64)
        .collect();
    let ys: Vec<f64> = xs
        .iter()
        .map(|&x| {
            if x < min_dist {
                1.0
            } else {
                (-(x - min_dist) / spread).exp()
            }
        })
        .collect();

    let mut a = 1.0;
    let mut b = 1.0;
    let mut cost = sum_of_squares(&xs, &ys, a, b);
    let mut lambda = 1e-3;

    for _ in 0..MAX_ITERATIONS {
        // Normal equations J^T J δ = J^T r for r = y - q(x).
        let (mut jaa, mut jab, mut jbb) = (0.0, 0.0, 0.0);
        let (mut ra, mut rb) = (0.0, 0.0);
        for (&x, &y) in xs.iter().zip(&ys) {
            let (q, dq_da, dq_db) = kernel_with_gradient(x, a, b);
            let r = y - q;
            jaa += dq_da * dq_da;
            jab += dq_da * dq_db;
            jbb += dq_db * dq_db;
            ra += dq_da * r;
            rb += dq_db * r;
        }

        let mut improved = false;
        while lambda < 1e12 {
            let maa = jaa * (1.0 + lambda);
            let mbb = jbb * (1.0 + lambda);
            let det = maa * mbb - jab * jab;
            if det.abs() < f64::MIN_POSITIVE {
                lambda *= 10.0;
                continue;
            }
            let da = (ra * mbb - jab * rb) / det;
            let db = (maa * rb - jab * ra) / det;
            let (next_a, next_b) = (a + da, b + db);

            if next_a > 0.0 && next_b > 0.0 {
                let next_cost = sum_of_squares(&xs, &ys, next_a, next_b);
                if next_cost < cost {
                    let converged = (cost - next_cost) <= 1e-15 * cost.max(1e-15)
                        || (da.abs() < 1e-12 && db.abs() < 1e-12);
                    a = next_a;
                    b = next_b;
                    cost = next_cost;
                    lambda = (lambda / 10.0).max(1e-12);
                    improved = !converged;
                    break;
                }
            }
            lambda *= 10.0;
        }

        if !improved {
            break;
        }
    }

    (a, b)
}

/// `q(x)` and its partial derivatives with respect to `a` and `b`.
fn kernel_with_gradient(x: f64, a: f64, b: f64) -> (f64, f64, f64) {
    if x <= 0.0 {
        return (1.0, 0.0, 0.0);
    }
    let p = x.powf(2.0 * b);
    let denom = 1.0 + a * p;
    let q = 1.0 / denom;
    let dq_da = -p / (denom * denom);
    let dq_db = -a * p * 2.0 * x.ln() / (denom * denom);
    (q, dq_da, dq_db)
}

fn sum_of_squares(xs: &[f64], ys: &[f64], a: f64, b: f64) -> f64 {
    xs.iter()
        .zip(ys)
        .map(|(&x, &y)| {
            let (q, _, _) = kernel_with_gradient(x, a, b);
            (y - q).powi(2)
        })
        .sum()
}
