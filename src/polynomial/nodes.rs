//! Gauss-Lobatto-Legendre nodes and weights, and Newton-form interpolation.
//!
//! The N+1 Gauss-Lobatto-Legendre (GLL) nodes are the roots of (1-x²)P'_N(x),
//! which includes the endpoints x = ±1. They serve two roles here:
//! 1. They are the interval element's interpolation nodes.
//! 2. The warp-and-blend construction for triangles and tetrahedra displaces
//!    equidistant edge nodes toward them; the displacement polynomial is
//!    interpolated in Newton form.

use super::legendre::{legendre, legendre_and_derivative};
use std::f64::consts::PI;

/// Compute Gauss-Lobatto-Legendre nodes for polynomial order N.
///
/// Returns N+1 nodes in [-1, 1], including the endpoints.
/// Uses Newton iteration starting from Chebyshev-Lobatto nodes.
pub fn gauss_lobatto_nodes(order: usize) -> Vec<f64> {
    let n = order;
    let n_nodes = n + 1;

    if n == 0 {
        return vec![0.0];
    }
    if n == 1 {
        return vec![-1.0, 1.0];
    }

    let mut nodes = Vec::with_capacity(n_nodes);

    // Initial guess: Chebyshev-Lobatto nodes
    // x_j = -cos(π j / N) for j = 0, ..., N
    for j in 0..=n {
        nodes.push(-(PI * j as f64 / n as f64).cos());
    }

    // Newton iteration to find roots of (1-x²)P'_N(x)
    // The roots are: x = ±1 (trivial) and zeros of P'_N(x) (interior)
    // For interior nodes, we solve P'_N(x) = 0

    // Endpoints are exact
    nodes[0] = -1.0;
    nodes[n] = 1.0;

    // Newton iteration for interior nodes
    for j in 1..n {
        let mut x = nodes[j];

        for _ in 0..100 {
            let (p_n, dp_n) = legendre_and_derivative(n, x);

            // We want to find roots of (1-x²)P'_N(x)
            // Taking derivative: -2x P'_N + (1-x²) P''_N
            // Using P''_N = (2x P'_N - n(n+1) P_N) / (1-x²) for |x| < 1
            // Simplifies to: the update for finding zeros of P'_N is:
            // x_new = x - P'_N(x) / P''_N(x)
            //
            // But it's easier to use: for GLL nodes, we find zeros of
            // L_N(x) = (1-x²) P'_N(x)
            // L'_N(x) = -2x P'_N(x) + (1-x²) P''_N(x)
            //
            // Using the identity: P''_N = (n(n+1) P_N - 2x P'_N) / (x² - 1)
            // We get: L'_N = -2x P'_N + (1-x²) * (n(n+1) P_N - 2x P'_N) / (x² - 1)
            //              = -2x P'_N - (n(n+1) P_N - 2x P'_N)
            //              = -n(n+1) P_N
            //
            // So the Newton update is:
            // x_new = x - (1-x²) P'_N / (-n(n+1) P_N)
            //       = x + (1-x²) P'_N / (n(n+1) P_N)

            let update = (1.0 - x * x) * dp_n / (n as f64 * (n + 1) as f64 * p_n);

            if update.abs() < 1e-15 {
                break;
            }

            x += update;
        }

        nodes[j] = x;
    }

    nodes
}

/// Compute Gauss-Lobatto-Legendre weights.
///
/// The weights are: w_j = 2 / (N(N+1) [P_N(x_j)]²)
pub fn gauss_lobatto_weights(order: usize, nodes: &[f64]) -> Vec<f64> {
    let n = order;

    if n == 0 {
        return vec![2.0];
    }

    let n_nodes = nodes.len();
    let mut weights = Vec::with_capacity(n_nodes);

    let denom = (n * (n + 1)) as f64;

    for &x in nodes {
        let p_n = legendre(n, x);
        let w = 2.0 / (denom * p_n * p_n);
        weights.push(w);
    }

    weights
}

/// Polynomial interpolant in Newton (divided-difference) form.
///
/// Interpolates the given values at the given abscissae; evaluation uses
/// Horner-style nested multiplication. Degree = points - 1.
#[derive(Clone, Debug)]
pub struct NewtonInterpolant {
    abscissae: Vec<f64>,
    /// Divided-difference coefficients c_k = f[x_0, ..., x_k].
    coefficients: Vec<f64>,
}

impl NewtonInterpolant {
    /// Build the interpolant through (abscissae[i], values[i]).
    pub fn new(abscissae: &[f64], values: &[f64]) -> Self {
        assert_eq!(
            abscissae.len(),
            values.len(),
            "need one value per abscissa"
        );
        let n = abscissae.len();

        // Divided-difference table, computed in place column by column.
        let mut table: Vec<f64> = values.to_vec();
        let mut coefficients = Vec::with_capacity(n);
        coefficients.push(table[0]);
        for level in 1..n {
            for i in (level..n).rev() {
                table[i] = (table[i] - table[i - 1]) / (abscissae[i] - abscissae[i - level]);
            }
            coefficients.push(table[level]);
        }

        Self {
            abscissae: abscissae.to_vec(),
            coefficients,
        }
    }

    /// Evaluate the interpolant at x.
    pub fn evaluate(&self, x: f64) -> f64 {
        let n = self.coefficients.len();
        let mut result = self.coefficients[n - 1];
        for k in (0..n - 1).rev() {
            result = result * (x - self.abscissae[k]) + self.coefficients[k];
        }
        result
    }
}
