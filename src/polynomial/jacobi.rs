//! Orthonormal Jacobi polynomial evaluation.
//!
//! Jacobi polynomials P_n^{(α,β)}(x) are orthogonal on [-1, 1] with weight
//! (1-x)^α (1+x)^β. The simplex basis needs them with small non-negative
//! integer α (0, 2i+1, 2(i+j)+2) and β = 0, normalized so that
//!
//! ∫_{-1}^{1} (1-x)^α (1+x)^β φ_m φ_n dx = δ_{mn}

/// Γ(n) for positive integer n, i.e. (n-1)!.
fn gamma_int(n: usize) -> f64 {
    debug_assert!(n >= 1);
    let mut result = 1.0;
    for k in 2..n {
        result *= k as f64;
    }
    result
}

/// Evaluate the orthonormal Jacobi polynomial φ_n^{(α,β)}(x).
///
/// Three-term recurrence in normalized form; α and β must be non-negative
/// integers (all this crate ever needs), which keeps the leading
/// normalization constant in factorials.
pub fn jacobi_normalized(alpha: usize, beta: usize, n: usize, x: f64) -> f64 {
    let af = alpha as f64;
    let bf = beta as f64;

    // γ_0 = 2^{α+β+1}/(α+β+1) · Γ(α+1)Γ(β+1)/Γ(α+β+1)
    let gamma0 = 2f64.powi((alpha + beta + 1) as i32) / (af + bf + 1.0) * gamma_int(alpha + 1)
        * gamma_int(beta + 1)
        / gamma_int(alpha + beta + 1);

    let p0 = 1.0 / gamma0.sqrt();
    if n == 0 {
        return p0;
    }

    let gamma1 = (af + 1.0) * (bf + 1.0) / (af + bf + 3.0) * gamma0;
    let p1 = ((af + bf + 2.0) * x / 2.0 + (af - bf) / 2.0) / gamma1.sqrt();
    if n == 1 {
        return p1;
    }

    let mut a_old = 2.0 / (2.0 + af + bf) * ((af + 1.0) * (bf + 1.0) / (af + bf + 3.0)).sqrt();
    let mut p_prev = p0;
    let mut p_curr = p1;

    for i in 1..n {
        let i = i as f64;
        let h1 = 2.0 * i + af + bf;
        let a_new = 2.0 / (h1 + 2.0)
            * ((i + 1.0) * (i + 1.0 + af + bf) * (i + 1.0 + af) * (i + 1.0 + bf)
                / ((h1 + 1.0) * (h1 + 3.0)))
                .sqrt();
        let b_new = -(af * af - bf * bf) / (h1 * (h1 + 2.0));
        let p_next = (-a_old * p_prev + (x - b_new) * p_curr) / a_new;
        a_old = a_new;
        p_prev = p_curr;
        p_curr = p_next;
    }

    p_curr
}

/// Evaluate the derivative of the orthonormal Jacobi polynomial.
///
/// d/dx φ_n^{(α,β)} = sqrt(n(n+α+β+1)) φ_{n-1}^{(α+1,β+1)}
pub fn jacobi_normalized_derivative(alpha: usize, beta: usize, n: usize, x: f64) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let scale = ((n * (n + alpha + beta + 1)) as f64).sqrt();
    scale * jacobi_normalized(alpha + 1, beta + 1, n - 1, x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polynomial::legendre_normalized;

    #[test]
    fn test_reduces_to_normalized_legendre() {
        // α = β = 0 is the orthonormal Legendre family.
        for n in 0..=6 {
            for &x in &[-1.0, -0.3, 0.0, 0.7, 1.0] {
                let j = jacobi_normalized(0, 0, n, x);
                let l = legendre_normalized(n, x);
                assert!(
                    (j - l).abs() < 1e-12,
                    "P̂_{}^(0,0)({}) = {}, normalized Legendre gives {}",
                    n,
                    x,
                    j,
                    l
                );
            }
        }
    }

    #[test]
    fn test_orthonormality_under_gauss_lobatto() {
        // ∫ (1-x)^α φ_m φ_n dx = δ_{mn}; integrand degree stays within GLL
        // exactness for the degrees checked.
        use crate::polynomial::{gauss_lobatto_nodes, gauss_lobatto_weights};
        let order = 12;
        let nodes = gauss_lobatto_nodes(order);
        let weights = gauss_lobatto_weights(order, &nodes);

        for alpha in [1usize, 3] {
            for m in 0..=3 {
                for n in 0..=3 {
                    let integral: f64 = nodes
                        .iter()
                        .zip(weights.iter())
                        .map(|(&x, &w)| {
                            w * (1.0 - x).powi(alpha as i32)
                                * jacobi_normalized(alpha, 0, m, x)
                                * jacobi_normalized(alpha, 0, n, x)
                        })
                        .sum();
                    let expected = if m == n { 1.0 } else { 0.0 };
                    assert!(
                        (integral - expected).abs() < 1e-11,
                        "α={}: ∫ φ_{} φ_{} = {}, expected {}",
                        alpha,
                        m,
                        n,
                        integral,
                        expected
                    );
                }
            }
        }
    }

    #[test]
    fn test_derivative_matches_finite_difference() {
        let h = 1e-6;
        for (alpha, n) in [(0usize, 3usize), (1, 2), (3, 4), (4, 1)] {
            for &x in &[-0.6, 0.0, 0.4] {
                let fd = (jacobi_normalized(alpha, 0, n, x + h)
                    - jacobi_normalized(alpha, 0, n, x - h))
                    / (2.0 * h);
                let exact = jacobi_normalized_derivative(alpha, 0, n, x);
                assert!(
                    (fd - exact).abs() < 1e-5,
                    "d/dx P̂_{}^({},0)({}): fd {} vs exact {}",
                    n,
                    alpha,
                    x,
                    fd,
                    exact
                );
            }
        }
    }
}
