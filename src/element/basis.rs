//! Orthonormal polynomial bases on the reference simplices.
//!
//! The bases are products of Jacobi polynomials in collapsed (Duffy)
//! coordinates, normalized so that V·Vᵀ is the inverse mass matrix of the
//! reference element. Mode identifiers are non-negative integer tuples
//! summing to at most the order, enumerated in node-tuple order — the
//! Vandermonde construction relies on the two orderings agreeing.

use crate::polynomial::{
    jacobi_normalized, jacobi_normalized_derivative, legendre_normalized,
    legendre_normalized_derivative,
};

use super::ElementKind;

/// Collapsed coordinates for the triangle.
///
/// a = 2(1+r)/(1-s) - 1, b = s; the singular line s = 1 maps to a = -1.
fn triangle_ab(r: f64, s: f64) -> (f64, f64) {
    let a = if (1.0 - s).abs() > 1e-12 {
        2.0 * (1.0 + r) / (1.0 - s) - 1.0
    } else {
        -1.0
    };
    (a, s)
}

/// Collapsed coordinates for the tetrahedron.
fn tetrahedron_abc(r: f64, s: f64, t: f64) -> (f64, f64, f64) {
    let a = if (s + t).abs() > 1e-12 {
        -2.0 * (1.0 + r) / (s + t) - 1.0
    } else {
        -1.0
    };
    let b = if (1.0 - t).abs() > 1e-12 {
        2.0 * (1.0 + s) / (1.0 - t) - 1.0
    } else {
        -1.0
    };
    (a, b, t)
}

/// Evaluate basis function `mode` at a unit-coordinate `point`.
pub fn basis_value(kind: ElementKind, mode: &[usize], point: &[f64]) -> f64 {
    match kind {
        ElementKind::Interval => legendre_normalized(mode[0], point[0]),
        ElementKind::Triangle => {
            let (i, j) = (mode[0], mode[1]);
            let (a, b) = triangle_ab(point[0], point[1]);
            2f64.sqrt()
                * jacobi_normalized(0, 0, i, a)
                * jacobi_normalized(2 * i + 1, 0, j, b)
                * (1.0 - b).powi(i as i32)
        }
        ElementKind::Tetrahedron => {
            let (i, j, k) = (mode[0], mode[1], mode[2]);
            let (a, b, c) = tetrahedron_abc(point[0], point[1], point[2]);
            2.0 * 2f64.sqrt()
                * jacobi_normalized(0, 0, i, a)
                * jacobi_normalized(2 * i + 1, 0, j, b)
                * (1.0 - b).powi(i as i32)
                * jacobi_normalized(2 * (i + j) + 2, 0, k, c)
                * (1.0 - c).powi((i + j) as i32)
        }
    }
}

/// Evaluate the gradient of basis function `mode` at `point`.
///
/// Chain rule through the collapsed coordinates; the (1-b)/2 power
/// bookkeeping follows the standard orthonormal-simplex derivation.
pub fn basis_gradient(kind: ElementKind, mode: &[usize], point: &[f64]) -> Vec<f64> {
    match kind {
        ElementKind::Interval => vec![legendre_normalized_derivative(mode[0], point[0])],
        ElementKind::Triangle => {
            let (id, jd) = (mode[0], mode[1]);
            let (a, b) = triangle_ab(point[0], point[1]);

            let fa = jacobi_normalized(0, 0, id, a);
            let dfa = jacobi_normalized_derivative(0, 0, id, a);
            let gb = jacobi_normalized(2 * id + 1, 0, jd, b);
            let dgb = jacobi_normalized_derivative(2 * id + 1, 0, jd, b);

            let half_1mb = 0.5 * (1.0 - b);

            let mut dmode_dr = dfa * gb;
            if id > 0 {
                dmode_dr *= half_1mb.powi(id as i32 - 1);
            }

            let mut dmode_ds = dfa * gb * 0.5 * (1.0 + a);
            if id > 0 {
                dmode_ds *= half_1mb.powi(id as i32 - 1);
            }
            let mut tmp = dgb * half_1mb.powi(id as i32);
            if id > 0 {
                tmp -= 0.5 * id as f64 * gb * half_1mb.powi(id as i32 - 1);
            }
            dmode_ds += fa * tmp;

            let scale = 2f64.powf(id as f64 + 0.5);
            vec![scale * dmode_dr, scale * dmode_ds]
        }
        ElementKind::Tetrahedron => {
            let (id, jd, kd) = (mode[0], mode[1], mode[2]);
            let (a, b, c) = tetrahedron_abc(point[0], point[1], point[2]);

            let fa = jacobi_normalized(0, 0, id, a);
            let dfa = jacobi_normalized_derivative(0, 0, id, a);
            let gb = jacobi_normalized(2 * id + 1, 0, jd, b);
            let dgb = jacobi_normalized_derivative(2 * id + 1, 0, jd, b);
            let hc = jacobi_normalized(2 * (id + jd) + 2, 0, kd, c);
            let dhc = jacobi_normalized_derivative(2 * (id + jd) + 2, 0, kd, c);

            let half_1mb = 0.5 * (1.0 - b);
            let half_1mc = 0.5 * (1.0 - c);

            let mut dmode_dr = dfa * gb * hc;
            if id > 0 {
                dmode_dr *= half_1mb.powi(id as i32 - 1);
            }
            if id + jd > 0 {
                dmode_dr *= half_1mc.powi((id + jd) as i32 - 1);
            }

            let mut dmode_ds = 0.5 * (1.0 + a) * dmode_dr;
            let mut tmp = dgb * half_1mb.powi(id as i32);
            if id > 0 {
                tmp -= 0.5 * id as f64 * gb * half_1mb.powi(id as i32 - 1);
            }
            if id + jd > 0 {
                tmp *= half_1mc.powi((id + jd) as i32 - 1);
            }
            tmp *= fa * hc;
            dmode_ds += tmp;

            let mut dmode_dt = 0.5 * (1.0 + a) * dmode_dr + 0.5 * (1.0 + b) * tmp;
            let mut tmp_t = dhc * half_1mc.powi((id + jd) as i32);
            if id + jd > 0 {
                tmp_t -= 0.5 * (id + jd) as f64 * hc * half_1mc.powi((id + jd) as i32 - 1);
            }
            tmp_t *= fa * gb * half_1mb.powi(id as i32);
            dmode_dt += tmp_t;

            let scale = 2f64.powf((2 * id + jd) as f64 + 1.5);
            vec![scale * dmode_dr, scale * dmode_ds, scale * dmode_dt]
        }
    }
}

/// Mode identifiers of the (d-1)-dimensional face basis, in face-basis order.
pub fn face_modes(kind: ElementKind, order: usize) -> Vec<Vec<usize>> {
    match kind {
        // An interval face is a point; its basis is the single constant.
        ElementKind::Interval => vec![vec![]],
        ElementKind::Triangle => (0..=order).map(|i| vec![i]).collect(),
        ElementKind::Tetrahedron => ElementKind::Triangle.node_tuples(order),
    }
}

/// Evaluate face basis function `mode` at facial unit coordinates `point`.
pub fn face_basis_value(kind: ElementKind, mode: &[usize], point: &[f64]) -> f64 {
    match kind {
        ElementKind::Interval => 1.0,
        ElementKind::Triangle => legendre_normalized(mode[0], point[0]),
        ElementKind::Tetrahedron => basis_value(ElementKind::Triangle, mode, point),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ReferenceElement;
    use crate::operators::quadrature::simplex_cubature;

    #[test]
    fn test_triangle_basis_orthonormal_under_cubature() {
        let order = 3;
        let kind = ElementKind::Triangle;
        let modes = kind.node_tuples(order);
        let (points, weights) = simplex_cubature(2 * order, 2);

        for (m1, mode1) in modes.iter().enumerate() {
            for (m2, mode2) in modes.iter().enumerate() {
                let integral: f64 = points
                    .iter()
                    .zip(weights.iter())
                    .map(|(p, &w)| {
                        w * basis_value(kind, mode1, p) * basis_value(kind, mode2, p)
                    })
                    .sum();
                let expected = if m1 == m2 { 1.0 } else { 0.0 };
                assert!(
                    (integral - expected).abs() < 1e-10,
                    "∫ ψ_{:?} ψ_{:?} = {}, expected {}",
                    mode1,
                    mode2,
                    integral,
                    expected
                );
            }
        }
    }

    #[test]
    fn test_tetrahedron_basis_orthonormal_under_cubature() {
        let order = 2;
        let kind = ElementKind::Tetrahedron;
        let modes = kind.node_tuples(order);
        let (points, weights) = simplex_cubature(2 * order, 3);

        for (m1, mode1) in modes.iter().enumerate() {
            for (m2, mode2) in modes.iter().enumerate() {
                let integral: f64 = points
                    .iter()
                    .zip(weights.iter())
                    .map(|(p, &w)| {
                        w * basis_value(kind, mode1, p) * basis_value(kind, mode2, p)
                    })
                    .sum();
                let expected = if m1 == m2 { 1.0 } else { 0.0 };
                assert!(
                    (integral - expected).abs() < 1e-10,
                    "∫ ψ_{:?} ψ_{:?} = {}, expected {}",
                    mode1,
                    mode2,
                    integral,
                    expected
                );
            }
        }
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let h = 1e-6;
        for (kind, point) in [
            (ElementKind::Triangle, vec![-0.3, -0.4]),
            (ElementKind::Tetrahedron, vec![-0.5, -0.4, -0.6]),
        ] {
            let order = 3;
            for mode in kind.node_tuples(order) {
                let grad = basis_gradient(kind, &mode, &point);
                for d in 0..kind.dimensions() {
                    let mut plus = point.clone();
                    let mut minus = point.clone();
                    plus[d] += h;
                    minus[d] -= h;
                    let fd = (basis_value(kind, &mode, &plus)
                        - basis_value(kind, &mode, &minus))
                        / (2.0 * h);
                    assert!(
                        (fd - grad[d]).abs() < 1e-4,
                        "{:?} mode {:?} ∂_{}: fd {} vs exact {}",
                        kind,
                        mode,
                        d,
                        fd,
                        grad[d]
                    );
                }
            }
        }
    }

    #[test]
    fn test_lowest_mode_is_constant() {
        // ψ_0 = 1/sqrt(reference volume): triangle area 2, tet volume 4/3.
        let tri = basis_value(ElementKind::Triangle, &[0, 0], &[-0.2, -0.3]);
        assert!((tri - 1.0 / 2f64.sqrt()).abs() < 1e-13);

        let tet = basis_value(ElementKind::Tetrahedron, &[0, 0, 0], &[-0.2, -0.5, -0.7]);
        assert!((tet - (3.0 / 4.0f64).sqrt()).abs() < 1e-13);
    }

    #[test]
    fn test_face_basis_count_matches_face_nodes() {
        for kind in [
            ElementKind::Interval,
            ElementKind::Triangle,
            ElementKind::Tetrahedron,
        ] {
            for order in 1..=4i64 {
                let re = ReferenceElement::new(kind, order).unwrap();
                assert_eq!(
                    face_modes(kind, order as usize).len(),
                    re.face_node_count(),
                    "{:?} order {}",
                    kind,
                    order
                );
            }
        }
    }
}
