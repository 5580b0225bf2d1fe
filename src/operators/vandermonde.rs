//! Vandermonde matrices over the simplex bases.
//!
//! V[i, j] = ψ_j(node_i) connects nodal values and modal coefficients:
//! nodal = V · modal. With the orthonormal simplex basis, V·Vᵀ is the
//! inverse mass matrix of the reference element, which is why every local
//! operator starts from these matrices.

use faer::Mat;

use crate::element::basis::{basis_gradient, basis_value, face_basis_value};
use crate::element::ElementKind;

/// Vandermonde matrix of the volume basis at the given points.
///
/// Rows follow `points`, columns follow `modes`; both orderings must be the
/// node-tuple enumeration for the square nodal case.
pub fn build_vandermonde(
    kind: ElementKind,
    modes: &[Vec<usize>],
    points: &[Vec<f64>],
) -> Mat<f64> {
    let mut v = Mat::zeros(points.len(), modes.len());
    for (i, point) in points.iter().enumerate() {
        for (j, mode) in modes.iter().enumerate() {
            v[(i, j)] = basis_value(kind, mode, point);
        }
    }
    v
}

/// One derivative Vandermonde matrix per unit coordinate direction.
pub fn build_grad_vandermonde(
    kind: ElementKind,
    modes: &[Vec<usize>],
    points: &[Vec<f64>],
) -> Vec<Mat<f64>> {
    let dims = kind.dimensions();
    let mut result: Vec<Mat<f64>> = (0..dims)
        .map(|_| Mat::zeros(points.len(), modes.len()))
        .collect();
    for (i, point) in points.iter().enumerate() {
        for (j, mode) in modes.iter().enumerate() {
            let grad = basis_gradient(kind, mode, point);
            for (d, g) in grad.into_iter().enumerate() {
                result[d][(i, j)] = g;
            }
        }
    }
    result
}

/// Vandermonde matrix of the face basis at facial-coordinate points.
pub fn build_face_vandermonde(
    kind: ElementKind,
    modes: &[Vec<usize>],
    points: &[Vec<f64>],
) -> Mat<f64> {
    let mut v = Mat::zeros(points.len(), modes.len());
    for (i, point) in points.iter().enumerate() {
        for (j, mode) in modes.iter().enumerate() {
            v[(i, j)] = face_basis_value(kind, mode, point);
        }
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ReferenceElement;
    use crate::operators::{mat_invert, mat_mul};

    #[test]
    fn test_nodal_vandermonde_is_invertible() {
        for kind in [
            ElementKind::Interval,
            ElementKind::Triangle,
            ElementKind::Tetrahedron,
        ] {
            for order in 1..=4i64 {
                let re = ReferenceElement::new(kind, order).unwrap();
                let v = build_vandermonde(kind, re.mode_identifiers(), &re.unit_nodes);
                let v_inv = mat_invert(&v);
                let product = mat_mul(&v, &v_inv);
                let n = re.node_count();
                for i in 0..n {
                    for j in 0..n {
                        let expected = if i == j { 1.0 } else { 0.0 };
                        assert!(
                            (product[(i, j)] - expected).abs() < 1e-9,
                            "{:?} order {}: V·V⁻¹[{},{}] = {}",
                            kind,
                            order,
                            i,
                            j,
                            product[(i, j)]
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_grad_vandermonde_differentiates_interpolant() {
        // For f in the polynomial space, ∇V·V⁻¹·f_nodal gives exact nodal
        // derivatives. Check with f(r,s) = r² + rs on the triangle.
        let re = ReferenceElement::new(ElementKind::Triangle, 3).unwrap();
        let v = build_vandermonde(ElementKind::Triangle, re.mode_identifiers(), &re.unit_nodes);
        let gv = build_grad_vandermonde(
            ElementKind::Triangle,
            re.mode_identifiers(),
            &re.unit_nodes,
        );
        let v_inv = mat_invert(&v);
        let dr = mat_mul(&gv[0], &v_inv);
        let ds = mat_mul(&gv[1], &v_inv);

        let f: Vec<f64> = re
            .unit_nodes
            .iter()
            .map(|p| p[0] * p[0] + p[0] * p[1])
            .collect();
        for (i, node) in re.unit_nodes.iter().enumerate() {
            let mut df_dr = 0.0;
            let mut df_ds = 0.0;
            for (j, &fj) in f.iter().enumerate() {
                df_dr += dr[(i, j)] * fj;
                df_ds += ds[(i, j)] * fj;
            }
            let exact_dr = 2.0 * node[0] + node[1];
            let exact_ds = node[0];
            assert!(
                (df_dr - exact_dr).abs() < 1e-10,
                "∂f/∂r at node {}: {} vs {}",
                i,
                df_dr,
                exact_dr
            );
            assert!(
                (df_ds - exact_ds).abs() < 1e-10,
                "∂f/∂s at node {}: {} vs {}",
                i,
                df_ds,
                exact_ds
            );
        }
    }
}
