//! The per-element matrix bundle: mass, differentiation, face mass,
//! multi-face mass and lifting matrices.
//!
//! All matrices are derived from the Vandermonde matrices of the orthonormal
//! basis, never by direct integration:
//!
//! - inverse mass  M⁻¹ = V·Vᵀ (orthonormality identity)
//! - mass          M   = (V·Vᵀ)⁻¹
//! - differentiation D_d = ∇V_d · V⁻¹ (exact solve; V is square)
//! - face mass     M_f = (V_f·V_fᵀ)⁻¹ over the face basis
//! - lifting       L = M⁻¹ · multi-face-mass

use faer::Mat;

use crate::element::basis::face_modes;
use crate::element::{ElementKind, ReferenceElement};
use crate::error::ElementError;

use super::vandermonde::{build_face_vandermonde, build_grad_vandermonde, build_vandermonde};
use super::{frobenius_distance, left_solve, mat_invert, mat_mul, mat_transpose};

/// Tolerance for the differentiation-matrix symmetry self-check.
const CONSISTENCY_TOL: f64 = 1e-12;

/// All local operators of one reference element.
///
/// Built once per `(kind, order)` and immutable afterwards; see
/// [`OperatorCache`](super::OperatorCache).
#[derive(Clone)]
pub struct LocalOperators {
    pub element: ReferenceElement,

    /// V[i, j] = ψ_j(node_i); square and invertible by construction.
    pub vandermonde: Mat<f64>,
    /// ∇V, one matrix per unit coordinate direction.
    pub grad_vandermonde: Vec<Mat<f64>>,

    /// M⁻¹ = V·Vᵀ.
    pub inverse_mass: Mat<f64>,
    /// M = (V·Vᵀ)⁻¹.
    pub mass: Mat<f64>,
    /// Nodal differentiation matrices D_d = ∇V_d · V⁻¹.
    pub differentiation: Vec<Mat<f64>>,

    /// Face Vandermonde over the (d-1)-dimensional face basis.
    pub face_vandermonde: Mat<f64>,
    /// Face mass matrix (face_node_count square).
    pub face_mass: Mat<f64>,
    /// Block scatter of `face_mass` into
    /// (node_count) × (face_count · face_node_count).
    pub multi_face_mass: Mat<f64>,
    /// L = M⁻¹ · multi_face_mass.
    pub lifting: Mat<f64>,
}

impl LocalOperators {
    pub fn build(kind: ElementKind, order: i64) -> Result<Self, ElementError> {
        let element = ReferenceElement::new(kind, order)?;

        let modes = element.mode_identifiers().to_vec();
        let vandermonde = build_vandermonde(kind, &modes, &element.unit_nodes);
        let grad_vandermonde = build_grad_vandermonde(kind, &modes, &element.unit_nodes);

        let inverse_mass = mat_mul(&vandermonde, &mat_transpose(&vandermonde));
        let mass = mat_invert(&inverse_mass);

        let differentiation: Vec<Mat<f64>> = grad_vandermonde
            .iter()
            .map(|gv| left_solve(&vandermonde, gv))
            .collect();

        let fmodes = face_modes(kind, element.order);
        let face_vandermonde =
            build_face_vandermonde(kind, &fmodes, &element.unit_face_nodes());
        let face_mass = mat_invert(&mat_mul(
            &face_vandermonde,
            &mat_transpose(&face_vandermonde),
        ));

        let multi_face_mass = assemble_multi_face_mass(&element, &face_mass);
        let lifting = mat_mul(&inverse_mass, &multi_face_mass);

        let ops = Self {
            element,
            vandermonde,
            grad_vandermonde,
            inverse_mass,
            mass,
            differentiation,
            face_vandermonde,
            face_mass,
            multi_face_mass,
            lifting,
        };
        ops.check_differentiation_symmetry()?;
        Ok(ops)
    }

    /// Face-orientation shuffles for the nodal face node set.
    ///
    /// Orientation matching only makes sense with at least one dof per
    /// face edge direction, so order-0 elements are rejected. Callers keep
    /// the table alongside these operators; it never changes afterwards.
    pub fn nodal_shuffle_lookup(
        &self,
    ) -> Result<super::face_shuffle::ShuffleLookup, ElementError> {
        super::face_shuffle::ShuffleLookup::build(&self.element, &self.element.unit_face_nodes())
    }

    /// Node-index permutation p with D_0[p][:, p] == D_target.
    ///
    /// p is the read-from map of the node-tuple transposition swapping
    /// components 0 and `target`: p[i] = index of transpose(tuple_i).
    pub fn diff_mat_permutation(&self, target: usize) -> Vec<usize> {
        let tuples = &self.element.node_tuples;
        tuples
            .iter()
            .map(|t| {
                let mut swapped = t.clone();
                swapped.swap(0, target);
                tuples
                    .iter()
                    .position(|u| *u == swapped)
                    .expect("node tuples are closed under component transposition")
            })
            .collect()
    }

    /// Certify that the differentiation matrices are consistent with the
    /// node set's axis symmetry: permuting nodes by the axis-0↔k
    /// transposition must turn D_0 into D_k.
    ///
    /// A violation means node or basis construction is defective; setup
    /// aborts rather than running with an inconsistent operator.
    fn check_differentiation_symmetry(&self) -> Result<(), ElementError> {
        let n = self.element.node_count();
        for target in 1..self.element.dimensions() {
            let p = self.diff_mat_permutation(target);
            let d0 = &self.differentiation[0];
            let mut permuted = Mat::zeros(n, n);
            for i in 0..n {
                for j in 0..n {
                    permuted[(i, j)] = d0[(p[i], p[j])];
                }
            }
            let distance = frobenius_distance(&permuted, &self.differentiation[target]);
            if distance > CONSISTENCY_TOL {
                return Err(ElementError::InconsistentOperators {
                    kind: self.element.kind,
                    order: self.element.order,
                    detail: format!(
                        "differentiation matrix {} deviates from permuted D_0 by {:.3e}",
                        target, distance
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Scatter a face mass matrix into the (node_count) × (face_count · width)
/// multi-face layout: each face's block lands on the rows of that face's
/// node indices, all other entries zero.
///
/// Shared with the quadrature variant, whose face blocks are rectangular.
pub(crate) fn assemble_multi_face_mass(
    element: &ReferenceElement,
    face_mass: &Mat<f64>,
) -> Mat<f64> {
    let height = face_mass.nrows();
    let width = face_mass.ncols();
    assert_eq!(height, element.face_node_count());

    let mut result = Mat::zeros(element.node_count(), element.face_count() * width);
    for (i_face, f_indices) in element.face_indices.iter().enumerate() {
        for (row_local, &row_global) in f_indices.iter().enumerate() {
            for col in 0..width {
                result[(row_global, i_face * width + col)] = face_mass[(row_local, col)];
            }
        }
    }
    result
}
