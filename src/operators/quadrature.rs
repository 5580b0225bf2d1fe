//! Over-integrated operator variant.
//!
//! The nodal operators in [`matrices`](super::matrices) integrate exactly
//! only when the integrand lives in the polynomial space — curved elements
//! and variable coefficients break that. This module carries the same
//! matrix family on a separate cubature grid of requested exactness, with
//! up/down interpolation between the nodal and quadrature representations.
//! Unlike the nodal path, every matrix here is a weighted quadrature sum;
//! the orthonormal-basis shortcut does not apply off the nodal points.

use faer::{linalg::solvers::Solve, Mat};

use crate::element::basis::face_modes;
use crate::element::ReferenceElement;
use crate::error::ElementError;

use super::face_shuffle::{face_affine_maps, ShuffleLookup};
use super::matrices::{assemble_multi_face_mass, LocalOperators};
use super::vandermonde::{build_face_vandermonde, build_grad_vandermonde, build_vandermonde};
use super::{left_solve, mat_mul, mat_transpose};

/// Grundmann-Möller cubature on the biunit d-simplex, exact for polynomials
/// of total degree `exact_to_degree`.
///
/// Returns (points, weights); points are in unit (biunit) coordinates and
/// the weights sum to the simplex volume 2^d/d!.
pub fn simplex_cubature(exact_to_degree: usize, dim: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
    if dim == 0 {
        // A point; integration is evaluation.
        return (vec![Vec::new()], vec![1.0]);
    }

    let s = exact_to_degree / 2; // rule of index s is exact to degree 2s+1
    let d = 2 * s + 1;
    let n = dim;

    let mut points = Vec::new();
    let mut weights = Vec::new();

    for i in 0..=s {
        let denom = (d + n - 2 * i) as f64;
        let coeff = sign(i) * 2f64.powi(-2 * (s as i32)) * denom.powi(d as i32)
            / (factorial(i) * factorial(d + n - i));

        for beta in compositions(s - i, n + 1) {
            // Barycentric point ((2β_k+1)/denom); cartesian standard-simplex
            // coordinates drop the first component.
            let std_point: Vec<f64> = beta[1..]
                .iter()
                .map(|&b| (2 * b + 1) as f64 / denom)
                .collect();
            // Map the standard simplex {x ≥ 0, Σx ≤ 1} to biunit coordinates.
            points.push(std_point.iter().map(|&x| 2.0 * x - 1.0).collect());
            weights.push(coeff * 2f64.powi(n as i32));
        }
    }

    (points, weights)
}

fn sign(i: usize) -> f64 {
    if i % 2 == 0 {
        1.0
    } else {
        -1.0
    }
}

fn factorial(n: usize) -> f64 {
    let mut result = 1.0;
    for k in 2..=n {
        result *= k as f64;
    }
    result
}

/// All compositions of `total` into `parts` non-negative integers.
fn compositions(total: usize, parts: usize) -> Vec<Vec<usize>> {
    if parts == 1 {
        return vec![vec![total]];
    }
    let mut result = Vec::new();
    for first in 0..=total {
        for mut rest in compositions(total - first, parts - 1) {
            let mut composition = Vec::with_capacity(parts);
            composition.push(first);
            composition.append(&mut rest);
            result.push(composition);
        }
    }
    result
}

/// Operators of one reference element on an over-integrated cubature grid.
#[derive(Clone)]
pub struct QuadratureOperators {
    pub exact_to_degree: usize,

    /// Volume cubature nodes in unit coordinates, and their weights.
    pub volume_nodes: Vec<Vec<f64>>,
    pub volume_weights: Vec<f64>,
    /// Face cubature nodes in facial unit coordinates, and their weights.
    pub face_nodes: Vec<Vec<f64>>,
    pub face_weights: Vec<f64>,

    /// Basis Vandermonde at the volume cubature nodes (rectangular).
    pub vandermonde: Mat<f64>,
    /// Gradient Vandermonde matrices at the volume cubature nodes.
    pub diff_vandermonde: Vec<Mat<f64>>,
    /// Face-basis Vandermonde at the face cubature nodes.
    pub face_vandermonde: Mat<f64>,

    /// Nodal-to-quadrature interpolation, volume grid.
    pub volume_up_interpolation: Mat<f64>,
    /// Nodal-to-quadrature interpolation, face grid.
    pub face_up_interpolation: Mat<f64>,
    /// Volume nodal values to concatenated per-face quadrature values.
    pub volume_to_face_up_interpolation: Mat<f64>,

    /// Mass analogue: maps quadrature-grid data back to nodal coefficients.
    pub mass: Mat<f64>,
    /// Transposed stiffness analogues, one per coordinate direction.
    pub stiffness_t: Vec<Mat<f64>>,
    /// Face mass analogue (face_node_count × quadrature face nodes).
    pub face_mass: Mat<f64>,
    /// Block scatter of `face_mass` over all faces.
    pub multi_face_mass: Mat<f64>,
    /// Lifting analogue: M⁻¹ · multi_face_mass.
    pub lifting: Mat<f64>,
}

impl QuadratureOperators {
    pub fn build(ops: &LocalOperators, exact_to_degree: usize) -> Self {
        let element = &ops.element;
        let kind = element.kind;
        let dim = element.dimensions();
        let modes = element.mode_identifiers().to_vec();

        let (volume_nodes, volume_weights) = simplex_cubature(exact_to_degree, dim);
        let (face_nodes, face_weights) = simplex_cubature(exact_to_degree, dim - 1);

        let vandermonde = build_vandermonde(kind, &modes, &volume_nodes);
        let diff_vandermonde = build_grad_vandermonde(kind, &modes, &volume_nodes);
        let fmodes = face_modes(kind, element.order);
        let face_vandermonde = build_face_vandermonde(kind, &fmodes, &face_nodes);

        let volume_up_interpolation = left_solve(&ops.vandermonde, &vandermonde);
        let face_up_interpolation = left_solve(&ops.face_vandermonde, &face_vandermonde);

        // Face quadrature nodes promoted into volume coordinates, faces
        // concatenated, interpolated from volume nodal data.
        let face_maps = face_affine_maps(element);
        let mut promoted = Vec::with_capacity(element.face_count() * face_nodes.len());
        for face_map in &face_maps {
            for qnode in &face_nodes {
                promoted.push(face_map.apply(qnode));
            }
        }
        let promoted_vandermonde = build_vandermonde(kind, &modes, &promoted);
        let volume_to_face_up_interpolation = left_solve(&ops.vandermonde, &promoted_vandermonde);

        // Weighted-sum mass/stiffness analogues: solve Vᵀ X = Wᵀ diag(w).
        let mass = transpose_solve(&ops.vandermonde, &vandermonde, &volume_weights);
        let stiffness_t: Vec<Mat<f64>> = diff_vandermonde
            .iter()
            .map(|dv| transpose_solve(&ops.vandermonde, dv, &volume_weights))
            .collect();
        let face_mass = transpose_solve(&ops.face_vandermonde, &face_vandermonde, &face_weights);

        let multi_face_mass = assemble_multi_face_mass(element, &face_mass);
        let lifting = mat_mul(&ops.inverse_mass, &multi_face_mass);

        Self {
            exact_to_degree,
            volume_nodes,
            volume_weights,
            face_nodes,
            face_weights,
            vandermonde,
            diff_vandermonde,
            face_vandermonde,
            volume_up_interpolation,
            face_up_interpolation,
            volume_to_face_up_interpolation,
            mass,
            stiffness_t,
            face_mass,
            multi_face_mass,
            lifting,
        }
    }

    pub fn node_count(&self) -> usize {
        self.volume_nodes.len()
    }

    pub fn face_node_count(&self) -> usize {
        self.face_nodes.len()
    }

    /// Face index lists into the concatenated facial quadrature vector.
    pub fn face_indices(&self, element: &ReferenceElement) -> Vec<Vec<usize>> {
        let fnc = self.face_node_count();
        (0..element.face_count())
            .map(|f| (f * fnc..(f + 1) * fnc).collect())
            .collect()
    }

    /// Orientation shuffles for the quadrature face node set.
    pub fn shuffle_lookup(
        &self,
        element: &ReferenceElement,
    ) -> Result<ShuffleLookup, ElementError> {
        ShuffleLookup::build(element, &self.face_nodes)
    }
}

/// Solve V_nodalᵀ · X = Wᵀ · diag(weights), the recurring quadrature-matrix
/// shape (mass, stiffness-transpose, face mass).
fn transpose_solve(nodal_vdm: &Mat<f64>, quad_vdm: &Mat<f64>, weights: &[f64]) -> Mat<f64> {
    let mut weighted = mat_transpose(quad_vdm);
    for col in 0..weighted.ncols() {
        for row in 0..weighted.nrows() {
            weighted[(row, col)] *= weights[col];
        }
    }
    let nodal_t = mat_transpose(nodal_vdm);
    let lu = nodal_t.as_ref().full_piv_lu();
    lu.solve(&weighted)
}
