//! Coordinate systems on the reference simplices.
//!
//! Each element kind carries three coordinate systems:
//! - barycentric (λ_1..λ_{d+1}, summing to 1),
//! - equilateral (the symmetric simplex the node warp operates in),
//! - unit/reference (r, s, t — the biunit simplex the basis is defined on).
//!
//! The mappings between them are fixed affine transforms per element kind.

use faer::{linalg::solvers::Solve, Mat};

use super::ElementKind;

/// An affine map x ↦ A·x + b between low-dimensional coordinate spaces.
#[derive(Clone, Debug)]
pub struct AffineMap {
    pub matrix: Mat<f64>,
    pub offset: Vec<f64>,
}

impl AffineMap {
    pub fn new(matrix: Mat<f64>, offset: Vec<f64>) -> Self {
        assert_eq!(matrix.nrows(), offset.len());
        Self { matrix, offset }
    }

    /// Identity map on a zero-dimensional space (interval faces are points).
    pub fn empty() -> Self {
        Self {
            matrix: Mat::zeros(0, 0),
            offset: Vec::new(),
        }
    }

    pub fn apply(&self, x: &[f64]) -> Vec<f64> {
        assert_eq!(x.len(), self.matrix.ncols());
        let mut result = self.offset.clone();
        for (i, r) in result.iter_mut().enumerate() {
            for (j, &xj) in x.iter().enumerate() {
                *r += self.matrix[(i, j)] * xj;
            }
        }
        result
    }

    /// The composite map x ↦ self(other(x)).
    pub fn compose(&self, other: &AffineMap) -> AffineMap {
        let rows = self.matrix.nrows();
        let mid = self.matrix.ncols();
        assert_eq!(mid, other.matrix.nrows());
        let cols = other.matrix.ncols();

        let mut matrix = Mat::zeros(rows, cols);
        for i in 0..rows {
            for j in 0..cols {
                let mut sum = 0.0;
                for k in 0..mid {
                    sum += self.matrix[(i, k)] * other.matrix[(k, j)];
                }
                matrix[(i, j)] = sum;
            }
        }
        let offset = self.apply(&other.offset);
        AffineMap { matrix, offset }
    }
}

/// Recover the affine map sending from_points[i] to to_points[i].
///
/// Requires exactly dim+1 points of dimension dim (the face and volume
/// vertex configurations used here always satisfy this), which makes the
/// fit an exact square solve.
pub fn identify_affine_map(from_points: &[Vec<f64>], to_points: &[Vec<f64>]) -> AffineMap {
    let n = from_points.len();
    if n == 1 {
        // Zero-dimensional: nothing to map.
        return AffineMap::empty();
    }
    let dim = n - 1;
    assert!(from_points.iter().all(|p| p.len() == dim));
    assert_eq!(to_points.len(), n);

    // Rows [x_i | 1] · [A_j ; b_j] = y_i[j], one solve per output component.
    let mut system = Mat::zeros(n, n);
    for (i, p) in from_points.iter().enumerate() {
        for (j, &x) in p.iter().enumerate() {
            system[(i, j)] = x;
        }
        system[(i, dim)] = 1.0;
    }
    let lu = system.as_ref().full_piv_lu();

    let mut matrix = Mat::zeros(dim, dim);
    let mut offset = vec![0.0; dim];
    for component in 0..dim {
        let mut rhs = Mat::zeros(n, 1);
        for (i, p) in to_points.iter().enumerate() {
            rhs[(i, 0)] = p[component];
        }
        let solution = lu.solve(&rhs);
        for j in 0..dim {
            matrix[(component, j)] = solution[(j, 0)];
        }
        offset[component] = solution[(dim, 0)];
    }

    AffineMap { matrix, offset }
}

/// Map barycentric coordinates (λ_1..λ_{d+1}) to equilateral coordinates.
///
/// The constants reflect the vertices of the symmetric (equilateral)
/// reference simplex for each kind.
pub fn barycentric_to_equilateral(kind: ElementKind, bary: &[f64]) -> Vec<f64> {
    assert_eq!(bary.len(), kind.vertex_count());
    match kind {
        ElementKind::Interval => vec![2.0 * bary[0] - 1.0],
        ElementKind::Triangle => vec![
            -bary[0] + bary[1],
            (-bary[0] - bary[1] + 2.0 * bary[2]) / 3f64.sqrt(),
        ],
        ElementKind::Tetrahedron => vec![
            -bary[0] + bary[1],
            (-bary[0] - bary[1] + 2.0 * bary[2]) / 3f64.sqrt(),
            (-bary[0] - bary[1] - bary[2] + 3.0 * bary[3]) / 6f64.sqrt(),
        ],
    }
}

/// The affine map from equilateral to unit (r, s, t) coordinates.
pub fn equilateral_to_unit(kind: ElementKind) -> AffineMap {
    match kind {
        ElementKind::Interval => AffineMap::new(mat_from_rows(&[&[1.0]]), vec![0.0]),
        ElementKind::Triangle => {
            let s3 = 3f64.sqrt();
            AffineMap::new(
                mat_from_rows(&[&[1.0, -1.0 / s3], &[0.0, 2.0 / s3]]),
                vec![-1.0 / 3.0, -1.0 / 3.0],
            )
        }
        ElementKind::Tetrahedron => {
            let s3 = 3f64.sqrt();
            let s6 = 6f64.sqrt();
            AffineMap::new(
                mat_from_rows(&[
                    &[1.0, -1.0 / s3, -1.0 / s6],
                    &[0.0, 2.0 / s3, -1.0 / s6],
                    &[0.0, 0.0, s6 / 2.0],
                ]),
                vec![-0.5, -0.5, -0.5],
            )
        }
    }
}

/// The affine map from unit coordinates to barycentric coordinates.
pub fn unit_to_barycentric(kind: ElementKind) -> AffineMap {
    match kind {
        ElementKind::Interval => {
            AffineMap::new(mat_from_rows(&[&[0.5], &[-0.5]]), vec![0.5, 0.5])
        }
        ElementKind::Triangle => AffineMap::new(
            mat_from_rows(&[&[0.5, 0.0], &[0.0, 0.5], &[-0.5, -0.5]]),
            vec![0.5, 0.5, 0.0],
        ),
        ElementKind::Tetrahedron => AffineMap::new(
            mat_from_rows(&[
                &[0.5, 0.0, 0.0],
                &[0.0, 0.5, 0.0],
                &[0.0, 0.0, 0.5],
                &[-0.5, -0.5, -0.5],
            ]),
            vec![0.5, 0.5, 0.5, -0.5],
        ),
    }
}

fn mat_from_rows(rows: &[&[f64]]) -> Mat<f64> {
    let nrows = rows.len();
    let ncols = rows[0].len();
    let mut m = Mat::zeros(nrows, ncols);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row.len(), ncols);
        for (j, &v) in row.iter().enumerate() {
            m[(i, j)] = v;
        }
    }
    m
}

/// v / ‖v‖.
pub fn normalize(v: &[f64]) -> Vec<f64> {
    let norm: f64 = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    v.iter().map(|x| x / norm).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_bary(len: usize, which: usize) -> Vec<f64> {
        let mut b = vec![0.0; len];
        b[which] = 1.0;
        b
    }

    #[test]
    fn test_vertex_roundtrip_all_kinds() {
        // barycentric -> equilateral -> unit -> barycentric is the identity
        // on every vertex.
        for kind in [
            ElementKind::Interval,
            ElementKind::Triangle,
            ElementKind::Tetrahedron,
        ] {
            let e2u = equilateral_to_unit(kind);
            let u2b = unit_to_barycentric(kind);
            for v in 0..kind.vertex_count() {
                let bary = unit_bary(kind.vertex_count(), v);
                let equil = barycentric_to_equilateral(kind, &bary);
                let unit = e2u.apply(&equil);
                let back = u2b.apply(&unit);
                for (i, (&orig, &got)) in bary.iter().zip(back.iter()).enumerate() {
                    assert!(
                        (orig - got).abs() < 1e-13,
                        "{:?} vertex {}: λ_{} = {} came back as {}",
                        kind,
                        v,
                        i,
                        orig,
                        got
                    );
                }
            }
        }
    }

    #[test]
    fn test_triangle_unit_vertices() {
        // A=(-1,-1), B=(1,-1), C=(-1,1) in unit coordinates.
        let kind = ElementKind::Triangle;
        let e2u = equilateral_to_unit(kind);
        let expected = [[-1.0, -1.0], [1.0, -1.0], [-1.0, 1.0]];
        for v in 0..3 {
            let unit = e2u.apply(&barycentric_to_equilateral(kind, &unit_bary(3, v)));
            for d in 0..2 {
                assert!(
                    (unit[d] - expected[v][d]).abs() < 1e-13,
                    "vertex {} coord {}: {} vs {}",
                    v,
                    d,
                    unit[d],
                    expected[v][d]
                );
            }
        }
    }

    #[test]
    fn test_tetrahedron_unit_vertices() {
        let kind = ElementKind::Tetrahedron;
        let e2u = equilateral_to_unit(kind);
        let expected = [
            [-1.0, -1.0, -1.0],
            [1.0, -1.0, -1.0],
            [-1.0, 1.0, -1.0],
            [-1.0, -1.0, 1.0],
        ];
        for v in 0..4 {
            let unit = e2u.apply(&barycentric_to_equilateral(kind, &unit_bary(4, v)));
            for d in 0..3 {
                assert!(
                    (unit[d] - expected[v][d]).abs() < 1e-13,
                    "vertex {} coord {}: {} vs {}",
                    v,
                    d,
                    unit[d],
                    expected[v][d]
                );
            }
        }
    }

    #[test]
    fn test_identify_affine_map_recovers_transform() {
        // Known 2D transform: rotate/scale/shift three points, recover it.
        let from = vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]];
        let map_true = AffineMap::new(
            mat_from_rows(&[&[0.0, -2.0], &[1.5, 0.0]]),
            vec![0.3, -0.7],
        );
        let to: Vec<Vec<f64>> = from.iter().map(|p| map_true.apply(p)).collect();
        let recovered = identify_affine_map(&from, &to);

        for &probe in &[[0.25, 0.25], [0.9, 0.05], [-0.3, 0.6]] {
            let expected = map_true.apply(&probe);
            let got = recovered.apply(&probe);
            for d in 0..2 {
                assert!((expected[d] - got[d]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_compose() {
        let f = AffineMap::new(mat_from_rows(&[&[2.0, 0.0], &[0.0, 3.0]]), vec![1.0, 0.0]);
        let g = AffineMap::new(mat_from_rows(&[&[0.0, 1.0], &[1.0, 0.0]]), vec![0.0, -1.0]);
        let fg = f.compose(&g);
        let x = [0.5, -2.0];
        let expected = f.apply(&g.apply(&x));
        let got = fg.apply(&x);
        for d in 0..2 {
            assert!((expected[d] - got[d]).abs() < 1e-13);
        }
    }
}
