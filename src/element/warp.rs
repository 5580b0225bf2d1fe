//! Warp-and-blend interpolation nodes for simplices.
//!
//! Equidistant nodes interpolate poorly at high order. Warburton's
//! construction ("An explicit construction of interpolation nodes on the
//! simplex", J. Eng. Math. 56, 2006) displaces them edge by edge toward
//! Gauss-Lobatto spacing, weighted by blending functions that vanish away
//! from each face. The tetrahedral version applies the triangular warp to
//! each of the four faces in turn.
//!
//! The node sets produced here must match the published construction
//! exactly — downstream mass-matrix conditioning depends on it — including
//! the near-edge blend clamp in the tetrahedral routine.

use crate::polynomial::{gauss_lobatto_nodes, NewtonInterpolant};

use super::coords::{barycentric_to_equilateral, normalize};
use super::ElementKind;

/// Optimized blend parameter α per order (index order-1) for triangles.
const TRIANGLE_ALPHA: [f64; 15] = [
    0.0000, 0.0000, 1.4152, 0.1001, 0.2751, 0.9800, 1.0999, 1.2832, 1.3648, 1.4773, 1.4959,
    1.5743, 1.5770, 1.6223, 1.6258,
];

/// Optimized blend parameter α per order (index order-1) for tetrahedra.
const TETRAHEDRON_ALPHA: [f64; 15] = [
    0.0, 0.0, 0.0, 0.1002, 1.1332, 1.5608, 1.3413, 1.2577, 1.1603, 1.10153, 0.6080, 0.4523,
    0.8856, 0.8717, 0.9655,
];

fn triangle_alpha(order: usize) -> f64 {
    if order >= 1 && order <= TRIANGLE_ALPHA.len() {
        TRIANGLE_ALPHA[order - 1]
    } else {
        5.0 / 3.0
    }
}

fn tetrahedron_alpha(order: usize) -> f64 {
    if order >= 1 && order <= TETRAHEDRON_ALPHA.len() {
        TETRAHEDRON_ALPHA[order - 1]
    } else {
        1.0
    }
}

/// Warburton's 1-D warp factor.
///
/// Interpolates the displacement from equidistant to Gauss-Lobatto points
/// over the equidistant points, then divides by (1 - x²); the removable
/// singularity at |x| ≈ 1 is defined as 0.
pub struct WarpFactor {
    interpolant: Option<NewtonInterpolant>,
}

impl WarpFactor {
    pub fn new(order: usize) -> Self {
        if order == 0 {
            return Self { interpolant: None };
        }

        let r_lgl = gauss_lobatto_nodes(order);
        let n = order + 1;
        let r_eq: Vec<f64> = (0..n)
            .map(|i| -1.0 + 2.0 * i as f64 / order as f64)
            .collect();
        let displacement: Vec<f64> = r_lgl
            .iter()
            .zip(r_eq.iter())
            .map(|(&lgl, &eq)| lgl - eq)
            .collect();

        Self {
            interpolant: Some(NewtonInterpolant::new(&r_eq, &displacement)),
        }
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        if x.abs() > 1.0 - 1e-10 {
            return 0.0;
        }
        match &self.interpolant {
            Some(interp) => interp.evaluate(x) / (1.0 - x * x),
            None => 0.0,
        }
    }
}

/// Per-edge warp of a triangle in its equilateral plane.
///
/// Precomputes the edge directions and opposite-vertex indices once;
/// `apply` then maps one node's barycentric coordinates to its 2-D shift.
pub struct TriangleWarper {
    alpha: f64,
    warp: WarpFactor,
    /// (face vertex pair, unit edge direction, opposite vertex index)
    edges: Vec<([usize; 2], [f64; 2], usize)>,
}

impl TriangleWarper {
    pub fn new(alpha: f64, order: usize) -> Self {
        let kind = ElementKind::Triangle;
        let vertices: Vec<Vec<f64>> = (0..3)
            .map(|v| {
                let mut bary = vec![0.0; 3];
                bary[v] = 1.0;
                barycentric_to_equilateral(kind, &bary)
            })
            .collect();

        let edges = kind
            .face_vertices()
            .iter()
            .map(|fvi| {
                let (v1, v2) = (fvi[0], fvi[1]);
                let delta: Vec<f64> = (0..2).map(|d| vertices[v2][d] - vertices[v1][d]).collect();
                let dir = normalize(&delta);
                let opp = (0..3).find(|v| !fvi.contains(v)).unwrap();
                ([v1, v2], [dir[0], dir[1]], opp)
            })
            .collect();

        Self {
            alpha,
            warp: WarpFactor::new(order),
            edges,
        }
    }

    /// The warp shift for a node at barycentric coordinates `bp`.
    pub fn apply(&self, bp: &[f64]) -> [f64; 2] {
        let mut shift = [0.0f64; 2];
        for ([v1, v2], edgedir, opp) in &self.edges {
            let blend = 4.0 * bp[*v1] * bp[*v2];
            let warp_amount = blend
                * self.warp.evaluate(bp[*v2] - bp[*v1])
                * (1.0 + (self.alpha * bp[*opp]).powi(2));
            shift[0] += warp_amount * edgedir[0];
            shift[1] += warp_amount * edgedir[1];
        }
        shift
    }
}

/// Warped triangle nodes in equilateral coordinates.
pub fn triangle_equilateral_nodes(order: usize, barycentric: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let warper = TriangleWarper::new(triangle_alpha(order), order);
    barycentric
        .iter()
        .map(|bp| {
            let mut point = barycentric_to_equilateral(ElementKind::Triangle, bp);
            let shift = warper.apply(bp);
            point[0] += shift[0];
            point[1] += shift[1];
            point
        })
        .collect()
}

/// Warped tetrahedron nodes in equilateral coordinates.
///
/// Applies the triangular warp to each of the four faces in turn,
/// accumulating shifts additively; the barycentric coordinates used for the
/// blends stay those of the unwarped equidistant nodes.
pub fn tetrahedron_equilateral_nodes(order: usize, barycentric: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let kind = ElementKind::Tetrahedron;
    let alpha = tetrahedron_alpha(order);

    let vertices: Vec<Vec<f64>> = (0..4)
        .map(|v| {
            let mut bary = vec![0.0; 4];
            bary[v] = 1.0;
            barycentric_to_equilateral(kind, &bary)
        })
        .collect();

    let mut points: Vec<Vec<f64>> = barycentric
        .iter()
        .map(|bp| barycentric_to_equilateral(kind, bp))
        .collect();

    let tri_warp = TriangleWarper::new(alpha, order);

    for fvi in kind.face_vertices() {
        let (v1, v2, v3) = (&vertices[fvi[0]], &vertices[fvi[1]], &vertices[fvi[2]]);

        // Directions spanning the face: base edge and its altitude.
        let base: Vec<f64> = (0..3).map(|d| v2[d] - v1[d]).collect();
        let altitude: Vec<f64> = (0..3).map(|d| v3[d] - (v1[d] + v2[d]) / 2.0).collect();
        let directions = [normalize(&base), normalize(&altitude)];
        debug_assert!(
            directions[0]
                .iter()
                .zip(directions[1].iter())
                .map(|(a, b)| a * b)
                .sum::<f64>()
                .abs()
                < 1e-15
        );

        let opp = (0..4).find(|v| !fvi.contains(v)).unwrap();

        for (bp, point) in barycentric.iter().zip(points.iter_mut()) {
            let face_bp = [bp[fvi[0]], bp[fvi[1]], bp[fvi[2]]];

            let mut blend =
                face_bp.iter().product::<f64>() * (1.0 + alpha * bp[opp]).powi(2);

            // Near the face's edges the plain blend denominator degenerates;
            // the published construction pins the blend to 0.5 there (each
            // edge is shifted twice). Must match exactly or edge nodes
            // duplicate.
            for &i in fvi.iter() {
                let denom = bp[i] + 0.5 * bp[opp];
                if denom.abs() > 1e-12 {
                    blend /= denom;
                } else {
                    blend = 0.5;
                    break;
                }
            }

            let tw = tri_warp.apply(&face_bp);
            for d in 0..3 {
                point[d] += blend * (tw[0] * directions[0][d] + tw[1] * directions[1][d]);
            }
        }
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ReferenceElement;

    #[test]
    fn test_warp_factor_vanishes_at_endpoints() {
        let warp = WarpFactor::new(6);
        assert_eq!(warp.evaluate(1.0), 0.0);
        assert_eq!(warp.evaluate(-1.0), 0.0);
        assert_eq!(warp.evaluate(1.0 - 1e-12), 0.0);
    }

    #[test]
    fn test_warp_factor_odd_symmetry() {
        // The LGL-vs-equidistant displacement is odd, and so is the warp.
        let warp = WarpFactor::new(5);
        for &x in &[0.1, 0.35, 0.6, 0.85] {
            assert!(
                (warp.evaluate(x) + warp.evaluate(-x)).abs() < 1e-12,
                "warp not odd at {}",
                x
            );
        }
    }

    #[test]
    fn test_triangle_nodes_low_order_unwarped() {
        // α table is 0 for orders 1-2 and the order-1 nodes are vertices;
        // warping must leave vertices in place for any order.
        for order in 1..=6i64 {
            let re = ReferenceElement::new(ElementKind::Triangle, order).unwrap();
            let expected = [[-1.0, -1.0], [1.0, -1.0], [-1.0, 1.0]];
            for (v, &node_idx) in re.vertex_indices.iter().enumerate() {
                for d in 0..2 {
                    assert!(
                        (re.unit_nodes[node_idx][d] - expected[v][d]).abs() < 1e-12,
                        "order {} vertex {} moved: {:?}",
                        order,
                        v,
                        re.unit_nodes[node_idx]
                    );
                }
            }
        }
    }

    #[test]
    fn test_triangle_nodes_symmetric() {
        // The warped node set is symmetric under the reflection swapping
        // vertices B and C (r <-> s in unit coordinates).
        let re = ReferenceElement::new(ElementKind::Triangle, 7).unwrap();
        for node in &re.unit_nodes {
            let mirrored = [node[1], node[0]];
            let found = re.unit_nodes.iter().any(|other| {
                (other[0] - mirrored[0]).abs() < 1e-10 && (other[1] - mirrored[1]).abs() < 1e-10
            });
            assert!(found, "no mirror partner for node {:?}", node);
        }
    }

    #[test]
    fn test_tetrahedron_nodes_distinct() {
        // The near-edge clamp exists so edge nodes do not collapse onto each
        // other; check all nodes stay distinct at a high order.
        let re = ReferenceElement::new(ElementKind::Tetrahedron, 6).unwrap();
        let n = re.unit_nodes.len();
        for i in 0..n {
            for j in i + 1..n {
                let dist: f64 = re.unit_nodes[i]
                    .iter()
                    .zip(re.unit_nodes[j].iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f64>()
                    .sqrt();
                assert!(
                    dist > 1e-6,
                    "nodes {} and {} nearly coincide: {:?} vs {:?}",
                    i,
                    j,
                    re.unit_nodes[i],
                    re.unit_nodes[j]
                );
            }
        }
    }

    #[test]
    fn test_tetrahedron_face_nodes_stay_on_faces() {
        // Warping moves nodes within their face planes, never off them.
        let re = ReferenceElement::new(ElementKind::Tetrahedron, 5).unwrap();
        for &i in &re.face_indices[0] {
            assert!(
                (re.unit_nodes[i][2] + 1.0).abs() < 1e-10,
                "face-0 node {:?} left the t = -1 plane",
                re.unit_nodes[i]
            );
        }
        for &i in &re.face_indices[2] {
            assert!(
                (re.unit_nodes[i][0] + 1.0).abs() < 1e-10,
                "face-2 node {:?} left the r = -1 plane",
                re.unit_nodes[i]
            );
        }
    }

    #[test]
    fn test_interval_nodes_are_gauss_lobatto() {
        let re = ReferenceElement::new(ElementKind::Interval, 4).unwrap();
        let lgl = gauss_lobatto_nodes(4);
        for (node, &x) in re.unit_nodes.iter().zip(lgl.iter()) {
            assert!((node[0] - x).abs() < 1e-14);
        }
    }
}
