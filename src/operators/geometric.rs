//! Time-step scaling factors.
//!
//! The stable explicit time step of a DG discretization factors into a
//! non-geometric part (a function of the reference node spacing, hence of
//! `(kind, order)` only) and a geometric part computed from each physical
//! element's Jacobian data.

use crate::element::{ElementKind, ReferenceElement};

/// Per-element geometry supplied by the discretization-geometry
/// collaborator.
#[derive(Clone, Debug)]
pub struct ElementGeometry {
    /// Jacobian determinant of the reference-to-physical map.
    pub jacobian: f64,
    /// Surface Jacobians, one per face.
    pub face_jacobians: Vec<f64>,
    /// Physical vertex positions, in reference vertex order.
    pub vertices: Vec<Vec<f64>>,
}

/// Reference-element part of the time-step bound.
///
/// For simplices: 2/3 of the smallest distance from any face node to any
/// other node that is a vertex. The interval uses its own calibration
/// (0.85 of the first Gauss-Lobatto spacing).
pub fn dt_non_geometric_factor(element: &ReferenceElement) -> f64 {
    if element.kind == ElementKind::Interval {
        return if element.order == 0 {
            1.0
        } else {
            0.85 * distance(&element.unit_nodes[0], &element.unit_nodes[1])
        };
    }

    let mut min_distance = f64::INFINITY;
    for face in &element.face_indices {
        for &face_node in face {
            for &vertex in &element.vertex_indices {
                if vertex == face_node {
                    continue;
                }
                let d = distance(&element.unit_nodes[face_node], &element.unit_nodes[vertex]);
                if d < min_distance {
                    min_distance = d;
                }
            }
        }
    }
    if !min_distance.is_finite() {
        // Order 0: the single node is every vertex; fall back to the
        // shortest reference edge.
        min_distance = 2.0;
    }
    2.0 / 3.0 * min_distance
}

/// Physical-element part of the time-step bound.
///
/// Tetrahedra of order 1 and 2 get their factor halved: the natural
/// jacobian ratio runs too close to the CFL limit there. This is a
/// deliberate conservatism, not an error.
pub fn dt_geometric_factor(kind: ElementKind, order: usize, geometry: &ElementGeometry) -> f64 {
    match kind {
        ElementKind::Interval => geometry.jacobian.abs(),
        ElementKind::Triangle => {
            let area = (2.0 * geometry.jacobian).abs();
            let semiperimeter: f64 = [(0, 1), (1, 2), (2, 0)]
                .iter()
                .map(|&(a, b)| distance(&geometry.vertices[a], &geometry.vertices[b]))
                .sum::<f64>()
                / 2.0;
            area / semiperimeter
        }
        ElementKind::Tetrahedron => {
            let max_face_jacobian = geometry
                .face_jacobians
                .iter()
                .fold(0.0f64, |acc, &fj| acc.max(fj.abs()));
            let mut result = geometry.jacobian.abs() / max_face_jacobian;
            if order == 1 || order == 2 {
                log::warn!(
                    "cowardly halving timestep for order {} tets to avoid CFL issues",
                    order
                );
                result /= 2.0;
            }
            result
        }
    }
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ReferenceElement;

    #[test]
    fn test_interval_factors() {
        let re0 = ReferenceElement::new(ElementKind::Interval, 0).unwrap();
        assert_eq!(dt_non_geometric_factor(&re0), 1.0);

        let re4 = ReferenceElement::new(ElementKind::Interval, 4).unwrap();
        let spacing = re4.unit_nodes[1][0] - re4.unit_nodes[0][0];
        assert!((dt_non_geometric_factor(&re4) - 0.85 * spacing).abs() < 1e-14);

        let geometry = ElementGeometry {
            jacobian: -0.25,
            face_jacobians: vec![1.0, 1.0],
            vertices: vec![vec![0.0], vec![0.5]],
        };
        assert_eq!(
            dt_geometric_factor(ElementKind::Interval, 4, &geometry),
            0.25
        );
    }

    #[test]
    fn test_factor_shrinks_with_order() {
        // Nodes cluster toward edges as order grows.
        let mut previous = f64::INFINITY;
        for order in 1..=6i64 {
            let re = ReferenceElement::new(ElementKind::Triangle, order).unwrap();
            let factor = dt_non_geometric_factor(&re);
            assert!(factor > 0.0);
            assert!(
                factor <= previous + 1e-12,
                "factor grew from {} to {} at order {}",
                previous,
                factor,
                order
            );
            previous = factor;
        }
    }

    #[test]
    fn test_triangle_geometric_factor_is_inradius_like() {
        // Unit right triangle: area 0.5, semiperimeter (2+√2)/2.
        let geometry = ElementGeometry {
            jacobian: 0.25, // |2J| = physical area
            face_jacobians: vec![1.0; 3],
            vertices: vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]],
        };
        let expected = 0.5 / ((2.0 + 2f64.sqrt()) / 2.0);
        let got = dt_geometric_factor(ElementKind::Triangle, 3, &geometry);
        assert!((got - expected).abs() < 1e-14);
    }

    #[test]
    fn test_tetrahedron_low_order_halving() {
        let geometry = ElementGeometry {
            jacobian: 3.0,
            face_jacobians: vec![1.0, 2.0, 1.5, 0.5],
            vertices: Vec::new(),
        };
        let naive = 3.0 / 2.0;
        // Orders 1 and 2 are halved, exactly.
        for order in [1, 2] {
            let got = dt_geometric_factor(ElementKind::Tetrahedron, order, &geometry);
            assert_eq!(got, naive / 2.0, "order {} should be halved", order);
        }
        // Order 3 and up use the plain ratio.
        let got = dt_geometric_factor(ElementKind::Tetrahedron, 3, &geometry);
        assert_eq!(got, naive);
    }
}
