//! Reference elements: kinds, node numbering, nodes and basis functions.
//!
//! A reference element is identified by `(kind, order)`. Everything else —
//! node tuples, interpolation nodes in three coordinate systems, vertex and
//! face index sets — is a pure function of that pair and is stored immutably
//! on [`ReferenceElement`].

pub mod basis;
pub mod coords;
pub mod warp;

use crate::error::ElementError;
use coords::equilateral_to_unit;

/// The supported reference-element shapes.
///
/// Kind-specific behavior (face tables, coordinate maps, warp routines)
/// dispatches on this tag; the matrix-derivation algorithms are shared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Interval,
    Triangle,
    Tetrahedron,
}

impl ElementKind {
    pub fn dimensions(self) -> usize {
        match self {
            ElementKind::Interval => 1,
            ElementKind::Triangle => 2,
            ElementKind::Tetrahedron => 3,
        }
    }

    pub fn vertex_count(self) -> usize {
        self.dimensions() + 1
    }

    pub fn face_count(self) -> usize {
        self.dimensions() + 1
    }

    /// Number of interpolation nodes for a given order:
    /// C(order + d, d), the dimension of the complete polynomial space.
    pub fn node_count(self, order: usize) -> usize {
        let d = self.dimensions();
        let mut numerator = 1usize;
        for i in 0..d {
            numerator *= order + 1 + i;
        }
        let mut factorial = 1usize;
        for i in 2..=d {
            factorial *= i;
        }
        numerator / factorial
    }

    /// Vertex index lists per face.
    ///
    /// Interval faces are the endpoints; triangle faces are AB, BC, AC;
    /// tetrahedron faces are ABC, ABD, ACD, BCD.
    pub fn face_vertices(self) -> &'static [&'static [usize]] {
        match self {
            ElementKind::Interval => &[&[0], &[1]],
            ElementKind::Triangle => &[&[0, 1], &[1, 2], &[0, 2]],
            ElementKind::Tetrahedron => &[&[0, 1, 2], &[0, 1, 3], &[0, 2, 3], &[1, 2, 3]],
        }
    }

    /// Enumerate the node tuples: non-negative integer d-tuples summing to
    /// at most `order`, with the last component varying slowest.
    ///
    /// This enumeration order defines the local node numbering and the mode
    /// ordering of the basis; every derived matrix depends on it.
    pub fn node_tuples(self, order: usize) -> Vec<Vec<usize>> {
        let mut result = Vec::with_capacity(self.node_count(order));
        match self {
            ElementKind::Interval => {
                for i in 0..=order {
                    result.push(vec![i]);
                }
            }
            ElementKind::Triangle => {
                for n in 0..=order {
                    for m in 0..=order - n {
                        result.push(vec![m, n]);
                    }
                }
            }
            ElementKind::Tetrahedron => {
                for o in 0..=order {
                    for n in 0..=order - o {
                        for m in 0..=order - o - n {
                            result.push(vec![m, n, o]);
                        }
                    }
                }
            }
        }
        result
    }

    /// The faces on which the node represented by `tuple` lies.
    pub fn faces_for_node_tuple(self, order: usize, tuple: &[usize]) -> Vec<usize> {
        let mut result = Vec::new();
        match self {
            ElementKind::Interval => {
                if tuple[0] == 0 {
                    result.push(0);
                    if order == 0 {
                        result.push(1);
                    }
                } else if tuple[0] == order {
                    result.push(1);
                }
            }
            ElementKind::Triangle => {
                let (m, n) = (tuple[0], tuple[1]);
                if n == 0 {
                    result.push(0);
                }
                if m + n == order {
                    result.push(1);
                }
                if m == 0 {
                    result.push(2);
                }
            }
            ElementKind::Tetrahedron => {
                let (m, n, o) = (tuple[0], tuple[1], tuple[2]);
                if o == 0 {
                    result.push(0);
                }
                if n == 0 {
                    result.push(1);
                }
                if m == 0 {
                    result.push(2);
                }
                if m + n + o == order {
                    result.push(3);
                }
            }
        }
        result
    }
}

/// A reference element of a given kind and order, with its interpolation
/// nodes in all three coordinate systems and the derived index sets.
///
/// Immutable once constructed.
#[derive(Clone, Debug)]
pub struct ReferenceElement {
    pub kind: ElementKind,
    pub order: usize,
    /// One tuple per node; defines the local numbering.
    pub node_tuples: Vec<Vec<usize>>,
    /// Equidistant nodes in barycentric coordinates (pre-warp).
    pub barycentric_nodes: Vec<Vec<f64>>,
    /// Warped nodes in equilateral coordinates.
    pub equilateral_nodes: Vec<Vec<f64>>,
    /// Warped nodes in unit (r, s, t) coordinates.
    pub unit_nodes: Vec<Vec<f64>>,
    /// Node index of each vertex.
    pub vertex_indices: Vec<usize>,
    /// For each face, the local node indices lying on it.
    pub face_indices: Vec<Vec<usize>>,
}

impl ReferenceElement {
    pub fn new(kind: ElementKind, order: i64) -> Result<Self, ElementError> {
        if order < 0 {
            return Err(ElementError::UnsupportedOrder { kind, order });
        }
        let order = order as usize;

        let node_tuples = kind.node_tuples(order);
        let barycentric_nodes = equidistant_barycentric_nodes(kind, order, &node_tuples);

        let (equilateral_nodes, unit_nodes) = match kind {
            ElementKind::Interval => {
                // 1D nodes are Gauss-Lobatto directly; equilateral and unit
                // coordinates coincide. The order-0 node sits at 0.5, the
                // value the reference node tables were published with.
                let nodes: Vec<Vec<f64>> = if order == 0 {
                    vec![vec![0.5]]
                } else {
                    crate::polynomial::gauss_lobatto_nodes(order)
                        .into_iter()
                        .map(|x| vec![x])
                        .collect()
                };
                (nodes.clone(), nodes)
            }
            ElementKind::Triangle => {
                let equil = warp::triangle_equilateral_nodes(order, &barycentric_nodes);
                let e2u = equilateral_to_unit(kind);
                let unit = equil.iter().map(|p| e2u.apply(p)).collect();
                (equil, unit)
            }
            ElementKind::Tetrahedron => {
                let equil = warp::tetrahedron_equilateral_nodes(order, &barycentric_nodes);
                let e2u = equilateral_to_unit(kind);
                let unit = equil.iter().map(|p| e2u.apply(p)).collect();
                (equil, unit)
            }
        };

        let vertex_indices = vertex_indices(kind, order, &node_tuples);
        let face_indices = face_indices(kind, order, &node_tuples);

        Ok(Self {
            kind,
            order,
            node_tuples,
            barycentric_nodes,
            equilateral_nodes,
            unit_nodes,
            vertex_indices,
            face_indices,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.kind.dimensions()
    }

    pub fn node_count(&self) -> usize {
        self.node_tuples.len()
    }

    pub fn face_count(&self) -> usize {
        self.face_indices.len()
    }

    pub fn face_node_count(&self) -> usize {
        self.face_indices[0].len()
    }

    /// Mode identifiers of the basis, in basis order.
    ///
    /// Identical to the node-tuple enumeration; the Vandermonde matrix
    /// depends on both orderings agreeing.
    pub fn mode_identifiers(&self) -> &[Vec<usize>] {
        &self.node_tuples
    }

    /// Equidistant (unwarped) nodes in equilateral coordinates.
    pub fn equidistant_equilateral_nodes(&self) -> Vec<Vec<f64>> {
        self.barycentric_nodes
            .iter()
            .map(|bary| coords::barycentric_to_equilateral(self.kind, bary))
            .collect()
    }

    /// Equidistant (unwarped) nodes in unit coordinates.
    pub fn equidistant_unit_nodes(&self) -> Vec<Vec<f64>> {
        let e2u = equilateral_to_unit(self.kind);
        self.equidistant_equilateral_nodes()
            .iter()
            .map(|p| e2u.apply(p))
            .collect()
    }

    /// Face node locations in facial (d-1 dimensional) unit coordinates.
    ///
    /// Taken from face 0, whose nodes sit on the plane where the last unit
    /// coordinate is -1; identical for each face.
    pub fn unit_face_nodes(&self) -> Vec<Vec<f64>> {
        let dim = self.dimensions();
        self.face_indices[0]
            .iter()
            .map(|&i| {
                let node = &self.unit_nodes[i];
                debug_assert!(dim == 1 || (node[dim - 1] + 1.0).abs() < 1e-13);
                node[..dim - 1].to_vec()
            })
            .collect()
    }
}

fn equidistant_barycentric_nodes(
    kind: ElementKind,
    order: usize,
    node_tuples: &[Vec<usize>],
) -> Vec<Vec<f64>> {
    node_tuples
        .iter()
        .map(|tuple| {
            let mut bary = Vec::with_capacity(kind.vertex_count());
            let mut sum = 0.0;
            bary.push(0.0); // placeholder for λ_1
            for &t in tuple {
                let divided = if order == 0 {
                    0.0
                } else {
                    t as f64 / order as f64
                };
                sum += divided;
                bary.push(divided);
            }
            bary[0] = 1.0 - sum;
            bary
        })
        .collect()
}

fn vertex_indices(kind: ElementKind, order: usize, node_tuples: &[Vec<usize>]) -> Vec<usize> {
    let d = kind.dimensions();
    let find = |target: &[usize]| {
        node_tuples
            .iter()
            .position(|t| t == target)
            .expect("vertex tuple is always a node tuple")
    };

    let mut result = vec![find(&vec![0; d])];
    for wander in 0..d {
        let mut tuple = vec![0; d];
        tuple[wander] = order;
        result.push(find(&tuple));
    }
    result
}

fn face_indices(kind: ElementKind, order: usize, node_tuples: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut faces = vec![Vec::new(); kind.face_count()];
    for (idx, tuple) in node_tuples.iter().enumerate() {
        for face in kind.faces_for_node_tuple(order, tuple) {
            faces[face].push(idx);
        }
    }
    faces
}
