//! Face-orientation matching.
//!
//! Two elements sharing a face generally disagree on the local ordering of
//! that face's vertices, and therefore on the ordering of its degrees of
//! freedom. A [`FaceShuffle`] is the index permutation reconciling the two
//! orderings; the lookup table holds one per canonical vertex permutation
//! and is computed once per element kind (or per quadrature node set).

use std::collections::HashMap;

use crate::element::coords::{
    barycentric_to_equilateral, equilateral_to_unit, identify_affine_map, AffineMap,
};
use crate::element::{ElementKind, ReferenceElement};
use crate::error::ElementError;

/// Matching tolerance for transformed face nodes.
const NODE_MATCH_TOL: f64 = 1e-10;

/// Index permutation of face-local dofs, keyed by the vertex permutation
/// that produced it.
#[derive(Clone, Debug)]
pub struct FaceShuffle {
    pub vertex_permutation: Vec<usize>,
    /// `apply(x)[i] = x[index_map[i]]`; `index_map[i]` is the face node the
    /// permuted orientation reads position `i` from.
    pub index_map: Vec<usize>,
}

impl FaceShuffle {
    pub fn apply<T: Copy>(&self, values: &[T]) -> Vec<T> {
        self.index_map.iter().map(|&i| values[i]).collect()
    }
}

/// Shuffle lookup table for one face node set.
#[derive(Clone)]
pub struct ShuffleLookup {
    shuffles: HashMap<Vec<usize>, FaceShuffle>,
}

impl ShuffleLookup {
    /// Build the table for the given face node set (nodal or quadrature)
    /// in facial unit coordinates.
    pub fn build(element: &ReferenceElement, face_nodes: &[Vec<f64>]) -> Result<Self, ElementError> {
        let kind = element.kind;
        let face_unit_vertices = face_unit_vertex_coords(kind);

        let mut shuffles = HashMap::new();
        for perm in permutations(kind.dimensions()) {
            let permuted: Vec<Vec<f64>> =
                perm.iter().map(|&i| face_unit_vertices[i].clone()).collect();
            let amap = identify_affine_map(&face_unit_vertices, &permuted);
            let index_map = find_index_map(element, &perm, face_nodes, &amap)?;
            shuffles.insert(
                perm.clone(),
                FaceShuffle {
                    vertex_permutation: perm,
                    index_map,
                },
            );
        }

        Ok(Self { shuffles })
    }

    /// The shuffle aligning a neighbor's face-dof ordering with ours.
    ///
    /// `face_1_vertices` and `face_2_vertices` are the two elements' global
    /// vertex numbers for the shared face. A vertex set that does not match
    /// is a distinct, catchable error so mesh-connectivity code can report
    /// the offending pairing.
    pub fn shuffle_to_match(
        &self,
        face_1_vertices: &[usize],
        face_2_vertices: &[usize],
    ) -> Result<&FaceShuffle, ElementError> {
        let normalize: HashMap<usize, usize> = face_1_vertices
            .iter()
            .enumerate()
            .map(|(i, &v)| (v, i))
            .collect();

        let mut normalized = Vec::with_capacity(face_2_vertices.len());
        for &v in face_2_vertices {
            match normalize.get(&v) {
                Some(&i) => normalized.push(i),
                None => {
                    return Err(ElementError::FaceVertexMismatch {
                        face_1: face_1_vertices.to_vec(),
                        face_2: face_2_vertices.to_vec(),
                    })
                }
            }
        }

        self.shuffles
            .get(&normalized)
            .ok_or_else(|| ElementError::FaceVertexMismatch {
                face_1: face_1_vertices.to_vec(),
                face_2: face_2_vertices.to_vec(),
            })
    }
}

/// Face-0 vertex locations in facial unit coordinates.
///
/// Face 0 lies on the plane where the last unit coordinate is -1; chopping
/// that coordinate yields the facial coordinate system.
fn face_unit_vertex_coords(kind: ElementKind) -> Vec<Vec<f64>> {
    let e2u = equilateral_to_unit(kind);
    kind.face_vertices()[0]
        .iter()
        .map(|&v| {
            let mut bary = vec![0.0; kind.vertex_count()];
            bary[v] = 1.0;
            let unit = e2u.apply(&barycentric_to_equilateral(kind, &bary));
            debug_assert!(kind.dimensions() == 1 || (unit[kind.dimensions() - 1] + 1.0).abs() < 1e-13);
            unit[..kind.dimensions() - 1].to_vec()
        })
        .collect()
}

/// For each position i, the face node whose image under `amap` lands on
/// node i (tolerance-based nearest match).
fn find_index_map(
    element: &ReferenceElement,
    perm: &[usize],
    face_nodes: &[Vec<f64>],
    amap: &AffineMap,
) -> Result<Vec<usize>, ElementError> {
    let transformed: Vec<Vec<f64>> = face_nodes.iter().map(|n| amap.apply(n)).collect();

    let mut index_map = Vec::with_capacity(face_nodes.len());
    for target in face_nodes {
        let found = transformed.iter().position(|t| {
            t.iter()
                .zip(target.iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
                .sqrt()
                < NODE_MATCH_TOL
        });
        match found {
            Some(j) => index_map.push(j),
            None => {
                return Err(ElementError::UnmatchedFaceNode {
                    kind: element.kind,
                    order: element.order,
                    permutation: perm.to_vec(),
                })
            }
        }
    }
    Ok(index_map)
}

/// All permutations of 0..n (n ≤ 3 here; faces have at most 3 vertices).
fn permutations(n: usize) -> Vec<Vec<usize>> {
    fn recurse(remaining: &[usize], prefix: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        if remaining.is_empty() {
            out.push(prefix.clone());
            return;
        }
        for (i, &v) in remaining.iter().enumerate() {
            let mut rest = remaining.to_vec();
            rest.remove(i);
            prefix.push(v);
            recurse(&rest, prefix, out);
            prefix.pop();
        }
    }
    let mut out = Vec::new();
    recurse(&(0..n).collect::<Vec<_>>(), &mut Vec::new(), &mut out);
    out
}

/// Affine maps promoting face-0 unit coordinates into volume coordinates,
/// one per face.
///
/// The face-f map sends facial coordinates u to the volume point of face f
/// corresponding to u on face 0: embed u as (u, -1), then apply the map
/// identified from face-0's vertex configuration to face-f's.
pub fn face_affine_maps(element: &ReferenceElement) -> Vec<AffineMap> {
    let kind = element.kind;
    let dim = kind.dimensions();
    let e2u = equilateral_to_unit(kind);

    let vertex_units: Vec<Vec<f64>> = (0..kind.vertex_count())
        .map(|v| {
            let mut bary = vec![0.0; kind.vertex_count()];
            bary[v] = 1.0;
            e2u.apply(&barycentric_to_equilateral(kind, &bary))
        })
        .collect();

    // Per face: its vertices plus the opposite vertex, so the identified
    // map is a square volume-to-volume solve.
    let sets_of_to_points: Vec<Vec<Vec<f64>>> = kind
        .face_vertices()
        .iter()
        .map(|fvi| {
            let mut pts: Vec<Vec<f64>> =
                fvi.iter().map(|&v| vertex_units[v].clone()).collect();
            let missing = (0..kind.vertex_count()).find(|v| !fvi.contains(v)).unwrap();
            pts.push(vertex_units[missing].clone());
            pts
        })
        .collect();
    let from_points = sets_of_to_points[0].clone();

    // Embed facial coordinates into the volume by appending -1.
    let mut embed_matrix = faer::Mat::zeros(dim, dim.saturating_sub(1));
    for i in 0..dim - 1 {
        embed_matrix[(i, i)] = 1.0;
    }
    let mut embed_offset = vec![0.0; dim];
    embed_offset[dim - 1] = -1.0;
    let embed = AffineMap::new(embed_matrix, embed_offset);

    sets_of_to_points
        .iter()
        .map(|to_points| identify_affine_map(&from_points, to_points).compose(&embed))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ReferenceElement;

    fn invert_permutation(p: &[usize]) -> Vec<usize> {
        let mut inv = vec![0; p.len()];
        for (i, &v) in p.iter().enumerate() {
            inv[v] = i;
        }
        inv
    }

    #[test]
    fn test_identity_permutation_is_identity_shuffle() {
        for kind in [ElementKind::Triangle, ElementKind::Tetrahedron] {
            let re = ReferenceElement::new(kind, 4).unwrap();
            let lookup = ShuffleLookup::build(&re, &re.unit_face_nodes()).unwrap();
            let identity: Vec<usize> = (0..kind.dimensions()).collect();
            let shuffle = lookup.shuffles.get(&identity).unwrap();
            for (i, &j) in shuffle.index_map.iter().enumerate() {
                assert_eq!(i, j, "{:?}: identity shuffle moved dof {}", kind, i);
            }
        }
    }

    #[test]
    fn test_shuffle_then_inverse_is_identity() {
        for kind in [ElementKind::Triangle, ElementKind::Tetrahedron] {
            let re = ReferenceElement::new(kind, 3).unwrap();
            let lookup = ShuffleLookup::build(&re, &re.unit_face_nodes()).unwrap();
            let original: Vec<usize> = (0..re.face_node_count()).collect();

            for (perm, shuffle) in lookup.shuffles.iter() {
                let inverse = lookup.shuffles.get(&invert_permutation(perm)).unwrap();
                let round_trip = inverse.apply(&shuffle.apply(&original));
                assert_eq!(
                    round_trip, original,
                    "{:?}: perm {:?} round trip failed",
                    kind, perm
                );
            }
        }
    }

    #[test]
    fn test_vertex_mismatch_is_detected() {
        let re = ReferenceElement::new(ElementKind::Triangle, 2).unwrap();
        let lookup = ShuffleLookup::build(&re, &re.unit_face_nodes()).unwrap();

        // Shared face between elements: same vertex set in another order.
        assert!(lookup.shuffle_to_match(&[11, 17], &[17, 11]).is_ok());

        // Disjoint vertex sets must raise the dedicated error.
        match lookup.shuffle_to_match(&[11, 17], &[17, 23]) {
            Err(ElementError::FaceVertexMismatch { .. }) => {}
            other => panic!("expected FaceVertexMismatch, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_triangle_edge_reversal_reverses_dofs() {
        // Reversing the two vertices of a triangle's edge reverses the
        // Gauss-Lobatto dof ordering along it.
        let re = ReferenceElement::new(ElementKind::Triangle, 4).unwrap();
        let lookup = ShuffleLookup::build(&re, &re.unit_face_nodes()).unwrap();
        let shuffle = lookup.shuffle_to_match(&[5, 9], &[9, 5]).unwrap();
        let n = re.face_node_count();
        for (i, &j) in shuffle.index_map.iter().enumerate() {
            assert_eq!(j, n - 1 - i, "edge reversal should flip dof order");
        }
    }

    #[test]
    fn test_face_affine_maps_hit_face_vertices() {
        // The face-f map must send face-0's vertex configuration onto
        // face f's vertices (in face-vertex order).
        for kind in [ElementKind::Triangle, ElementKind::Tetrahedron] {
            let re = ReferenceElement::new(kind, 3).unwrap();
            let maps = face_affine_maps(&re);
            let e2u = equilateral_to_unit(kind);
            let vertex_units: Vec<Vec<f64>> = (0..kind.vertex_count())
                .map(|v| {
                    let mut bary = vec![0.0; kind.vertex_count()];
                    bary[v] = 1.0;
                    e2u.apply(&barycentric_to_equilateral(kind, &bary))
                })
                .collect();
            let face_vertex_coords = face_unit_vertex_coords(kind);

            for (f, fvi) in kind.face_vertices().iter().enumerate() {
                for (k, &v) in fvi.iter().enumerate() {
                    let image = maps[f].apply(&face_vertex_coords[k]);
                    for d in 0..kind.dimensions() {
                        assert!(
                            (image[d] - vertex_units[v][d]).abs() < 1e-12,
                            "{:?} face {} vertex {}: {:?} vs {:?}",
                            kind,
                            f,
                            k,
                            image,
                            vertex_units[v]
                        );
                    }
                }
            }
        }
    }
}
