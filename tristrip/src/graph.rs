//! Face/edge adjacency structures for stripification.
//!
//! Faces and edges live in flat arenas referenced by integer id, with edges
//! chained per vertex for O(1) average lookup by an unordered index pair.

pub type FaceId = usize;
pub type EdgeId = usize;

/// Assignment state of a face. A committed face is never reassigned; an
/// experiment tag is overwritten freely by later experiments and cleared
/// when its experiment loses.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FaceTag {
    Unassigned,
    Experiment { experiment: u32, strip: u32 },
    Committed { strip: u32 },
}

#[derive(Clone, Debug)]
pub struct Face {
    pub v0: u16,
    pub v1: u16,
    pub v2: u16,
    pub tag: FaceTag,
    /// Synthetic degenerate bridge inserted by the strip walk, absent from
    /// the source index buffer.
    pub synthetic: bool,
}

impl Face {
    fn new(v0: u16, v1: u16, v2: u16) -> Self {
        Self {
            v0,
            v1,
            v2,
            tag: FaceTag::Unassigned,
            synthetic: false,
        }
    }

    pub fn verts(&self) -> [u16; 3] {
        [self.v0, self.v1, self.v2]
    }

    pub fn has_vert(&self, v: u16) -> bool {
        self.v0 == v || self.v1 == v || self.v2 == v
    }

    pub fn is_degenerate(&self) -> bool {
        is_degenerate(self.v0, self.v1, self.v2)
    }

    /// Same triangle under rotation (not reflection).
    fn same_rotation(&self, v0: u16, v1: u16, v2: u16) -> bool {
        (self.v0 == v0 && self.v1 == v1 && self.v2 == v2)
            || (self.v0 == v1 && self.v1 == v2 && self.v2 == v0)
            || (self.v0 == v2 && self.v1 == v0 && self.v2 == v1)
    }
}

pub fn is_degenerate(v0: u16, v1: u16, v2: u16) -> bool {
    v0 == v1 || v1 == v2 || v2 == v0
}

pub struct Edge {
    pub v0: u16,
    pub v1: u16,
    pub face0: Option<FaceId>,
    pub face1: Option<FaceId>,
    // next edge in v0's / v1's chain
    next0: Option<EdgeId>,
    next1: Option<EdgeId>,
}

/// Arena of faces and edges built from a triangle index buffer.
///
/// Faces past `real_faces` are synthetic bridges appended during strip
/// growth; reset-point scans only ever look at the real prefix.
pub struct Graph {
    pub faces: Vec<Face>,
    real_faces: usize,
    edges: Vec<Edge>,
    heads: Vec<Option<EdgeId>>,
}

impl Graph {
    /// Builds the face list and edge table from index triples, excluding
    /// degenerate triangles and rotation-duplicates. A third face claiming
    /// an already double-owned edge is logged and its link dropped.
    pub fn build(indices: &[u16], max_index: u16) -> Self {
        let num_triangles = indices.len() / 3;

        let mut graph = Self {
            faces: Vec::with_capacity(num_triangles),
            real_faces: 0,
            edges: Vec::with_capacity(num_triangles * 3),
            heads: vec![None; max_index as usize + 1],
        };

        for tri in indices.chunks_exact(3) {
            let (v0, v1, v2) = (tri[0], tri[1], tri[2]);

            // degenerate source triangles are silently dropped
            if is_degenerate(v0, v1, v2) {
                continue;
            }

            let face_id = graph.faces.len();
            let mut might_already_exist = true;
            let mut updated = [None; 3];

            for (slot, (ev0, ev1)) in [(v0, v1), (v1, v2), (v2, v0)].into_iter().enumerate() {
                match graph.find_edge(ev0, ev1) {
                    None => {
                        // a fresh edge means this face can't be a duplicate
                        might_already_exist = false;
                        graph.push_edge(ev0, ev1, face_id);
                    }
                    Some(e) => {
                        if graph.edges[e].face1.is_some() {
                            log::warn!(
                                "more than 2 triangles share edge ({ev0}, {ev1}); dropping adjacency link"
                            );
                        } else {
                            graph.edges[e].face1 = Some(face_id);
                            updated[slot] = Some(e);
                        }
                    }
                }
            }

            if might_already_exist && graph.already_exists(v0, v1, v2) {
                // unhook the links that were just pointed at the duplicate
                for e in updated.into_iter().flatten() {
                    graph.edges[e].face1 = None;
                }
            } else {
                graph.faces.push(Face::new(v0, v1, v2));
            }
        }

        graph.real_faces = graph.faces.len();
        graph
    }

    // linear scan on purpose: correctness over speed at insertion time
    fn already_exists(&self, v0: u16, v1: u16, v2: u16) -> bool {
        self.faces.iter().any(|f| f.same_rotation(v0, v1, v2))
    }

    fn push_edge(&mut self, v0: u16, v1: u16, face0: FaceId) {
        let id = self.edges.len();
        self.edges.push(Edge {
            v0,
            v1,
            face0: Some(face0),
            face1: None,
            next0: self.heads[v0 as usize],
            next1: self.heads[v1 as usize],
        });
        self.heads[v0 as usize] = Some(id);
        self.heads[v1 as usize] = Some(id);
    }

    /// Appends a synthetic degenerate bridge face. Bridges never enter the
    /// edge table.
    pub fn push_bridge(&mut self, v0: u16, v1: u16, v2: u16) -> FaceId {
        let id = self.faces.len();
        self.faces.push(Face {
            v0,
            v1,
            v2,
            tag: FaceTag::Unassigned,
            synthetic: true,
        });
        id
    }

    pub fn real_face_count(&self) -> usize {
        self.real_faces
    }

    pub fn face(&self, id: FaceId) -> &Face {
        &self.faces[id]
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id]
    }

    pub(crate) fn head(&self, v: u16) -> Option<EdgeId> {
        self.heads[v as usize]
    }

    pub(crate) fn chain_next(&self, e: EdgeId, v: u16) -> Option<EdgeId> {
        let edge = &self.edges[e];
        if edge.v0 == v {
            edge.next0
        } else {
            edge.next1
        }
    }

    /// Looks up the edge between `v0` and `v1` in either orientation by
    /// walking `v0`'s chain.
    pub fn find_edge(&self, v0: u16, v1: u16) -> Option<EdgeId> {
        let mut iter = self.heads[v0 as usize];

        while let Some(e) = iter {
            let edge = &self.edges[e];

            if edge.v0 == v0 {
                if edge.v1 == v1 {
                    return Some(e);
                }
                iter = edge.next0;
            } else {
                debug_assert_eq!(edge.v1, v0);
                if edge.v0 == v1 {
                    return Some(e);
                }
                iter = edge.next1;
            }
        }

        None
    }

    /// The face on the other side of edge `(v0, v1)` from `from`.
    /// `None` for boundary edges, degenerate "edges" of a bridge face,
    /// and edges absent from the table.
    pub fn face_across(&self, v0: u16, v1: u16, from: FaceId) -> Option<FaceId> {
        let edge = match self.find_edge(v0, v1) {
            Some(e) => &self.edges[e],
            None => return None,
        };

        if edge.face0 == Some(from) {
            edge.face1
        } else {
            edge.face0
        }
    }

    /// Neighbor faces actually reachable across this face's edges.
    pub fn neighbor_count(&self, id: FaceId) -> usize {
        let f = self.face(id);
        [(f.v0, f.v1), (f.v1, f.v2), (f.v2, f.v0)]
            .into_iter()
            .filter(|&(a, b)| self.face_across(a, b, id).is_some())
            .count()
    }

    /// Edges of this face with no second owner.
    pub fn boundary_edge_count(&self, id: FaceId) -> usize {
        3 - self.neighbor_count(id)
    }
}

#[cfg(test)]
mod graph_tests {
    use super::*;

    // 0--1
    // | /|
    // |/ |
    // 2--3
    const QUAD: [u16; 6] = [0, 1, 2, 2, 1, 3];

    #[test]
    fn quad_adjacency() {
        let graph = Graph::build(&QUAD, 3);

        assert_eq!(graph.real_face_count(), 2);
        assert_eq!(graph.face_across(1, 2, 0), Some(1));
        assert_eq!(graph.face_across(1, 2, 1), Some(0));
        // boundary edge
        assert_eq!(graph.face_across(0, 1, 0), None);
        assert_eq!(graph.neighbor_count(0), 1);
        assert_eq!(graph.boundary_edge_count(0), 2);
    }

    #[test]
    fn degenerate_faces_excluded() {
        let indices = [0, 1, 2, 3, 3, 4, 5, 6, 5];
        let graph = Graph::build(&indices, 6);

        assert_eq!(graph.real_face_count(), 1);
        assert_eq!(graph.face(0).verts(), [0, 1, 2]);
    }

    #[test]
    fn rotation_duplicates_excluded() {
        let indices = [0, 1, 2, 1, 2, 0, 2, 0, 1];
        let graph = Graph::build(&indices, 2);

        assert_eq!(graph.real_face_count(), 1);
    }

    #[test]
    fn non_manifold_edge_keeps_third_face() {
        // three triangles all sharing edge (0, 1)
        let indices = [0, 1, 2, 1, 0, 3, 0, 1, 4];
        let graph = Graph::build(&indices, 4);

        // third face is kept as a face, only its link via (0, 1) is dropped
        assert_eq!(graph.real_face_count(), 3);
        let e = graph.find_edge(0, 1).unwrap();
        assert_eq!(graph.edge(e).face0, Some(0));
        assert_eq!(graph.edge(e).face1, Some(1));
        // adjacency is now asymmetric: the third face still sees face 0
        // across the shared edge, but nothing points back at it
        assert_eq!(graph.neighbor_count(2), 1);
        assert_eq!(graph.face_across(0, 1, 2), Some(0));
        assert_ne!(graph.face_across(0, 1, 0), Some(2));
    }

    #[test]
    fn edge_lookup_is_unordered() {
        let graph = Graph::build(&QUAD, 3);

        assert_eq!(graph.find_edge(1, 2), graph.find_edge(2, 1));
        assert!(graph.find_edge(0, 3).is_none());
    }
}
