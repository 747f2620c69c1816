//! Strip growth: walking the adjacency graph forward and backward from a
//! seed edge, pivoting over synthetic degenerate bridges at dead ends.

use crate::graph::{Face, FaceId, FaceTag, Graph};
use crate::graph::EdgeId;

#[derive(Clone, Copy, Debug)]
pub struct StripStart {
    pub face: FaceId,
    pub edge: EdgeId,
    /// Walk direction along the seed edge: `true` walks v0 -> v1.
    pub to_v1: bool,
}

pub struct Strip {
    pub start: Option<StripStart>,
    pub faces: Vec<FaceId>,
    pub id: u32,
    /// `Some` while the strip is speculative, `None` once committed (or for
    /// split pieces, which are never speculative).
    pub experiment: Option<u32>,
    pub visited: bool,
    pub degenerates: u32,
}

/// Outcome of one growth step.
enum WalkStep {
    /// No free neighbor across the trailing edge.
    Terminated,
    /// Append `face`; if `bridge`, pivot over a synthetic degenerate first
    /// so the following step has somewhere to go.
    Grow { face: FaceId, apex: u16, bridge: bool },
}

impl Strip {
    pub fn new(start: StripStart, id: u32, experiment: u32) -> Self {
        Self {
            start: Some(start),
            faces: Vec::new(),
            id,
            experiment: Some(experiment),
            visited: false,
            degenerates: 0,
        }
    }

    /// A bare strip used for split pieces; it has no seed and is never grown.
    pub fn piece() -> Self {
        Self {
            start: None,
            faces: Vec::new(),
            id: 0,
            experiment: None,
            visited: false,
            degenerates: 0,
        }
    }

    /// Whether `face` belongs to this strip.
    pub fn contains(&self, face: Option<FaceId>, graph: &Graph) -> bool {
        let Some(face) = face else {
            return false;
        };

        match (graph.face(face).tag, self.experiment) {
            (FaceTag::Experiment { strip, .. }, Some(_)) => strip == self.id,
            (FaceTag::Committed { strip }, None) => strip == self.id,
            _ => false,
        }
    }

    /// Whether `face` is off limits for this strip: already committed
    /// anywhere, or claimed by the experiment this strip belongs to.
    pub fn is_marked(&self, face: FaceId, graph: &Graph) -> bool {
        match graph.face(face).tag {
            FaceTag::Committed { .. } => true,
            FaceTag::Experiment { experiment, .. } => self.experiment == Some(experiment),
            FaceTag::Unassigned => false,
        }
    }

    pub fn mark(&self, face: FaceId, graph: &mut Graph) {
        graph.faces[face].tag = match self.experiment {
            Some(e) => FaceTag::Experiment {
                experiment: e,
                strip: self.id,
            },
            None => FaceTag::Committed { strip: self.id },
        };
    }

    /// Whether `face` shares at least one edge with a face of this strip.
    pub fn shares_edge(&self, face: FaceId, graph: &Graph) -> bool {
        let f = graph.face(face);

        [(f.v0, f.v1), (f.v1, f.v2), (f.v2, f.v0)]
            .into_iter()
            .filter_map(|(a, b)| graph.find_edge(a, b))
            .any(|e| {
                let edge = graph.edge(e);
                self.contains(edge.face0, graph) || self.contains(edge.face1, graph)
            })
    }

    /// Grows the strip forward as far as possible, then backward from the
    /// seed edge's opposite direction (rejecting faces that would wrap the
    /// strip around onto its own vertices), and joins the two walks.
    pub fn build(&mut self, graph: &mut Graph) {
        let Some(start) = self.start else {
            return;
        };

        let mut scratch: Vec<u16> = Vec::new();
        let mut forward = vec![start.face];
        let mut backward = Vec::new();

        self.mark(start.face, graph);

        let e = graph.edge(start.edge);
        let (v0, v1) = if start.to_v1 {
            (e.v0, e.v1)
        } else {
            (e.v1, e.v0)
        };

        scratch.push(v0);
        scratch.push(v1);
        let v2 = next_index(&scratch, graph.face(start.face));
        scratch.push(v2);

        self.grow(graph, &mut scratch, &mut forward, v1, v2, start.face, None);

        // wrap-around guard primed with everything the forward walk took
        let mut seen = forward.clone();

        scratch.clear();
        scratch.extend([v2, v1, v0]);
        self.grow(
            graph,
            &mut scratch,
            &mut backward,
            v1,
            v0,
            start.face,
            Some(&mut seen),
        );

        self.faces.extend(backward.iter().rev());
        self.faces.append(&mut forward);
    }

    fn plan_step(
        &self,
        graph: &Graph,
        scratch: &[u16],
        nv0: u16,
        nv1: u16,
        prev: FaceId,
        seen: Option<&[FaceId]>,
    ) -> WalkStep {
        let face = match graph.face_across(nv0, nv1, prev) {
            Some(f) if !self.is_marked(f, graph) => f,
            _ => return WalkStep::Terminated,
        };

        if let Some(seen) = seen {
            if !is_unique(graph, seen, graph.face(face)) {
                return WalkStep::Terminated;
            }
        }

        let apex = next_index(scratch, graph.face(face));

        // peek one face further: if that walk dies, pivoting over a bridge to
        // the alternate neighbor may keep the strip alive
        let dead_end = graph
            .face_across(nv1, apex, face)
            .map_or(true, |f| self.is_marked(f, graph));
        let bridge = dead_end
            && graph
                .face_across(nv0, apex, face)
                .is_some_and(|alt| !self.is_marked(alt, graph));

        WalkStep::Grow { face, apex, bridge }
    }

    #[allow(clippy::too_many_arguments)]
    fn grow(
        &mut self,
        graph: &mut Graph,
        scratch: &mut Vec<u16>,
        out: &mut Vec<FaceId>,
        mut nv0: u16,
        mut nv1: u16,
        mut prev: FaceId,
        mut seen: Option<&mut Vec<FaceId>>,
    ) {
        loop {
            let step = self.plan_step(graph, scratch, nv0, nv1, prev, seen.as_deref().map(|v| &v[..]));

            match step {
                WalkStep::Terminated => break,
                WalkStep::Grow { face, apex, bridge } => {
                    let mut next_nv0 = nv1;

                    if bridge {
                        let b = graph.push_bridge(nv0, nv1, nv0);
                        out.push(b);
                        self.mark(b, graph);
                        scratch.push(nv0);
                        next_nv0 = nv0;
                        self.degenerates += 1;
                    }

                    out.push(face);
                    if let Some(seen) = seen.as_deref_mut() {
                        seen.push(face);
                    }
                    self.mark(face, graph);
                    scratch.push(apex);

                    nv0 = next_nv0;
                    nv1 = apex;
                    prev = face;
                }
            }
        }
    }
}

/// Continuation search: an edge chained off the finished strip's trailing
/// vertex that touches a face this experiment hasn't taken yet.
pub fn find_traversal(graph: &Graph, strip: &Strip) -> Option<StripStart> {
    let start = strip.start?;
    let e = graph.edge(start.edge);
    let v = if start.to_v1 { e.v1 } else { e.v0 };

    let mut iter = graph.head(v);
    let mut found = None;

    while let Some(eid) = iter {
        let edge = graph.edge(eid);

        if let (Some(f0), Some(f1)) = (edge.face0, edge.face1) {
            if !strip.contains(Some(f0), graph) && !strip.is_marked(f1, graph) {
                found = Some((eid, f1));
                break;
            }
            if !strip.contains(Some(f1), graph) && !strip.is_marked(f0, graph) {
                found = Some((eid, f0));
                break;
            }
        }

        iter = graph.chain_next(eid, v);
    }

    let (eid, face) = found?;
    let edge = graph.edge(eid);
    let to_v1 = if strip.shares_edge(face, graph) {
        edge.v0 == v
    } else {
        edge.v1 == v
    };

    Some(StripStart {
        face,
        edge: eid,
        to_v1,
    })
}

/// The vertex of `face` not among the last two emitted indices.
/// Falls back to a repeated vertex for degenerate (bridge) faces.
pub fn next_index(scratch: &[u16], face: &Face) -> u16 {
    debug_assert!(scratch.len() >= 2);
    let v0 = scratch[scratch.len() - 2];
    let v1 = scratch[scratch.len() - 1];
    let [fv0, fv1, fv2] = face.verts();

    for (cand, others) in [(fv0, [fv1, fv2]), (fv1, [fv0, fv2]), (fv2, [fv0, fv1])] {
        if cand != v0 && cand != v1 {
            if others.iter().any(|&o| o != v0 && o != v1) {
                // a duplicate triangle probably derailed the walk
                log::warn!("strip walk: triangle doesn't share both trailing vertices, walk derailed");
            }
            return cand;
        }
    }

    // degenerate face: repeat one of its duplicated vertices
    if fv0 == fv1 || fv0 == fv2 {
        fv0
    } else {
        fv1
    }
}

/// `false` if all three of `face`'s vertices already occur among `seen`,
/// which keeps the backward walk from wrapping around.
fn is_unique(graph: &Graph, seen: &[FaceId], face: &Face) -> bool {
    let verts = face.verts();
    let mut found = [false; 3];

    for &f in seen {
        let sf = graph.face(f);
        for (i, &v) in verts.iter().enumerate() {
            if !found[i] && sf.has_vert(v) {
                found[i] = true;
            }
        }
        if found == [true; 3] {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod strip_tests {
    use super::*;

    // 0---2---4
    //  \ / \ / \
    //   1---3---5   three triangles in a row
    const ROW: [u16; 9] = [0, 1, 2, 2, 1, 3, 2, 3, 4];

    #[test]
    fn walk_grows_both_directions() {
        let mut graph = Graph::build(&ROW, 4);
        let edge = graph.find_edge(2, 1).unwrap();
        let mut strip = Strip::new(
            StripStart {
                face: 1,
                edge,
                to_v1: true,
            },
            0,
            0,
        );

        strip.build(&mut graph);

        assert_eq!(strip.faces.len(), 3);
        assert_eq!(strip.degenerates, 0);
        // middle seed reached both neighbors
        assert!(strip.faces.contains(&0));
        assert!(strip.faces.contains(&2));
    }

    #[test]
    fn marked_faces_stop_the_walk() {
        let mut graph = Graph::build(&ROW, 4);

        let edge = graph.find_edge(0, 1).unwrap();
        let mut first = Strip::new(
            StripStart {
                face: 0,
                edge,
                to_v1: true,
            },
            0,
            0,
        );
        first.build(&mut graph);
        assert_eq!(first.faces.len(), 3);

        // same experiment: everything is taken now
        let edge = graph.find_edge(2, 3).unwrap();
        let second = Strip::new(
            StripStart {
                face: 2,
                edge,
                to_v1: true,
            },
            1,
            0,
        );
        assert!(second.is_marked(2, &graph));
        assert!(find_traversal(&graph, &first).is_none());
    }

    #[test]
    fn apex_resolution() {
        let graph = Graph::build(&ROW, 4);

        assert_eq!(next_index(&[0, 1], graph.face(0)), 2);
        assert_eq!(next_index(&[1, 2], graph.face(0)), 0);
    }
}
