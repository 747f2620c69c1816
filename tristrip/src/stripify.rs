//! The experiment-and-commit strip search: randomized-start growth
//! experiments over the adjacency graph, greedy commit of the best batch,
//! then cache-size splitting and vertex-cache-driven reordering.

use ahash::AHashSet;

use crate::cache::VertexCache;
use crate::graph::{Face, FaceId, FaceTag, Graph};
use crate::strip::{find_traversal, Strip, StripStart};

/// Slots of the modeled cache assumed lost to real-world inefficiency when
/// deriving the strip-length threshold.
const CACHE_INEFFICIENCY: usize = 6;

/// Reset-point fan-out per commit batch.
const NUM_SAMPLES: usize = 10;

/// Reset-point search state threaded through the outer loop.
struct SearchState {
    jump: f32,
    first: bool,
}

pub(crate) struct Stripifier {
    /// Cache size minus the inefficiency allowance, floored at one. Both the
    /// split threshold and the simulated cache capacity.
    cache_size: usize,
    min_strip_length: usize,
}

impl Stripifier {
    pub fn new(cache_size: usize, min_strip_length: usize) -> Self {
        Self {
            cache_size: cache_size.saturating_sub(CACHE_INEFFICIENCY).max(1),
            min_strip_length,
        }
    }

    /// Runs the full search over `graph`: committed strips in emission
    /// order plus the loose faces rejected by the minimum strip length.
    pub fn stripify(&self, graph: &mut Graph) -> (Vec<Strip>, Vec<FaceId>) {
        let all_strips = self.find_all_strips(graph);
        self.split_up_strips_and_optimize(graph, all_strips)
    }

    fn find_all_strips(&self, graph: &mut Graph) -> Vec<Strip> {
        let mut all_strips = Vec::new();
        let mut experiment_id: u32 = 0;
        let mut strip_id: u32 = 0;
        let mut done = false;

        let mut state = SearchState {
            jump: 0.0,
            first: true,
        };

        while !done {
            // phase 1: seed up to NUM_SAMPLES * 6 experiments, one per
            // (reset face, edge, direction) combination
            let mut experiments: Vec<Vec<Strip>> = Vec::with_capacity(NUM_SAMPLES * 6);
            let mut reset_points: AHashSet<FaceId> = AHashSet::new();

            for _ in 0..NUM_SAMPLES {
                let Some(next_face) = find_good_reset_point(graph, &mut state) else {
                    done = true;
                    break;
                };

                // already evaluated in this batch
                if !reset_points.insert(next_face) {
                    continue;
                }

                debug_assert!(!matches!(
                    graph.face(next_face).tag,
                    FaceTag::Committed { .. }
                ));

                let [v0, v1, v2] = graph.face(next_face).verts();

                for (a, b) in [(v0, v1), (v1, v2), (v2, v0)] {
                    let edge = graph.find_edge(a, b).expect("edge of a real face");

                    for to_v1 in [true, false] {
                        let strip = Strip::new(
                            StripStart {
                                face: next_face,
                                edge,
                                to_v1,
                            },
                            strip_id,
                            experiment_id,
                        );
                        strip_id += 1;
                        experiment_id += 1;
                        experiments.push(vec![strip]);
                    }
                }
            }

            // phase 2: build each experiment's seed strip and chain
            // traversal continuations until none exist
            for exp in &mut experiments {
                exp[0].build(graph);
                let experiment = exp[0].experiment.expect("seed strip is experimental");

                while let Some(start) = find_traversal(graph, exp.last().expect("seeded")) {
                    let mut strip = Strip::new(start, strip_id, experiment);
                    strip_id += 1;
                    strip.build(graph);
                    exp.push(strip);
                }
            }

            // phase 3: highest mean strip length wins, first seen on ties
            let mut best_index = 0;
            let mut best_value = 0.0f32;

            for (i, exp) in experiments.iter().enumerate() {
                let value = avg_strip_size(exp);
                if value > best_value {
                    best_value = value;
                    best_index = i;
                }
            }

            // phase 4: commit the winner, release every loser's tags
            for (i, mut exp) in experiments.into_iter().enumerate() {
                if i == best_index {
                    for strip in &mut exp {
                        strip.experiment = None;
                        for j in 0..strip.faces.len() {
                            let f = strip.faces[j];
                            strip.mark(f, graph);
                        }
                    }
                    all_strips.extend(exp);
                } else {
                    for strip in &exp {
                        for &f in &strip.faces {
                            if matches!(graph.face(f).tag, FaceTag::Experiment { .. }) {
                                graph.faces[f].tag = FaceTag::Unassigned;
                            }
                        }
                    }
                }
            }
        }

        all_strips
    }

    /// Splits strips into cache-threshold pieces, flattens the too-short
    /// ones into a loose face list, and greedily reorders the rest by
    /// simulated cache hits.
    fn split_up_strips_and_optimize(
        &self,
        graph: &mut Graph,
        all_strips: Vec<Strip>,
    ) -> (Vec<Strip>, Vec<FaceId>) {
        let threshold = self.cache_size;
        let mut temp_strips: Vec<Strip> = Vec::new();

        for decl in &all_strips {
            let actual = decl
                .faces
                .iter()
                .filter(|&&f| !graph.face(f).is_degenerate())
                .count();

            if actual > threshold {
                let num_times = actual / threshold;
                let mut num_leftover = actual % threshold;
                let mut degenerate_count = 0usize;

                for j in 0..num_times {
                    let mut current = Strip::piece();
                    let mut face_ctr = j * threshold + degenerate_count;
                    let mut first_time = true;

                    while face_ctr < threshold + j * threshold + degenerate_count {
                        let fid = decl.faces[face_ctr];

                        if graph.face(fid).is_degenerate() {
                            degenerate_count += 1;

                            // no use for a degenerate leading or closing a slice
                            let keep = (face_ctr + 1
                                != threshold + j * threshold + degenerate_count
                                || (j == num_times - 1
                                    && num_leftover < 4
                                    && num_leftover > 0))
                                && !first_time;

                            if keep {
                                current.faces.push(fid);
                            }
                            face_ctr += 1;
                        } else {
                            current.faces.push(fid);
                            face_ctr += 1;
                            first_time = false;
                        }
                    }

                    if j == num_times - 1 && num_leftover > 0 && num_leftover < 4 {
                        // way too small a remainder, fold it into this slice
                        let mut ctr = 0;
                        while ctr < num_leftover {
                            let fid = decl.faces[face_ctr];
                            if graph.face(fid).is_degenerate() {
                                degenerate_count += 1;
                            } else {
                                ctr += 1;
                            }
                            current.faces.push(fid);
                            face_ctr += 1;
                        }
                        num_leftover = 0;
                    }

                    temp_strips.push(current);
                }

                let mut left_off = num_times * threshold + degenerate_count;

                if num_leftover != 0 {
                    let mut current = Strip::piece();
                    let mut ctr = 0;
                    let mut first_time = true;

                    while ctr < num_leftover {
                        let fid = decl.faces[left_off];

                        if !graph.face(fid).is_degenerate() {
                            ctr += 1;
                            first_time = false;
                            current.faces.push(fid);
                            left_off += 1;
                        } else if !first_time {
                            current.faces.push(fid);
                            left_off += 1;
                        } else {
                            left_off += 1;
                        }
                    }

                    temp_strips.push(current);
                }
            } else {
                let mut current = Strip::piece();
                current.faces.extend_from_slice(&decl.faces);
                temp_strips.push(current);
            }
        }

        let (mut big_strips, face_list) = self.remove_small_strips(graph, temp_strips);
        let mut out_strips = Vec::new();

        if !big_strips.is_empty() {
            let mut vcache = VertexCache::new(self.cache_size);

            // seed with the most isolated strip: fewest neighbor references
            // per face
            let mut first_index = 0;
            let mut min_cost = 10000.0f32;

            for (i, strip) in big_strips.iter().enumerate() {
                let num_neighbors: usize = strip
                    .faces
                    .iter()
                    .map(|&f| graph.neighbor_count(f))
                    .sum();
                let cost = num_neighbors as f32 / strip.faces.len() as f32;

                if cost < min_cost {
                    min_cost = cost;
                    first_index = i;
                }
            }

            update_cache_strip(&mut vcache, graph, &big_strips[first_index]);
            big_strips[first_index].visited = true;

            let mut order = vec![first_index];
            let mut wants_cw = big_strips[first_index].faces.len() % 2 == 0;

            // n^2, but strips are few compared to faces
            loop {
                let mut best_hits = -1.0f32;
                let mut best_index = None;

                for (i, strip) in big_strips.iter().enumerate() {
                    if strip.visited {
                        continue;
                    }

                    let hits = calc_strip_hits(&vcache, graph, strip);

                    if hits > best_hits {
                        best_hits = hits;
                        best_index = Some(i);
                    } else if hits == best_hits {
                        // tie: prefer the strip whose winding lines up with
                        // the parity implied by concatenation
                        let begin = graph.face(strip.faces[0]).verts();
                        let first = first_face_order(graph, &strip.faces, false);

                        if wants_cw == is_cw(&begin, first[0], first[1]) {
                            best_index = Some(i);
                        }
                    }
                }

                let Some(bi) = best_index else {
                    break;
                };

                big_strips[bi].visited = true;
                update_cache_strip(&mut vcache, graph, &big_strips[bi]);

                if big_strips[bi].faces.len() % 2 != 0 {
                    wants_cw = !wants_cw;
                }
                order.push(bi);
            }

            let mut slots: Vec<Option<Strip>> = big_strips.into_iter().map(Some).collect();
            for i in order {
                out_strips.push(slots[i].take().expect("strip ordered once"));
            }
        }

        (out_strips, face_list)
    }

    /// Strips below the minimum length are no strips at all: their faces go to
    /// a loose list, greedily reordered one face at a time by cache hits.
    fn remove_small_strips(
        &self,
        graph: &Graph,
        strips: Vec<Strip>,
    ) -> (Vec<Strip>, Vec<FaceId>) {
        let mut big_strips = Vec::new();
        let mut temp_faces = Vec::new();

        for strip in strips {
            if strip.faces.len() < self.min_strip_length {
                temp_faces.extend_from_slice(&strip.faces);
            } else {
                big_strips.push(strip);
            }
        }

        let mut face_list = Vec::with_capacity(temp_faces.len());

        if !temp_faces.is_empty() {
            let mut visited = vec![false; temp_faces.len()];
            let mut vcache = VertexCache::new(self.cache_size);

            loop {
                let mut best_hits = -1i32;
                let mut best_index = None;

                for (i, &f) in temp_faces.iter().enumerate() {
                    if visited[i] {
                        continue;
                    }
                    let hits = calc_face_hits(&vcache, graph.face(f));
                    if hits > best_hits {
                        best_hits = hits;
                        best_index = Some(i);
                    }
                }

                let Some(bi) = best_index else {
                    break;
                };

                visited[bi] = true;
                update_cache_face(&mut vcache, graph.face(temp_faces[bi]));
                face_list.push(temp_faces[bi]);
            }
        }

        (big_strips, face_list)
    }
}

/// Picks a face to seed the next batch of experiments. The very first call
/// hunts for a mesh boundary; later calls jump around the face list so
/// other large open spans get done too, leaving small fragments for the
/// loose list at the end.
fn find_good_reset_point(graph: &Graph, state: &mut SearchState) -> Option<FaceId> {
    let num_faces = graph.real_face_count();
    if num_faces == 0 {
        return None;
    }

    let boundary_start = if state.first {
        state.first = false;
        find_start_point(graph)
    } else {
        None
    };
    let start = boundary_start.unwrap_or(((num_faces - 1) as f32 * state.jump) as usize);

    let mut result = None;
    let mut i = start;

    loop {
        if !matches!(graph.face(i).tag, FaceTag::Committed { .. }) {
            result = Some(i);
            break;
        }

        i += 1;
        if i >= num_faces {
            i = 0;
        }
        if i == start {
            break;
        }
    }

    state.jump += 0.1;
    if state.jump > 1.0 {
        state.jump = 0.05;
    }

    result
}

/// The face with the most boundary edges, or `None` when the mesh has no
/// boundary at all.
fn find_start_point(graph: &Graph) -> Option<FaceId> {
    let mut best_ctr = -1i32;
    let mut best_index = None;

    for i in 0..graph.real_face_count() {
        let ctr = graph.boundary_edge_count(i) as i32;
        if ctr > best_ctr {
            best_ctr = ctr;
            best_index = Some(i);
        }
    }

    if best_ctr == 0 {
        None
    } else {
        best_index
    }
}

/// Mean strip length of an experiment, degenerates excluded.
fn avg_strip_size(strips: &[Strip]) -> f32 {
    let mut size_accum: i64 = 0;

    for strip in strips {
        size_accum += strip.faces.len() as i64 - strip.degenerates as i64;
    }

    size_accum as f32 / strips.len() as f32
}

fn update_cache_face(vcache: &mut VertexCache, face: &Face) {
    for v in face.verts() {
        if !vcache.in_cache(v) {
            vcache.add_entry(v);
        }
    }
}

fn update_cache_strip(vcache: &mut VertexCache, graph: &Graph, strip: &Strip) {
    for &f in &strip.faces {
        update_cache_face(vcache, graph.face(f));
    }
}

fn calc_face_hits(vcache: &VertexCache, face: &Face) -> i32 {
    face.verts().iter().filter(|&&v| vcache.in_cache(v)).count() as i32
}

/// Fraction of a strip's vertex references already in the simulated cache.
fn calc_strip_hits(vcache: &VertexCache, graph: &Graph, strip: &Strip) -> f32 {
    let mut num_hits = 0;

    for &f in &strip.faces {
        num_hits += calc_face_hits(vcache, graph.face(f));
    }

    num_hits as f32 / strip.faces.len() as f32
}

/// First vertex of `b` that does not occur in `a`.
fn unique_vertex(b: &[u16; 3], a: &[u16; 3]) -> Option<u16> {
    b.iter().copied().find(|v| !a.contains(v))
}

/// Vertices of `b` shared with `a`, in `b`'s scan order.
fn shared_vertices(b: &[u16; 3], a: &[u16; 3]) -> (Option<u16>, Option<u16>) {
    let mut v0 = None;
    let mut v1 = None;

    for v in b.iter().copied().filter(|v| a.contains(v)) {
        if v0.is_none() {
            v0 = Some(v);
        } else {
            v1 = Some(v);
            break;
        }
    }

    (v0, v1)
}

fn is_cw(face: &[u16; 3], v0: u16, v1: u16) -> bool {
    if face[0] == v0 {
        face[1] == v1
    } else if face[1] == v0 {
        face[2] == v1
    } else {
        face[0] == v1
    }
}

fn next_is_cw(num_indices: usize) -> bool {
    num_indices % 2 == 0
}

/// Reorders a strip's first face so the vertex not shared with the second
/// face leads and (third face permitting) the vertex shared with the third
/// face trails, preserving the walk's winding convention.
fn first_face_order(graph: &Graph, faces: &[FaceId], degenerate_aware: bool) -> [u16; 3] {
    let mut first = graph.face(faces[0]).verts();

    if faces.len() > 1 {
        let second = graph.face(faces[1]);

        if let Some(u) = unique_vertex(&first, &second.verts()) {
            if u == first[1] {
                first.swap(0, 1);
            } else if u == first[2] {
                first.swap(0, 2);
            }
        }

        if faces.len() > 2 {
            if degenerate_aware && second.is_degenerate() {
                let pivot = second.v1;
                if first[1] == pivot {
                    first.swap(1, 2);
                }
            } else {
                let third = graph.face(faces[2]).verts();
                let (s0, s1) = shared_vertices(&first, &third);

                if s0 == Some(first[1]) && s1.is_none() {
                    first.swap(1, 2);
                }
            }
        }
    }

    first
}

/// Emits the final flat index stream from the ordered strip list.
///
/// Unstitched strips are separated by `-1` and counted; stitching doubles
/// the joining vertex (with a winding-parity fixup) unless a restart
/// sentinel is configured.
pub(crate) fn create_strips(
    graph: &Graph,
    all_strips: &[Strip],
    stitch_strips: bool,
    restart: Option<i32>,
) -> (Vec<i32>, usize) {
    let mut strip_indices: Vec<i32> = Vec::new();
    let mut num_separate_strips = 0usize;

    if all_strips.is_empty() {
        return (strip_indices, num_separate_strips);
    }

    let restart_enabled = restart.is_some();
    // the -1 strip separators would throw off winding-parity inference
    let mut account_for_negatives = 0usize;
    let mut last_face = [0u16; 3];

    for (i, strip) in all_strips.iter().enumerate() {
        let faces = &strip.faces;
        debug_assert!(!faces.is_empty());

        let begin = graph.face(faces[0]).verts();
        let first = first_face_order(graph, faces, true);

        if i == 0 || !stitch_strips || restart_enabled {
            if !is_cw(&begin, first[0], first[1]) {
                strip_indices.push(first[0] as i32);
            }
        } else {
            // double tap the first vertex of the new strip
            strip_indices.push(first[0] as i32);

            let next_cw = next_is_cw(strip_indices.len() - account_for_negatives);
            if next_cw != is_cw(&begin, first[0], first[1]) {
                strip_indices.push(first[0] as i32);
            }
        }

        strip_indices.push(first[0] as i32);
        strip_indices.push(first[1] as i32);
        strip_indices.push(first[2] as i32);
        last_face = first;

        for &fid in &faces[1..] {
            let face = graph.face(fid);

            match unique_vertex(&face.verts(), &last_face) {
                Some(apex) => {
                    strip_indices.push(apex as i32);
                    last_face = [last_face[1], last_face[2], apex];
                }
                None => {
                    // degenerate bridge: emit its third vertex verbatim and
                    // restart the sliding window from its raw indices
                    strip_indices.push(face.v2 as i32);
                    last_face = face.verts();
                }
            }
        }

        if stitch_strips && !restart_enabled {
            if i != all_strips.len() - 1 {
                strip_indices.push(last_face[2] as i32);
            }
        } else if let Some(restart_value) = restart {
            strip_indices.push(restart_value);
        } else {
            strip_indices.push(-1);
            account_for_negatives += 1;
            num_separate_strips += 1;
        }

        last_face = [last_face[1], last_face[2], last_face[2]];
    }

    if stitch_strips || restart_enabled {
        num_separate_strips = 1;
    }

    (strip_indices, num_separate_strips)
}
