//! Triangle strip generation with vertex cache awareness.
//!
//! Takes a raw triangle list and reorganizes it into cache-friendly
//! triangle strips: an adjacency graph over the faces, a multi-start
//! experiment search for long strips, cache-size splitting, and a greedy
//! reorder of the result against a simulated post-transform cache.
//!
//! ```no_run
//! use tristrip::{generate_strips, StripConfig};
//!
//! let quad = [0u16, 1, 2, 2, 1, 3];
//! let groups = generate_strips(&quad, &StripConfig::default()).unwrap();
//! assert_eq!(groups[0].indices, [0, 1, 2, 3]);
//! ```

mod cache;
mod graph;
mod strip;
mod stripify;

pub use cache::VertexCache;

use graph::Graph;
use stripify::{create_strips, Stripifier};

/// Post-transform cache size of first-generation cached GPUs.
pub const CACHESIZE_GEFORCE1_2: usize = 16;
/// Post-transform cache size of GeForce3-class hardware.
pub const CACHESIZE_GEFORCE3: usize = 24;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PrimitiveType {
    /// Plain triangle list, three indices per face.
    List,
    /// Triangle strip.
    Strip,
}

/// One run of output primitives sharing a topology.
#[derive(Clone, Debug)]
pub struct PrimitiveGroup {
    pub prim_type: PrimitiveType,
    pub indices: Vec<u16>,
}

impl PrimitiveGroup {
    pub fn num_indices(&self) -> usize {
        self.indices.len()
    }
}

/// Knobs for [`generate_strips`].
#[derive(Clone, Copy, Debug)]
pub struct StripConfig {
    /// Post-transform cache size to optimize for.
    pub cache_size: usize,
    /// Strips with fewer faces than this are emitted as one list group.
    pub min_strip_size: usize,
    /// Join all strips into a single strip with degenerate triangles.
    pub stitch_strips: bool,
    /// Primitive-restart index emitted between strips instead of
    /// degenerate stitching. Implies a single output strip group.
    pub restart_value: Option<u16>,
    /// Skip strip emission entirely and output one cache-reordered list.
    pub lists_only: bool,
}

impl Default for StripConfig {
    fn default() -> Self {
        Self {
            cache_size: CACHESIZE_GEFORCE1_2,
            min_strip_size: 0,
            stitch_strips: true,
            restart_value: None,
            lists_only: false,
        }
    }
}

/// Converts a triangle list into optimized primitive groups.
///
/// Returns `None` when `indices` is empty or contains no stripifiable
/// face (for instance when every input triangle is degenerate).
pub fn generate_strips(indices: &[u16], config: &StripConfig) -> Option<Vec<PrimitiveGroup>> {
    if indices.is_empty() {
        return None;
    }

    let max_index = indices.iter().copied().max()?;

    let mut graph = Graph::build(indices, max_index);
    if graph.real_face_count() == 0 {
        log::debug!("no stripifiable faces in {} indices", indices.len());
        return None;
    }

    let stripifier = Stripifier::new(config.cache_size, config.min_strip_size);
    let (strips, loose) = stripifier.stripify(&mut graph);

    if config.lists_only {
        let mut list = Vec::with_capacity(indices.len());
        for &f in strips.iter().flat_map(|s| s.faces.iter()) {
            let face = graph.face(f);
            if !face.is_degenerate() {
                list.extend(face.verts());
            }
        }
        for &f in &loose {
            list.extend(graph.face(f).verts());
        }

        return Some(vec![PrimitiveGroup {
            prim_type: PrimitiveType::List,
            indices: list,
        }]);
    }

    let restart = config.restart_value.map(i32::from);
    let (strip_indices, num_separate) = create_strips(&graph, &strips, config.stitch_strips, restart);

    let mut groups = Vec::with_capacity(num_separate + 1);

    if config.stitch_strips || restart.is_some() {
        if !strip_indices.is_empty() {
            groups.push(PrimitiveGroup {
                prim_type: PrimitiveType::Strip,
                indices: strip_indices.iter().map(|&i| i as u16).collect(),
            });
        }
    } else {
        let mut current = Vec::new();
        for &i in &strip_indices {
            if i == -1 {
                groups.push(PrimitiveGroup {
                    prim_type: PrimitiveType::Strip,
                    indices: std::mem::take(&mut current),
                });
            } else {
                current.push(i as u16);
            }
        }
        debug_assert_eq!(groups.len(), num_separate);
    }

    if !loose.is_empty() {
        let mut list = Vec::with_capacity(loose.len() * 3);
        for &f in &loose {
            list.extend(graph.face(f).verts());
        }
        groups.push(PrimitiveGroup {
            prim_type: PrimitiveType::List,
            indices: list,
        });
    }

    if groups.is_empty() {
        return None;
    }

    Some(groups)
}

#[cfg(test)]
mod api_tests {
    use super::*;

    fn unstitched() -> StripConfig {
        StripConfig {
            stitch_strips: false,
            ..StripConfig::default()
        }
    }

    #[test]
    fn quad_becomes_four_index_strip() {
        let groups = generate_strips(&[0, 1, 2, 2, 1, 3], &unstitched()).unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].prim_type, PrimitiveType::Strip);
        assert_eq!(groups[0].indices, [0, 1, 2, 3]);
    }

    #[test]
    fn empty_input_is_none() {
        assert!(generate_strips(&[], &StripConfig::default()).is_none());
    }

    #[test]
    fn all_degenerate_input_is_none() {
        assert!(generate_strips(&[0, 0, 1, 2, 2, 2], &StripConfig::default()).is_none());
    }

    #[test]
    fn lists_only_preserves_face_count() {
        let mut indices = Vec::new();
        for i in 0..20u16 {
            indices.extend([i * 3, i * 3 + 1, i * 3 + 2]);
        }

        let groups = generate_strips(
            &indices,
            &StripConfig {
                lists_only: true,
                ..StripConfig::default()
            },
        )
        .unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].prim_type, PrimitiveType::List);
        assert_eq!(groups[0].num_indices(), indices.len());
    }

    #[test]
    fn min_strip_size_moves_fragments_to_list() {
        let mut indices = Vec::new();
        for i in 0..10u16 {
            indices.extend([i * 3, i * 3 + 1, i * 3 + 2]);
        }

        let groups = generate_strips(
            &indices,
            &StripConfig {
                min_strip_size: 2,
                stitch_strips: false,
                ..StripConfig::default()
            },
        )
        .unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].prim_type, PrimitiveType::List);
        assert_eq!(groups[0].num_indices(), 30);
    }

    #[test]
    fn restart_forces_single_group() {
        let mut indices = Vec::new();
        for i in 0..4u16 {
            indices.extend([i * 3, i * 3 + 1, i * 3 + 2]);
        }

        let groups = generate_strips(
            &indices,
            &StripConfig {
                stitch_strips: false,
                restart_value: Some(0xFFFF),
                ..StripConfig::default()
            },
        )
        .unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].prim_type, PrimitiveType::Strip);
        assert_eq!(groups[0].indices.iter().filter(|&&i| i == 0xFFFF).count(), 4);
    }

    /// Unstitched strips plus any list group cover every input face.
    #[test]
    fn grid_face_count_is_preserved() {
        let n = 6u16;
        let mut indices = Vec::new();
        for y in 0..n - 1 {
            for x in 0..n - 1 {
                let base = y * n + x;
                indices.extend([base, base + n, base + n + 1]);
                indices.extend([base, base + n + 1, base + 1]);
            }
        }
        let input_faces = indices.len() / 3;

        let groups = generate_strips(&indices, &unstitched()).unwrap();

        let mut faces = 0usize;
        for group in &groups {
            match group.prim_type {
                PrimitiveType::List => faces += group.num_indices() / 3,
                PrimitiveType::Strip => {
                    let mut window = [0u16; 3];
                    for (i, &v) in group.indices.iter().enumerate() {
                        window = [window[1], window[2], v];
                        if i >= 2 && window[0] != window[1] && window[1] != window[2] && window[0] != window[2] {
                            faces += 1;
                        }
                    }
                }
            }
        }

        assert_eq!(faces, input_faces);
    }
}
