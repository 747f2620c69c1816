//! Vertex deduplication and the VIF-sized chunk builder: mesh corners are
//! collapsed to unique vertices, stripified, and the strips regrouped into
//! single-material chunks that fit the 64-vertex unpack limit.

use ahash::AHashMap;
use glam::{Vec2, Vec3, Vec4};

use tristrip::{generate_strips, PrimitiveType, StripConfig, CACHESIZE_GEFORCE3};

use crate::error::{ModelError, Result};
use crate::obj::ModelMesh;

/// VIF unpacks into VU memory in packets of at most this many vertices.
pub const MAX_VERTS_PER_VIF_PACKET: usize = 64;

/// A unique mesh corner after deduplication.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshVertex {
    pub position: Vec3,
    pub normal: Option<Vec3>,
    pub uv: Option<Vec2>,
    pub color: Option<Vec4>,
    pub obj_mat_id: Option<usize>,
    pub render_mat_id: Option<usize>,
}

/// Bit-pattern identity on the floats; vertex identity is position, normal,
/// UV and source material, never the color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct VertexKey {
    position: [u32; 3],
    normal: Option<[u32; 3]>,
    uv: Option<[u32; 2]>,
    material: Option<usize>,
}

fn canon(f: f32) -> u32 {
    // -0.0 and 0.0 are the same vertex
    if f == 0.0 {
        0
    } else {
        f.to_bits()
    }
}

impl VertexKey {
    fn new(vert: &MeshVertex) -> Self {
        Self {
            position: vert.position.to_array().map(canon),
            normal: vert.normal.map(|n| n.to_array().map(canon)),
            uv: vert.uv.map(|uv| uv.to_array().map(canon)),
            material: vert.obj_mat_id,
        }
    }
}

/// One ≤ 64-vertex, single-material slice of a stripified mesh. Strip
/// vertices are stored expanded, in emission order; `strip_lengths`
/// delimits the sub-strips.
#[derive(Debug, Clone, Default)]
pub struct MeshChunk {
    pub strip_lengths: Vec<usize>,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub colors: Vec<Vec4>,
    pub obj_mat_id: Option<usize>,
    pub render_mat_id: Option<usize>,
}

impl MeshChunk {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.strip_lengths.iter().map(|len| len - 2).sum()
    }

    /// Per-strip reset values as the hardware wants them encoded.
    pub fn reset_counts(&self) -> Vec<u8> {
        self.strip_lengths
            .iter()
            .map(|len| ((len - 2) * 3) as u8)
            .collect()
    }

    fn push_strip(&mut self, verts: &[MeshVertex], strip: &[u16]) {
        self.strip_lengths.push(strip.len());

        for &index in strip {
            let vert = &verts[index as usize];

            self.positions.push(vert.position);
            if let Some(normal) = vert.normal {
                self.normals.push(normal);
            }
            if let Some(uv) = vert.uv {
                self.uvs.push(uv);
            }
            if let Some(color) = vert.color {
                self.colors.push(color);
            }

            self.obj_mat_id = vert.obj_mat_id;
            self.render_mat_id = vert.render_mat_id;
        }
    }
}

/// A mesh converted to chunked triangle strips.
#[derive(Debug, Clone, Default)]
pub struct TriStripMesh {
    pub chunks: Vec<MeshChunk>,
    /// Source triangle count, before stripification.
    pub triangle_count: usize,
}

impl TriStripMesh {
    pub fn total_strip_verts(&self) -> usize {
        self.chunks.iter().map(MeshChunk::vertex_count).sum()
    }
}

/// Collapses every face corner of `mesh` to a deduplicated vertex list plus
/// a `u16` index buffer, three indices per face.
pub fn dedup_vertices(mesh: &ModelMesh) -> Result<(Vec<MeshVertex>, Vec<u16>)> {
    let mut verts: Vec<MeshVertex> = Vec::new();
    let mut index_of: AHashMap<VertexKey, u16> = AHashMap::new();
    let mut indices = Vec::with_capacity(mesh.faces.len() * 3);

    for face in &mesh.faces {
        for corner in 0..3 {
            let vert = MeshVertex {
                position: face.verts[corner].position,
                normal: face.normals[corner],
                uv: face.uvs[corner],
                color: face.verts[corner].color,
                obj_mat_id: face.material_id,
                render_mat_id: face.render_material_id,
            };

            let key = VertexKey::new(&vert);
            let index = match index_of.get(&key) {
                Some(&index) => index,
                None => {
                    if verts.len() > u16::MAX as usize {
                        return Err(ModelError::TooManyVertices {
                            mesh: mesh.name.clone(),
                            count: verts.len(),
                        });
                    }
                    let index = verts.len() as u16;
                    verts.push(vert);
                    index_of.insert(key, index);
                    index
                }
            };

            indices.push(index);
        }
    }

    Ok((verts, indices))
}

/// Stripifies `mesh` and regroups the strips into VIF-sized chunks.
///
/// Strips come out unstitched with the GeForce3-class cache size, which is
/// what the VU wants. A strip run changes chunk whenever the source
/// material changes or the vertex cap would be hit; chunk boundaries
/// duplicate vertices, they never drop them.
pub fn generate_tri_strips(mesh: &ModelMesh) -> Result<TriStripMesh> {
    let mut out = TriStripMesh {
        triangle_count: mesh.faces.len(),
        ..TriStripMesh::default()
    };

    if mesh.faces.is_empty() {
        return Ok(out);
    }

    let (verts, indices) = dedup_vertices(mesh)?;

    let config = StripConfig {
        cache_size: CACHESIZE_GEFORCE3,
        min_strip_size: 0,
        stitch_strips: false,
        restart_value: None,
        lists_only: false,
    };
    let groups = generate_strips(&indices, &config).ok_or_else(|| ModelError::StripifyFailed {
        mesh: mesh.name.clone(),
    })?;

    let mut strips: Vec<Vec<u16>> = Vec::with_capacity(groups.len());
    for group in groups {
        match group.prim_type {
            PrimitiveType::Strip => strips.push(group.indices),
            // a list group decomposes into three-vertex strips
            PrimitiveType::List => {
                for tri in group.indices.chunks_exact(3) {
                    strips.push(tri.to_vec());
                }
            }
        }
    }

    let mut chunk = MeshChunk::default();
    let mut last_material: Option<Option<usize>> = None;

    for strip in &strips {
        let material = verts[strip[0] as usize].obj_mat_id;
        let material_break = last_material.is_some() && last_material != Some(material);
        let fits = chunk.vertex_count() + strip.len() < MAX_VERTS_PER_VIF_PACKET;

        if (material_break || !fits) && !chunk.is_empty() {
            out.chunks.push(std::mem::take(&mut chunk));
        }

        chunk.push_strip(&verts, strip);
        last_material = Some(material);
    }

    if !chunk.is_empty() {
        out.chunks.push(chunk);
    }

    log::trace!(
        "mesh '{}': {} unique verts, {} strips, {} chunks",
        mesh.name,
        verts.len(),
        strips.len(),
        out.chunks.len()
    );

    Ok(out)
}

#[cfg(test)]
mod chunk_tests {
    use super::*;
    use crate::obj::{ObjFace, ObjVertex};

    fn face(a: Vec3, b: Vec3, c: Vec3, material: Option<usize>) -> ObjFace {
        let vert = |position| ObjVertex {
            position,
            color: None,
        };
        ObjFace {
            verts: [vert(a), vert(b), vert(c)],
            uvs: [None; 3],
            normals: [None; 3],
            material_id: material,
            render_material_id: None,
        }
    }

    fn row_mesh(faces: usize, material: Option<usize>) -> ModelMesh {
        // triangles sharing successive edges along the x axis
        let mut mesh = ModelMesh::new("row");
        for i in 0..faces {
            let x = i as f32;
            mesh.faces.push(face(
                Vec3::new(x, (i % 2) as f32, 0.0),
                Vec3::new(x + 1.0, ((i + 1) % 2) as f32, 0.0),
                Vec3::new(x + 2.0, (i % 2) as f32, 0.0),
                material,
            ));
        }
        mesh
    }

    #[test]
    fn dedup_collapses_shared_corners() {
        let mesh = row_mesh(10, None);
        let (verts, indices) = dedup_vertices(&mesh).unwrap();

        assert_eq!(indices.len(), 30);
        // 10 triangles in a row touch 12 distinct positions
        assert_eq!(verts.len(), 12);

        // the same corners map to the same indices on a second pass
        let (verts2, indices2) = dedup_vertices(&mesh).unwrap();
        assert_eq!(verts.len(), verts2.len());
        assert_eq!(indices, indices2);
    }

    #[test]
    fn dedup_keeps_materials_apart() {
        let mut mesh = row_mesh(2, Some(0));
        let mut other = row_mesh(2, Some(1));
        mesh.faces.append(&mut other.faces);

        let (verts, _) = dedup_vertices(&mesh).unwrap();
        // same positions, two materials, no sharing across them
        assert_eq!(verts.len(), 8);
    }

    #[test]
    fn negative_zero_is_normalized() {
        let mesh = ModelMesh {
            name: "z".into(),
            faces: vec![
                face(
                    Vec3::new(0.0, 0.0, 0.0),
                    Vec3::new(1.0, 0.0, 0.0),
                    Vec3::new(0.0, 1.0, 0.0),
                    None,
                ),
                face(
                    Vec3::new(-0.0, 0.0, 0.0),
                    Vec3::new(1.0, 0.0, 0.0),
                    Vec3::new(1.0, 1.0, 0.0),
                    None,
                ),
            ],
        };

        let (verts, _) = dedup_vertices(&mesh).unwrap();
        assert_eq!(verts.len(), 4);
    }

    #[test]
    fn chunks_respect_the_vertex_cap() {
        let mesh = row_mesh(70, Some(0));
        let striped = generate_tri_strips(&mesh).unwrap();

        assert!(striped.chunks.len() >= 2);
        for chunk in &striped.chunks {
            assert!(chunk.vertex_count() <= MAX_VERTS_PER_VIF_PACKET);
            assert!(!chunk.strip_lengths.is_empty());
            assert_eq!(
                chunk.vertex_count(),
                chunk.strip_lengths.iter().sum::<usize>()
            );
        }

        // boundary vertices are duplicated, never lost
        assert!(striped.total_strip_verts() >= 72);
        let triangles: usize = striped.chunks.iter().map(MeshChunk::triangle_count).sum();
        assert!(triangles >= 70);
    }

    #[test]
    fn chunks_are_single_material() {
        let mut mesh = row_mesh(6, Some(0));
        let mut other = ModelMesh::new("other");
        for i in 0..6 {
            let x = i as f32;
            other.faces.push(face(
                Vec3::new(x, 10.0, 0.0),
                Vec3::new(x + 1.0, 11.0, 0.0),
                Vec3::new(x + 2.0, 10.0, 0.0),
                Some(1),
            ));
        }
        mesh.faces.append(&mut other.faces);

        let striped = generate_tri_strips(&mesh).unwrap();

        assert!(striped.chunks.len() >= 2);
        let mut seen = [false; 2];
        for chunk in &striped.chunks {
            let mat = chunk.obj_mat_id.unwrap();
            seen[mat] = true;
        }
        assert!(seen[0] && seen[1]);
    }

    #[test]
    fn reset_counts_follow_strip_lengths() {
        let chunk = MeshChunk {
            strip_lengths: vec![4, 3, 10],
            ..MeshChunk::default()
        };

        assert_eq!(chunk.reset_counts(), vec![6, 3, 24]);
        assert_eq!(chunk.triangle_count(), 2 + 1 + 8);
    }

    #[test]
    fn empty_mesh_makes_no_chunks() {
        let striped = generate_tri_strips(&ModelMesh::new("empty")).unwrap();
        assert!(striped.chunks.is_empty());
        assert_eq!(striped.triangle_count, 0);
    }
}
