//! Shape records: per-chunk descriptors and GS primitive state for the
//! external VIF packet encoder, plus the shape totals it needs.

pub mod chunk;

use bytemuck::{Pod, Zeroable};
use flagset::{flags, FlagSet};

use crate::error::{ModelError, Result};
use crate::obj::{material::Material, ModelMesh};
use chunk::{generate_tri_strips, TriStripMesh};

flags! {
    /// GS PRIM register state attached to each chunk.
    #[repr(u16)]
    pub enum GsPrim: u16 {
        /// PRIM field: triangle strip topology.
        TRISTRIP = 0b100,
        /// Gouraud shading.
        IIP = 1 << 3,
        /// Texture mapping.
        TME = 1 << 4,
        /// Fogging.
        FGE = 1 << 5,
        /// Alpha blending.
        ABE = 1 << 6,
    }
}

/// Fixed-layout chunk descriptor handed to the packet encoder. Indices are
/// one-based; `0` means none.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct VifDescriptor {
    pub texture_index: u16,
    pub material_index: u16,
}

impl VifDescriptor {
    /// Texture is resolved at render time, not from the model's table.
    pub const EXTERNAL_TEXTURE: u16 = 0xFFFF;
}

/// A tri-striped mesh with everything the packet encoder needs.
#[derive(Debug, Clone, Default)]
pub struct Shape {
    pub mesh: TriStripMesh,
    pub descriptors: Vec<VifDescriptor>,
    pub prims: Vec<FlagSet<GsPrim>>,
    pub total_strip_verts: u16,
    pub num_triangles: u16,
}

/// Stripifies `mesh` and resolves each chunk against the model's texture
/// and material tables.
pub fn build_shape(
    mesh: &ModelMesh,
    textures: &[String],
    materials: &[Material],
    external_texture: bool,
) -> Result<Shape> {
    let striped = generate_tri_strips(mesh)?;

    let (total_strip_verts, num_triangles) = shape_totals(&mesh.name, &striped)?;
    let mut shape = Shape {
        total_strip_verts,
        num_triangles,
        ..Shape::default()
    };

    for chunk in &striped.chunks {
        let mut texture_index: u16 = 0;
        let mut material_index: u16 = 0;

        if external_texture {
            texture_index = VifDescriptor::EXTERNAL_TEXTURE;
        } else if let Some(obj_mat) = chunk.obj_mat_id {
            let material =
                materials
                    .get(obj_mat)
                    .ok_or_else(|| ModelError::UnknownMaterial {
                        mesh: mesh.name.clone(),
                        id: obj_mat,
                    })?;

            if let Some(map) = material.map_diffuse.as_deref() {
                texture_index = textures
                    .iter()
                    .position(|t| t == map)
                    .map_or(0, |i| i as u16 + 1);
            }
            material_index = chunk.render_mat_id.map_or(0, |i| i as u16 + 1);
        }

        log::trace!(
            "chunk - {} verts, mat id: {}, tex id: {}",
            chunk.vertex_count(),
            material_index,
            texture_index
        );

        let mut prim = GsPrim::TRISTRIP | GsPrim::IIP | GsPrim::FGE;
        if texture_index != 0 {
            prim |= GsPrim::TME;
        }
        if external_texture {
            prim |= GsPrim::ABE;
        }

        shape.descriptors.push(VifDescriptor {
            texture_index,
            material_index,
        });
        shape.prims.push(prim);
    }

    log::info!(
        "tri-striped mesh '{}' into {} chunks - {} triangles, {} strip points",
        mesh.name,
        striped.chunks.len(),
        shape.num_triangles,
        shape.total_strip_verts
    );

    shape.mesh = striped;
    Ok(shape)
}

/// The packet header stores both totals as `u16`; strip points duplicated
/// across chunk boundaries can push past that even when dedup fits.
fn shape_totals(mesh_name: &str, striped: &TriStripMesh) -> Result<(u16, u16)> {
    let strip_verts = striped.total_strip_verts();
    let overflow = || ModelError::ShapeTooLarge {
        mesh: mesh_name.to_string(),
        strip_verts,
        triangles: striped.triangle_count,
    };

    Ok((
        u16::try_from(strip_verts).map_err(|_| overflow())?,
        u16::try_from(striped.triangle_count).map_err(|_| overflow())?,
    ))
}

#[cfg(test)]
mod shape_tests {
    use super::*;
    use crate::obj::{ObjFace, ObjVertex};
    use glam::{Vec2, Vec3};

    fn textured_mesh(material: usize) -> ModelMesh {
        let vert = |x, y| ObjVertex {
            position: Vec3::new(x, y, 0.0),
            color: None,
        };
        let mut mesh = ModelMesh::new("panel");
        let mut face = ObjFace {
            verts: [vert(0.0, 0.0), vert(1.0, 0.0), vert(0.0, 1.0)],
            uvs: [Some(Vec2::ZERO), Some(Vec2::X), Some(Vec2::Y)],
            normals: [Some(Vec3::Z); 3],
            material_id: Some(material),
            render_material_id: Some(material),
        };
        mesh.faces.push(face);
        face.verts = [vert(0.0, 1.0), vert(1.0, 0.0), vert(1.0, 1.0)];
        // shared corners must carry the same uv or they dedup apart
        face.uvs = [Some(Vec2::Y), Some(Vec2::X), Some(Vec2::ONE)];
        mesh.faces.push(face);
        mesh
    }

    fn body_material() -> Material {
        Material {
            id: 0,
            name: "body".into(),
            map_diffuse: Some("body.png".into()),
            ..Material::default()
        }
    }

    #[test]
    fn textured_chunk_gets_tme() {
        let shape = build_shape(
            &textured_mesh(0),
            &["body.png".to_string()],
            &[body_material()],
            false,
        )
        .unwrap();

        assert_eq!(shape.descriptors.len(), 1);
        assert_eq!(shape.descriptors[0].texture_index, 1);
        assert_eq!(shape.descriptors[0].material_index, 1);
        assert!(shape.prims[0].contains(GsPrim::TME));
        assert!(shape.prims[0].contains(GsPrim::TRISTRIP));
        assert!(!shape.prims[0].contains(GsPrim::ABE));
        assert_eq!(shape.num_triangles, 2);
        assert_eq!(shape.total_strip_verts, 4);
    }

    #[test]
    fn external_texture_marks_descriptor_and_abe() {
        let shape = build_shape(&textured_mesh(0), &[], &[body_material()], true).unwrap();

        assert_eq!(
            shape.descriptors[0].texture_index,
            VifDescriptor::EXTERNAL_TEXTURE
        );
        assert_eq!(shape.descriptors[0].material_index, 0);
        assert!(shape.prims[0].contains(GsPrim::ABE));
    }

    #[test]
    fn untextured_chunk_has_no_tme() {
        let vert = |x: f32, y: f32| ObjVertex {
            position: Vec3::new(x, y, 0.0),
            color: None,
        };
        let mut mesh = ModelMesh::new("flat");
        mesh.faces.push(ObjFace {
            verts: [vert(0.0, 0.0), vert(1.0, 0.0), vert(0.0, 1.0)],
            uvs: [None; 3],
            normals: [None; 3],
            material_id: None,
            render_material_id: None,
        });

        let shape = build_shape(&mesh, &[], &[], false).unwrap();
        assert_eq!(shape.descriptors[0].texture_index, 0);
        assert!(!shape.prims[0].contains(GsPrim::TME));
    }

    #[test]
    fn missing_material_entry_is_an_error() {
        let err = build_shape(&textured_mesh(0), &[], &[], false).unwrap_err();

        assert!(matches!(
            err,
            crate::error::ModelError::UnknownMaterial { id: 0, .. }
        ));
        assert!(err.to_string().contains("panel"));
    }

    #[test]
    fn oversized_totals_are_an_error() {
        let striped = TriStripMesh {
            triangle_count: 70_000,
            ..TriStripMesh::default()
        };

        let err = shape_totals("huge", &striped).unwrap_err();
        assert!(matches!(
            err,
            crate::error::ModelError::ShapeTooLarge {
                triangles: 70_000,
                ..
            }
        ));
    }

    #[test]
    fn descriptor_is_pod() {
        let descriptor = VifDescriptor {
            texture_index: 2,
            material_index: 1,
        };
        let bytes = bytemuck::bytes_of(&descriptor);
        assert_eq!(bytes, [2, 0, 1, 0]);
    }
}
