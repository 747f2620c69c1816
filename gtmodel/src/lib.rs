//! OBJ to PS2 tri-strip model conversion.
//!
//! Parses Wavefront OBJ/MTL input, deduplicates vertices, stripifies each
//! mesh with [`tristrip`] and regroups the strips into 64-vertex,
//! single-material chunks with the descriptor records a VIF packet encoder
//! consumes. The byte-level packet encoding itself lives outside this
//! crate.

pub mod error;
pub mod obj;
pub mod shape;

pub mod prelude {
    pub use crate::error::{ModelError, Result};
    pub use crate::obj::{
        material::{Material, MaterialObject},
        ModelMesh, ModelObject, ObjFace, ObjVertex,
    };
    pub use crate::shape::{
        build_shape,
        chunk::{
            dedup_vertices, generate_tri_strips, MeshChunk, MeshVertex, TriStripMesh,
            MAX_VERTS_PER_VIF_PACKET,
        },
        GsPrim, Shape, VifDescriptor,
    };
}
