//! Wavefront OBJ model as the conversion input: named meshes of triangle
//! faces with resolved positions, optional vertex colors, normals, UVs and
//! per-face material ids.

pub mod material;

use std::fs;
use std::path::Path;

use glam::{Vec2, Vec3, Vec4};

use crate::error::{ModelError, Result};
use material::MaterialObject;

/// A position with an optional `v`-line vertex color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjVertex {
    pub position: Vec3,
    pub color: Option<Vec4>,
}

/// A triangle with all element references resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjFace {
    pub verts: [ObjVertex; 3],
    pub uvs: [Option<Vec2>; 3],
    pub normals: [Option<Vec3>; 3],
    /// Index into the mtl file's material list.
    pub material_id: Option<usize>,
    /// Index into the render material table, assigned by
    /// [`ModelObject::remap_material_indices`].
    pub render_material_id: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct ModelMesh {
    pub name: String,
    pub faces: Vec<ObjFace>,
}

impl ModelMesh {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            faces: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelObject {
    pub meshes: Vec<ModelMesh>,
    pub material_object: Option<MaterialObject>,
}

/// Unresolved face corner references, kept until the whole file is scanned.
#[derive(Debug, Clone, Copy)]
struct RawCorner {
    position: usize,
    uv: Option<usize>,
    normal: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct RawFace<'a> {
    corners: [RawCorner; 3],
    material_id: Option<usize>,
    line: usize,
    /// The source line, kept for resolution errors.
    raw: &'a str,
}

const DEFAULT_MESH: &str = "_default_";

impl ModelObject {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text, path.parent())
    }

    /// Parses OBJ text. `search_dir` is where `mtllib` references are
    /// resolved; `None` makes any `mtllib` a hard error.
    pub fn parse(text: &str, search_dir: Option<&Path>) -> Result<Self> {
        let mut obj = Self::default();

        let mut positions: Vec<ObjVertex> = Vec::new();
        let mut normals: Vec<Vec3> = Vec::new();
        let mut uvs: Vec<Vec2> = Vec::new();

        let mut mesh_name = DEFAULT_MESH.to_string();
        let mut raw_meshes: Vec<(String, Vec<RawFace<'_>>)> = Vec::new();
        let mut raw_faces: Vec<RawFace<'_>> = Vec::new();
        let mut current_material: Option<usize> = None;

        for (i, raw) in text.lines().enumerate() {
            let line_no = i + 1;
            let mut tokens = raw.split_whitespace();
            let Some(directive) = tokens.next() else {
                continue;
            };

            match directive {
                "o" => {
                    let Some(name) = tokens.next() else {
                        return Err(ModelError::parse("object without a name", line_no, raw));
                    };

                    if mesh_name != DEFAULT_MESH || !raw_faces.is_empty() {
                        raw_meshes.push((mesh_name, std::mem::take(&mut raw_faces)));
                    }
                    mesh_name = name.to_string();
                }
                "mtllib" => {
                    let Some(file) = tokens.next() else {
                        return Err(ModelError::parse("mtllib without a file", line_no, raw));
                    };
                    let Some(dir) = search_dir else {
                        return Err(ModelError::parse(
                            format!("cannot resolve material file '{file}'"),
                            line_no,
                            raw,
                        ));
                    };

                    let mtl_path = dir.join(file);
                    if !mtl_path.is_file() {
                        return Err(ModelError::parse(
                            format!("referenced material file '{file}' does not exist"),
                            line_no,
                            raw,
                        ));
                    }
                    obj.material_object = Some(MaterialObject::load_from_file(&mtl_path)?);
                }
                "usemtl" => {
                    let Some(name) = tokens.next() else {
                        continue;
                    };
                    // blender exports these for unassigned faces
                    if name == "(null)" || name == "None" {
                        continue;
                    }

                    let Some(materials) = obj.material_object.as_ref() else {
                        return Err(ModelError::parse(
                            "usemtl found but no mtl file declared",
                            line_no,
                            raw,
                        ));
                    };
                    let Some(material) = materials.find(name) else {
                        return Err(ModelError::parse(
                            format!("usemtl uses '{name}' but not found in mtl file"),
                            line_no,
                            raw,
                        ));
                    };
                    current_material = Some(material.id);
                }
                "v" => positions.push(parse_vertex(line_no, raw, tokens)?),
                "vn" => normals.push(parse_vec3(line_no, raw, tokens)?),
                "vt" => uvs.push(parse_uv(line_no, raw, tokens)?),
                "f" => {
                    let corners: Vec<RawCorner> = tokens
                        .map(|t| parse_corner(t, line_no, raw))
                        .collect::<Result<_>>()?;

                    match corners.len() {
                        3 => {}
                        0..=2 => return Err(ModelError::parse("invalid face", line_no, raw)),
                        _ => {
                            return Err(ModelError::parse(
                                "quads are not supported",
                                line_no,
                                raw,
                            ))
                        }
                    }

                    let corners = [corners[0], corners[1], corners[2]];

                    // silently drop faces collapsed to a line or point
                    if corners[0].position == corners[1].position
                        || corners[1].position == corners[2].position
                        || corners[0].position == corners[2].position
                    {
                        continue;
                    }

                    raw_faces.push(RawFace {
                        corners,
                        material_id: current_material,
                        line: line_no,
                        raw,
                    });
                }
                _ => {}
            }
        }
        raw_meshes.push((mesh_name, raw_faces));

        // resolve element references now that every v/vt/vn is known
        for (name, faces) in raw_meshes {
            let mut mesh = ModelMesh::new(name);

            for face in faces {
                mesh.faces
                    .push(resolve_face(&face, &positions, &uvs, &normals)?);
            }

            obj.meshes.push(mesh);
        }

        Ok(obj)
    }

    /// Assigns the render material index to every face carrying the given
    /// source material id.
    pub fn remap_material_indices(&mut self, mtl_index: usize, render_index: usize) {
        for mesh in &mut self.meshes {
            for face in &mut mesh.faces {
                if face.material_id == Some(mtl_index) {
                    face.render_material_id = Some(render_index);
                }
            }
        }
    }

    pub fn face_count(&self) -> usize {
        self.meshes.iter().map(|m| m.faces.len()).sum()
    }
}

fn resolve_face(
    face: &RawFace<'_>,
    positions: &[ObjVertex],
    uvs: &[Vec2],
    normals: &[Vec3],
) -> Result<ObjFace> {
    let raw = face.raw;
    let mut verts = [ObjVertex {
        position: Vec3::ZERO,
        color: None,
    }; 3];
    let mut face_uvs = [None; 3];
    let mut face_normals = [None; 3];

    for (i, corner) in face.corners.iter().enumerate() {
        verts[i] = *positions.get(corner.position).ok_or_else(|| {
            ModelError::parse("face references missing vertex", face.line, raw)
        })?;

        if let Some(uv) = corner.uv {
            face_uvs[i] = Some(*uvs.get(uv).ok_or_else(|| {
                ModelError::parse("face references missing texture coordinate", face.line, raw)
            })?);
        }
        if let Some(n) = corner.normal {
            face_normals[i] = Some(*normals.get(n).ok_or_else(|| {
                ModelError::parse("face references missing normal", face.line, raw)
            })?);
        }
    }

    Ok(ObjFace {
        verts,
        uvs: face_uvs,
        normals: face_normals,
        material_id: face.material_id,
        render_material_id: None,
    })
}

/// `v x y z [r g b]`
fn parse_vertex<'a>(
    line_no: usize,
    raw: &str,
    tokens: impl Iterator<Item = &'a str>,
) -> Result<ObjVertex> {
    let mut values = [0.0f32; 6];
    let mut cnt = 0;

    for token in tokens {
        if cnt >= values.len() {
            return Err(ModelError::parse("too many vertex values", line_no, raw));
        }
        values[cnt] = token
            .parse()
            .map_err(|_| ModelError::parse("failed to parse obj vertex", line_no, raw))?;
        cnt += 1;
    }

    if cnt < 3 {
        return Err(ModelError::parse("too few vertex values", line_no, raw));
    }

    Ok(ObjVertex {
        position: Vec3::from_slice(&values[..3]),
        color: (cnt >= 6).then(|| Vec4::new(values[3], values[4], values[5], 1.0)),
    })
}

fn parse_vec3<'a>(
    line_no: usize,
    raw: &str,
    tokens: impl Iterator<Item = &'a str>,
) -> Result<Vec3> {
    let mut values = [0.0f32; 3];
    let mut cnt = 0;

    for token in tokens {
        if cnt >= 3 {
            return Err(ModelError::parse("too many normal values", line_no, raw));
        }
        values[cnt] = token
            .parse()
            .map_err(|_| ModelError::parse("failed to parse obj normal", line_no, raw))?;
        cnt += 1;
    }

    Ok(Vec3::from_array(values))
}

/// `vt u v [w]`, the third component ignored.
fn parse_uv<'a>(line_no: usize, raw: &str, tokens: impl Iterator<Item = &'a str>) -> Result<Vec2> {
    let mut values = [0.0f32; 2];
    let mut cnt = 0;

    for token in tokens {
        if cnt >= 3 {
            return Err(ModelError::parse("too many vt values", line_no, raw));
        }
        let value: f32 = token
            .parse()
            .map_err(|_| ModelError::parse("failed to parse obj vt", line_no, raw))?;
        if cnt < 2 {
            values[cnt] = value;
        }
        cnt += 1;
    }

    Ok(Vec2::from_array(values))
}

/// `pos`, `pos/uv`, `pos//normal` or `pos/uv/normal`, one-based.
fn parse_corner(token: &str, line_no: usize, raw: &str) -> Result<RawCorner> {
    let mut parts = token.split('/');

    let position = parse_element(parts.next().unwrap_or(""), line_no, raw)?
        .ok_or_else(|| ModelError::parse("face corner without a vertex", line_no, raw))?;
    let uv = match parts.next() {
        Some(p) => parse_element(p, line_no, raw)?,
        None => None,
    };
    let normal = match parts.next() {
        Some(p) => parse_element(p, line_no, raw)?,
        None => None,
    };

    Ok(RawCorner {
        position,
        uv,
        normal,
    })
}

fn parse_element(part: &str, line_no: usize, raw: &str) -> Result<Option<usize>> {
    if part.is_empty() {
        return Ok(None);
    }

    let value: isize = part
        .parse()
        .map_err(|_| ModelError::parse("failed to parse face element", line_no, raw))?;
    if value < 1 {
        return Err(ModelError::parse(
            "face element references must be positive",
            line_no,
            raw,
        ));
    }

    Ok(Some(value as usize - 1))
}
