//! MTL material library model and parser.

use std::fs;
use std::path::Path;

use glam::{vec4, Vec4};

use crate::error::{ModelError, Result};

/// One `newmtl` entry. Colors are RGBA, alpha defaulting to zero when the
/// file gives only three components.
#[derive(Debug, Clone, Default)]
pub struct Material {
    pub id: usize,
    pub name: String,
    pub ambient: Vec4,
    pub diffuse: Vec4,
    pub specular: Vec4,
    pub emissive: Vec4,
    pub map_ambient: Option<String>,
    pub map_diffuse: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MaterialObject {
    pub materials: Vec<Material>,
}

impl MaterialObject {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut obj = Self::default();

        for (i, raw) in text.lines().enumerate() {
            let line_no = i + 1;
            let line = raw.trim_start();

            let mut tokens = line.split_whitespace();
            let Some(directive) = tokens.next() else {
                continue;
            };

            match directive {
                "newmtl" => {
                    let Some(name) = tokens.next() else {
                        return Err(ModelError::parse("newmtl without a name", line_no, raw));
                    };
                    let id = obj.materials.len();
                    obj.materials.push(Material {
                        id,
                        name: name.to_string(),
                        ..Material::default()
                    });
                }
                "Ka" => {
                    current_material(&mut obj, "Ka", line_no, raw)?.ambient =
                        parse_color(line_no, raw, tokens)?
                }
                "Kd" => {
                    current_material(&mut obj, "Kd", line_no, raw)?.diffuse =
                        parse_color(line_no, raw, tokens)?
                }
                "Ks" => {
                    current_material(&mut obj, "Ks", line_no, raw)?.specular =
                        parse_color(line_no, raw, tokens)?
                }
                "Ke" => {
                    current_material(&mut obj, "Ke", line_no, raw)?.emissive =
                        parse_color(line_no, raw, tokens)?
                }
                "map_Ka" => {
                    let map = tokens.next().map(str::to_string);
                    current_material(&mut obj, "map_Ka", line_no, raw)?.map_ambient = map;
                }
                "map_Kd" => {
                    let map = tokens.next().map(str::to_string);
                    current_material(&mut obj, "map_Kd", line_no, raw)?.map_diffuse = map;
                }
                _ => {}
            }
        }

        Ok(obj)
    }

    pub fn find(&self, name: &str) -> Option<&Material> {
        self.materials.iter().find(|m| m.name == name)
    }
}

fn current_material<'a>(
    obj: &'a mut MaterialObject,
    directive: &str,
    line_no: usize,
    raw: &str,
) -> Result<&'a mut Material> {
    obj.materials.last_mut().ok_or_else(|| {
        ModelError::parse(
            format!("'{directive}' found but no material declared"),
            line_no,
            raw,
        )
    })
}

fn parse_color<'a>(
    line_no: usize,
    raw: &str,
    tokens: impl Iterator<Item = &'a str>,
) -> Result<Vec4> {
    let mut color = vec4(0.0, 0.0, 0.0, 0.0);

    for (cnt, token) in tokens.enumerate() {
        let value: f32 = token
            .parse()
            .map_err(|_| ModelError::parse("failed to parse color value", line_no, raw))?;

        match cnt {
            0 => color.x = value,
            1 => color.y = value,
            2 => color.z = value,
            3 => color.w = value,
            _ => return Err(ModelError::parse("too many color values", line_no, raw)),
        }
    }

    Ok(color)
}

#[cfg(test)]
mod mtl_tests {
    use super::*;

    #[test]
    fn parses_materials_in_order() {
        let mtl = "newmtl body\nKd 0.8 0.1 0.1\nmap_Kd body.png\n\nnewmtl glass\nKd 0.2 0.2 0.9 0.5\n";
        let obj = MaterialObject::parse(mtl).unwrap();

        assert_eq!(obj.materials.len(), 2);
        assert_eq!(obj.materials[0].id, 0);
        assert_eq!(obj.materials[0].name, "body");
        assert_eq!(obj.materials[0].map_diffuse.as_deref(), Some("body.png"));
        assert_eq!(obj.materials[1].diffuse.w, 0.5);
        assert_eq!(obj.find("glass").unwrap().id, 1);
    }

    #[test]
    fn color_before_newmtl_is_an_error() {
        let err = MaterialObject::parse("Kd 1 0 0\n").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
