//! Batch OBJ converter: tri-strips every mesh of every input model and
//! reports the chunk layout. A failing file is logged and skipped.

use std::path::Path;
use std::process::ExitCode;

use gtmodel::prelude::*;
use ini::Ini;

#[derive(Default)]
struct ToolConfig {
    /// Meshes whose texture is resolved at render time instead of from the
    /// model's texture table.
    external_meshes: Vec<String>,
}

impl ToolConfig {
    fn from_ini(ini: &Ini) -> Self {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("external_textures")) {
            for mesh in section.get_all("mesh") {
                config.external_meshes.push(mesh.to_string());
            }
        }

        config
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("usage: gtmodel-tool [conf.ini] <model.obj>...");
        return ExitCode::FAILURE;
    }

    let mut config = ToolConfig::default();
    let mut failures = 0usize;

    for arg in &args {
        let path = Path::new(arg);

        if path.extension().is_some_and(|e| e == "ini") {
            match Ini::load_from_file(path) {
                Ok(ini) => config = ToolConfig::from_ini(&ini),
                Err(e) => {
                    log::error!("{}: {e}", path.display());
                    failures += 1;
                }
            }
            continue;
        }

        match convert(path, &config) {
            Ok(()) => log::info!("{}: done", path.display()),
            Err(e) => {
                log::error!("{}: {e}", path.display());
                failures += 1;
            }
        }
    }

    if failures > 0 {
        log::warn!("{failures} input(s) failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn convert(path: &Path, config: &ToolConfig) -> Result<()> {
    let mut model = ModelObject::load_from_file(path)?;

    let materials: Vec<Material> = model
        .material_object
        .as_ref()
        .map(|m| m.materials.clone())
        .unwrap_or_default();

    // the render material table keeps the mtl declaration order
    for (render_index, material) in materials.iter().enumerate() {
        model.remap_material_indices(material.id, render_index);
    }

    let mut textures: Vec<String> = Vec::new();
    for material in &materials {
        if let Some(map) = &material.map_diffuse {
            if !textures.iter().any(|t| t == map) {
                textures.push(map.clone());
            }
        }
    }

    for mesh in &model.meshes {
        let external = config.external_meshes.iter().any(|n| n == &mesh.name);
        let shape = build_shape(mesh, &textures, &materials, external)?;

        println!(
            "{}: {} chunks, {} triangles, {} strip points",
            mesh.name,
            shape.mesh.chunks.len(),
            shape.num_triangles,
            shape.total_strip_verts
        );
    }

    Ok(())
}
