//! Material and texture conversion.
//!
//! Each source material becomes one `StateSet` and each image one
//! `Texture2D`; the registry hands out the same objects for every later
//! request within the job.

use std::collections::HashMap;
use std::path::Path;

use osgx_math::Vec4;

use crate::config::ExportConfig;
use crate::graph::{BlendFunc, DataVariance, Material, ObjectData, ObjectId, RenderingHint, SceneGraph, StateSet, Texture2D};
use crate::joblog::ExportLog;
use crate::source::{SourceImage, SourceMaterial, SourceMesh, SourceScene};
use crate::weld::sanitize;

/// Largest fixed-function specular exponent.
pub const MAX_SHININESS: f32 = 128.0;

/// Fixed-function colours of a source material.
pub fn convert_material(src: &SourceMaterial) -> Material {
    let alpha = if src.use_transparency {
        sanitize(src.alpha).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let diffuse = src.diffuse_color.map(|c| sanitize(c * src.diffuse_intensity));
    let specular = src.specular_color.map(|c| sanitize(c * src.specular_intensity));
    let scaled = |factor: f32| diffuse.map(|c| sanitize(c * factor));

    let rgba = |rgb: [f32; 3]| Vec4::new(rgb[0], rgb[1], rgb[2], alpha);
    Material {
        ambient: rgba(scaled(src.ambient)),
        diffuse: rgba(diffuse),
        specular: rgba(specular),
        emission: rgba(scaled(src.emit)),
        shininess: sanitize(src.shininess).clamp(0.0, MAX_SHININESS),
    }
}

/// UV layers to weld and the texture unit each one lands on.
///
/// With enabled texture slots, slot `i` uses unit `i` and reads the layer
/// it names (the first layer otherwise). Without textures every layer is
/// kept on the unit matching its index.
pub fn uv_units(material: Option<&SourceMaterial>, mesh: &SourceMesh) -> (Vec<usize>, Vec<u32>) {
    if mesh.uv_layers.is_empty() {
        return (Vec::new(), Vec::new());
    }
    let slots: Vec<_> = material
        .map(|m| m.texture_slots.iter().filter(|s| s.enabled).collect())
        .unwrap_or_default();

    if slots.is_empty() {
        let layers: Vec<usize> = (0..mesh.uv_layers.len()).collect();
        let units = layers.iter().map(|&l| l as u32).collect();
        return (layers, units);
    }

    slots
        .iter()
        .enumerate()
        .map(|(unit, slot)| {
            let layer = slot
                .uv_layer
                .as_deref()
                .and_then(|name| mesh.uv_layers.iter().position(|l| l.name == name))
                .unwrap_or(0);
            (layer, unit as u32)
        })
        .unzip()
}

/// Converts materials and images at most once per job.
#[derive(Debug)]
pub struct MaterialRegistry {
    texture_prefix: String,
    relative_paths: bool,
    states: HashMap<String, Option<ObjectId>>,
    textures: HashMap<String, Option<ObjectId>>,
}

impl MaterialRegistry {
    pub fn new(config: &ExportConfig) -> Self {
        Self {
            texture_prefix: config.texture_prefix.clone(),
            relative_paths: config.relative_texture_path,
            states: HashMap::new(),
            textures: HashMap::new(),
        }
    }

    /// Number of distinct state sets built.
    pub fn state_set_count(&self) -> usize {
        self.states.values().flatten().count()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.values().flatten().count()
    }

    /// State set for a named material. Unknown materials are logged once
    /// and yield `None`.
    pub fn state_set(
        &mut self,
        graph: &mut SceneGraph,
        scene: &SourceScene,
        name: &str,
        log: &mut ExportLog,
    ) -> Option<ObjectId> {
        if let Some(cached) = self.states.get(name) {
            return *cached;
        }

        let id = match scene.material(name) {
            Some(material) => Some(self.build_state_set(graph, scene, material, log)),
            None => {
                log.warn(format!("Material '{}' not found; geometry exported without it", name));
                None
            }
        };
        self.states.insert(name.to_string(), id);
        id
    }

    fn build_state_set(
        &mut self,
        graph: &mut SceneGraph,
        scene: &SourceScene,
        src: &SourceMaterial,
        log: &mut ExportLog,
    ) -> ObjectId {
        let mut state = StateSet::default();

        let material = graph.add(&src.name, DataVariance::Static, ObjectData::Material(convert_material(src)));
        state.attributes.push(material);

        if src.use_transparency {
            let blend = graph.add("", DataVariance::Static, ObjectData::BlendFunc(BlendFunc::alpha()));
            state.attributes.push(blend);
            state.set_mode("GL_BLEND", true);
            state.rendering_hint = RenderingHint::Transparent;
        }

        for (unit, slot) in src.texture_slots.iter().filter(|s| s.enabled).enumerate() {
            if let Some(texture) = self.texture(graph, scene, &slot.image, log) {
                state.add_texture(unit as u32, texture);
            }
        }

        graph.add(&src.name, DataVariance::Static, ObjectData::StateSet(state))
    }

    /// Texture for a named image. Images without a file or packed data are
    /// logged and yield `None`.
    pub fn texture(
        &mut self,
        graph: &mut SceneGraph,
        scene: &SourceScene,
        image: &str,
        log: &mut ExportLog,
    ) -> Option<ObjectId> {
        if let Some(cached) = self.textures.get(image) {
            return *cached;
        }

        let id = match scene.image(image).and_then(|src| self.texture_path(src)) {
            Some(path) => {
                log::debug!("Texture '{}' -> {}", image, path);
                Some(graph.add(image, DataVariance::Static, ObjectData::Texture2D(Texture2D::new(path))))
            }
            None => {
                log.warn(format!("Image '{}' has no file or packed data; texture omitted", image));
                None
            }
        };
        self.textures.insert(image.to_string(), id);
        id
    }

    /// Path written for an image.
    pub fn texture_path(&self, image: &SourceImage) -> Option<String> {
        let file = image.filepath.as_deref().filter(|p| !p.is_empty());
        if file.is_none() && !image.packed {
            return None;
        }

        let relative = || {
            let name = file
                .and_then(|p| Path::new(p).file_name())
                .and_then(|n| n.to_str())
                .unwrap_or(image.name.as_str());
            format!("{}{}", self.texture_prefix, name)
        };

        match file {
            Some(path) if !self.relative_paths => Some(path.to_string()),
            _ => Some(relative()),
        }
    }
}
