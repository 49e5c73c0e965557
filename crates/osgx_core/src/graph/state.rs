//! Render state: state sets and the attributes they carry.

use std::collections::BTreeMap;

use osgx_math::{Vec3, Vec4};

use super::ObjectId;

/// Render bin requested by a state set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderingHint {
    #[default]
    Default,
    Transparent,
}

impl RenderingHint {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderingHint::Default => "DEFAULT_BIN",
            RenderingHint::Transparent => "TRANSPARENT_BIN",
        }
    }
}

/// Modes and attributes bound to one texture unit.
#[derive(Clone, Debug, Default)]
pub struct TextureUnit {
    pub modes: BTreeMap<String, bool>,
    pub attributes: Vec<ObjectId>,
}

/// GL modes plus ordered attributes, global and per texture unit.
#[derive(Clone, Debug, Default)]
pub struct StateSet {
    pub rendering_hint: RenderingHint,
    pub modes: BTreeMap<String, bool>,
    pub attributes: Vec<ObjectId>,
    pub texture_units: BTreeMap<u32, TextureUnit>,
}

impl StateSet {
    pub fn set_mode(&mut self, mode: impl Into<String>, on: bool) {
        self.modes.insert(mode.into(), on);
    }

    /// Bind a texture attribute to `unit` and enable 2D texturing there.
    pub fn add_texture(&mut self, unit: u32, texture: ObjectId) {
        let slot = self.texture_units.entry(unit).or_default();
        slot.modes.insert("GL_TEXTURE_2D".to_string(), true);
        slot.attributes.push(texture);
    }
}

/// Fixed-function surface colours.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub ambient: Vec4,
    pub diffuse: Vec4,
    pub specular: Vec4,
    pub emission: Vec4,
    pub shininess: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: Vec4::new(0.2, 0.2, 0.2, 1.0),
            diffuse: Vec4::new(0.8, 0.8, 0.8, 1.0),
            specular: Vec4::new(0.0, 0.0, 0.0, 1.0),
            emission: Vec4::new(0.0, 0.0, 0.0, 1.0),
            shininess: 0.0,
        }
    }
}

/// Global lighting model.
#[derive(Clone, Debug, PartialEq)]
pub struct LightModel {
    pub ambient_intensity: Vec4,
    pub separate_specular: bool,
    pub local_viewer: bool,
    pub two_sided: bool,
}

impl Default for LightModel {
    fn default() -> Self {
        Self {
            ambient_intensity: Vec4::new(0.1, 0.1, 0.1, 1.0),
            separate_specular: true,
            local_viewer: true,
            two_sided: false,
        }
    }
}

/// Source and destination blend factors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlendFunc {
    pub source: &'static str,
    pub destination: &'static str,
}

impl BlendFunc {
    pub fn alpha() -> Self {
        Self {
            source: "SRC_ALPHA",
            destination: "ONE_MINUS_SRC_ALPHA",
        }
    }
}

/// 2D texture referencing an image file.
#[derive(Clone, Debug, PartialEq)]
pub struct Texture2D {
    pub file: String,
    pub wrap: &'static str,
    pub min_filter: &'static str,
    pub mag_filter: &'static str,
}

impl Texture2D {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            wrap: "REPEAT",
            min_filter: "LINEAR_MIPMAP_LINEAR",
            mag_filter: "LINEAR",
        }
    }
}

/// Fixed-function light parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct Light {
    pub light_num: u32,
    pub ambient: Vec4,
    pub diffuse: Vec4,
    pub specular: Vec4,
    /// w = 0 for directional lights
    pub position: Vec4,
    pub direction: Vec3,
    pub constant_attenuation: f32,
    pub linear_attenuation: f32,
    pub quadratic_attenuation: f32,
    pub spot_exponent: f32,
    pub spot_cutoff: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            light_num: 0,
            ambient: Vec4::new(0.0, 0.0, 0.0, 1.0),
            diffuse: Vec4::new(0.8, 0.8, 0.8, 1.0),
            specular: Vec4::new(1.0, 1.0, 1.0, 1.0),
            position: Vec4::new(0.0, 0.0, 0.0, 1.0),
            direction: Vec3::new(0.0, 0.0, -1.0),
            constant_attenuation: 1.0,
            linear_attenuation: 0.0,
            quadratic_attenuation: 0.0,
            spot_exponent: 0.0,
            spot_cutoff: 180.0,
        }
    }
}
