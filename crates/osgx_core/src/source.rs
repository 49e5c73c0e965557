//! Host scene records.
//!
//! These types describe the facts the authoring application hands to the
//! exporter, before any conversion to scene-graph objects. They mirror the
//! host's own data model: row-major matrices, per-face corner ("loop")
//! attributes, curves addressed by data path.

use osgx_math::{mat4_from_rows, Mat4, RotationOrder};
use serde::Deserialize;

/// Row-major 4x4 matrix as written by the host.
pub type RowMatrix = [[f32; 4]; 4];

fn identity_rows() -> RowMatrix {
    [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]
}

fn default_frame_start() -> i32 {
    1
}

fn one() -> f32 {
    1.0
}

fn white() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

/// The whole scene handed over by the host for one export.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SourceScene {
    #[serde(default)]
    pub name: String,

    #[serde(default = "default_frame_start")]
    pub frame_start: i32,

    /// Objects in host order; parents may appear after children.
    #[serde(default)]
    pub objects: Vec<SourceObject>,

    #[serde(default)]
    pub materials: Vec<SourceMaterial>,

    #[serde(default)]
    pub images: Vec<SourceImage>,

    #[serde(default)]
    pub actions: Vec<SourceAction>,
}

impl SourceScene {
    /// Parse a scene description from JSON text.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn object(&self, name: &str) -> Option<&SourceObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    pub fn material(&self, name: &str) -> Option<&SourceMaterial> {
        self.materials.iter().find(|m| m.name == name)
    }

    pub fn image(&self, name: &str) -> Option<&SourceImage> {
        self.images.iter().find(|i| i.name == name)
    }

    pub fn action(&self, name: &str) -> Option<&SourceAction> {
        self.actions.iter().find(|a| a.name == name)
    }
}

/// Object type discriminator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectType {
    Mesh,
    Armature,
    Light,
    Camera,
    #[default]
    Empty,
}

/// How an object's rotation is stored and animated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RotationMode {
    Quaternion,
    AxisAngle,
    #[serde(untagged)]
    Euler(RotationOrder),
}

impl Default for RotationMode {
    fn default() -> Self {
        RotationMode::Euler(RotationOrder::XYZ)
    }
}

/// A single scene object.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SourceObject {
    pub name: String,

    #[serde(rename = "type", default)]
    pub kind: ObjectType,

    /// Name of the parent object
    #[serde(default)]
    pub parent: Option<String>,

    /// Bone of the parent armature this object hangs from
    #[serde(default)]
    pub parent_bone: Option<String>,

    #[serde(default = "identity_rows")]
    pub matrix_world: RowMatrix,

    #[serde(default = "identity_rows")]
    pub matrix_local: RowMatrix,

    #[serde(default)]
    pub selected: bool,

    #[serde(default)]
    pub rotation_mode: RotationMode,

    /// Mesh data as stored
    #[serde(default)]
    pub mesh: Option<SourceMesh>,

    /// Mesh data with the modifier stack applied, when the host evaluated it
    #[serde(default)]
    pub evaluated_mesh: Option<SourceMesh>,

    /// Armature object this mesh is deformed by
    #[serde(default)]
    pub armature_modifier: Option<String>,

    #[serde(default)]
    pub armature: Option<SourceArmature>,

    #[serde(default)]
    pub light: Option<SourceLight>,

    /// Action driving this object (or its pose bones)
    #[serde(default)]
    pub action: Option<String>,

    /// Whether constraints affect this object's transform
    #[serde(default)]
    pub has_constraints: bool,

    /// Host-evaluated local matrices per frame, used for constraint baking
    #[serde(default)]
    pub baked: Vec<BakedSample>,
}

impl SourceObject {
    pub fn world_matrix(&self) -> Mat4 {
        mat4_from_rows(&self.matrix_world)
    }

    pub fn local_matrix(&self) -> Mat4 {
        mat4_from_rows(&self.matrix_local)
    }

    /// Mesh to export, honoring the apply-modifiers preference.
    pub fn export_mesh(&self, apply_modifiers: bool) -> Option<&SourceMesh> {
        if apply_modifiers {
            self.evaluated_mesh.as_ref().or(self.mesh.as_ref())
        } else {
            self.mesh.as_ref()
        }
    }
}

/// One host-evaluated sample of an object's local transform.
#[derive(Clone, Debug, Deserialize)]
pub struct BakedSample {
    pub frame: f32,
    pub matrix: RowMatrix,
}

/// Polygon mesh with per-corner attributes.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SourceMesh {
    pub positions: Vec<[f32; 3]>,

    /// Smooth vertex normals (one per position)
    #[serde(default)]
    pub normals: Vec<[f32; 3]>,

    pub faces: Vec<SourceFace>,

    /// UV layers; each holds one UV per face corner, in face order
    #[serde(default)]
    pub uv_layers: Vec<SourceUvLayer>,

    /// Vertex colours, one RGBA per face corner, in face order
    #[serde(default)]
    pub colors: Option<Vec<[f32; 4]>>,

    /// Material names per slot; `None` leaves the slot empty
    #[serde(default)]
    pub materials: Vec<Option<String>>,

    #[serde(default)]
    pub vertex_groups: Vec<SourceVertexGroup>,
}

/// One polygon.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SourceFace {
    /// Indices into `SourceMesh::positions`
    pub vertices: Vec<u32>,

    /// Face normal, used when the face is flat shaded
    #[serde(default)]
    pub normal: [f32; 3],

    #[serde(default)]
    pub smooth: bool,

    #[serde(default)]
    pub material_index: usize,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SourceUvLayer {
    pub name: String,
    pub uvs: Vec<[f32; 2]>,
}

/// Named vertex group with (vertex index, weight) pairs.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SourceVertexGroup {
    pub name: String,
    pub weights: Vec<(u32, f32)>,
}

/// Fixed-function material parameters.
#[derive(Clone, Debug, Deserialize)]
pub struct SourceMaterial {
    pub name: String,

    #[serde(default = "white")]
    pub diffuse_color: [f32; 3],

    #[serde(default = "one")]
    pub diffuse_intensity: f32,

    #[serde(default = "white")]
    pub specular_color: [f32; 3],

    #[serde(default)]
    pub specular_intensity: f32,

    /// Ambient factor applied to the diffuse colour
    #[serde(default)]
    pub ambient: f32,

    /// Emission factor applied to the diffuse colour
    #[serde(default)]
    pub emit: f32,

    /// Specular exponent in [0, 128]
    #[serde(default)]
    pub shininess: f32,

    #[serde(default)]
    pub use_transparency: bool,

    #[serde(default = "one")]
    pub alpha: f32,

    #[serde(default)]
    pub texture_slots: Vec<SourceTextureSlot>,
}

impl Default for SourceMaterial {
    fn default() -> Self {
        Self {
            name: String::new(),
            diffuse_color: white(),
            diffuse_intensity: 1.0,
            specular_color: white(),
            specular_intensity: 0.0,
            ambient: 0.0,
            emit: 0.0,
            shininess: 0.0,
            use_transparency: false,
            alpha: 1.0,
            texture_slots: Vec::new(),
        }
    }
}

/// A texture bound to a material slot.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SourceTextureSlot {
    /// Name of the image in `SourceScene::images`
    pub image: String,

    /// UV layer used for lookup; `None` means the mesh's first layer
    #[serde(default)]
    pub uv_layer: Option<String>,

    /// Disabled slots are ignored
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Image backing a texture.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SourceImage {
    pub name: String,

    /// Absolute path of the image file on the host
    #[serde(default)]
    pub filepath: Option<String>,

    /// Image pixels are packed into the host document
    #[serde(default)]
    pub packed: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LightType {
    #[default]
    Point,
    Sun,
    Spot,
    Area,
    Hemi,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FalloffType {
    Constant,
    InverseLinear,
    #[default]
    InverseSquare,
    LinearQuadraticWeighted,
}

/// Lamp parameters.
#[derive(Clone, Debug, Deserialize)]
pub struct SourceLight {
    #[serde(rename = "type", default)]
    pub kind: LightType,

    #[serde(default = "white")]
    pub color: [f32; 3],

    #[serde(default = "one")]
    pub energy: f32,

    #[serde(default = "default_distance")]
    pub distance: f32,

    #[serde(default)]
    pub falloff_type: FalloffType,

    #[serde(default)]
    pub linear_attenuation: f32,

    #[serde(default)]
    pub quadratic_attenuation: f32,

    /// Full cone angle in radians
    #[serde(default = "default_spot_size")]
    pub spot_size: f32,

    /// Edge softness in [0, 1]
    #[serde(default)]
    pub spot_blend: f32,

    #[serde(default = "default_true")]
    pub use_diffuse: bool,

    #[serde(default = "default_true")]
    pub use_specular: bool,
}

fn default_distance() -> f32 {
    25.0
}

fn default_spot_size() -> f32 {
    std::f32::consts::FRAC_PI_4
}

impl Default for SourceLight {
    fn default() -> Self {
        Self {
            kind: LightType::Point,
            color: white(),
            energy: 1.0,
            distance: default_distance(),
            falloff_type: FalloffType::InverseSquare,
            linear_attenuation: 0.0,
            quadratic_attenuation: 0.0,
            spot_size: default_spot_size(),
            spot_blend: 0.0,
            use_diffuse: true,
            use_specular: true,
        }
    }
}

/// Bone hierarchy of an armature object.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SourceArmature {
    pub bones: Vec<SourceBone>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SourceBone {
    pub name: String,

    #[serde(default)]
    pub parent: Option<String>,

    /// Rest matrix in armature space
    #[serde(default = "identity_rows")]
    pub matrix_local: RowMatrix,

    /// Rotation mode of the matching pose bone
    #[serde(default = "quaternion_mode")]
    pub rotation_mode: RotationMode,
}

fn quaternion_mode() -> RotationMode {
    RotationMode::Quaternion
}

impl SourceBone {
    pub fn bind_matrix(&self) -> Mat4 {
        mat4_from_rows(&self.matrix_local)
    }
}

/// Keyframe interpolation towards the next key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Interpolation {
    Constant,
    #[default]
    Linear,
    Bezier,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SourceKeyframe {
    pub frame: f32,
    pub value: f32,

    #[serde(default)]
    pub interpolation: Interpolation,

    /// Left Bézier handle as (frame, value)
    #[serde(default)]
    pub handle_left: Option<[f32; 2]>,

    /// Right Bézier handle as (frame, value)
    #[serde(default)]
    pub handle_right: Option<[f32; 2]>,
}

/// One animated scalar, addressed by data path and component index.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SourceCurve {
    pub data_path: String,

    #[serde(default)]
    pub array_index: usize,

    pub keyframes: Vec<SourceKeyframe>,
}

/// A named set of curves.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SourceAction {
    pub name: String,
    pub curves: Vec<SourceCurve>,
}

impl SourceAction {
    /// Frame span covered by the keyframes, if any.
    pub fn frame_range(&self) -> Option<(f32, f32)> {
        let mut frames = self
            .curves
            .iter()
            .flat_map(|c| c.keyframes.iter().map(|k| k.frame))
            .filter(|f| f.is_finite());
        let first = frames.next()?;
        Some(frames.fold((first, first), |(lo, hi), f| (lo.min(f), hi.max(f))))
    }
}
