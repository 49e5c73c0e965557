//! Vertex welding and primitive building.
//!
//! Host meshes store attributes per face corner. The welder flattens the
//! faces of one material slot into loose corners, merges corners whose
//! attributes agree once rounded to the output precision, and rebuilds the
//! faces as index lists grouped by primitive type.

use std::collections::{BTreeMap, HashMap};

use osgx_math::{Vec2, Vec3, Vec4};

use crate::graph::{Geometry, Primitive, PrimitiveMode};
use crate::joblog::ExportLog;
use crate::source::{SourceFace, SourceMesh};

/// One face corner with all of its attributes resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct LooseCorner {
    pub source_vertex: u32,
    pub position: Vec3,
    pub normal: Vec3,
    pub uvs: Vec<Vec2>,
    pub color: Option<Vec4>,
}

/// Attribute values rounded to the output precision. Corners with equal
/// keys are written identically, so they share one output vertex.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct WeldKey {
    position: [i64; 3],
    normal: [i64; 3],
    uvs: Vec<[i64; 2]>,
    color: Option<[i64; 4]>,
}

/// Rounds floats to a fixed number of decimals for key comparison.
#[derive(Clone, Copy, Debug)]
pub struct Quantizer {
    scale: f64,
}

impl Quantizer {
    pub fn new(precision: usize) -> Self {
        Self {
            scale: 10f64.powi(precision as i32),
        }
    }

    /// NaN maps to zero before rounding.
    pub fn quantize(&self, value: f32) -> i64 {
        let value = sanitize(value) as f64;
        (value * self.scale).round() as i64
    }

    fn array<const N: usize>(&self, values: [f32; N]) -> [i64; N] {
        values.map(|v| self.quantize(v))
    }

    pub fn key(&self, corner: &LooseCorner) -> WeldKey {
        WeldKey {
            position: self.array(corner.position.to_array()),
            normal: self.array(corner.normal.to_array()),
            uvs: corner.uvs.iter().map(|uv| self.array(uv.to_array())).collect(),
            color: corner.color.map(|c| self.array(c.to_array())),
        }
    }
}

/// Replace non-finite values with zero.
pub fn sanitize(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn sanitize_vec3(v: Vec3) -> Vec3 {
    Vec3::new(sanitize(v.x), sanitize(v.y), sanitize(v.z))
}

/// Result of welding one material slot.
#[derive(Clone, Debug, Default)]
pub struct WeldedMesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,

    /// One array per requested UV layer, parallel to `positions`
    pub uvs: Vec<Vec<Vec2>>,

    pub colors: Option<Vec<Vec4>>,

    /// Lines, then triangles, then quads; empty kinds are omitted
    pub primitives: Vec<Primitive>,

    /// Output vertices produced from each source vertex
    pub vertex_map: BTreeMap<u32, Vec<u32>>,

    /// Number of loose corners before welding
    pub loose_count: usize,

    /// Faces dropped because their corner count is unsupported
    pub rejected_faces: usize,
}

impl WeldedMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Convert into a geometry, placing UV array `i` on `units[i]`.
    pub fn into_geometry(self, units: &[u32]) -> Geometry {
        let tex_coords = units.iter().copied().zip(self.uvs).collect();
        Geometry {
            vertices: self.positions,
            normals: self.normals,
            colors: self.colors,
            tex_coords,
            primitives: self.primitives,
            state_set: None,
        }
    }
}

/// Welds the faces of one material slot.
pub struct Welder<'m> {
    mesh: &'m SourceMesh,
    uv_layers: Vec<usize>,
    quantizer: Quantizer,
    corner_offsets: Vec<usize>,
}

impl<'m> Welder<'m> {
    /// `uv_layers` selects which host UV layers are carried, in order.
    pub fn new(mesh: &'m SourceMesh, uv_layers: Vec<usize>, precision: usize) -> Self {
        let mut corner_offsets = Vec::with_capacity(mesh.faces.len());
        let mut offset = 0;
        for face in &mesh.faces {
            corner_offsets.push(offset);
            offset += face.vertices.len();
        }
        Self {
            mesh,
            uv_layers,
            quantizer: Quantizer::new(precision),
            corner_offsets,
        }
    }

    /// Material slots used by at least one face, ascending.
    pub fn material_slots(&self) -> Vec<usize> {
        let mut slots: Vec<usize> = self.mesh.faces.iter().map(|f| f.material_index).collect();
        slots.sort_unstable();
        slots.dedup();
        slots
    }

    fn corner(&self, face: &SourceFace, face_index: usize, corner: usize) -> LooseCorner {
        let mesh = self.mesh;
        let source_vertex = face.vertices[corner];
        let loop_index = self.corner_offsets[face_index] + corner;

        let position = mesh
            .positions
            .get(source_vertex as usize)
            .map(|p| Vec3::from_array(*p))
            .unwrap_or(Vec3::ZERO);

        let face_normal = Vec3::from_array(face.normal);
        let normal = if face.smooth {
            mesh.normals
                .get(source_vertex as usize)
                .map(|n| Vec3::from_array(*n))
                .unwrap_or(face_normal)
        } else {
            face_normal
        };

        let uvs = self
            .uv_layers
            .iter()
            .map(|&layer| {
                mesh.uv_layers
                    .get(layer)
                    .and_then(|l| l.uvs.get(loop_index))
                    .map(|uv| Vec2::new(sanitize(uv[0]), sanitize(uv[1])))
                    .unwrap_or(Vec2::ZERO)
            })
            .collect();

        let color = mesh.colors.as_ref().map(|colors| {
            colors
                .get(loop_index)
                .map(|c| Vec4::from_array((*c).map(sanitize)))
                .unwrap_or(Vec4::ONE)
        });

        LooseCorner {
            source_vertex,
            position: sanitize_vec3(position),
            normal: sanitize_vec3(normal),
            uvs,
            color,
        }
    }

    /// Weld every face assigned to `material_index`.
    pub fn weld(&self, material_index: usize, log: &mut ExportLog) -> WeldedMesh {
        let mesh = self.mesh;
        let vertex_total = mesh.positions.len();

        // Loose corners per accepted face, grouped by primitive mode
        let mut faces: Vec<(PrimitiveMode, Vec<LooseCorner>)> = Vec::new();
        let mut rejected = 0;

        for (face_index, face) in mesh.faces.iter().enumerate() {
            if face.material_index != material_index {
                continue;
            }
            let Some(mode) = PrimitiveMode::for_corner_count(face.vertices.len()) else {
                log.warn(format!(
                    "Face {} has {} corners, only 2, 3 or 4 are supported; face skipped",
                    face_index,
                    face.vertices.len()
                ));
                rejected += 1;
                continue;
            };
            if let Some(bad) = face.vertices.iter().find(|&&v| v as usize >= vertex_total) {
                log.warn(format!(
                    "Face {} references vertex {} but the mesh has {} vertices; face skipped",
                    face_index, bad, vertex_total
                ));
                rejected += 1;
                continue;
            }
            let corners = (0..face.vertices.len())
                .map(|c| self.corner(face, face_index, c))
                .collect();
            faces.push((mode, corners));
        }

        let mut welded = WeldedMesh {
            uvs: vec![Vec::new(); self.uv_layers.len()],
            colors: mesh.colors.as_ref().map(|_| Vec::new()),
            rejected_faces: rejected,
            ..Default::default()
        };

        let mut lookup: HashMap<WeldKey, u32> = HashMap::new();
        let mut by_mode: BTreeMap<PrimitiveMode, Primitive> = BTreeMap::new();

        for (mode, corners) in faces {
            let primitive = by_mode.entry(mode).or_insert_with(|| Primitive::new(mode));
            for corner in corners {
                welded.loose_count += 1;
                let key = self.quantizer.key(&corner);
                let index = match lookup.get(&key) {
                    Some(&index) => index,
                    None => {
                        let index = welded.positions.len() as u32;
                        lookup.insert(key, index);
                        welded.push_vertex(&corner);
                        index
                    }
                };
                let mapped = welded.vertex_map.entry(corner.source_vertex).or_default();
                if !mapped.contains(&index) {
                    mapped.push(index);
                }
                primitive.indices.push(index);
            }
        }

        welded.primitives = by_mode.into_values().collect();
        log::debug!(
            "Welded material slot {}: {} corners -> {} vertices",
            material_index,
            welded.loose_count,
            welded.positions.len()
        );
        welded
    }
}

impl WeldedMesh {
    fn push_vertex(&mut self, corner: &LooseCorner) {
        self.positions.push(corner.position);
        self.normals.push(corner.normal);
        for (array, uv) in self.uvs.iter_mut().zip(&corner.uvs) {
            array.push(*uv);
        }
        if let (Some(colors), Some(color)) = (self.colors.as_mut(), corner.color) {
            colors.push(color);
        }
    }
}
