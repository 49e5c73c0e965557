//! Drawables: indexed geometry and skinned geometry.

use std::collections::BTreeMap;

use osgx_math::{Vec2, Vec3, Vec4};

use super::ObjectId;

/// Primitive type of a primitive set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrimitiveMode {
    Lines,
    Triangles,
    Quads,
}

impl PrimitiveMode {
    /// Mode for a face with `corners` corners, if supported.
    pub fn for_corner_count(corners: usize) -> Option<Self> {
        match corners {
            2 => Some(PrimitiveMode::Lines),
            3 => Some(PrimitiveMode::Triangles),
            4 => Some(PrimitiveMode::Quads),
            _ => None,
        }
    }

    pub fn corners(self) -> usize {
        match self {
            PrimitiveMode::Lines => 2,
            PrimitiveMode::Triangles => 3,
            PrimitiveMode::Quads => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PrimitiveMode::Lines => "LINES",
            PrimitiveMode::Triangles => "TRIANGLES",
            PrimitiveMode::Quads => "QUADS",
        }
    }
}

/// Storage width of an index list, derived from its largest value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexWidth {
    UByte,
    UShort,
    UInt,
}

impl IndexWidth {
    pub fn for_max_index(max: u32) -> Self {
        if max <= u8::MAX as u32 {
            IndexWidth::UByte
        } else if max <= u16::MAX as u32 {
            IndexWidth::UShort
        } else {
            IndexWidth::UInt
        }
    }

    pub fn draw_elements_tag(self) -> &'static str {
        match self {
            IndexWidth::UByte => "DrawElementsUByte",
            IndexWidth::UShort => "DrawElementsUShort",
            IndexWidth::UInt => "DrawElementsUInt",
        }
    }
}

/// Index list drawn with one primitive mode.
#[derive(Clone, Debug, PartialEq)]
pub struct Primitive {
    pub mode: PrimitiveMode,
    pub indices: Vec<u32>,
}

impl Primitive {
    pub fn new(mode: PrimitiveMode) -> Self {
        Self {
            mode,
            indices: Vec::new(),
        }
    }

    pub fn index_width(&self) -> IndexWidth {
        IndexWidth::for_max_index(self.indices.iter().copied().max().unwrap_or(0))
    }
}

/// Indexed geometry with parallel per-vertex arrays.
#[derive(Clone, Debug, Default)]
pub struct Geometry {
    pub vertices: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub colors: Option<Vec<Vec4>>,

    /// Texture coordinates by texture unit
    pub tex_coords: BTreeMap<u32, Vec<Vec2>>,

    pub primitives: Vec<Primitive>,
    pub state_set: Option<ObjectId>,
}

impl Geometry {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Check that every primitive index addresses an existing vertex.
    pub fn indices_valid(&self) -> bool {
        let count = self.vertices.len() as u32;
        self.primitives
            .iter()
            .all(|p| p.indices.iter().all(|&i| i < count))
    }
}

/// Vertices influenced by one bone, with their weights.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VertexInfluence {
    pub name: String,
    pub weights: Vec<(u32, f32)>,
}

/// A geometry deformed by a skeleton. The source geometry is kept as is;
/// the influence map names the bones that deform it.
#[derive(Clone, Debug)]
pub struct RigGeometry {
    pub source: ObjectId,
    pub influences: Vec<VertexInfluence>,
    pub state_set: Option<ObjectId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_width_from_max() {
        assert_eq!(IndexWidth::for_max_index(0), IndexWidth::UByte);
        assert_eq!(IndexWidth::for_max_index(255), IndexWidth::UByte);
        assert_eq!(IndexWidth::for_max_index(256), IndexWidth::UShort);
        assert_eq!(IndexWidth::for_max_index(65_535), IndexWidth::UShort);
        assert_eq!(IndexWidth::for_max_index(65_536), IndexWidth::UInt);
    }

    #[test]
    fn test_primitive_width_tracks_contents() {
        let mut prim = Primitive::new(PrimitiveMode::Triangles);
        prim.indices = vec![0, 1, 300];
        assert_eq!(prim.index_width(), IndexWidth::UShort);
        assert_eq!(prim.index_width().draw_elements_tag(), "DrawElementsUShort");
    }

    #[test]
    fn test_mode_for_corner_count() {
        assert_eq!(PrimitiveMode::for_corner_count(2), Some(PrimitiveMode::Lines));
        assert_eq!(PrimitiveMode::for_corner_count(4), Some(PrimitiveMode::Quads));
        assert_eq!(PrimitiveMode::for_corner_count(5), None);
        assert_eq!(PrimitiveMode::for_corner_count(1), None);
    }

    #[test]
    fn test_indices_valid() {
        let mut geom = Geometry {
            vertices: vec![Vec3::ZERO; 3],
            ..Default::default()
        };
        geom.primitives.push(Primitive {
            mode: PrimitiveMode::Triangles,
            indices: vec![0, 1, 2],
        });
        assert!(geom.indices_valid());
        geom.primitives[0].indices[2] = 3;
        assert!(!geom.indices_valid());
    }
}
