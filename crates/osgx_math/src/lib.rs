// Re-export glam for convenience
pub use glam::*;

// osgx math helpers
mod euler;
mod transform;
pub use euler::{axis_vector, RotationOrder};
pub use transform::{mat4_from_rows, Mat4Ext};
