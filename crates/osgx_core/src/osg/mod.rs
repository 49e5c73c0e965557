//! Text serialization of the scene graph.
//!
//! The writer walks the graph from the root, writing every shareable
//! object in full the first time it is met and as a `Use <id>` directive
//! afterwards. Formatting state (indent widths, float precision, the set of
//! already written ids) lives in a [`WriteContext`] built per export job.

mod format;
mod writer;

pub use format::*;
pub use writer::*;
