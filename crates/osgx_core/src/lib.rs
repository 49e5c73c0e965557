//! OSGX Core - scene-graph conversion and dotosg text export.
//!
//! This crate provides:
//!
//! - **Host records**: `SourceScene` and friends, deserialized from JSON
//! - **Scene graph**: an arena of OSG objects addressed by `ObjectId`
//! - **Conversion**: vertex welding, skeleton/rig assembly, material, light
//!   and animation channel extraction
//! - **Serialization**: the dotosg ASCII writer with `Use` back-references
//!
//! # Example
//!
//! ```ignore
//! use osgx_core::{read_scene, ExportConfig, Exporter};
//!
//! let scene = read_scene("scene.json")?;
//! let export = Exporter::new(&scene, ExportConfig::default())?.build()?;
//! export.write_to("scene.osg")?;
//! println!("{} warnings", export.finish().warning_count());
//! ```

pub mod animation;
pub mod config;
pub mod export;
pub mod graph;
pub mod joblog;
pub mod light;
pub mod material;
pub mod osg;
pub mod rig;
pub mod source;
pub mod weld;

// Re-export commonly used types
pub use config::{ConfigError, ExportConfig};
pub use export::{
    export_scene, read_scene, Export, ExportError, ExportReport, ExportResult, ExportStats, Exporter,
};
pub use graph::{ObjectId, SceneGraph};
pub use joblog::{ExportLog, LogEntry};
pub use source::SourceScene;
