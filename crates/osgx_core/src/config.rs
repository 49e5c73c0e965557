//! Export options supplied by the front end (CLI or embedding host).

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading or validating an [`ExportConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value for `{field}`: {message}")]
    Invalid { field: &'static str, message: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Largest decimal precision the float formatter accepts.
pub const MAX_FLOAT_PRECISION: usize = 9;

/// Options recognized by one export job.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Spaces per nesting level
    pub indent: usize,

    /// Extra spaces before the properties of a block
    pub block_indent: usize,

    /// Decimal digits for every written float (also the welding tolerance)
    pub float_precision: usize,

    /// Frames per second used to convert keyframe frames to seconds
    pub anim_fps: f32,

    /// Only export objects flagged as selected by the host
    pub selected_only: bool,

    /// Prefer the host's modifier-evaluated mesh when one is supplied
    pub apply_modifiers: bool,

    /// Use host-baked samples for objects with constraints
    pub bake_constraints: bool,

    /// Frame step used when resampling curves
    pub bake_frame_step: u32,

    /// Clear the world translation of root objects
    pub zero_translation: bool,

    /// Prepended to texture file names in relative mode
    pub texture_prefix: String,

    /// Write texture paths as `texture_prefix` + file name instead of the
    /// host's absolute path
    pub relative_texture_path: bool,

    /// Extract animation channels at all
    pub export_animations: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            indent: 2,
            block_indent: 2,
            float_precision: 5,
            anim_fps: 25.0,
            selected_only: false,
            apply_modifiers: true,
            bake_constraints: true,
            bake_frame_step: 1,
            zero_translation: false,
            texture_prefix: String::new(),
            relative_texture_path: true,
            export_animations: true,
        }
    }
}

impl ExportConfig {
    /// Parse a config from JSON text. Missing fields take their defaults.
    pub fn from_json(text: &str) -> ConfigResult<Self> {
        let config: ExportConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Reject values the exporter cannot work with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.bake_frame_step == 0 {
            return Err(ConfigError::Invalid {
                field: "bake_frame_step",
                message: "must be at least 1".to_string(),
            });
        }
        if !self.anim_fps.is_finite() || self.anim_fps <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "anim_fps",
                message: format!("must be a positive number, got {}", self.anim_fps),
            });
        }
        if self.float_precision > MAX_FLOAT_PRECISION {
            return Err(ConfigError::Invalid {
                field: "float_precision",
                message: format!("at most {} digits", MAX_FLOAT_PRECISION),
            });
        }
        Ok(())
    }
}
