use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::annotate::AnnotationScope;
use crate::choreo::{ChoreoParams, KnotSelection};
use crate::config::errors::ConfigError;
use crate::detect::DetectorParams;
use crate::env::Frame;

/// Rope and render settings, the keys of `rigidbody_params.json`.
///
/// Every key is required; the physics values are handed to the host as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RopeParams {
    pub num_segments: usize,
    pub segment_radius: f64,
    pub segment_mass: f64,
    pub segment_friction: f64,
    pub linear_damping: f64,
    pub angular_damping: f64,
    pub table_size: f64,
    pub engine: String,
    pub render_width: u32,
    pub render_height: u32,
}

impl RopeParams {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let params: Self = read_json(path.as_ref())?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_segments == 0 {
            return Err(ConfigError::Invalid("num_segments must be > 0".into()));
        }
        if !(self.segment_radius > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "segment_radius must be > 0, got {}",
                self.segment_radius
            )));
        }
        if !(self.segment_mass > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "segment_mass must be > 0, got {}",
                self.segment_mass
            )));
        }
        if self.render_width == 0 || self.render_height == 0 {
            return Err(ConfigError::Invalid(format!(
                "render size must be non-zero, got {}x{}",
                self.render_width, self.render_height
            )));
        }
        Ok(())
    }
}

impl Default for RopeParams {
    fn default() -> Self {
        Self {
            num_segments: 50,
            segment_radius: 0.4,
            segment_mass: 1.0,
            segment_friction: 0.4,
            linear_damping: 0.6,
            angular_damping: 0.9,
            table_size: 60.0,
            engine: "raster".to_string(),
            render_width: 640,
            render_height: 480,
        }
    }
}

/// Which phases of an episode produce images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderPhases {
    pub tie: bool,
    pub straighten: bool,
    pub loosen: bool,
}

impl Default for RenderPhases {
    fn default() -> Self {
        Self {
            tie: false,
            straighten: false,
            loosen: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub episodes: usize,
    pub num_loosens: usize,
    /// Render every `render_step`-th frame of the rendered windows.
    pub render_step: u32,
    pub num_annotations: usize,
    pub scope: AnnotationScope,
    pub selection: KnotSelection,
    pub seed: u64,
    pub horizon: Frame,
    pub render: RenderPhases,
    pub detector: DetectorParams,
    pub choreo: ChoreoParams,
    pub output_dir: Option<PathBuf>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            episodes: 2,
            num_loosens: 5,
            render_step: 2,
            num_annotations: 300,
            scope: AnnotationScope::default(),
            selection: KnotSelection::default(),
            seed: 0,
            horizon: 15_000,
            render: RenderPhases::default(),
            detector: DetectorParams::default(),
            choreo: ChoreoParams::default(),
            output_dir: None,
        }
    }
}

impl GenerationConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let cfg: Self = read_json(path.as_ref())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.render_step == 0 {
            return Err(ConfigError::Invalid("render_step must be > 0".into()));
        }
        if self.num_annotations == 0 {
            return Err(ConfigError::Invalid("num_annotations must be > 0".into()));
        }
        if self.selection.kinds().is_empty() {
            return Err(ConfigError::Invalid(
                "knot selection needs at least one kind".into(),
            ));
        }
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PARAMS: &str = r#"{
        "num_segments": 50,
        "segment_radius": 0.4,
        "segment_mass": 1.0,
        "segment_friction": 0.4,
        "linear_damping": 0.6,
        "angular_damping": 0.9,
        "table_size": 60,
        "engine": "BLENDER_EEVEE",
        "render_width": 640,
        "render_height": 480
    }"#;

    #[test]
    fn loads_rope_params() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PARAMS.as_bytes()).unwrap();

        let params = RopeParams::from_path(file.path()).unwrap();
        assert_eq!(params.num_segments, 50);
        assert_eq!(params.engine, "BLENDER_EEVEE");
    }

    #[test]
    fn missing_key_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"num_segments": 50}"#).unwrap();

        let err = RopeParams::from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = RopeParams::from_path("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn zero_segments_rejected() {
        let params = RopeParams {
            num_segments: 0,
            ..RopeParams::default()
        };
        assert!(matches!(params.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn generation_config_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"episodes": 4, "seed": 7}"#).unwrap();

        let cfg = GenerationConfig::from_path(file.path()).unwrap();
        assert_eq!(cfg.episodes, 4);
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.num_loosens, 5);
        assert_eq!(cfg.render_step, 2);
    }
}
