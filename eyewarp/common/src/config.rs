use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use api::WarpParameters;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CaptureConfig {
    pub width: usize,
    pub height: usize,
    pub fps: f32,
}

impl CaptureConfig {
    /// Time between frames; a non-positive rate falls back to the default.
    pub fn frame_interval(&self) -> Duration {
        let fps = if self.fps.is_finite() && self.fps > 0.0 {
            self.fps
        } else {
            Self::default().fps
        };
        Duration::from_secs_f32(1.0 / fps)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 30.0,
        }
    }
}

/// Which detector module to load and where to look for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModuleConfig {
    #[serde(alias = "active_detector")]
    pub active: String,
    pub directory: String,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            active: "demo_detector".to_string(),
            directory: "plugins/native".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WarpConfig {
    #[serde(alias = "strength")]
    pub bulge_strength: f32,
    #[serde(alias = "mirror")]
    pub mirror_enabled: bool,
    pub process_interval_ms: u64,
    #[serde(default = "default_max_fps")]
    pub max_fps: Option<f32>,
    pub capture: CaptureConfig,
    pub module: ModuleConfig,
}

fn default_max_fps() -> Option<f32> {
    Some(60.0)
}

impl Default for WarpConfig {
    fn default() -> Self {
        Self {
            bulge_strength: 0.5,
            mirror_enabled: true,
            process_interval_ms: 50,
            max_fps: default_max_fps(),
            capture: CaptureConfig::default(),
            module: ModuleConfig::default(),
        }
    }
}

impl WarpConfig {
    /// Operator strength, forced into the supported range.
    pub fn strength(&self) -> f32 {
        if self.bulge_strength.is_finite() {
            self.bulge_strength.clamp(0.0, WarpParameters::MAX_STRENGTH)
        } else {
            0.0
        }
    }

    pub fn process_interval(&self) -> Duration {
        Duration::from_millis(self.process_interval_ms)
    }

    pub fn frame_duration(&self) -> Option<Duration> {
        self.max_fps
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .map(|fps| Duration::from_secs_f32(1.0 / fps))
    }
}

/// Reads the config at `path`, writing the defaults there first if it does not exist.
pub fn load_config(path: &Path) -> Result<WarpConfig> {
    if path.exists() {
        info!("Loading config from {:?}", path);
        let file = fs::File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        let reader = std::io::BufReader::new(file);
        let config = serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse {:?}", path))?;
        Ok(config)
    } else {
        info!("Config not found. Creating default at {:?}", path);
        let config = WarpConfig::default();
        let file =
            fs::File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &config)?;
        Ok(config)
    }
}
