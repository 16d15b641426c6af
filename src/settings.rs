use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::overlay::compositor::{StrokeSettings, DEFAULT_STROKE_WIDTH};
use crate::overlay::raster::Rgba;

/// Environment variable naming the settings file read by the C surface.
pub const CONFIG_ENV_VAR: &str = "PATH_OVERLAY_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverlaySettings {
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f32,
    #[serde(default = "default_stroke_color")]
    pub stroke_color: Rgba,
    #[serde(default = "default_window_title")]
    pub window_title: String,
    /// Enables `debug` level logging and lets `RUST_LOG` override it.
    #[serde(default)]
    pub debug_logging: bool,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_stroke_width() -> f32 {
    DEFAULT_STROKE_WIDTH
}

fn default_stroke_color() -> Rgba {
    Rgba::PATH_RED
}

fn default_window_title() -> String {
    "Path Overlay".to_string()
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            stroke_width: default_stroke_width(),
            stroke_color: default_stroke_color(),
            window_title: default_window_title(),
            debug_logging: false,
            log_file: None,
        }
    }
}

impl OverlaySettings {
    /// A missing or empty file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Settings from the file named by [`CONFIG_ENV_VAR`], or the defaults
    /// when the variable is unset or the file cannot be parsed.
    pub fn from_env() -> Self {
        let Some(path) = std::env::var_os(CONFIG_ENV_VAR) else {
            return Self::default();
        };
        match Self::load(&path) {
            Ok(settings) => settings,
            Err(err) => {
                tracing::warn!(
                    path = %Path::new(&path).display(),
                    "failed to parse overlay settings, using defaults: {err}"
                );
                Self::default()
            }
        }
    }

    pub fn stroke(&self) -> StrokeSettings {
        let width = if self.stroke_width.is_finite() && self.stroke_width > 0.0 {
            self.stroke_width
        } else {
            tracing::warn!(
                "stroke width {} is invalid; using {DEFAULT_STROKE_WIDTH}",
                self.stroke_width
            );
            DEFAULT_STROKE_WIDTH
        };
        StrokeSettings {
            width,
            color: self.stroke_color,
        }
    }
}
