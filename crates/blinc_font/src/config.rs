//! Font engine configuration (font.toml)

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Which string pipeline handles use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapingMode {
    /// One glyph per codepoint with pair kerning
    Direct,
    /// Clusters and positions from the face's shaping engine
    #[default]
    Shaped,
}

/// Top-level font engine configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FontEngineConfig {
    /// Largest side of any atlas texture, in pixels
    #[serde(default = "default_max_texture_dimensions")]
    pub max_texture_dimensions: i32,
    #[serde(default)]
    pub shaping: ShapingMode,
    /// Smallest pixel size kerned under `FontKerning::Auto`
    #[serde(default = "default_kerning_min_font_size")]
    pub kerning_min_font_size: u32,
    /// Rasterize printable ASCII when a handle is created
    #[serde(default = "default_true")]
    pub preload_ascii: bool,
    #[serde(default = "default_bitmap_strike_threshold")]
    pub bitmap_strike_threshold: f32,
    /// Font files registered as fallback faces, in order
    #[serde(default)]
    pub fallback_faces: Vec<PathBuf>,
}

fn default_max_texture_dimensions() -> i32 {
    1024
}

fn default_kerning_min_font_size() -> u32 {
    14
}

fn default_true() -> bool {
    true
}

fn default_bitmap_strike_threshold() -> f32 {
    0.95
}

impl Default for FontEngineConfig {
    fn default() -> Self {
        Self {
            max_texture_dimensions: default_max_texture_dimensions(),
            shaping: ShapingMode::default(),
            kerning_min_font_size: default_kerning_min_font_size(),
            preload_ascii: true,
            bitmap_strike_threshold: default_bitmap_strike_threshold(),
            fallback_faces: Vec::new(),
        }
    }
}

impl FontEngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), ?config, "loaded font engine config");
        Ok(config)
    }

    /// Serialize to a TOML string
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn with_shaping(mut self, shaping: ShapingMode) -> Self {
        self.shaping = shaping;
        self
    }

    pub fn with_max_texture_dimensions(mut self, max_texture_dimensions: i32) -> Self {
        self.max_texture_dimensions = max_texture_dimensions;
        self
    }

    pub fn with_preload_ascii(mut self, preload_ascii: bool) -> Self {
        self.preload_ascii = preload_ascii;
        self
    }
}
