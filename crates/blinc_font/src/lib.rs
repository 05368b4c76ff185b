//! Glyph caching, font effects and texture atlas packing for Blinc
//!
//! This crate turns Unicode strings into textured quads:
//! - Per (face, size) glyph caches with fallback-face chaining
//! - Font effect layers (outline, blur, glow, shadow) sharing glyph textures
//! - Shelf packing of glyph boxes into RGBA8 atlas textures
//! - Versioned, lazily generated texture data for the renderer
//!
//! The entry point is [`FontProvider`]. Everything here is single threaded:
//! face backends are shared through `Rc`, so providers are `!Send`.

pub mod backend;
pub mod config;
pub mod convolution;
pub mod effect;
pub mod face;
pub mod family;
pub mod glyph;
pub mod handle;
pub mod layer;
pub mod mesh;
pub mod provider;
pub mod shaping;
pub mod texture;
pub mod texture_layout;
pub mod types;

pub use backend::{
    normalize_bitmap, select_bitmap_strike, FaceBackend, LanguageData, PixelMode, ProceduralFace,
    RasterizedGlyph, ShapeRequest, ShapedRun, StrikeSelection, SwashFace,
};
pub use config::{FontEngineConfig, ShapingMode};
pub use convolution::{ConvolutionFilter, FilterOperation};
pub use effect::{
    BlurEffect, EffectLayer, FontEffect, FontEffectFactory, FontEffectInstancer, FontEffectList,
    GlowEffect, OutlineEffect, PropertyDictionary, PropertyValue, ShadowEffect,
};
pub use face::{FaceId, FontFace};
pub use family::FontFamily;
pub use glyph::{
    ColorFormat, FontGlyph, FontMetrics, GlyphBitmap, GlyphId, GlyphIndex, GlyphLocation,
};
pub use handle::{FallbackFaces, FontFaceHandle, HandleId, NoFallback, StringPaint};
pub use layer::{FontFaceLayer, LayerId};
pub use mesh::{Mesh, TextVertex, TexturedMesh};
pub use provider::FontProvider;
pub use shaping::{FontKerning, ShapedGlyph, TextDirection, TextShapingContext};
pub use texture::{TextureData, TextureError, TextureRequest};
pub use texture_layout::TextureLayout;
pub use types::{Colourb, ColourbPremultiplied, FontStyle, FontWeight, Vector2f, Vector2i};

use std::path::PathBuf;

use thiserror::Error;

/// Font engine errors
#[derive(Error, Debug)]
pub enum FontError {
    #[error("Failed to load font face from {path}: {message}")]
    FaceLoad { path: PathBuf, message: String },

    #[error("Failed to parse font face: {0}")]
    FaceParse(String),

    #[error("Font face '{family}' cannot be rendered at {size}px")]
    InvalidPixelSize { family: String, size: u32 },

    #[error("No font face matches '{0}'")]
    FaceNotFound(String),

    #[error("Unknown font face handle {0:?}")]
    UnknownHandle(HandleId),

    #[error(
        "Texture atlas overflow: {unplaced} glyph boxes do not fit in {max_dimensions}px textures"
    )]
    AtlasOverflow { unplaced: usize, max_dimensions: i32 },

    #[error("Unknown font effect '{0}'")]
    UnknownEffect(String),

    #[error("Invalid value for font effect property '{property}' of '{effect}'")]
    InvalidEffectProperty { effect: String, property: String },

    #[error("Invalid font engine configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Failed to serialize font engine configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FontError>;
