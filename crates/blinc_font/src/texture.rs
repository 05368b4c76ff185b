//! Renderer-facing texture requests
//!
//! Atlas pixels are produced on demand. Every mesh carries a
//! [`TextureRequest`] capturing the handle version it was built against; asking
//! for the pixels after the handle's glyph set changed fails with
//! [`TextureError::Stale`] and the caller should regenerate its geometry.

use thiserror::Error;

use crate::handle::HandleId;
use crate::layer::LayerId;
use crate::types::Vector2i;

/// Identifies one atlas texture of one layer at one handle version
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureRequest {
    pub handle: HandleId,
    pub layer: LayerId,
    pub texture_index: usize,
    pub version: u32,
}

/// Generated RGBA8 pixels, premultiplied, rows tightly packed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureData {
    pub dimensions: Vector2i,
    pub pixels: Vec<u8>,
}

/// Reasons a texture cannot be produced
///
/// None of these are fatal: the renderer simply has no texture for this
/// request this frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TextureError {
    #[error("Texture request for version {requested} is stale, handle is at version {current}")]
    Stale { requested: u32, current: u32 },

    #[error("Font face handle {0:?} no longer exists")]
    UnknownHandle(HandleId),

    #[error("Font face handle has no layer {0:?}")]
    UnknownLayer(LayerId),

    #[error("Layer has no texture {0}")]
    UnknownTexture(usize),
}
