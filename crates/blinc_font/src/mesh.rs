//! Renderer-facing geometry
//!
//! Text is emitted as one [`TexturedMesh`] per atlas texture per layer. The
//! vertex layout is `#[repr(C)]` and `Pod` so it can be uploaded as-is.

use bytemuck::{Pod, Zeroable};

use crate::texture::TextureRequest;
use crate::types::{ColourbPremultiplied, Vector2f};

/// A single text vertex
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct TextVertex {
    /// Position in pixels
    pub position: [f32; 2],
    /// Premultiplied RGBA colour
    pub colour: [u8; 4],
    /// Normalized texture coordinates
    pub tex_coord: [f32; 2],
}

/// Indexed triangle list
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<TextVertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Number of quads emitted so far
    pub fn quad_count(&self) -> usize {
        self.indices.len() / 6
    }

    /// Append an axis-aligned quad
    pub fn push_quad(
        &mut self,
        origin: Vector2f,
        dimensions: Vector2f,
        colour: ColourbPremultiplied,
        tex_top_left: Vector2f,
        tex_bottom_right: Vector2f,
    ) {
        let base = self.vertices.len() as u32;
        let colour = colour.to_array();
        let (x0, y0) = (origin.x, origin.y);
        let (x1, y1) = (origin.x + dimensions.x, origin.y + dimensions.y);
        let (u0, v0) = (tex_top_left.x, tex_top_left.y);
        let (u1, v1) = (tex_bottom_right.x, tex_bottom_right.y);

        self.vertices.extend_from_slice(&[
            TextVertex { position: [x0, y0], colour, tex_coord: [u0, v0] },
            TextVertex { position: [x1, y0], colour, tex_coord: [u1, v0] },
            TextVertex { position: [x1, y1], colour, tex_coord: [u1, v1] },
            TextVertex { position: [x0, y1], colour, tex_coord: [u0, v1] },
        ]);
        self.indices
            .extend_from_slice(&[base, base + 3, base + 1, base + 1, base + 3, base + 2]);
    }
}

/// A mesh bound to one atlas texture
#[derive(Clone, Debug, PartialEq)]
pub struct TexturedMesh {
    pub texture: TextureRequest,
    pub mesh: Mesh,
}

impl TexturedMesh {
    pub fn new(texture: TextureRequest) -> Self {
        Self { texture, mesh: Mesh::default() }
    }
}
