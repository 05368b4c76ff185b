use crate::types::Vector2i;

/// Where a rectangle ended up after packing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub texture_index: usize,
    /// Top-left pixel in the texture
    pub position: Vector2i,
    /// Byte offset of the first pixel in the RGBA8 texture buffer
    pub texture_offset: usize,
    /// Bytes per texture row
    pub texture_stride: usize,
}

/// A box to pack, identified by a caller-chosen id
#[derive(Clone, Debug)]
pub struct TextureLayoutRectangle {
    id: u64,
    dimensions: Vector2i,
    placement: Option<Placement>,
}

impl TextureLayoutRectangle {
    pub fn new(id: u64, dimensions: Vector2i) -> Self {
        Self { id, dimensions, placement: None }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn dimensions(&self) -> Vector2i {
        self.dimensions
    }

    pub fn placement(&self) -> Option<Placement> {
        self.placement
    }

    pub fn is_placed(&self) -> bool {
        self.placement.is_some()
    }

    /// Whether the rectangle fits a texture of `maximum_dimensions` per side
    pub fn fits(&self, maximum_dimensions: i32) -> bool {
        self.dimensions.x <= maximum_dimensions && self.dimensions.y <= maximum_dimensions
    }

    pub(super) fn place(&mut self, texture_index: usize, position: Vector2i, texture_width: i32) {
        let texture_stride = texture_width.max(0) as usize * 4;
        self.placement = Some(Placement {
            texture_index,
            position,
            texture_offset: position.y as usize * texture_stride + position.x as usize * 4,
            texture_stride,
        });
    }

    pub(super) fn unplace(&mut self) {
        self.placement = None;
    }
}
