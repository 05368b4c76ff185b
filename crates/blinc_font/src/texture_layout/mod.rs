//! Shelf packing of glyph boxes into atlas textures
//!
//! Rectangles are sorted by descending height and packed row by row into
//! power-of-two textures. A texture starts from an estimate of the remaining
//! area and doubles its smaller side until everything fits or the maximum is
//! reached; whatever does not fit spills into the next texture.

mod rectangle;
mod row;
mod texture;

pub use rectangle::{Placement, TextureLayoutRectangle};
pub use row::TextureLayoutRow;
pub use texture::TextureLayoutTexture;

use crate::types::Vector2i;
use crate::{FontError, Result};

#[derive(Clone, Debug, Default)]
pub struct TextureLayout {
    rectangles: Vec<TextureLayoutRectangle>,
    textures: Vec<TextureLayoutTexture>,
}

impl TextureLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rectangle(&mut self, id: u64, dimensions: Vector2i) {
        self.rectangles.push(TextureLayoutRectangle::new(id, dimensions));
    }

    pub fn rectangles(&self) -> &[TextureLayoutRectangle] {
        &self.rectangles
    }

    pub fn num_rectangles(&self) -> usize {
        self.rectangles.len()
    }

    pub fn textures(&self) -> &[TextureLayoutTexture] {
        &self.textures
    }

    pub fn texture(&self, index: usize) -> Option<&TextureLayoutTexture> {
        self.textures.get(index)
    }

    pub fn num_textures(&self) -> usize {
        self.textures.len()
    }

    /// Rectangles placed on texture `index`
    pub fn texture_rectangles(
        &self,
        index: usize,
    ) -> impl Iterator<Item = &TextureLayoutRectangle> + '_ {
        self.textures
            .get(index)
            .into_iter()
            .flat_map(|texture| texture.rectangles())
            .map(|i| &self.rectangles[i])
    }

    /// Place every rectangle, creating as many textures as needed
    ///
    /// Equal heights keep insertion order. Rectangles larger than
    /// `max_texture_dimensions` on either side are left unplaced and reported
    /// as [`FontError::AtlasOverflow`]; every other rectangle keeps its
    /// placement and the textures built for them are kept.
    pub fn generate_layout(&mut self, max_texture_dimensions: i32) -> Result<()> {
        self.textures.clear();
        for rectangle in &mut self.rectangles {
            rectangle.unplace();
        }
        self.rectangles.sort_by(|a, b| b.dimensions().y.cmp(&a.dimensions().y));

        let maximum = max_texture_dimensions.max(1);
        let total = self.rectangles.len();
        let fitting = self.rectangles.iter().filter(|r| r.fits(maximum)).count();
        let mut placed = 0;
        while placed < fitting {
            let mut texture = TextureLayoutTexture::default();
            let count = texture.generate(&mut self.rectangles, self.textures.len(), maximum);
            if count == 0 {
                break;
            }
            self.textures.push(texture);
            placed += count;
        }

        if placed < total {
            let unplaced = total - placed;
            tracing::warn!(
                unplaced,
                max_texture_dimensions,
                textures = self.textures.len(),
                "glyph boxes do not fit in the texture atlas"
            );
            return Err(FontError::AtlasOverflow {
                unplaced,
                max_dimensions: max_texture_dimensions,
            });
        }

        tracing::trace!(
            rectangles = total,
            textures = self.textures.len(),
            "texture layout generated"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout_of(dimensions: &[(i32, i32)]) -> TextureLayout {
        let mut layout = TextureLayout::new();
        for (id, &(w, h)) in dimensions.iter().enumerate() {
            layout.add_rectangle(id as u64, Vector2i::new(w, h));
        }
        layout
    }

    fn assert_no_overlap(layout: &TextureLayout) {
        for texture_index in 0..layout.num_textures() {
            let texture = layout.texture(texture_index).unwrap().dimensions();
            let placed: Vec<_> = layout
                .texture_rectangles(texture_index)
                .filter(|r| r.dimensions().area() > 0)
                .map(|r| (r.placement().unwrap().position, r.dimensions()))
                .collect();

            for (i, &(a_pos, a_dim)) in placed.iter().enumerate() {
                assert!(a_pos.x >= 0 && a_pos.y >= 0);
                assert!(a_pos.x + a_dim.x <= texture.x && a_pos.y + a_dim.y <= texture.y);

                for &(b_pos, b_dim) in &placed[i + 1..] {
                    // Expanding one box by the gutter must not touch the other
                    let apart = a_pos.x + a_dim.x + 1 <= b_pos.x
                        || b_pos.x + b_dim.x + 1 <= a_pos.x
                        || a_pos.y + a_dim.y + 1 <= b_pos.y
                        || b_pos.y + b_dim.y + 1 <= a_pos.y;
                    assert!(apart, "{a_pos:?}/{a_dim:?} overlaps {b_pos:?}/{b_dim:?}");
                }
            }
        }
    }

    #[test]
    fn test_all_rectangles_placed_without_overlap() {
        let sizes: Vec<(i32, i32)> =
            (0..300).map(|i| (3 + (i * 7) % 23, 4 + (i * 13) % 29)).collect();
        let mut layout = layout_of(&sizes);
        layout.generate_layout(1024).unwrap();

        assert!(layout.rectangles().iter().all(|r| r.is_placed()));
        assert_eq!(layout.num_textures(), 1);
        assert_no_overlap(&layout);
    }

    #[test]
    fn test_spills_into_multiple_textures() {
        let sizes = vec![(30, 30); 40];
        let mut layout = layout_of(&sizes);
        layout.generate_layout(64).unwrap();

        assert!(layout.num_textures() > 1);
        assert!(layout.rectangles().iter().all(|r| r.is_placed()));
        for texture in layout.textures() {
            assert!(texture.dimensions().x <= 64 && texture.dimensions().y <= 64);
        }
        assert_no_overlap(&layout);
    }

    #[test]
    fn test_rectangle_of_maximum_size_fits() {
        let mut layout = layout_of(&[(64, 64), (10, 10)]);
        layout.generate_layout(64).unwrap();
        assert_eq!(layout.num_textures(), 2);
        assert_eq!(layout.rectangles()[0].placement().unwrap().position, Vector2i::ZERO);
    }

    #[test]
    fn test_oversized_rectangle_overflows() {
        let mut layout = layout_of(&[(10, 10), (100, 5)]);
        let result = layout.generate_layout(64);
        assert!(matches!(
            result,
            Err(FontError::AtlasOverflow { unplaced: 1, max_dimensions: 64 })
        ));
        // The box that fits keeps its placement
        assert!(layout.rectangles().iter().any(|r| r.id() == 0 && r.is_placed()));
    }

    #[test]
    fn test_overtall_rectangle_overflows() {
        let mut layout = layout_of(&[(10, 10), (5, 100), (8, 12)]);
        let result = layout.generate_layout(64);
        assert!(matches!(
            result,
            Err(FontError::AtlasOverflow { unplaced: 1, max_dimensions: 64 })
        ));
        assert_eq!(layout.num_textures(), 1);

        let placed: Vec<(u64, bool)> =
            layout.rectangles().iter().map(|r| (r.id(), r.is_placed())).collect();
        assert_eq!(placed, vec![(1, false), (2, true), (0, true)]);
        assert_no_overlap(&layout);
    }

    #[test]
    fn test_equal_heights_keep_insertion_order() {
        let mut layout = layout_of(&[(5, 8), (6, 10), (7, 8), (8, 8)]);
        layout.generate_layout(1024).unwrap();

        let ids: Vec<u64> = layout.rectangles().iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec![1, 0, 2, 3]);

        let x: Vec<i32> =
            layout.rectangles().iter().map(|r| r.placement().unwrap().position.x).collect();
        assert_eq!(x, vec![0, 7, 13, 21]);
    }

    #[test]
    fn test_offsets_address_texture_buffer() {
        let mut layout = layout_of(&[(4, 4), (3, 3)]);
        layout.generate_layout(1024).unwrap();

        let texture = layout.texture(0).unwrap();
        let buffer = texture.allocate_texture();
        assert_eq!(buffer.len(), texture.dimensions().area() * 4);

        let placement = layout.rectangles()[1].placement().unwrap();
        assert_eq!(placement.texture_stride, texture.dimensions().x as usize * 4);
        assert_eq!(placement.texture_offset, placement.position.x as usize * 4);
    }

    #[test]
    fn test_regenerate_is_idempotent() {
        let mut layout = layout_of(&[(4, 9), (12, 3), (0, 0)]);
        layout.generate_layout(1024).unwrap();
        let first: Vec<_> = layout.rectangles().iter().map(|r| r.placement()).collect();
        layout.generate_layout(1024).unwrap();
        let second: Vec<_> = layout.rectangles().iter().map(|r| r.placement()).collect();
        assert_eq!(first, second);
    }
}
