use super::rectangle::TextureLayoutRectangle;
use super::row::TextureLayoutRow;
use crate::types::Vector2i;

/// One atlas texture: a stack of rows
#[derive(Clone, Debug, Default)]
pub struct TextureLayoutTexture {
    dimensions: Vector2i,
    rows: Vec<TextureLayoutRow>,
}

impl TextureLayoutTexture {
    pub fn dimensions(&self) -> Vector2i {
        self.dimensions
    }

    pub fn rows(&self) -> &[TextureLayoutRow] {
        &self.rows
    }

    /// Indices of every rectangle placed on this texture
    pub fn rectangles(&self) -> impl Iterator<Item = usize> + '_ {
        self.rows.iter().flat_map(|row| row.rectangles().iter().copied())
    }

    /// Zeroed RGBA8 buffer matching the texture's dimensions
    pub fn allocate_texture(&self) -> Vec<u8> {
        vec![0; self.dimensions.area() * 4]
    }

    /// Pack as many unplaced rectangles as fit, growing the texture up to
    /// `maximum_dimensions` on each axis. Rectangles larger than the maximum
    /// are left alone. Returns the number placed.
    pub(super) fn generate(
        &mut self,
        rectangles: &mut [TextureLayoutRectangle],
        texture_index: usize,
        maximum_dimensions: i32,
    ) -> usize {
        let maximum = maximum_dimensions.max(1);
        let (square_pixels, unplaced) = rectangles
            .iter()
            .filter(|rectangle| !rectangle.is_placed() && rectangle.fits(maximum))
            .fold((0u64, 0usize), |(area, count), rectangle| {
                let dimensions = rectangle.dimensions();
                let cell = (dimensions.x.max(0) as u64 + 1) * (dimensions.y.max(0) as u64 + 1);
                (area + cell, count + 1)
            });
        if unplaced == 0 {
            return 0;
        }

        let side = ((square_pixels as f64).sqrt() as u32).max(1).next_power_of_two();
        let side = side.min(maximum as u32) as i32;
        let mut width = side;
        let mut height = (side / 2).max(1);

        loop {
            let mut placed = 0;
            let mut y = 0;
            let mut complete = true;

            while placed < unplaced {
                let mut row = TextureLayoutRow::default();
                let count = row.generate(rectangles, texture_index, width, y, maximum);
                if count == 0 {
                    complete = false;
                    break;
                }
                if y + row.height() > height {
                    row.unplace(rectangles);
                    complete = false;
                    break;
                }
                y += row.height() + 1;
                placed += count;
                self.rows.push(row);
            }

            if complete || (width == maximum && height == maximum) {
                self.dimensions = Vector2i::new(width, height);
                return placed;
            }

            if width > height {
                height = (height * 2).min(maximum);
            } else {
                width = (width * 2).min(maximum);
            }

            for row in &mut self.rows {
                row.unplace(rectangles);
            }
            self.rows.clear();
        }
    }
}
