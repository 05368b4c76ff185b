use super::rectangle::TextureLayoutRectangle;
use crate::types::Vector2i;

/// One shelf of rectangles sharing a top edge
#[derive(Clone, Debug, Default)]
pub struct TextureLayoutRow {
    height: i32,
    rectangles: Vec<usize>,
}

impl TextureLayoutRow {
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Indices of the rectangles placed on this row
    pub fn rectangles(&self) -> &[usize] {
        &self.rectangles
    }

    /// Fill the row left to right with the first unplaced rectangles that fit
    ///
    /// Rectangles larger than `maximum` on either side are never taken.
    /// Rectangles are separated by a one pixel gutter. Returns the number
    /// placed.
    pub(super) fn generate(
        &mut self,
        rectangles: &mut [TextureLayoutRectangle],
        texture_index: usize,
        width: i32,
        y: i32,
        maximum: i32,
    ) -> usize {
        let mut x = 0;
        let mut first_candidate = 0;

        while let Some(index) = next_fit(rectangles, first_candidate, width - x, maximum) {
            let rectangle = &mut rectangles[index];
            let dimensions = rectangle.dimensions();
            self.height = self.height.max(dimensions.y);
            rectangle.place(texture_index, Vector2i::new(x, y), width);
            self.rectangles.push(index);

            if dimensions.x > 0 {
                x += dimensions.x + 1;
            }
            first_candidate = index + 1;
        }

        self.rectangles.len()
    }

    pub(super) fn unplace(&mut self, rectangles: &mut [TextureLayoutRectangle]) {
        for &index in &self.rectangles {
            rectangles[index].unplace();
        }
        self.rectangles.clear();
        self.height = 0;
    }
}

fn next_fit(
    rectangles: &[TextureLayoutRectangle],
    from: usize,
    available: i32,
    maximum: i32,
) -> Option<usize> {
    (from..rectangles.len()).find(|&i| {
        let rectangle = &rectangles[i];
        !rectangle.is_placed() && rectangle.fits(maximum) && rectangle.dimensions().x <= available
    })
}
