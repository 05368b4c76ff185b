//! Kernel convolution over the opacity channel of glyph bitmaps
//!
//! Outline, blur and glow effects are all built from this filter: outline is a
//! dilation, blur a normalized Gaussian sum, glow a dilation followed by blur.

use std::ops::{Index, IndexMut};

use crate::glyph::{ColorFormat, GlyphImage};
use crate::types::Vector2i;

/// How kernel-weighted source opacities are combined
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FilterOperation {
    /// Sum of all weighted samples
    #[default]
    Sum,
    /// Maximum of all weighted samples
    Dilation,
}

/// A `(2 * rx + 1) x (2 * ry + 1)` kernel of weights
#[derive(Clone, Debug, Default)]
pub struct ConvolutionFilter {
    kernel_size: Vector2i,
    kernel: Vec<f32>,
    operation: FilterOperation,
}

impl ConvolutionFilter {
    /// Square kernel with the same radius on both axes
    pub fn new(radius: i32, operation: FilterOperation) -> Option<Self> {
        Self::with_radii(Vector2i::new(radius, radius), operation)
    }

    /// Zero-initialized kernel; `None` for negative radii
    pub fn with_radii(radii: Vector2i, operation: FilterOperation) -> Option<Self> {
        if radii.x < 0 || radii.y < 0 {
            tracing::warn!(?radii, "invalid convolution filter radii");
            return None;
        }
        let kernel_size = radii * 2 + Vector2i::new(1, 1);
        Some(Self { kernel_size, kernel: vec![0.0; kernel_size.area()], operation })
    }

    pub fn kernel_size(&self) -> Vector2i {
        self.kernel_size
    }

    pub fn radii(&self) -> Vector2i {
        Vector2i::new((self.kernel_size.x - 1) / 2, (self.kernel_size.y - 1) / 2)
    }

    pub fn operation(&self) -> FilterOperation {
        self.operation
    }

    fn row_range(&self, row: usize) -> std::ops::Range<usize> {
        debug_assert!(row < self.kernel_size.y as usize, "kernel row {row} out of range");
        let row = row.min((self.kernel_size.y - 1).max(0) as usize);
        let width = self.kernel_size.x as usize;
        row * width..(row + 1) * width
    }

    /// Convolve the opacity of `source` into the alpha bytes of `destination`
    ///
    /// `source_offset` is the position of the source's top-left pixel in the
    /// destination. Out-of-bounds source samples contribute nothing. Colour
    /// bytes of an RGBA destination are left untouched.
    pub fn run(
        &self,
        destination: &mut [u8],
        destination_dimensions: Vector2i,
        destination_stride: usize,
        destination_format: ColorFormat,
        source: GlyphImage<'_>,
        source_offset: Vector2i,
    ) {
        let destination_bpp = destination_format.bytes_per_pixel();
        let destination_alpha = destination_bpp - 1;
        let source_bpp = source.format.bytes_per_pixel();
        let source_alpha = source_bpp - 1;
        let radius = self.radii();

        for y in 0..destination_dimensions.y {
            for x in 0..destination_dimensions.x {
                let mut opacity = 0.0f32;

                for kernel_y in 0..self.kernel_size.y {
                    let source_y = y - source_offset.y - radius.y + kernel_y;
                    if source_y < 0 || source_y >= source.dimensions.y {
                        continue;
                    }
                    for kernel_x in 0..self.kernel_size.x {
                        let source_x = x - source_offset.x - radius.x + kernel_x;
                        if source_x < 0 || source_x >= source.dimensions.x {
                            continue;
                        }
                        let source_pixel = (source_y * source.dimensions.x + source_x) as usize;
                        let source_index = source_pixel * source_bpp + source_alpha;
                        let kernel_index = (kernel_y * self.kernel_size.x + kernel_x) as usize;
                        let weight = self.kernel[kernel_index];
                        let sample = f32::from(source.data[source_index]) * weight;

                        match self.operation {
                            FilterOperation::Sum => opacity += sample,
                            FilterOperation::Dilation => opacity = opacity.max(sample),
                        }
                    }
                }

                let index = y as usize * destination_stride
                    + x as usize * destination_bpp
                    + destination_alpha;
                if let Some(pixel) = destination.get_mut(index) {
                    *pixel = opacity.clamp(0.0, 255.0) as u8;
                }
            }
        }
    }
}

/// Kernel row access; the row index is clamped to the kernel
impl Index<usize> for ConvolutionFilter {
    type Output = [f32];

    fn index(&self, row: usize) -> &[f32] {
        &self.kernel[self.row_range(row)]
    }
}

impl IndexMut<usize> for ConvolutionFilter {
    fn index_mut(&mut self, row: usize) -> &mut [f32] {
        let range = self.row_range(row);
        &mut self.kernel[range]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_pixel() -> Vec<u8> {
        let mut pixels = vec![0u8; 9];
        pixels[4] = 200;
        pixels
    }

    #[test]
    fn test_negative_radius_rejected() {
        assert!(ConvolutionFilter::new(-1, FilterOperation::Sum).is_none());
        let filter =
            ConvolutionFilter::with_radii(Vector2i::new(2, 0), FilterOperation::Sum).unwrap();
        assert_eq!(filter.kernel_size(), Vector2i::new(5, 1));
    }

    #[test]
    fn test_dilation_spreads_opacity() {
        let mut filter = ConvolutionFilter::new(1, FilterOperation::Dilation).unwrap();
        for row in 0..3 {
            filter[row].fill(1.0);
        }
        let pixels = single_pixel();
        let source = GlyphImage {
            dimensions: Vector2i::new(3, 3),
            format: ColorFormat::A8,
            data: &pixels,
        };

        let mut destination = vec![0u8; 25];
        let (dimensions, offset) = (Vector2i::new(5, 5), Vector2i::new(1, 1));
        filter.run(&mut destination, dimensions, 5, ColorFormat::A8, source, offset);

        assert_eq!(destination[0], 0);
        assert_eq!(destination[6], 200);
        assert_eq!(destination[12], 200);
        assert_eq!(destination[18], 200);
        assert_eq!(destination[24], 0);
    }

    #[test]
    fn test_sum_clamps_and_writes_alpha_only() {
        let mut filter = ConvolutionFilter::new(1, FilterOperation::Sum).unwrap();
        for row in 0..3 {
            filter[row].fill(1.0);
        }
        let pixels = vec![200u8; 9];
        let source = GlyphImage {
            dimensions: Vector2i::new(3, 3),
            format: ColorFormat::A8,
            data: &pixels,
        };

        let mut destination = vec![7u8; 3 * 3 * 4];
        let dimensions = Vector2i::new(3, 3);
        filter.run(&mut destination, dimensions, 12, ColorFormat::Rgba8, source, Vector2i::ZERO);

        assert_eq!(&destination[16..20], &[7, 7, 7, 255]);
    }

    #[test]
    fn test_row_index_clamped() {
        let mut filter = ConvolutionFilter::new(0, FilterOperation::Sum).unwrap();
        filter[0][0] = 0.5;
        assert_eq!(filter[0], [0.5]);
    }
}
