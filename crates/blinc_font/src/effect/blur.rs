//! Gaussian blur of each glyph

use super::{
    expand_box, fill_color_values_from_alpha, gaussian_filters, EffectAttributes, EffectLayer,
    FontEffect, FontEffectInstancer, GlyphBox, PropertyDefinition, PropertyValue,
    ResolvedProperties,
};
use crate::convolution::ConvolutionFilter;
use crate::glyph::{ColorFormat, FontGlyph, GlyphImage};
use crate::types::{Colourb, Vector2i};

/// Separable blur, rendered as a horizontal then a vertical pass
#[derive(Debug)]
pub struct BlurEffect {
    attributes: EffectAttributes,
    width: i32,
    filter_x: ConvolutionFilter,
    filter_y: ConvolutionFilter,
}

impl BlurEffect {
    /// Blur with radius `width`; `None` unless `width > 0`
    pub fn new(width: i32) -> Option<Self> {
        if width <= 0 {
            return None;
        }
        let (filter_x, filter_y) = gaussian_filters(width)?;
        Some(Self { attributes: EffectAttributes::default(), width, filter_x, filter_y })
    }

    pub fn with_colour(mut self, colour: Colourb) -> Self {
        self.attributes.colour = colour;
        self
    }

    pub fn with_layer(mut self, layer: EffectLayer) -> Self {
        self.attributes.layer = layer;
        self
    }
}

impl FontEffect for BlurEffect {
    fn attributes(&self) -> &EffectAttributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut EffectAttributes {
        &mut self.attributes
    }

    fn has_unique_texture(&self) -> bool {
        true
    }

    fn glyph_metrics(&self, glyph_box: GlyphBox, _glyph: &FontGlyph) -> Option<GlyphBox> {
        expand_box(glyph_box, self.width)
    }

    fn generate_glyph_texture(
        &self,
        destination: &mut [u8],
        dimensions: Vector2i,
        stride: usize,
        glyph: GlyphImage<'_>,
    ) {
        let mut horizontal = vec![0u8; dimensions.area()];
        let row = dimensions.x.max(0) as usize;
        let offset = Vector2i::new(self.width, self.width);
        self.filter_x.run(&mut horizontal, dimensions, row, ColorFormat::A8, glyph, offset);

        let pass = GlyphImage { dimensions, format: ColorFormat::A8, data: &horizontal };
        let format = ColorFormat::Rgba8;
        self.filter_y.run(destination, dimensions, stride, format, pass, Vector2i::ZERO);
        fill_color_values_from_alpha(destination, dimensions, stride);
    }
}

/// Instancer for `blur(<width> <color>)`
pub struct BlurInstancer;

static BLUR_PROPERTIES: [PropertyDefinition; 2] = [
    PropertyDefinition { name: "width", default: PropertyValue::Length(1.0) },
    PropertyDefinition { name: "color", default: PropertyValue::Colour(Colourb::WHITE) },
];

impl FontEffectInstancer for BlurInstancer {
    fn properties(&self) -> &[PropertyDefinition] {
        &BLUR_PROPERTIES
    }

    fn instance_font_effect(&self, properties: &ResolvedProperties) -> Option<Box<dyn FontEffect>> {
        let effect =
            BlurEffect::new(properties.length_px("width"))?.with_colour(properties.colour("color"));
        Some(Box::new(effect))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blur_preserves_total_coverage() {
        let effect = BlurEffect::new(2).unwrap();
        let pixels = vec![200u8; 1];
        let glyph = GlyphImage {
            dimensions: Vector2i::new(1, 1),
            format: ColorFormat::A8,
            data: &pixels,
        };

        let dimensions = Vector2i::new(5, 5);
        let mut destination = vec![0u8; 5 * 5 * 4];
        effect.generate_glyph_texture(&mut destination, dimensions, 20, glyph);

        let centre = destination[2 * 20 + 2 * 4 + 3];
        let edge = destination[2 * 20 + 3];
        assert!(centre > edge);
        assert!(centre < 200);
        assert_eq!(destination[2 * 20 + 2 * 4], centre);

        let total: u32 = destination.chunks_exact(4).map(|p| u32::from(p[3])).sum();
        assert!((150..=200).contains(&total), "total coverage {total}");
    }

    #[test]
    fn test_metrics_expand_by_width() {
        let effect = BlurEffect::new(3).unwrap();
        let glyph_box = GlyphBox { origin: Vector2i::new(0, -8), dimensions: Vector2i::new(5, 8) };
        let grown = effect.glyph_metrics(glyph_box, &FontGlyph::default()).unwrap();
        assert_eq!(grown.dimensions, Vector2i::new(11, 14));
    }
}
