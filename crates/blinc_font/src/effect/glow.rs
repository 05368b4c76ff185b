//! Soft glow: a dilated outline that is then blurred and offset

use super::{
    fill_color_values_from_alpha, gaussian_filters, outline_filter, EffectAttributes, EffectLayer,
    FontEffect, FontEffectInstancer, GlyphBox, PropertyDefinition, PropertyValue,
    ResolvedProperties,
};
use crate::convolution::ConvolutionFilter;
use crate::glyph::{ColorFormat, FontGlyph, GlyphImage};
use crate::types::{Colourb, Vector2i};

#[derive(Debug)]
pub struct GlowEffect {
    attributes: EffectAttributes,
    combined_width: i32,
    offset: Vector2i,
    filter_outline: ConvolutionFilter,
    filter_blur_x: ConvolutionFilter,
    filter_blur_y: ConvolutionFilter,
}

impl GlowEffect {
    /// `None` if either width is negative
    pub fn new(width_outline: i32, width_blur: i32, offset: Vector2i) -> Option<Self> {
        if width_outline < 0 || width_blur < 0 {
            return None;
        }
        let filter_outline = outline_filter(width_outline)?;
        let (filter_blur_x, filter_blur_y) = gaussian_filters(width_blur)?;
        Some(Self {
            attributes: EffectAttributes::default(),
            combined_width: width_outline + width_blur,
            offset,
            filter_outline,
            filter_blur_x,
            filter_blur_y,
        })
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

impl FontEffect for GlowEffect {
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
        if glyph_box.dimensions.x * glyph_box.dimensions.y <= 0 {
            return None;
        }
        let combined = Vector2i::new(self.combined_width, self.combined_width);
        Some(GlyphBox {
            origin: glyph_box.origin + self.offset - combined,
            dimensions: glyph_box.dimensions + combined * 2,
        })
    }

    fn generate_glyph_texture(
        &self,
        destination: &mut [u8],
        dimensions: Vector2i,
        stride: usize,
        glyph: GlyphImage<'_>,
    ) {
        let row = dimensions.x.max(0) as usize;
        let combined = Vector2i::new(self.combined_width, self.combined_width);

        let mut outline = vec![0u8; dimensions.area()];
        self.filter_outline.run(&mut outline, dimensions, row, ColorFormat::A8, glyph, combined);

        let mut blur_x = vec![0u8; dimensions.area()];
        let outline_image = GlyphImage { dimensions, format: ColorFormat::A8, data: &outline };
        self.filter_blur_x.run(
            &mut blur_x,
            dimensions,
            row,
            ColorFormat::A8,
            outline_image,
            Vector2i::ZERO,
        );

        let blur_image = GlyphImage { dimensions, format: ColorFormat::A8, data: &blur_x };
        self.filter_blur_y.run(
            destination,
            dimensions,
            stride,
            ColorFormat::Rgba8,
            blur_image,
            Vector2i::ZERO,
        );
        fill_color_values_from_alpha(destination, dimensions, stride);
    }
}

/// Instancer for `glow(<width-outline> <width-blur> <offset-x> <offset-y> <color>)`
pub struct GlowInstancer;

static GLOW_PROPERTIES: [PropertyDefinition; 5] = [
    PropertyDefinition { name: "width-outline", default: PropertyValue::Length(1.0) },
    PropertyDefinition { name: "width-blur", default: PropertyValue::Length(1.0) },
    PropertyDefinition { name: "offset-x", default: PropertyValue::Length(0.0) },
    PropertyDefinition { name: "offset-y", default: PropertyValue::Length(0.0) },
    PropertyDefinition { name: "color", default: PropertyValue::Colour(Colourb::WHITE) },
];

impl FontEffectInstancer for GlowInstancer {
    fn properties(&self) -> &[PropertyDefinition] {
        &GLOW_PROPERTIES
    }

    fn instance_font_effect(&self, properties: &ResolvedProperties) -> Option<Box<dyn FontEffect>> {
        let offset =
            Vector2i::new(properties.length_px("offset-x"), properties.length_px("offset-y"));
        let outline_width = properties.length_px("width-outline");
        let blur_width = properties.length_px("width-blur");
        let effect = GlowEffect::new(outline_width, blur_width, offset)?
            .with_colour(properties.colour("color"));
        Some(Box::new(effect))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_apply_offset_and_growth() {
        let effect = GlowEffect::new(1, 2, Vector2i::new(3, -1)).unwrap();
        let glyph_box =
            GlyphBox { origin: Vector2i::new(1, -10), dimensions: Vector2i::new(6, 10) };
        let grown = effect.glyph_metrics(glyph_box, &FontGlyph::default()).unwrap();

        assert_eq!(grown.origin, Vector2i::new(1, -14));
        assert_eq!(grown.dimensions, Vector2i::new(12, 16));
    }

    #[test]
    fn test_zero_widths_copy_coverage() {
        let effect = GlowEffect::new(0, 0, Vector2i::ZERO).unwrap();
        let pixels = vec![0u8, 180, 90, 0];
        let glyph = GlyphImage {
            dimensions: Vector2i::new(2, 2),
            format: ColorFormat::A8,
            data: &pixels,
        };

        let mut destination = vec![0u8; 16];
        effect.generate_glyph_texture(&mut destination, Vector2i::new(2, 2), 8, glyph);

        assert_eq!(&destination[4..8], &[180, 180, 180, 180]);
        assert_eq!(&destination[8..12], &[90, 90, 90, 90]);
        assert_eq!(destination[3], 0);
    }

    #[test]
    fn test_negative_width_rejected() {
        assert!(GlowEffect::new(-1, 1, Vector2i::ZERO).is_none());
        assert!(GlowEffect::new(1, -1, Vector2i::ZERO).is_none());
    }
}
