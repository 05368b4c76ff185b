//! Solid outline around each glyph

use super::{
    expand_box, fill_color_values_from_alpha, outline_filter, EffectAttributes, EffectLayer,
    FontEffect, FontEffectInstancer, GlyphBox, PropertyDefinition, PropertyValue,
    ResolvedProperties,
};
use crate::convolution::ConvolutionFilter;
use crate::glyph::{ColorFormat, FontGlyph, GlyphImage};
use crate::types::{Colourb, Vector2i};

#[derive(Debug)]
pub struct OutlineEffect {
    attributes: EffectAttributes,
    width: i32,
    filter: ConvolutionFilter,
}

impl OutlineEffect {
    /// Outline `width` pixels wide; `None` unless `width > 0`
    pub fn new(width: i32) -> Option<Self> {
        if width <= 0 {
            return None;
        }
        Some(Self {
            attributes: EffectAttributes::default(),
            width,
            filter: outline_filter(width)?,
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

    pub fn width(&self) -> i32 {
        self.width
    }
}

impl FontEffect for OutlineEffect {
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
        let offset = Vector2i::new(self.width, self.width);
        self.filter.run(destination, dimensions, stride, ColorFormat::Rgba8, glyph, offset);
        fill_color_values_from_alpha(destination, dimensions, stride);
    }
}

/// Instancer for `outline(<width> <color>)`
pub struct OutlineInstancer;

static OUTLINE_PROPERTIES: [PropertyDefinition; 2] = [
    PropertyDefinition { name: "width", default: PropertyValue::Length(1.0) },
    PropertyDefinition { name: "color", default: PropertyValue::Colour(Colourb::WHITE) },
];

impl FontEffectInstancer for OutlineInstancer {
    fn properties(&self) -> &[PropertyDefinition] {
        &OUTLINE_PROPERTIES
    }

    fn instance_font_effect(&self, properties: &ResolvedProperties) -> Option<Box<dyn FontEffect>> {
        let effect = OutlineEffect::new(properties.length_px("width"))?
            .with_colour(properties.colour("color"));
        Some(Box::new(effect))
    }
}
