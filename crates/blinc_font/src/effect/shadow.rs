//! Offset copy of the base glyphs

use super::{
    EffectAttributes, EffectLayer, FontEffect, FontEffectInstancer, GlyphBox, PropertyDefinition,
    PropertyValue, ResolvedProperties,
};
use crate::glyph::FontGlyph;
use crate::types::{Colourb, Vector2i};

/// Draws the base glyph textures again at an offset, so it never renders
/// pixels of its own
#[derive(Debug)]
pub struct ShadowEffect {
    attributes: EffectAttributes,
    offset: Vector2i,
}

impl ShadowEffect {
    pub fn new(offset: Vector2i) -> Self {
        Self { attributes: EffectAttributes::default(), offset }
    }

    pub fn with_colour(mut self, colour: Colourb) -> Self {
        self.attributes.colour = colour;
        self
    }

    pub fn with_layer(mut self, layer: EffectLayer) -> Self {
        self.attributes.layer = layer;
        self
    }

    pub fn offset(&self) -> Vector2i {
        self.offset
    }
}

impl FontEffect for ShadowEffect {
    fn attributes(&self) -> &EffectAttributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut EffectAttributes {
        &mut self.attributes
    }

    fn has_unique_texture(&self) -> bool {
        false
    }

    fn glyph_metrics(&self, glyph_box: GlyphBox, _glyph: &FontGlyph) -> Option<GlyphBox> {
        if glyph_box.dimensions.x * glyph_box.dimensions.y <= 0 {
            return None;
        }
        Some(GlyphBox { origin: glyph_box.origin + self.offset, dimensions: glyph_box.dimensions })
    }
}

/// Instancer for `shadow(<offset-x> <offset-y> <color>)`
pub struct ShadowInstancer;

static SHADOW_PROPERTIES: [PropertyDefinition; 3] = [
    PropertyDefinition { name: "offset-x", default: PropertyValue::Length(0.0) },
    PropertyDefinition { name: "offset-y", default: PropertyValue::Length(0.0) },
    PropertyDefinition { name: "color", default: PropertyValue::Colour(Colourb::WHITE) },
];

impl FontEffectInstancer for ShadowInstancer {
    fn properties(&self) -> &[PropertyDefinition] {
        &SHADOW_PROPERTIES
    }

    fn instance_font_effect(&self, properties: &ResolvedProperties) -> Option<Box<dyn FontEffect>> {
        let offset =
            Vector2i::new(properties.length_px("offset-x"), properties.length_px("offset-y"));
        Some(Box::new(ShadowEffect::new(offset).with_colour(properties.colour("color"))))
    }
}
