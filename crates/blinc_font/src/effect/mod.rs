//! Font effects
//!
//! An effect is an immutable per-glyph transform rendered as its own layer
//! behind or in front of the plain text. Effects are shared as
//! `Rc<dyn FontEffect>`; two effects with the same fingerprint render
//! identically, which lets handles reuse one layer's textures for both.

mod blur;
mod glow;
mod instancer;
mod outline;
mod shadow;

pub use blur::{BlurEffect, BlurInstancer};
pub use glow::{GlowEffect, GlowInstancer};
pub use instancer::{
    FontEffectFactory, FontEffectInstancer, PropertyDefinition, PropertyDictionary, PropertyValue,
    ResolvedProperties,
};
pub use outline::{OutlineEffect, OutlineInstancer};
pub use shadow::{ShadowEffect, ShadowInstancer};

use std::fmt;
use std::rc::Rc;

use crate::convolution::{ConvolutionFilter, FilterOperation};
use crate::glyph::{FontGlyph, GlyphImage};
use crate::types::{Colourb, Vector2i};

/// Paint order of an effect relative to the base text
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EffectLayer {
    #[default]
    Back,
    Front,
}

/// State common to every effect
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EffectAttributes {
    pub layer: EffectLayer,
    pub colour: Colourb,
    pub fingerprint: u64,
}

/// Box of a glyph inside an effect layer, relative to the pen position
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GlyphBox {
    /// Top-left corner, y down
    pub origin: Vector2i,
    pub dimensions: Vector2i,
}

/// A per-glyph bitmap transform
pub trait FontEffect: fmt::Debug {
    fn attributes(&self) -> &EffectAttributes;

    fn attributes_mut(&mut self) -> &mut EffectAttributes;

    /// Whether the effect renders its own pixels
    ///
    /// Effects returning `false` only reposition or recolour the base glyphs
    /// and their layers share the base layer's textures.
    fn has_unique_texture(&self) -> bool;

    /// Adjust a glyph's box to fit the effect, or `None` to skip the glyph
    fn glyph_metrics(&self, glyph_box: GlyphBox, glyph: &FontGlyph) -> Option<GlyphBox>;

    /// Render the effect for one glyph into an RGBA8 region
    ///
    /// `destination` starts at the region's first byte and rows are `stride`
    /// bytes apart. Output must be premultiplied.
    fn generate_glyph_texture(
        &self,
        _destination: &mut [u8],
        _dimensions: Vector2i,
        _stride: usize,
        _glyph: GlyphImage<'_>,
    ) {
    }

    fn layer(&self) -> EffectLayer {
        self.attributes().layer
    }

    fn colour(&self) -> Colourb {
        self.attributes().colour
    }

    fn fingerprint(&self) -> u64 {
        self.attributes().fingerprint
    }
}

/// Ordered effects for one piece of text, Back effects first
pub type FontEffectList = Vec<Rc<dyn FontEffect>>;

/// Identity comparison of shared effects
pub fn same_effect(a: &Rc<dyn FontEffect>, b: &Rc<dyn FontEffect>) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}

/// Stable partition of `effects`: Back effects before Front effects
pub fn sort_by_layer(effects: &mut FontEffectList) {
    effects.sort_by_key(|effect| match effect.layer() {
        EffectLayer::Back => 0,
        EffectLayer::Front => 1,
    });
}

/// Broadcast each pixel's alpha into its colour channels
///
/// Turns an alpha-only render into premultiplied white, which vertex colour
/// then tints.
pub fn fill_color_values_from_alpha(destination: &mut [u8], dimensions: Vector2i, stride: usize) {
    for y in 0..dimensions.y.max(0) as usize {
        let row_start = y * stride;
        let row_end = (row_start + dimensions.x.max(0) as usize * 4).min(destination.len());
        let Some(row) = destination.get_mut(row_start..row_end) else {
            return;
        };
        for pixel in row.chunks_exact_mut(4) {
            let alpha = pixel[3];
            pixel[0] = alpha;
            pixel[1] = alpha;
            pixel[2] = alpha;
        }
    }
}

/// Dilation kernel of radius `width`, full weight inside the disc and a
/// linear falloff over one pixel outside it
pub(crate) fn outline_filter(width: i32) -> Option<ConvolutionFilter> {
    let mut filter = ConvolutionFilter::new(width, FilterOperation::Dilation)?;
    for x in -width..=width {
        for y in -width..=width {
            let distance = ((x * x + y * y) as f32).sqrt();
            let weight = if distance > width as f32 {
                ((width + 1) as f32 - distance).max(0.0)
            } else {
                1.0
            };
            filter[(x + width) as usize][(y + width) as usize] = weight;
        }
    }
    Some(filter)
}

/// Normalized horizontal and vertical 1-D Gaussian kernels of radius `width`
pub(crate) fn gaussian_filters(width: i32) -> Option<(ConvolutionFilter, ConvolutionFilter)> {
    let mut filter_x =
        ConvolutionFilter::with_radii(Vector2i::new(width, 0), FilterOperation::Sum)?;
    let mut filter_y =
        ConvolutionFilter::with_radii(Vector2i::new(0, width), FilterOperation::Sum)?;

    let std_dev = 0.4 * width as f32;
    let two_variance = 2.0 * std_dev * std_dev;

    let weights: Vec<f32> = (-width..=width)
        .map(|x| {
            if two_variance > 0.0 {
                (-((x * x) as f32) / two_variance).exp()
            } else {
                1.0
            }
        })
        .collect();
    let sum: f32 = weights.iter().sum();

    for (i, weight) in weights.iter().enumerate() {
        let weight = weight / sum;
        filter_x[0][i] = weight;
        filter_y[i][0] = weight;
    }
    Some((filter_x, filter_y))
}

/// Grow a non-empty box by `width` on every side
pub(crate) fn expand_box(glyph_box: GlyphBox, width: i32) -> Option<GlyphBox> {
    if glyph_box.dimensions.x * glyph_box.dimensions.y <= 0 {
        return None;
    }
    Some(GlyphBox {
        origin: glyph_box.origin - Vector2i::new(width, width),
        dimensions: glyph_box.dimensions + Vector2i::new(2 * width, 2 * width),
    })
}
