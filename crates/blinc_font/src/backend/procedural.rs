//! Procedural face drawing solid boxes

use std::cell::Cell;

use super::{FaceBackend, RasterizedGlyph, ShapeRequest, ShapedRun};
use crate::glyph::{ColorFormat, FontMetrics, GlyphIndex};
use crate::shaping::{ShapedGlyph, TextDirection};
use crate::types::{FontStyle, FontWeight};

/// A face whose glyphs are filled rectangles
///
/// Covers exactly the characters it is built with; glyph indices follow that
/// order starting at 1. Box sizes vary with the glyph index so packing sees a
/// realistic mix of heights. Characters marked as colour glyphs render as
/// opaque RGBA. `A`/`V` pairs kern by `-size / 8`.
#[derive(Debug)]
pub struct ProceduralFace {
    family: String,
    style: FontStyle,
    weight: FontWeight,
    characters: Vec<char>,
    colour_characters: Vec<char>,
    shaping: bool,
    renders: Cell<usize>,
}

impl ProceduralFace {
    pub fn new(family: impl Into<String>, characters: &str) -> Self {
        Self {
            family: family.into(),
            style: FontStyle::Normal,
            weight: FontWeight::NORMAL,
            characters: characters.chars().collect(),
            colour_characters: Vec::new(),
            shaping: true,
            renders: Cell::new(0),
        }
    }

    /// Printable ASCII, U+0020..=U+007E
    pub fn ascii(family: impl Into<String>) -> Self {
        let characters: String = (' '..='~').collect();
        Self::new(family, &characters)
    }

    pub fn with_style(mut self, style: FontStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_weight(mut self, weight: FontWeight) -> Self {
        self.weight = weight;
        self
    }

    /// Render these characters as RGBA colour glyphs, adding them to the face
    pub fn with_colour_glyphs(mut self, characters: &str) -> Self {
        for character in characters.chars() {
            if !self.characters.contains(&character) {
                self.characters.push(character);
            }
            self.colour_characters.push(character);
        }
        self
    }

    /// Disable the built-in shaper so handles iterate codepoints directly
    pub fn without_shaping(mut self) -> Self {
        self.shaping = false;
        self
    }

    /// Number of glyphs rasterized so far
    pub fn render_count(&self) -> usize {
        self.renders.get()
    }

    fn character(&self, glyph_index: GlyphIndex) -> Option<char> {
        let position = (glyph_index as usize).checked_sub(1)?;
        self.characters.get(position).copied()
    }

    /// Glyph box and advance at `size`
    fn glyph_geometry(character: char, glyph_index: GlyphIndex, size: u32) -> (u32, u32, i32) {
        if character.is_whitespace() {
            return (0, 0, (size / 3) as i32);
        }
        if is_combining_mark(character) {
            return ((size / 4).max(1), (size / 5).max(1), 0);
        }
        let width = (size / 2).saturating_sub(glyph_index % 3).max(1);
        let height = (size * 7 / 10 + glyph_index % 4).max(1);
        (width, height, (width + 1 + size / 10) as i32)
    }

    fn resolve_direction(text: &str, requested: TextDirection) -> TextDirection {
        match requested {
            TextDirection::Auto if text.chars().any(is_right_to_left) => TextDirection::RightToLeft,
            TextDirection::Auto => TextDirection::LeftToRight,
            direction => direction,
        }
    }
}

fn is_combining_mark(character: char) -> bool {
    ('\u{0300}'..='\u{036f}').contains(&character)
}

fn is_right_to_left(character: char) -> bool {
    ('\u{0590}'..='\u{08ff}').contains(&character)
}

impl FaceBackend for ProceduralFace {
    fn family_name(&self) -> &str {
        &self.family
    }

    fn style(&self) -> FontStyle {
        self.style
    }

    fn weight(&self) -> FontWeight {
        self.weight
    }

    fn glyph_index(&self, character: char) -> GlyphIndex {
        self.characters
            .iter()
            .position(|&c| c == character)
            .map_or(0, |position| position as GlyphIndex + 1)
    }

    fn metrics(&self, size: u32) -> Option<FontMetrics> {
        if size == 0 {
            return None;
        }
        let size_f = size as f32;
        Some(FontMetrics {
            size,
            ascent: (size_f * 0.8).round(),
            descent: (size_f * 0.2).round(),
            line_spacing: (size_f * 1.2).round(),
            x_height: (size_f * 0.5).round(),
            underline_position: (size_f * 0.1).round(),
            underline_thickness: (size_f / 14.0).round().max(1.0),
        })
    }

    fn render_glyph(&self, glyph_index: GlyphIndex, size: u32) -> Option<RasterizedGlyph> {
        let character = self.character(glyph_index)?;
        self.renders.set(self.renders.get() + 1);
        tracing::trace!(family = %self.family, ?character, size, "rasterizing procedural glyph");

        let (width, height, advance) = Self::glyph_geometry(character, glyph_index, size);
        let pixel_count = (width * height) as usize;
        let (bitmap, format) = if self.colour_characters.contains(&character) {
            let colour = [(glyph_index * 40 % 256) as u8, 96, 200, 255];
            (colour.repeat(pixel_count), ColorFormat::Rgba8)
        } else {
            (vec![0xff; pixel_count], ColorFormat::A8)
        };

        let bearing_x = if is_combining_mark(character) { -((size / 3) as i32) } else { 1 };
        Some(RasterizedGlyph {
            bitmap,
            width,
            height,
            bearing_x,
            bearing_y: height as i32,
            advance,
            format,
        })
    }

    fn kerning(&self, size: u32, left: GlyphIndex, right: GlyphIndex) -> i32 {
        match (self.character(left), self.character(right)) {
            (Some('A'), Some('V')) | (Some('V'), Some('A')) => -((size / 8) as i32),
            _ => 0,
        }
    }

    fn shape(&self, text: &str, size: u32, request: &ShapeRequest<'_>) -> Option<ShapedRun> {
        if !self.shaping {
            return None;
        }

        let mut glyphs: Vec<ShapedGlyph> = Vec::with_capacity(text.len());
        let mut cluster = 0u32;
        for (offset, character) in text.char_indices() {
            if !(is_combining_mark(character) && offset > 0) {
                cluster = offset as u32;
            }
            let glyph_index = self.glyph_index(character);
            let advance = match glyph_index {
                0 => 0,
                _ => Self::glyph_geometry(character, glyph_index, size).2,
            };

            let kerning = match glyphs.last() {
                Some(previous) if request.kerning => {
                    self.kerning(size, previous.glyph_index, glyph_index)
                }
                _ => 0,
            };
            if let Some(previous) = glyphs.last_mut() {
                previous.x_advance += kerning * 64;
            }

            glyphs.push(ShapedGlyph {
                glyph_index,
                cluster,
                x_advance: advance * 64,
                ..ShapedGlyph::default()
            });
        }

        let direction = Self::resolve_direction(text, request.direction);
        if direction == TextDirection::RightToLeft {
            glyphs.reverse();
        }
        Some(ShapedRun { glyphs, direction })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coverage_and_indices() {
        let face = ProceduralFace::new("Test", "abc");
        assert_eq!(face.glyph_index('a'), 1);
        assert_eq!(face.glyph_index('c'), 3);
        assert_eq!(face.glyph_index('z'), 0);
        assert!(face.render_glyph(0, 16).is_none());
        assert!(face.render_glyph(4, 16).is_none());
    }

    #[test]
    fn test_render_counts_and_formats() {
        let face = ProceduralFace::new("Test", "a ").with_colour_glyphs("\u{1F600}");
        let a = face.render_glyph(1, 20).unwrap();
        assert_eq!(a.format, ColorFormat::A8);
        assert_eq!(a.bitmap.len(), (a.width * a.height) as usize);

        let space = face.render_glyph(2, 20).unwrap();
        assert_eq!((space.width, space.height), (0, 0));
        assert!(space.advance > 0);

        let emoji = face.render_glyph(3, 20).unwrap();
        assert_eq!(emoji.format, ColorFormat::Rgba8);
        assert_eq!(face.render_count(), 3);
    }

    #[test]
    fn test_shaping_merges_combining_marks() {
        let face = ProceduralFace::new("Test", "xy");
        let run = face.shape("xe\u{301}y", 16, &ShapeRequest::default()).unwrap();
        let clusters: Vec<u32> = run.glyphs.iter().map(|g| g.cluster).collect();
        assert_eq!(clusters, vec![0, 1, 1, 4]);
        assert_eq!(run.glyphs[1].glyph_index, 0);
        assert_eq!(run.direction, TextDirection::LeftToRight);
    }

    #[test]
    fn test_shaping_applies_kerning() {
        let face = ProceduralFace::new("Test", "AV");
        let kerned = ShapeRequest { kerning: true, ..ShapeRequest::default() };
        let plain = face.shape("AV", 16, &ShapeRequest::default()).unwrap();
        let run = face.shape("AV", 16, &kerned).unwrap();
        assert_eq!(run.glyphs[0].x_advance, plain.glyphs[0].x_advance - 2 * 64);
    }

    #[test]
    fn test_without_shaping() {
        let face = ProceduralFace::ascii("Test").without_shaping();
        assert!(face.shape("abc", 16, &ShapeRequest::default()).is_none());
    }
}
