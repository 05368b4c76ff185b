//! Shaping inputs and outputs

use crate::glyph::GlyphIndex;

/// Writing direction of a run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TextDirection {
    /// Derived from the language, then from the script of the text
    #[default]
    Auto,
    LeftToRight,
    RightToLeft,
}

/// Whether pair kerning is applied
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FontKerning {
    /// Kern at or above the configured minimum font size
    #[default]
    Auto,
    Normal,
    None,
}

impl FontKerning {
    pub fn is_enabled(self, font_size: u32, min_font_size: u32) -> bool {
        match self {
            FontKerning::Auto => font_size >= min_font_size,
            FontKerning::Normal => true,
            FontKerning::None => false,
        }
    }
}

/// Per-string shaping parameters supplied by the style layer
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextShapingContext {
    /// BCP 47 language tag, empty when unknown
    pub language: String,
    pub direction: TextDirection,
    /// Extra pixels after every glyph
    pub letter_spacing: f32,
    pub kerning: FontKerning,
}

impl TextShapingContext {
    pub fn with_letter_spacing(mut self, letter_spacing: f32) -> Self {
        self.letter_spacing = letter_spacing;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_kerning(mut self, kerning: FontKerning) -> Self {
        self.kerning = kerning;
        self
    }
}

/// One glyph produced by a shaping engine
///
/// Advances and offsets are 26.6 fixed point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShapedGlyph {
    pub glyph_index: GlyphIndex,
    /// Byte offset of the glyph's cluster in the shaped text
    pub cluster: u32,
    pub x_advance: i32,
    pub y_advance: i32,
    pub x_offset: i32,
    pub y_offset: i32,
}

/// C0 and C1 control characters produce neither a glyph nor an advance
pub fn is_control_character(character: char) -> bool {
    (character as u32) < 0x20 || ('\u{7f}'..='\u{9f}').contains(&character)
}

/// Convert a 26.6 fixed point value to whole pixels
pub fn from_26_6(value: i32) -> i32 {
    value >> 6
}

/// Byte range of the cluster starting at `glyphs[position]`
///
/// The cluster ends where the next glyph with a different cluster value
/// starts, in either shaping direction, or at the end of the text.
pub fn cluster_range(
    glyphs: &[ShapedGlyph],
    position: usize,
    text_len: usize,
) -> std::ops::Range<usize> {
    let start = glyphs[position].cluster as usize;
    let end = glyphs
        .iter()
        .map(|glyph| glyph.cluster as usize)
        .filter(|&cluster| cluster > start)
        .min()
        .unwrap_or(text_len);
    start.min(text_len)..end.min(text_len)
}
