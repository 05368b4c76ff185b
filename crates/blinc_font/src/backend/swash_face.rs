//! Font file backend using swash for rasterization and rustybuzz for shaping

use std::cell::RefCell;
use std::fmt;
use std::path::Path;

use swash::scale::{Render, ScaleContext, Source, StrikeWith};
use swash::scale::image::{Content, Image};
use swash::zeno::Format;
use swash::{CacheKey, FontRef};

use super::{
    downscale_bitmap, normalize_bitmap, select_bitmap_strike, FaceBackend, PixelMode,
    RasterizedGlyph, ShapeRequest, ShapedRun,
};
use crate::glyph::{FontMetrics, GlyphIndex};
use crate::shaping::{ShapedGlyph, TextDirection};
use crate::types::{FontStyle, FontWeight, Vector2i};
use crate::{FontError, Result};

/// A face parsed from TrueType/OpenType data
pub struct SwashFace {
    data: Vec<u8>,
    face_index: u32,
    offset: u32,
    cache_key: CacheKey,
    family: String,
    style: FontStyle,
    weight: FontWeight,
    /// ppem of each colour bitmap strike, by strike index
    strikes: Vec<u16>,
    strike_threshold: f32,
    scale_context: RefCell<ScaleContext>,
}

impl fmt::Debug for SwashFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwashFace")
            .field("family", &self.family)
            .field("style", &self.style)
            .field("weight", &self.weight)
            .field("face_index", &self.face_index)
            .field("strikes", &self.strikes)
            .finish_non_exhaustive()
    }
}

impl SwashFace {
    /// Parse face `face_index` of an in-memory font file
    ///
    /// `family` overrides the family name stored in the font.
    pub fn from_data(data: Vec<u8>, face_index: u32, family: Option<&str>) -> Result<Self> {
        let parsed = ttf_parser::Face::parse(&data, face_index)
            .map_err(|error| FontError::FaceParse(error.to_string()))?;

        let family = match family {
            Some(family) => family.to_owned(),
            None => family_name(&parsed)
                .ok_or_else(|| FontError::FaceParse("face has no family name".into()))?,
        };
        let style = if parsed.is_italic() || parsed.is_oblique() {
            FontStyle::Italic
        } else {
            FontStyle::Normal
        };
        let weight = FontWeight(parsed.weight().to_number());

        let font = FontRef::from_index(&data, face_index as usize)
            .ok_or_else(|| FontError::FaceParse(format!("no face at index {face_index}")))?;
        let (offset, cache_key) = (font.offset, font.key);
        let strikes = font.color_strikes().map(|strike| strike.ppem()).collect();

        tracing::debug!(%family, ?style, weight = weight.0, face_index, "parsed font face");
        Ok(Self {
            data,
            face_index,
            offset,
            cache_key,
            family,
            style,
            weight,
            strikes,
            strike_threshold: 0.95,
            scale_context: RefCell::new(ScaleContext::new()),
        })
    }

    pub fn from_file(path: &Path, face_index: u32, family: Option<&str>) -> Result<Self> {
        let data = std::fs::read(path).map_err(|error| FontError::FaceLoad {
            path: path.to_path_buf(),
            message: error.to_string(),
        })?;
        Self::from_data(data, face_index, family).map_err(|error| match error {
            FontError::FaceParse(message) => {
                FontError::FaceLoad { path: path.to_path_buf(), message }
            }
            other => other,
        })
    }

    /// Scale factor at or above which bitmap strikes are drawn unscaled
    pub fn with_strike_threshold(mut self, threshold: f32) -> Self {
        self.strike_threshold = threshold;
        self
    }

    pub fn has_colour_strikes(&self) -> bool {
        !self.strikes.is_empty()
    }

    fn font(&self) -> FontRef<'_> {
        FontRef { data: &self.data, offset: self.offset, key: self.cache_key }
    }

    fn advance(&self, glyph_index: GlyphIndex, size: u32) -> i32 {
        let Ok(glyph) = u16::try_from(glyph_index) else {
            return 0;
        };
        self.font().glyph_metrics(&[]).scale(size as f32).advance_width(glyph).round() as i32
    }

    fn render(&self, glyph: u16, size: f32, sources: &[Source]) -> Option<Image> {
        let mut context = self.scale_context.borrow_mut();
        let mut scaler = context.builder(self.font()).size(size).hint(true).build();
        Render::new(sources).format(Format::Alpha).render(&mut scaler, glyph)
    }

    /// Render from a colour bitmap strike, downscaling strikes larger than `size`
    fn render_strike(&self, glyph: u16, size: u32) -> Option<RasterizedGlyph> {
        let selection = select_bitmap_strike(&self.strikes, size, self.strike_threshold)?;
        let image = self.render(
            glyph,
            f32::from(selection.ppem),
            &[Source::ColorBitmap(StrikeWith::Index(selection.index as u32))],
        )?;
        let mut rasterized = rasterized_from_image(image, 0)?;
        if selection.scale < 1.0 {
            let source = Vector2i::new(rasterized.width as i32, rasterized.height as i32);
            let scaled = |value: i32| (value as f32 * selection.scale).round() as i32;
            let target = Vector2i::new(scaled(source.x).max(1), scaled(source.y).max(1));
            rasterized.bitmap =
                downscale_bitmap(&rasterized.bitmap, source, target, rasterized.format);
            rasterized.width = target.x as u32;
            rasterized.height = target.y as u32;
            rasterized.bearing_x = scaled(rasterized.bearing_x);
            rasterized.bearing_y = scaled(rasterized.bearing_y);
        }
        Some(rasterized)
    }
}

fn family_name(face: &ttf_parser::Face<'_>) -> Option<String> {
    let names = face.names();
    let find = |name_id| {
        names
            .into_iter()
            .filter(|name| name.name_id == name_id && name.is_unicode())
            .find_map(|name| name.to_string())
    };
    find(ttf_parser::name_id::TYPOGRAPHIC_FAMILY).or_else(|| find(ttf_parser::name_id::FAMILY))
}

fn rasterized_from_image(image: Image, advance: i32) -> Option<RasterizedGlyph> {
    let width = image.placement.width as usize;
    let height = image.placement.height as usize;
    let (bitmap, format) = match image.content {
        Content::Mask => normalize_bitmap(&image.data, width, height, width, PixelMode::Gray)?,
        Content::Color => normalize_bitmap(&image.data, width, height, width * 4, PixelMode::Rgba)?,
        Content::SubpixelMask => {
            tracing::warn!("unexpected subpixel mask from alpha render");
            return None;
        }
    };
    Some(RasterizedGlyph {
        bitmap,
        width: width as u32,
        height: height as u32,
        bearing_x: image.placement.left,
        bearing_y: image.placement.top,
        advance,
        format,
    })
}

impl FaceBackend for SwashFace {
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
        GlyphIndex::from(self.font().charmap().map(character))
    }

    fn metrics(&self, size: u32) -> Option<FontMetrics> {
        let metrics = self.font().metrics(&[]);
        if size == 0 || metrics.units_per_em == 0 {
            return None;
        }
        let scaled = metrics.scale(size as f32);
        let descent = scaled.descent.abs();
        Some(FontMetrics {
            size,
            ascent: scaled.ascent.round(),
            descent: descent.round(),
            line_spacing: (scaled.ascent + descent + scaled.leading).round(),
            x_height: scaled.x_height.round(),
            underline_position: -scaled.underline_offset,
            underline_thickness: scaled.stroke_size.max(1.0),
        })
    }

    fn render_glyph(&self, glyph_index: GlyphIndex, size: u32) -> Option<RasterizedGlyph> {
        let glyph = u16::try_from(glyph_index).ok()?;
        let advance = self.advance(glyph_index, size);

        let sources = [Source::ColorOutline(0), Source::Outline];
        if let Some(image) = self.render(glyph, size as f32, &sources) {
            return rasterized_from_image(image, advance);
        }
        if let Some(mut rasterized) = self.render_strike(glyph, size) {
            rasterized.advance = advance;
            return Some(rasterized);
        }

        // Glyphs without an outline, such as spaces, still advance the pen
        let empty = self.font().glyph_metrics(&[]).scale(size as f32);
        if glyph_index != 0 && empty.advance_width(glyph) > 0.0 {
            return Some(RasterizedGlyph { advance, ..RasterizedGlyph::default() });
        }
        tracing::trace!(family = %self.family, glyph_index, size, "glyph has no renderable source");
        None
    }

    fn kerning(&self, size: u32, left: GlyphIndex, right: GlyphIndex) -> i32 {
        let (Ok(left), Ok(right)) = (u16::try_from(left), u16::try_from(right)) else {
            return 0;
        };
        let Ok(face) = ttf_parser::Face::parse(&self.data, self.face_index) else {
            return 0;
        };
        let Some(kern) = face.tables().kern else {
            return 0;
        };
        let units = kern
            .subtables
            .into_iter()
            .filter(|subtable| subtable.horizontal && !subtable.variable)
            .find_map(|subtable| {
                subtable.glyphs_kerning(ttf_parser::GlyphId(left), ttf_parser::GlyphId(right))
            })
            .unwrap_or(0);
        let units_per_em = f32::from(face.units_per_em().max(1));
        (f32::from(units) * size as f32 / units_per_em).round() as i32
    }

    fn shape(&self, text: &str, size: u32, request: &ShapeRequest<'_>) -> Option<ShapedRun> {
        let face = rustybuzz::Face::from_slice(&self.data, self.face_index)?;

        let mut buffer = rustybuzz::UnicodeBuffer::new();
        buffer.push_str(text);
        if let Ok(language) = request.language.parse::<rustybuzz::Language>() {
            buffer.set_language(language);
        }
        let script = request.script.and_then(|tag| {
            rustybuzz::Script::from_iso15924_tag(rustybuzz::ttf_parser::Tag::from_bytes(&tag))
        });
        if let Some(script) = script {
            buffer.set_script(script);
        }
        match request.direction {
            TextDirection::LeftToRight => buffer.set_direction(rustybuzz::Direction::LeftToRight),
            TextDirection::RightToLeft => buffer.set_direction(rustybuzz::Direction::RightToLeft),
            TextDirection::Auto => {}
        }
        buffer.guess_segment_properties();
        let direction = match buffer.direction() {
            rustybuzz::Direction::RightToLeft => TextDirection::RightToLeft,
            _ => TextDirection::LeftToRight,
        };

        let features = if request.kerning {
            Vec::new()
        } else {
            vec![rustybuzz::Feature::new(rustybuzz::ttf_parser::Tag::from_bytes(b"kern"), 0, ..)]
        };
        let output = rustybuzz::shape(&face, &features, buffer);

        // Font units to 26.6 pixels
        let scale = size as f32 * 64.0 / face.units_per_em().max(1) as f32;
        let to_26_6 = |value: i32| (value as f32 * scale).round() as i32;
        let glyphs = output
            .glyph_infos()
            .iter()
            .zip(output.glyph_positions())
            .map(|(info, position)| ShapedGlyph {
                glyph_index: info.glyph_id,
                cluster: info.cluster,
                x_advance: to_26_6(position.x_advance),
                y_advance: to_26_6(position.y_advance),
                x_offset: to_26_6(position.x_offset),
                y_offset: to_26_6(position.y_offset),
            })
            .collect();
        Some(ShapedRun { glyphs, direction })
    }
}
