//! Face backends: the rasterizer and shaper behind a loaded face
//!
//! [`SwashFace`] renders real font files. [`ProceduralFace`] draws solid
//! boxes for a fixed character set and serves headless rendering and tests.

mod procedural;
mod swash_face;

pub use self::procedural::ProceduralFace;
pub use self::swash_face::SwashFace;

use crate::glyph::{ColorFormat, FontGlyph, FontMetrics, GlyphBitmap, GlyphIndex};
use crate::shaping::{ShapedGlyph, TextDirection};
use crate::types::{FontStyle, FontWeight, Vector2i};

/// A rasterized glyph as produced by a backend, already normalized
#[derive(Debug, Clone, Default)]
pub struct RasterizedGlyph {
    /// A8 coverage or premultiplied RGBA8, rows tightly packed
    pub bitmap: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Offset from the pen to the left edge
    pub bearing_x: i32,
    /// Offset from the baseline to the top edge, y up
    pub bearing_y: i32,
    /// Horizontal advance in pixels
    pub advance: i32,
    pub format: ColorFormat,
}

impl From<RasterizedGlyph> for FontGlyph {
    fn from(glyph: RasterizedGlyph) -> Self {
        let dimensions = Vector2i::new(glyph.width as i32, glyph.height as i32);
        let bitmap = if dimensions.area() == 0 || glyph.bitmap.is_empty() {
            GlyphBitmap::Empty
        } else {
            GlyphBitmap::Owned(glyph.bitmap)
        };
        FontGlyph {
            dimensions,
            bearing: Vector2i::new(glyph.bearing_x, glyph.bearing_y),
            advance: glyph.advance,
            color_format: glyph.format,
            bitmap,
        }
    }
}

/// Script and direction registered for a language tag
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LanguageData {
    /// ISO 15924 tag, e.g. `*b"Arab"`
    pub script: Option<[u8; 4]>,
    pub direction: TextDirection,
}

/// Parameters of one shaping call
#[derive(Clone, Copy, Debug, Default)]
pub struct ShapeRequest<'a> {
    pub language: &'a str,
    pub script: Option<[u8; 4]>,
    pub direction: TextDirection,
    pub kerning: bool,
}

/// Output of a shaping call, in visual order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShapedRun {
    pub glyphs: Vec<ShapedGlyph>,
    /// Resolved direction, never [`TextDirection::Auto`]
    pub direction: TextDirection,
}

/// A loaded font face
///
/// Every method is a query; backends keep any scratch state behind interior
/// mutability so handles can share one face at several sizes.
pub trait FaceBackend {
    fn family_name(&self) -> &str;

    fn style(&self) -> FontStyle;

    fn weight(&self) -> FontWeight;

    /// Glyph for `character`, 0 when the face has none
    fn glyph_index(&self, character: char) -> GlyphIndex;

    /// Metrics at `size` pixels, `None` if the face cannot be used at that size
    fn metrics(&self, size: u32) -> Option<FontMetrics>;

    /// Rasterize a glyph, `None` on failure
    fn render_glyph(&self, glyph_index: GlyphIndex, size: u32) -> Option<RasterizedGlyph>;

    /// Pair kerning in pixels
    fn kerning(&self, _size: u32, _left: GlyphIndex, _right: GlyphIndex) -> i32 {
        0
    }

    /// Shape `text`, `None` when the backend has no shaping engine
    fn shape(&self, _text: &str, _size: u32, _request: &ShapeRequest<'_>) -> Option<ShapedRun> {
        None
    }
}

/// Source pixel layout of a backend bitmap
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelMode {
    /// 1 bit per pixel, most significant bit first
    Mono,
    /// 8-bit coverage
    Gray,
    /// 32-bit premultiplied BGRA
    Bgra,
    /// 32-bit straight-alpha RGBA
    Rgba,
}

/// Convert backend pixels with row `pitch` into tightly packed A8 or
/// premultiplied RGBA8
///
/// Returns `None` if `data` is too short for the given geometry.
pub fn normalize_bitmap(
    data: &[u8],
    width: usize,
    height: usize,
    pitch: usize,
    mode: PixelMode,
) -> Option<(Vec<u8>, ColorFormat)> {
    let source_row = match mode {
        PixelMode::Mono => width.div_ceil(8),
        PixelMode::Gray => width,
        PixelMode::Bgra | PixelMode::Rgba => width * 4,
    };
    if height > 0 && (pitch < source_row || data.len() < pitch * (height - 1) + source_row) {
        return None;
    }
    let rows = (0..height).map(|y| &data[y * pitch..y * pitch + source_row]);

    match mode {
        PixelMode::Mono => {
            let mut pixels = Vec::with_capacity(width * height);
            for row in rows {
                let bit = |x: usize| row[x / 8] & (0x80 >> (x % 8)) != 0;
                pixels.extend((0..width).map(|x| if bit(x) { 255 } else { 0 }));
            }
            Some((pixels, ColorFormat::A8))
        }
        PixelMode::Gray => Some((rows.flatten().copied().collect(), ColorFormat::A8)),
        PixelMode::Bgra => {
            let mut pixels = Vec::with_capacity(width * height * 4);
            for row in rows {
                for bgra in row.chunks_exact(4) {
                    pixels.extend_from_slice(&[bgra[2], bgra[1], bgra[0], bgra[3]]);
                }
            }
            Some((pixels, ColorFormat::Rgba8))
        }
        PixelMode::Rgba => {
            let mut pixels = Vec::with_capacity(width * height * 4);
            for row in rows {
                for rgba in row.chunks_exact(4) {
                    let alpha = u16::from(rgba[3]);
                    let premultiply =
                        |channel: u8| ((u16::from(channel) * alpha + 127) / 255) as u8;
                    pixels.extend_from_slice(&[
                        premultiply(rgba[0]),
                        premultiply(rgba[1]),
                        premultiply(rgba[2]),
                        rgba[3],
                    ]);
                }
            }
            Some((pixels, ColorFormat::Rgba8))
        }
    }
}

/// Bitmap strike picked for a requested pixel size
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrikeSelection {
    pub index: usize,
    pub ppem: u16,
    /// Factor to scale strike bitmaps by, never above 1
    pub scale: f32,
}

/// Pick the smallest strike at least `size` pixels tall, else the largest
///
/// Scale factors at or above `threshold` are rounded up to 1 so near-matching
/// strikes are used unscaled. Strikes are only ever scaled down.
pub fn select_bitmap_strike(strikes: &[u16], size: u32, threshold: f32) -> Option<StrikeSelection> {
    let size = size as i64;
    let (index, &ppem) = strikes.iter().enumerate().min_by_key(|&(_, &ppem)| {
        let difference = i64::from(ppem) - size;
        if difference < 0 {
            (1, -difference)
        } else {
            (0, difference)
        }
    })?;

    let mut scale = size as f32 / f32::from(ppem.max(1));
    if scale >= threshold {
        scale = 1.0;
    }
    Some(StrikeSelection { index, ppem, scale })
}

/// Area-average downscale of a tightly packed bitmap
pub fn downscale_bitmap(
    source: &[u8],
    source_dimensions: Vector2i,
    target_dimensions: Vector2i,
    format: ColorFormat,
) -> Vec<u8> {
    let channels = format.bytes_per_pixel();
    let (sw, sh) = (source_dimensions.x.max(0) as usize, source_dimensions.y.max(0) as usize);
    let (tw, th) = (target_dimensions.x.max(0) as usize, target_dimensions.y.max(0) as usize);
    let mut target = vec![0u8; tw * th * channels];
    if sw == 0 || sh == 0 || tw == 0 || th == 0 || source.len() < sw * sh * channels {
        return target;
    }

    let x_ratio = sw as f32 / tw as f32;
    let y_ratio = sh as f32 / th as f32;
    for ty in 0..th {
        let y0 = ty as f32 * y_ratio;
        let y1 = y0 + y_ratio;
        for tx in 0..tw {
            let x0 = tx as f32 * x_ratio;
            let x1 = x0 + x_ratio;
            let mut sum = [0f32; 4];
            let mut weight_total = 0.0;

            for sy in y0.floor() as usize..(y1.ceil() as usize).min(sh) {
                let wy = (y1.min(sy as f32 + 1.0) - y0.max(sy as f32)).max(0.0);
                for sx in x0.floor() as usize..(x1.ceil() as usize).min(sw) {
                    let wx = (x1.min(sx as f32 + 1.0) - x0.max(sx as f32)).max(0.0);
                    let weight = wx * wy;
                    let pixel = (sy * sw + sx) * channels;
                    for c in 0..channels {
                        sum[c] += f32::from(source[pixel + c]) * weight;
                    }
                    weight_total += weight;
                }
            }

            let pixel = (ty * tw + tx) * channels;
            for c in 0..channels {
                let average = sum[c] / weight_total.max(f32::EPSILON);
                target[pixel + c] = average.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    target
}
