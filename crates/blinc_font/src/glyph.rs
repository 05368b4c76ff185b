//! Glyph records and face metrics

use indexmap::IndexMap;
use rustc_hash::{FxBuildHasher, FxHashMap};

use crate::handle::HandleId;
use crate::types::{Vector2f, Vector2i};

/// Face-specific glyph index. Index 0 is reserved for "not present"
pub type GlyphIndex = u32;

/// U+FFFD, drawn for characters no face can render
pub const REPLACEMENT_CHARACTER: char = '\u{FFFD}';

/// Pixel format of a glyph bitmap
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ColorFormat {
    /// 8-bit coverage
    #[default]
    A8,
    /// 32-bit premultiplied RGBA
    Rgba8,
}

impl ColorFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            ColorFormat::A8 => 1,
            ColorFormat::Rgba8 => 4,
        }
    }
}

/// Address of an owned glyph bitmap inside another handle's glyph map
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GlyphLocation {
    pub handle: HandleId,
    pub glyph_index: GlyphIndex,
}

/// Pixel storage of a glyph
///
/// Fallback glyphs copied into another handle's cache hold a
/// [`GlyphBitmap::Borrowed`] location instead of duplicating pixels. Locations
/// resolve through the provider and yield nothing once the owning handle is
/// released.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum GlyphBitmap {
    #[default]
    Empty,
    Owned(Vec<u8>),
    Borrowed(GlyphLocation),
}

/// Resolves borrowed glyph bitmaps to their owner's pixels
pub trait GlyphBitmapSource {
    fn borrowed_pixels(&self, location: GlyphLocation) -> Option<&[u8]>;
}

/// Resolver that knows no other handles
pub struct OwnedBitmapsOnly;

impl GlyphBitmapSource for OwnedBitmapsOnly {
    fn borrowed_pixels(&self, _location: GlyphLocation) -> Option<&[u8]> {
        None
    }
}

/// A rasterized glyph at one pixel size
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FontGlyph {
    /// Bitmap dimensions in pixels
    pub dimensions: Vector2i,
    /// Offset from the pen position to the bitmap's top-left corner, y up
    pub bearing: Vector2i,
    /// Horizontal pen movement in pixels
    pub advance: i32,
    pub color_format: ColorFormat,
    pub bitmap: GlyphBitmap,
}

impl FontGlyph {
    /// Copy of this glyph's metrics that borrows its pixels from `location`
    ///
    /// Copying an already borrowed glyph keeps pointing at the original owner
    /// so locations never chain.
    pub fn weak_copy(&self, location: GlyphLocation) -> FontGlyph {
        let bitmap = match &self.bitmap {
            GlyphBitmap::Empty => GlyphBitmap::Empty,
            GlyphBitmap::Owned(_) => GlyphBitmap::Borrowed(location),
            GlyphBitmap::Borrowed(owner) => GlyphBitmap::Borrowed(*owner),
        };
        FontGlyph {
            dimensions: self.dimensions,
            bearing: self.bearing,
            advance: self.advance,
            color_format: self.color_format,
            bitmap,
        }
    }

    pub fn owned_pixels(&self) -> Option<&[u8]> {
        match &self.bitmap {
            GlyphBitmap::Owned(data) => Some(data),
            _ => None,
        }
    }

    /// Pixel view of this glyph, resolving borrowed bitmaps through `source`
    pub fn image<'a>(&'a self, source: &'a dyn GlyphBitmapSource) -> Option<GlyphImage<'a>> {
        let data = match &self.bitmap {
            GlyphBitmap::Empty => return None,
            GlyphBitmap::Owned(data) => data.as_slice(),
            GlyphBitmap::Borrowed(location) => source.borrowed_pixels(*location)?,
        };
        let expected = self.dimensions.area() * self.color_format.bytes_per_pixel();
        if data.len() < expected {
            return None;
        }
        Some(GlyphImage { dimensions: self.dimensions, format: self.color_format, data })
    }

    /// Synthesized stand-in for U+FFFD: a box outline, one pixel wide
    pub fn replacement(size: u32) -> FontGlyph {
        let size = size as i32;
        let dimensions = Vector2i::new((size / 3).max(1), ((size * 2) / 3).max(1));
        let mut pixels = vec![0u8; dimensions.area()];
        for y in 0..dimensions.y {
            for x in 0..dimensions.x {
                let near_edge = x < 1 || x >= dimensions.x - 1 || y < 1 || y >= dimensions.y - 1;
                if near_edge {
                    pixels[(y * dimensions.x + x) as usize] = 0xdd;
                }
            }
        }

        FontGlyph {
            dimensions,
            bearing: Vector2i::new(1, dimensions.y),
            advance: dimensions.x + 2,
            color_format: ColorFormat::A8,
            bitmap: GlyphBitmap::Owned(pixels),
        }
    }
}

/// Borrowed pixels of a glyph, tightly packed
#[derive(Clone, Copy, Debug)]
pub struct GlyphImage<'a> {
    pub dimensions: Vector2i,
    pub format: ColorFormat,
    pub data: &'a [u8],
}

impl GlyphImage<'_> {
    pub fn row_bytes(&self) -> usize {
        self.dimensions.x.max(0) as usize * self.format.bytes_per_pixel()
    }
}

/// Identity of a glyph box inside a layer
///
/// Packs into `glyph_index << 32 | character`, with bit 31 flagging glyphs that
/// belong to a fallback cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GlyphId {
    pub index: GlyphIndex,
    pub character: char,
    pub cluster: bool,
}

const CLUSTER_BIT: u64 = 1 << 31;

impl GlyphId {
    pub const fn new(index: GlyphIndex, character: char) -> Self {
        Self { index, character, cluster: false }
    }

    pub const fn cluster(index: GlyphIndex, character: char) -> Self {
        Self { index, character, cluster: true }
    }

    pub fn key(self) -> u64 {
        let mut key = (u64::from(self.index) << 32) | u64::from(u32::from(self.character));
        if self.cluster {
            key |= CLUSTER_BIT;
        }
        key
    }

    pub fn from_key(key: u64) -> Option<Self> {
        let character = char::from_u32((key & 0x7fff_ffff) as u32)?;
        Some(Self { index: (key >> 32) as u32, character, cluster: key & CLUSTER_BIT != 0 })
    }
}

/// A glyph in a handle's primary map with the character it was built for
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CachedGlyph {
    pub glyph: FontGlyph,
    pub character: char,
}

/// One glyph of a cluster rendered by a fallback face
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterGlyph {
    pub glyph_index: GlyphIndex,
    pub character: char,
    pub glyph: FontGlyph,
    /// Pen movement reported by the fallback face's shaper
    pub advance: i32,
    /// Shaper offset from the pen, y up
    pub offset: Vector2i,
}

impl ClusterGlyph {
    pub fn id(&self) -> GlyphId {
        GlyphId::cluster(self.glyph_index, self.character)
    }
}

pub type GlyphMap = IndexMap<GlyphIndex, CachedGlyph, FxBuildHasher>;
pub type FallbackGlyphMap = IndexMap<char, FontGlyph, FxBuildHasher>;
pub type ClusterGlyphMap = IndexMap<String, Vec<ClusterGlyph>, FxBuildHasher>;
/// Cluster glyph id key to (cluster position, glyph position) in a [`ClusterGlyphMap`]
pub type ClusterLookup = FxHashMap<u64, (usize, usize)>;

/// Read-only view of every glyph a handle can draw
#[derive(Clone, Copy)]
pub struct GlyphMaps<'a> {
    pub glyphs: &'a GlyphMap,
    pub fallback_glyphs: &'a FallbackGlyphMap,
    pub fallback_cluster_glyphs: &'a ClusterGlyphMap,
    pub cluster_lookup: &'a ClusterLookup,
}

impl<'a> GlyphMaps<'a> {
    /// Every glyph with its layer id: primary glyphs, then fallback glyphs,
    /// then cluster glyphs, each in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (GlyphId, &'a FontGlyph)> + 'a {
        let glyphs = self
            .glyphs
            .iter()
            .map(|(&index, cached)| (GlyphId::new(index, cached.character), &cached.glyph));
        let fallback = self
            .fallback_glyphs
            .iter()
            .map(|(&character, glyph)| (GlyphId::new(0, character), glyph));
        // Clusters repeating a glyph id contribute only the copy the lookup resolves to
        let lookup = self.cluster_lookup;
        let clusters = self
            .fallback_cluster_glyphs
            .values()
            .enumerate()
            .flat_map(|(cluster, glyphs)| {
                glyphs.iter().enumerate().map(move |(position, glyph)| (cluster, position, glyph))
            })
            .filter(move |&(cluster, position, glyph)| {
                lookup.get(&glyph.id().key()) == Some(&(cluster, position))
            })
            .map(|(_, _, cluster_glyph)| (cluster_glyph.id(), &cluster_glyph.glyph));
        glyphs.chain(fallback).chain(clusters)
    }

    /// Glyph backing a layer id
    ///
    /// Index 0 resolves to the fallback glyph for the character if there is
    /// one, otherwise to the replacement glyph.
    pub fn lookup(&self, id: GlyphId) -> Option<&'a FontGlyph> {
        if id.cluster {
            let &(cluster, position) = self.cluster_lookup.get(&id.key())?;
            let (_, glyphs) = self.fallback_cluster_glyphs.get_index(cluster)?;
            return glyphs.get(position).map(|cluster_glyph| &cluster_glyph.glyph);
        }
        if id.index != 0 {
            return self.glyphs.get(&id.index).map(|cached| &cached.glyph);
        }
        self.fallback_glyphs
            .get(&id.character)
            .or_else(|| self.glyphs.get(&0).map(|cached| &cached.glyph))
    }
}

/// Vertical metrics of a face at one pixel size
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FontMetrics {
    pub size: u32,
    pub ascent: f32,
    pub descent: f32,
    pub line_spacing: f32,
    pub x_height: f32,
    pub underline_position: f32,
    pub underline_thickness: f32,
}

impl FontMetrics {
    /// Pen offset of the baseline from the top of a line box
    pub fn baseline(&self) -> Vector2f {
        Vector2f::new(0.0, self.ascent)
    }
}
