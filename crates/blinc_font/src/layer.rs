//! One rendering pass of a font face handle
//!
//! A layer is either the plain glyphs or one font effect. It owns a texture
//! layout and a box per glyph giving the quad to emit relative to the pen.
//! Layers that reposition the base glyphs, or render exactly like another
//! layer, share that layer's textures instead of packing their own.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::effect::{FontEffect, GlyphBox};
use crate::glyph::{ColorFormat, FontGlyph, GlyphBitmapSource, GlyphId, GlyphImage, GlyphMaps};
use crate::handle::HandleId;
use crate::mesh::TexturedMesh;
use crate::texture::{TextureData, TextureError, TextureRequest};
use crate::texture_layout::TextureLayout;
use crate::types::{Colourb, ColourbPremultiplied, Vector2f, Vector2i};
use crate::Result;

/// Index of a layer in its handle, in creation order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub(crate) usize);

impl LayerId {
    /// The effect-less layer every handle creates first
    pub const BASE: LayerId = LayerId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// Quad of one glyph inside a layer
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TextureBox {
    /// Offset of the quad's top-left corner from the pen position
    pub origin: Vector2f,
    pub dimensions: Vector2f,
    /// Top-left and bottom-right texture coordinates
    pub texcoords: [Vector2f; 2],
    /// `None` draws nothing for the glyph
    pub texture_index: Option<usize>,
}

/// An atlas texture a layer draws from
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerTexture {
    pub request: TextureRequest,
    pub dimensions: Vector2i,
}

/// Handle state a layer needs while generating
#[derive(Clone, Copy, Debug)]
pub(crate) struct LayerContext {
    pub handle: HandleId,
    pub version: u32,
    pub max_texture_dimensions: i32,
}

/// Boxes and textures copied from another layer
pub(crate) struct CloneSource {
    boxes: FxHashMap<u64, TextureBox>,
    textures: Rc<[LayerTexture]>,
}

#[derive(Debug)]
pub struct FontFaceLayer {
    id: LayerId,
    effect: Option<Rc<dyn FontEffect>>,
    colour: Colourb,
    texture_layout: TextureLayout,
    character_boxes: FxHashMap<u64, TextureBox>,
    textures: Rc<[LayerTexture]>,
    owns_textures: bool,
}

impl FontFaceLayer {
    pub(crate) fn new(id: LayerId, effect: Option<Rc<dyn FontEffect>>) -> Self {
        let colour = effect.as_ref().map_or(Colourb::WHITE, |effect| effect.colour());
        Self {
            id,
            effect,
            colour,
            texture_layout: TextureLayout::new(),
            character_boxes: FxHashMap::default(),
            textures: Rc::from(Vec::new()),
            owns_textures: false,
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn effect(&self) -> Option<&Rc<dyn FontEffect>> {
        self.effect.as_ref()
    }

    /// Textures this layer draws from, shared with the layer it cloned
    pub fn textures(&self) -> &Rc<[LayerTexture]> {
        &self.textures
    }

    pub fn num_textures(&self) -> usize {
        self.textures.len()
    }

    /// Whether the textures were packed by this layer rather than cloned
    pub fn owns_textures(&self) -> bool {
        self.owns_textures
    }

    pub fn character_box(&self, id: GlyphId) -> Option<&TextureBox> {
        self.character_boxes.get(&id.key())
    }

    /// Layer colour after applying `opacity`
    pub fn colour(&self, opacity: f32) -> ColourbPremultiplied {
        self.colour.to_premultiplied(opacity)
    }

    pub(crate) fn clone_source(&self) -> CloneSource {
        CloneSource { boxes: self.character_boxes.clone(), textures: Rc::clone(&self.textures) }
    }

    /// Rebuild the layer from the handle's current glyphs
    ///
    /// With a clone source the boxes and textures are copied; unless
    /// `clone_glyph_origins` is set the effect then repositions every box.
    /// Without one, glyphs are packed into fresh textures. An atlas overflow
    /// still leaves the glyphs that fit drawable.
    pub(crate) fn generate(
        &mut self,
        context: LayerContext,
        maps: GlyphMaps<'_>,
        clone: Option<CloneSource>,
        clone_glyph_origins: bool,
    ) -> Result<()> {
        self.texture_layout = TextureLayout::new();
        self.character_boxes.clear();

        if let Some(clone) = clone {
            self.character_boxes = clone.boxes;
            self.textures = clone.textures;
            self.owns_textures = false;

            if let (Some(effect), false) = (&self.effect, clone_glyph_origins) {
                for (id, glyph) in maps.iter() {
                    // Glyphs added since the source was generated have no box yet
                    let Some(texture_box) = self.character_boxes.get_mut(&id.key()) else {
                        continue;
                    };
                    let (origin, dimensions) = (texture_box.origin, texture_box.dimensions);
                    let glyph_box = GlyphBox {
                        origin: Vector2i::new(origin.x as i32, origin.y as i32),
                        dimensions: Vector2i::new(dimensions.x as i32, dimensions.y as i32),
                    };
                    match effect.glyph_metrics(glyph_box, glyph) {
                        Some(adjusted) => texture_box.origin = adjusted.origin.to_f32(),
                        None => texture_box.texture_index = None,
                    }
                }
            }
            return Ok(());
        }

        for (id, glyph) in maps.iter() {
            self.add_glyph_box(id, glyph);
        }

        let layout_result = self.texture_layout.generate_layout(context.max_texture_dimensions);

        for rectangle in self.texture_layout.rectangles() {
            let Some(placement) = rectangle.placement() else {
                continue;
            };
            let Some(texture) = self.texture_layout.texture(placement.texture_index) else {
                continue;
            };
            let Some(texture_box) = self.character_boxes.get_mut(&rectangle.id()) else {
                debug_assert!(false, "packed rectangle without a glyph box");
                continue;
            };
            let size = texture.dimensions().to_f32();
            let position = placement.position.to_f32();
            let dimensions = rectangle.dimensions().to_f32();

            texture_box.texture_index = Some(placement.texture_index);
            texture_box.texcoords = [
                Vector2f::new(position.x / size.x, position.y / size.y),
                Vector2f::new(
                    (position.x + dimensions.x) / size.x,
                    (position.y + dimensions.y) / size.y,
                ),
            ];
        }

        self.textures = self
            .texture_layout
            .textures()
            .iter()
            .enumerate()
            .map(|(texture_index, texture)| LayerTexture {
                request: TextureRequest {
                    handle: context.handle,
                    layer: self.id,
                    texture_index,
                    version: context.version,
                },
                dimensions: texture.dimensions(),
            })
            .collect();
        self.owns_textures = true;

        tracing::debug!(
            layer = self.id.0,
            glyphs = self.character_boxes.len(),
            textures = self.textures.len(),
            version = context.version,
            "font face layer generated"
        );
        layout_result
    }

    fn add_glyph_box(&mut self, id: GlyphId, glyph: &FontGlyph) {
        let mut glyph_box = GlyphBox { origin: Vector2i::ZERO, dimensions: glyph.dimensions };
        if let Some(effect) = &self.effect {
            match effect.glyph_metrics(glyph_box, glyph) {
                Some(adjusted) => glyph_box = adjusted,
                None => return,
            }
        }

        debug_assert!(glyph_box.dimensions.x >= 0 && glyph_box.dimensions.y >= 0);
        let texture_box = TextureBox {
            origin: Vector2f::new(
                (glyph_box.origin.x + glyph.bearing.x) as f32,
                (glyph_box.origin.y - glyph.bearing.y) as f32,
            ),
            dimensions: glyph_box.dimensions.to_f32(),
            ..TextureBox::default()
        };
        self.character_boxes.insert(id.key(), texture_box);
        self.texture_layout.add_rectangle(id.key(), glyph_box.dimensions);
    }

    /// Render the pixels of one of this layer's own textures
    pub(crate) fn generate_texture(
        &self,
        texture_index: usize,
        maps: GlyphMaps<'_>,
        bitmaps: &dyn GlyphBitmapSource,
    ) -> std::result::Result<TextureData, TextureError> {
        let texture = self
            .texture_layout
            .texture(texture_index)
            .ok_or(TextureError::UnknownTexture(texture_index))?;
        let mut pixels = texture.allocate_texture();

        for rectangle in self.texture_layout.texture_rectangles(texture_index) {
            let Some(placement) = rectangle.placement() else {
                continue;
            };
            let Some(glyph) = GlyphId::from_key(rectangle.id()).and_then(|id| maps.lookup(id))
            else {
                continue;
            };
            let Some(image) = glyph.image(bitmaps) else {
                continue;
            };
            let Some(destination) = pixels.get_mut(placement.texture_offset..) else {
                continue;
            };

            let stride = placement.texture_stride;
            match &self.effect {
                None => copy_glyph_pixels(destination, stride, image),
                Some(effect) => {
                    let dimensions = rectangle.dimensions();
                    effect.generate_glyph_texture(destination, dimensions, stride, image)
                }
            }
        }

        Ok(TextureData { dimensions: texture.dimensions(), pixels })
    }

    /// Emit the quad of glyph `id` at pen `position`
    ///
    /// `meshes` holds this layer's meshes, one per texture.
    pub(crate) fn generate_geometry(
        &self,
        meshes: &mut [TexturedMesh],
        id: GlyphId,
        position: Vector2f,
        colour: ColourbPremultiplied,
    ) {
        let Some(texture_box) = self.character_boxes.get(&id.key()) else {
            return;
        };
        if texture_box.dimensions.x <= 0.0 || texture_box.dimensions.y <= 0.0 {
            return;
        }
        let Some(mesh) = texture_box.texture_index.and_then(|index| meshes.get_mut(index)) else {
            return;
        };
        mesh.mesh.push_quad(
            (position + texture_box.origin).round(),
            texture_box.dimensions,
            colour,
            texture_box.texcoords[0],
            texture_box.texcoords[1],
        );
    }
}

/// Copy a glyph into an RGBA8 region, broadcasting coverage for A8 glyphs
fn copy_glyph_pixels(destination: &mut [u8], stride: usize, image: GlyphImage<'_>) {
    let row_bytes = image.row_bytes();
    if row_bytes == 0 {
        return;
    }

    let rows = image.data.chunks_exact(row_bytes).take(image.dimensions.y.max(0) as usize);
    for (y, source) in rows.enumerate() {
        let Some(row) = destination.get_mut(y * stride..) else {
            return;
        };
        match image.format {
            ColorFormat::A8 => {
                for (pixel, &alpha) in row.chunks_exact_mut(4).zip(source) {
                    pixel.fill(alpha);
                }
            }
            ColorFormat::Rgba8 => {
                if let Some(row) = row.get_mut(..row_bytes) {
                    row.copy_from_slice(source);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{OutlineEffect, ShadowEffect};
    use crate::glyph::{
        CachedGlyph, ClusterGlyphMap, ClusterLookup, FallbackGlyphMap, GlyphBitmap, GlyphMap,
        OwnedBitmapsOnly,
    };

    fn solid_glyph(width: i32, height: i32, alpha: u8) -> FontGlyph {
        FontGlyph {
            dimensions: Vector2i::new(width, height),
            bearing: Vector2i::new(1, height),
            advance: width + 2,
            color_format: ColorFormat::A8,
            bitmap: GlyphBitmap::Owned(vec![alpha; (width * height) as usize]),
        }
    }

    struct Glyphs {
        glyphs: GlyphMap,
        fallback: FallbackGlyphMap,
        clusters: ClusterGlyphMap,
        lookup: ClusterLookup,
    }

    impl Glyphs {
        fn new() -> Self {
            let mut glyphs = GlyphMap::default();
            glyphs.insert(1, CachedGlyph { glyph: solid_glyph(4, 6, 200), character: 'a' });
            glyphs.insert(2, CachedGlyph { glyph: solid_glyph(3, 0, 0), character: ' ' });
            let mut fallback = FallbackGlyphMap::default();
            fallback.insert('ß', solid_glyph(5, 7, 100));
            Self {
                glyphs,
                fallback,
                clusters: ClusterGlyphMap::default(),
                lookup: ClusterLookup::default(),
            }
        }

        fn maps(&self) -> GlyphMaps<'_> {
            GlyphMaps {
                glyphs: &self.glyphs,
                fallback_glyphs: &self.fallback,
                fallback_cluster_glyphs: &self.clusters,
                cluster_lookup: &self.lookup,
            }
        }
    }

    fn context() -> LayerContext {
        LayerContext { handle: HandleId(0), version: 4, max_texture_dimensions: 1024 }
    }

    #[test]
    fn test_base_layer_boxes_and_textures() {
        let glyphs = Glyphs::new();
        let mut layer = FontFaceLayer::new(LayerId::BASE, None);
        layer.generate(context(), glyphs.maps(), None, false).unwrap();

        assert!(layer.owns_textures());
        assert_eq!(layer.num_textures(), 1);
        assert_eq!(layer.textures()[0].request.version, 4);

        let a = layer.character_box(GlyphId::new(1, 'a')).unwrap();
        assert_eq!(a.origin, Vector2f::new(1.0, -6.0));
        assert_eq!(a.dimensions, Vector2f::new(4.0, 6.0));
        assert_eq!(a.texture_index, Some(0));
        assert!(layer.character_box(GlyphId::new(0, 'ß')).is_some());
    }

    #[test]
    fn test_base_texture_broadcasts_alpha() {
        let glyphs = Glyphs::new();
        let mut layer = FontFaceLayer::new(LayerId::BASE, None);
        layer.generate(context(), glyphs.maps(), None, false).unwrap();

        let data = layer.generate_texture(0, glyphs.maps(), &OwnedBitmapsOnly).unwrap();
        let a = layer.character_box(GlyphId::new(1, 'a')).unwrap();
        let x = (a.texcoords[0].x * data.dimensions.x as f32) as usize;
        let y = (a.texcoords[0].y * data.dimensions.y as f32) as usize;
        let offset = (y * data.dimensions.x as usize + x) * 4;
        assert_eq!(&data.pixels[offset..offset + 4], &[200, 200, 200, 200]);

        assert_eq!(
            layer.generate_texture(3, glyphs.maps(), &OwnedBitmapsOnly),
            Err(TextureError::UnknownTexture(3))
        );
    }

    #[test]
    fn test_effect_skips_empty_glyphs() {
        let glyphs = Glyphs::new();
        let effect: Rc<dyn FontEffect> = Rc::new(OutlineEffect::new(2).unwrap());
        let mut layer = FontFaceLayer::new(LayerId(1), Some(effect));
        layer.generate(context(), glyphs.maps(), None, false).unwrap();

        assert!(layer.character_box(GlyphId::new(2, ' ')).is_none());
        let a = layer.character_box(GlyphId::new(1, 'a')).unwrap();
        assert_eq!(a.origin, Vector2f::new(-1.0, -8.0));
        assert_eq!(a.dimensions, Vector2f::new(8.0, 10.0));
    }

    #[test]
    fn test_effect_texture_holds_the_outline_ring() {
        let glyphs = Glyphs::new();
        let effect: Rc<dyn FontEffect> = Rc::new(OutlineEffect::new(2).unwrap());
        let mut layer = FontFaceLayer::new(LayerId(1), Some(effect));
        layer.generate(context(), glyphs.maps(), None, false).unwrap();

        let data = layer.generate_texture(0, glyphs.maps(), &OwnedBitmapsOnly).unwrap();
        let a = layer.character_box(GlyphId::new(1, 'a')).unwrap();
        let left = (a.texcoords[0].x * data.dimensions.x as f32) as usize;
        let top = (a.texcoords[0].y * data.dimensions.y as f32) as usize;
        let pixel = |x: usize, y: usize| {
            let offset = ((top + y) * data.dimensions.x as usize + left + x) * 4;
            &data.pixels[offset..offset + 4]
        };

        // The 4x6 glyph sits two pixels in from each edge of its 8x10 box
        assert_eq!(pixel(3, 4), &[200; 4]);
        assert_eq!(pixel(0, 4), &[200; 4]);
        assert_eq!(pixel(7, 4), &[200; 4]);
        // Box corners are sqrt(8) from the glyph, inside the one pixel falloff
        let corner = (200.0 * (3.0 - 8.0f32.sqrt())) as u8;
        assert_eq!(pixel(0, 0), &[corner; 4]);
        assert_eq!(pixel(7, 9), &[corner; 4]);
        assert!(data.pixels.chunks_exact(4).all(|rgba| rgba[..3].iter().all(|&c| c == rgba[3])));
    }

    #[test]
    fn test_clone_shares_textures_and_moves_origins() {
        let glyphs = Glyphs::new();
        let mut base = FontFaceLayer::new(LayerId::BASE, None);
        base.generate(context(), glyphs.maps(), None, false).unwrap();

        let effect: Rc<dyn FontEffect> = Rc::new(ShadowEffect::new(Vector2i::new(2, 2)));
        let mut shadow = FontFaceLayer::new(LayerId(1), Some(effect));
        shadow.generate(context(), glyphs.maps(), Some(base.clone_source()), false).unwrap();

        assert!(Rc::ptr_eq(shadow.textures(), base.textures()));
        assert!(!shadow.owns_textures());
        let moved = shadow.character_box(GlyphId::new(1, 'a')).unwrap();
        assert_eq!(moved.origin, Vector2f::new(3.0, -4.0));
        assert_eq!(moved.texcoords, base.character_box(GlyphId::new(1, 'a')).unwrap().texcoords);
        // Zero-area glyphs are rejected by the shadow
        assert_eq!(shadow.character_box(GlyphId::new(2, ' ')).unwrap().texture_index, None);
    }

    #[test]
    fn test_geometry_uses_box_texture() {
        let glyphs = Glyphs::new();
        let mut layer = FontFaceLayer::new(LayerId::BASE, None);
        layer.generate(context(), glyphs.maps(), None, false).unwrap();

        let mut meshes = vec![TexturedMesh::new(layer.textures()[0].request)];
        let colour = ColourbPremultiplied::white(255);
        let pen = Vector2f::new(10.4, 20.0);
        layer.generate_geometry(&mut meshes, GlyphId::new(1, 'a'), pen, colour);
        layer.generate_geometry(&mut meshes, GlyphId::new(9, 'z'), Vector2f::ZERO, colour);

        assert_eq!(meshes[0].mesh.quad_count(), 1);
        assert_eq!(meshes[0].mesh.vertices[0].position, [11.0, 14.0]);
    }
}
