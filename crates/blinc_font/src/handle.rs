//! Glyph cache and layer manager for one face at one pixel size
//!
//! A handle rasterizes glyphs on first use and keeps them for its lifetime.
//! Characters the face lacks are borrowed from fallback faces, either one
//! codepoint at a time or, for clusters the shaper could not map, as a whole
//! reshaped cluster. Every glyph is packed into each layer's atlas; adding a
//! glyph marks the layers dirty and the next string generation regenerates
//! them in creation order and bumps the handle's version.

use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::backend::{FaceBackend, LanguageData, ShapeRequest, ShapedRun};
use crate::config::{FontEngineConfig, ShapingMode};
use crate::effect::{same_effect, EffectLayer, FontEffect};
use crate::glyph::{
    CachedGlyph, ClusterGlyph, ClusterGlyphMap, ClusterLookup, ColorFormat, FallbackGlyphMap,
    FontGlyph, FontMetrics, GlyphBitmapSource, GlyphId, GlyphIndex, GlyphLocation, GlyphMap,
    GlyphMaps, REPLACEMENT_CHARACTER,
};
use crate::layer::{FontFaceLayer, LayerContext, LayerId};
use crate::mesh::TexturedMesh;
use crate::shaping::{
    cluster_range, from_26_6, is_control_character, TextDirection, TextShapingContext,
};
use crate::texture::{TextureData, TextureError, TextureRequest};
use crate::types::{Colourb, ColourbPremultiplied, Vector2f, Vector2i};
use crate::{FontError, Result};

/// Identity of a handle within its provider; never reused
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(pub(crate) usize);

impl HandleId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Glyph sources consulted when a handle's own face lacks a character
///
/// Fallback faces are tried in index order. Returned glyphs are weak copies
/// borrowing their pixels from the fallback handle that rasterized them.
pub trait FallbackFaces {
    fn fallback_count(&self) -> usize;

    fn fallback_glyph(&mut self, index: usize, character: char, size: u32) -> Option<FontGlyph>;

    /// Reshape `cluster` with fallback face `index`; `None` unless at least one
    /// glyph is mapped
    fn fallback_cluster(
        &mut self,
        index: usize,
        cluster: &str,
        size: u32,
        request: &ShapeRequest<'_>,
    ) -> Option<Vec<ClusterGlyph>>;
}

/// No fallback faces at all
pub struct NoFallback;

impl FallbackFaces for NoFallback {
    fn fallback_count(&self) -> usize {
        0
    }

    fn fallback_glyph(
        &mut self,
        _index: usize,
        _character: char,
        _size: u32,
    ) -> Option<FontGlyph> {
        None
    }

    fn fallback_cluster(
        &mut self,
        _index: usize,
        _cluster: &str,
        _size: u32,
        _request: &ShapeRequest<'_>,
    ) -> Option<Vec<ClusterGlyph>> {
        None
    }
}

/// Colour and layer configuration of a generated string
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StringPaint {
    pub colour: Colourb,
    pub opacity: f32,
    pub layer_configuration: usize,
}

impl Default for StringPaint {
    fn default() -> Self {
        Self { colour: Colourb::WHITE, opacity: 1.0, layer_configuration: 0 }
    }
}

/// A resolved glyph and its pen offset from the string origin
#[derive(Clone, Copy, Debug)]
struct PlacedGlyph {
    id: GlyphId,
    position: Vector2f,
    full_colour: bool,
}

type LayerConfiguration = SmallVec<[LayerId; 4]>;

pub struct FontFaceHandle {
    id: HandleId,
    backend: Rc<dyn FaceBackend>,
    size: u32,
    metrics: FontMetrics,
    shaping: ShapingMode,
    max_texture_dimensions: i32,
    kerning_min_font_size: u32,

    glyphs: GlyphMap,
    fallback_glyphs: FallbackGlyphMap,
    fallback_cluster_glyphs: ClusterGlyphMap,
    cluster_lookup: ClusterLookup,

    /// Creation order, which is also regeneration order
    layers: Vec<FontFaceLayer>,
    /// Effect fingerprint to the layer that owns its textures
    layer_cache: FxHashMap<u64, LayerId>,
    layer_configurations: Vec<LayerConfiguration>,

    is_layers_dirty: bool,
    version: u32,
}

impl fmt::Debug for FontFaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontFaceHandle")
            .field("id", &self.id)
            .field("family", &self.backend.family_name())
            .field("size", &self.size)
            .field("glyphs", &self.glyphs.len())
            .field("fallback_glyphs", &self.fallback_glyphs.len())
            .field("layers", &self.layers.len())
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl FontFaceHandle {
    /// Create a handle and generate its base layer
    pub fn new(
        id: HandleId,
        backend: Rc<dyn FaceBackend>,
        size: u32,
        config: &FontEngineConfig,
    ) -> Result<Self> {
        let metrics = backend.metrics(size).ok_or_else(|| FontError::InvalidPixelSize {
            family: backend.family_name().to_owned(),
            size,
        })?;

        let mut handle = Self {
            id,
            backend,
            size,
            metrics,
            shaping: config.shaping,
            max_texture_dimensions: config.max_texture_dimensions,
            kerning_min_font_size: config.kerning_min_font_size,
            glyphs: GlyphMap::default(),
            fallback_glyphs: FallbackGlyphMap::default(),
            fallback_cluster_glyphs: ClusterGlyphMap::default(),
            cluster_lookup: ClusterLookup::default(),
            layers: Vec::new(),
            layer_cache: FxHashMap::default(),
            layer_configurations: Vec::new(),
            is_layers_dirty: false,
            version: 0,
        };

        let replacement = handle.replacement_glyph();
        handle
            .glyphs
            .insert(0, CachedGlyph { glyph: replacement, character: REPLACEMENT_CHARACTER });
        if config.preload_ascii {
            let backend = Rc::clone(&handle.backend);
            for character in ' '..='~' {
                let glyph_index = backend.glyph_index(character);
                handle.resolve_glyph(glyph_index, character, false, &mut NoFallback);
            }
        }

        handle.layers.push(FontFaceLayer::new(LayerId::BASE, None));
        handle.layer_configurations.push(SmallVec::from_slice(&[LayerId::BASE]));
        handle.generate_layer(LayerId::BASE);
        handle.is_layers_dirty = false;

        tracing::debug!(
            handle = id.0,
            family = handle.backend.family_name(),
            size,
            glyphs = handle.glyphs.len(),
            "font face handle created"
        );
        Ok(handle)
    }

    /// The face's own U+FFFD if it renders, otherwise a synthesized box
    fn replacement_glyph(&self) -> FontGlyph {
        let glyph_index = self.backend.glyph_index(REPLACEMENT_CHARACTER);
        if glyph_index != 0 {
            if let Some(rasterized) = self.backend.render_glyph(glyph_index, self.size) {
                let glyph = FontGlyph::from(rasterized);
                if glyph.dimensions.area() > 0 {
                    return glyph;
                }
            }
        }
        FontGlyph::replacement(self.size)
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn metrics(&self) -> &FontMetrics {
        &self.metrics
    }

    pub fn backend(&self) -> &Rc<dyn FaceBackend> {
        &self.backend
    }

    /// Changes whenever previously generated geometry and textures are invalid
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn is_layers_dirty(&self) -> bool {
        self.is_layers_dirty
    }

    pub fn glyphs(&self) -> &GlyphMap {
        &self.glyphs
    }

    pub fn fallback_glyphs(&self) -> &FallbackGlyphMap {
        &self.fallback_glyphs
    }

    pub fn fallback_cluster_glyphs(&self) -> &ClusterGlyphMap {
        &self.fallback_cluster_glyphs
    }

    pub fn glyph_maps(&self) -> GlyphMaps<'_> {
        GlyphMaps {
            glyphs: &self.glyphs,
            fallback_glyphs: &self.fallback_glyphs,
            fallback_cluster_glyphs: &self.fallback_cluster_glyphs,
            cluster_lookup: &self.cluster_lookup,
        }
    }

    pub fn layers(&self) -> &[FontFaceLayer] {
        &self.layers
    }

    pub fn layer(&self, id: LayerId) -> Option<&FontFaceLayer> {
        self.layers.get(id.0)
    }

    /// Layers of a configuration in paint order
    pub fn layer_configuration(&self, index: usize) -> Option<&[LayerId]> {
        self.layer_configurations.get(index).map(|configuration| configuration.as_slice())
    }

    pub fn num_layer_configurations(&self) -> usize {
        self.layer_configurations.len()
    }

    pub(crate) fn owned_glyph_pixels(&self, glyph_index: GlyphIndex) -> Option<&[u8]> {
        self.glyphs.get(&glyph_index)?.glyph.owned_pixels()
    }

    /// Cached glyph for `glyph_index`, rasterizing it on first use
    ///
    /// Glyph index 0 or a failed rasterization consults the fallback faces
    /// when `look_in_fallback` is set, then resolves to the replacement glyph.
    /// Never fails once the handle exists.
    pub fn get_or_append_glyph(
        &mut self,
        glyph_index: GlyphIndex,
        character: char,
        look_in_fallback: bool,
        fallbacks: &mut dyn FallbackFaces,
    ) -> Option<(GlyphId, &FontGlyph)> {
        let id = self.resolve_glyph(glyph_index, character, look_in_fallback, fallbacks);
        self.glyph_maps().lookup(id).map(|glyph| (id, glyph))
    }

    /// [`Self::get_or_append_glyph`] for the face's glyph of `character`
    pub fn glyph_for_character(
        &mut self,
        character: char,
        look_in_fallback: bool,
        fallbacks: &mut dyn FallbackFaces,
    ) -> Option<(GlyphId, &FontGlyph)> {
        let glyph_index = self.backend.glyph_index(character);
        self.get_or_append_glyph(glyph_index, character, look_in_fallback, fallbacks)
    }

    fn resolve_glyph(
        &mut self,
        glyph_index: GlyphIndex,
        character: char,
        look_in_fallback: bool,
        fallbacks: &mut dyn FallbackFaces,
    ) -> GlyphId {
        if glyph_index != 0 {
            if let Some(cached) = self.glyphs.get(&glyph_index) {
                return GlyphId::new(glyph_index, cached.character);
            }
            if let Some(rasterized) = self.backend.render_glyph(glyph_index, self.size) {
                let cached = CachedGlyph { glyph: rasterized.into(), character };
                self.glyphs.insert(glyph_index, cached);
                self.is_layers_dirty = true;
                return GlyphId::new(glyph_index, character);
            }
            tracing::debug!(
                glyph_index,
                ?character,
                size = self.size,
                "glyph rasterization failed"
            );
        }

        if look_in_fallback && character != REPLACEMENT_CHARACTER {
            if self.fallback_glyphs.contains_key(&character) {
                return GlyphId::new(0, character);
            }
            for index in 0..fallbacks.fallback_count() {
                if let Some(glyph) = fallbacks.fallback_glyph(index, character, self.size) {
                    tracing::trace!(?character, fallback = index, "glyph taken from fallback face");
                    self.fallback_glyphs.insert(character, glyph);
                    self.is_layers_dirty = true;
                    return GlyphId::new(0, character);
                }
            }
        }

        GlyphId::new(0, REPLACEMENT_CHARACTER)
    }

    /// Weak copy of this face's own glyph for `character`, used when the handle
    /// serves as a fallback for another one
    pub(crate) fn own_glyph(&mut self, character: char) -> Option<FontGlyph> {
        let glyph_index = self.backend.glyph_index(character);
        if glyph_index == 0 {
            return None;
        }
        let id = self.resolve_glyph(glyph_index, character, false, &mut NoFallback);
        let cached = self.glyphs.get(&id.index).filter(|_| id.index != 0)?;
        Some(cached.glyph.weak_copy(GlyphLocation { handle: self.id, glyph_index: id.index }))
    }

    /// Shape `cluster` with this face alone, as weak copies of its glyphs
    pub(crate) fn shape_cluster(
        &mut self,
        cluster: &str,
        request: &ShapeRequest<'_>,
    ) -> Option<Vec<ClusterGlyph>> {
        let backend = Rc::clone(&self.backend);
        let run = backend.shape(cluster, self.size, request)?;
        if run.glyphs.iter().all(|shaped| shaped.glyph_index == 0) {
            return None;
        }

        let mut glyphs = Vec::with_capacity(run.glyphs.len());
        for (position, shaped) in run.glyphs.iter().enumerate() {
            let position_in_cluster = run.glyphs[..position]
                .iter()
                .filter(|other| other.cluster == shaped.cluster)
                .count();
            let text = cluster
                .get(cluster_range(&run.glyphs, position, cluster.len()))
                .unwrap_or_default();
            let character = text
                .chars()
                .nth(position_in_cluster)
                .or_else(|| text.chars().next())
                .unwrap_or(REPLACEMENT_CHARACTER);
            let id = self.resolve_glyph(shaped.glyph_index, character, false, &mut NoFallback);
            let Some(cached) = self.glyphs.get(&id.index) else {
                continue;
            };

            let shaped_here = id.index != 0 && id.index == shaped.glyph_index;
            let (advance, offset) = if shaped_here {
                let offset = Vector2i::new(from_26_6(shaped.x_offset), from_26_6(shaped.y_offset));
                (from_26_6(shaped.x_advance), offset)
            } else {
                (cached.glyph.advance, Vector2i::ZERO)
            };
            let location = GlyphLocation { handle: self.id, glyph_index: id.index };
            glyphs.push(ClusterGlyph {
                glyph_index: id.index,
                character,
                glyph: cached.glyph.weak_copy(location),
                advance,
                offset,
            });
        }
        Some(glyphs)
    }

    /// Position of `cluster` in the fallback cluster map, reshaping it with
    /// each fallback face in turn on first use
    fn get_or_append_fallback_cluster(
        &mut self,
        cluster: &str,
        request: &ShapeRequest<'_>,
        fallbacks: &mut dyn FallbackFaces,
    ) -> Option<usize> {
        if let Some(position) = self.fallback_cluster_glyphs.get_index_of(cluster) {
            return Some(position);
        }

        for index in 0..fallbacks.fallback_count() {
            let Some(glyphs) = fallbacks.fallback_cluster(index, cluster, self.size, request)
            else {
                continue;
            };
            if glyphs.is_empty() {
                continue;
            }

            let position = self.fallback_cluster_glyphs.len();
            for (glyph_position, glyph) in glyphs.iter().enumerate() {
                self.cluster_lookup.entry(glyph.id().key()).or_insert((position, glyph_position));
            }
            self.fallback_cluster_glyphs.insert(cluster.to_owned(), glyphs);
            self.is_layers_dirty = true;
            tracing::trace!(cluster, fallback = index, "cluster taken from fallback face");
            return Some(position);
        }
        None
    }

    /// Index of the layer configuration rendering `effects`
    ///
    /// `effects` must already be ordered Back before Front. Configurations are
    /// matched by effect identity; index 0 is the base layer alone.
    pub fn generate_layer_configuration(&mut self, effects: &[Rc<dyn FontEffect>]) -> usize {
        if effects.is_empty() {
            return 0;
        }

        let existing = self.layer_configurations.iter().position(|configuration| {
            configuration.len() == effects.len() + 1
                && configuration
                    .iter()
                    .filter_map(|&id| self.layers[id.0].effect())
                    .zip(effects)
                    .all(|(layer_effect, effect)| same_effect(layer_effect, effect))
        });
        if let Some(index) = existing {
            return index;
        }

        let mut configuration = LayerConfiguration::with_capacity(effects.len() + 1);
        let mut added_base = false;
        for effect in effects {
            if !added_base && effect.layer() == EffectLayer::Front {
                configuration.push(LayerId::BASE);
                added_base = true;
            }
            configuration.push(self.get_or_create_layer(effect));
        }
        if !added_base {
            configuration.push(LayerId::BASE);
        }

        self.layer_configurations.push(configuration);
        self.layer_configurations.len() - 1
    }

    fn get_or_create_layer(&mut self, effect: &Rc<dyn FontEffect>) -> LayerId {
        let existing = self.layers.iter().find(|layer| {
            layer.effect().is_some_and(|layer_effect| same_effect(layer_effect, effect))
        });
        if let Some(layer) = existing {
            return layer.id();
        }

        let id = LayerId(self.layers.len());
        self.layers.push(FontFaceLayer::new(id, Some(Rc::clone(effect))));
        self.generate_layer(id);
        id
    }

    /// (Re)generate one layer, cloning where its effect allows
    ///
    /// Effects without unique textures clone the base layer. Effects with a
    /// fingerprint already rendered by an earlier layer clone that layer;
    /// fingerprint 0 marks an effect built outside a factory and is never
    /// shared.
    fn generate_layer(&mut self, id: LayerId) {
        let Some(layer) = self.layers.get(id.0) else {
            return;
        };
        let (clone_from, clone_glyph_origins) = match layer.effect() {
            None => (None, false),
            Some(effect) if !effect.has_unique_texture() => (Some(LayerId::BASE), false),
            Some(effect) if effect.fingerprint() == 0 => (None, false),
            Some(effect) => {
                let fingerprint = effect.fingerprint();
                match self.layer_cache.get(&fingerprint) {
                    Some(&owner) if owner != id => (Some(owner), true),
                    _ => {
                        self.layer_cache.insert(fingerprint, id);
                        (None, false)
                    }
                }
            }
        };

        let clone = clone_from
            .and_then(|source| self.layers.get(source.0))
            .map(FontFaceLayer::clone_source);
        let context = LayerContext {
            handle: self.id,
            version: self.version,
            max_texture_dimensions: self.max_texture_dimensions,
        };
        let maps = GlyphMaps {
            glyphs: &self.glyphs,
            fallback_glyphs: &self.fallback_glyphs,
            fallback_cluster_glyphs: &self.fallback_cluster_glyphs,
            cluster_lookup: &self.cluster_lookup,
        };
        if let Err(error) = self.layers[id.0].generate(context, maps, clone, clone_glyph_origins) {
            tracing::debug!(
                handle = self.id.0,
                layer = id.0,
                %error,
                "layer generated with unplaced glyphs"
            );
        }
    }

    /// Regenerate every layer if glyphs were added since the last call
    ///
    /// Returns whether the version changed.
    pub fn update_layers_on_dirty(&mut self) -> bool {
        if !self.is_layers_dirty {
            return false;
        }
        self.is_layers_dirty = false;
        self.version = self.version.wrapping_add(1);

        for index in 0..self.layers.len() {
            self.generate_layer(LayerId(index));
        }
        tracing::debug!(
            handle = self.id.0,
            version = self.version,
            layers = self.layers.len(),
            "layers regenerated"
        );
        true
    }

    /// Advance width of `text`, rasterizing any glyphs it needs
    ///
    /// `prior_character` is the character laid out just before `text`, so a
    /// string split across calls kerns the same as in one piece.
    pub fn get_string_width(
        &mut self,
        text: &str,
        shaping: &TextShapingContext,
        prior_character: Option<char>,
        language: Option<LanguageData>,
        fallbacks: &mut dyn FallbackFaces,
    ) -> f32 {
        self.resolve_string(text, shaping, prior_character, language, fallbacks).1
    }

    /// Append the quads of `text` to `meshes`, one mesh per touched texture
    /// per layer in paint order, with the pen starting at baseline `position`
    ///
    /// Returns the advance width, never negative.
    #[allow(clippy::too_many_arguments)]
    pub fn generate_string(
        &mut self,
        meshes: &mut Vec<TexturedMesh>,
        text: &str,
        position: Vector2f,
        paint: StringPaint,
        shaping: &TextShapingContext,
        prior_character: Option<char>,
        language: Option<LanguageData>,
        fallbacks: &mut dyn FallbackFaces,
    ) -> f32 {
        let (placed, width) =
            self.resolve_string(text, shaping, prior_character, language, fallbacks);
        self.update_layers_on_dirty();

        let Some(configuration) = self.layer_configurations.get(paint.layer_configuration) else {
            tracing::warn!(
                handle = self.id.0,
                configuration = paint.layer_configuration,
                "unknown layer configuration"
            );
            return width;
        };

        let base_colour = paint.colour.to_premultiplied(paint.opacity);
        for &layer_id in configuration {
            let Some(layer) = self.layers.get(layer_id.0) else {
                continue;
            };
            if layer.num_textures() == 0 {
                continue;
            }

            let layer_colour =
                if layer_id == LayerId::BASE { base_colour } else { layer.colour(paint.opacity) };
            let mut layer_meshes: Vec<TexturedMesh> =
                layer.textures().iter().map(|texture| TexturedMesh::new(texture.request)).collect();
            for glyph in &placed {
                let colour = if layer_id == LayerId::BASE && glyph.full_colour {
                    ColourbPremultiplied::white(base_colour.a)
                } else {
                    layer_colour
                };
                let origin = position + glyph.position;
                layer.generate_geometry(&mut layer_meshes, glyph.id, origin, colour);
            }
            meshes.extend(layer_meshes.into_iter().filter(|mesh| !mesh.mesh.is_empty()));
        }
        width
    }

    fn shape_request<'a>(
        &self,
        shaping: &'a TextShapingContext,
        language: Option<LanguageData>,
    ) -> ShapeRequest<'a> {
        let direction = match shaping.direction {
            TextDirection::Auto => {
                language.map_or(TextDirection::Auto, |language| language.direction)
            }
            direction => direction,
        };
        ShapeRequest {
            language: &shaping.language,
            script: language.and_then(|language| language.script),
            direction,
            kerning: shaping.kerning.is_enabled(self.size, self.kerning_min_font_size),
        }
    }

    fn resolve_string(
        &mut self,
        text: &str,
        shaping: &TextShapingContext,
        prior_character: Option<char>,
        language: Option<LanguageData>,
        fallbacks: &mut dyn FallbackFaces,
    ) -> (Vec<PlacedGlyph>, f32) {
        let request = self.shape_request(shaping, language);
        let prior = prior_character.map_or(0, |character| self.backend.glyph_index(character));
        if self.shaping == ShapingMode::Shaped {
            let backend = Rc::clone(&self.backend);
            if let Some(run) = backend.shape(text, self.size, &request) {
                let letter_spacing = shaping.letter_spacing;
                return self.resolve_shaped(text, &run, &request, prior, letter_spacing, fallbacks);
            }
        }
        self.resolve_direct(text, request.kerning, prior, shaping.letter_spacing, fallbacks)
    }

    fn placed(&self, id: GlyphId, position: Vector2f) -> Option<(PlacedGlyph, i32)> {
        let glyph = self.glyph_maps().lookup(id)?;
        let full_colour = glyph.color_format == ColorFormat::Rgba8;
        Some((PlacedGlyph { id, position, full_colour }, glyph.advance))
    }

    /// One glyph per codepoint with pair kerning between mapped glyphs
    ///
    /// `prior` is the glyph preceding the string, 0 for none.
    fn resolve_direct(
        &mut self,
        text: &str,
        kerning: bool,
        prior: GlyphIndex,
        letter_spacing: f32,
        fallbacks: &mut dyn FallbackFaces,
    ) -> (Vec<PlacedGlyph>, f32) {
        let backend = Rc::clone(&self.backend);
        let mut placed = Vec::with_capacity(text.len());
        let mut pen = 0.0f32;
        let mut previous = prior;

        for character in text.chars() {
            if is_control_character(character) {
                continue;
            }
            let glyph_index = backend.glyph_index(character);
            let id = self.resolve_glyph(glyph_index, character, true, fallbacks);
            if kerning && previous != 0 && id.index != 0 {
                pen += backend.kerning(self.size, previous, id.index) as f32;
            }
            let Some((glyph, advance)) = self.placed(id, Vector2f::new(pen, 0.0)) else {
                continue;
            };
            placed.push(glyph);
            pen += advance as f32 + letter_spacing;
            previous = id.index;
        }
        (placed, pen.max(0.0))
    }

    /// Positions from the shaper, with fallback for unmapped glyphs and clusters
    ///
    /// The shaper kerns within the run; the pair formed with `prior` is
    /// kerned here for left-to-right runs.
    fn resolve_shaped(
        &mut self,
        text: &str,
        run: &ShapedRun,
        request: &ShapeRequest<'_>,
        prior: GlyphIndex,
        letter_spacing: f32,
        fallbacks: &mut dyn FallbackFaces,
    ) -> (Vec<PlacedGlyph>, f32) {
        let mut placed = Vec::with_capacity(run.glyphs.len());
        let first = run.glyphs.first().map_or(0, |shaped| shaped.glyph_index);
        let mut pen = if request.kerning
            && run.direction != TextDirection::RightToLeft
            && prior != 0
            && first != 0
        {
            self.backend.kerning(self.size, prior, first) as f32
        } else {
            0.0
        };
        let mut current_cluster: Option<u32> = None;
        let mut position_in_cluster = 0;
        let mut replaced_cluster: Option<u32> = None;

        for (position, shaped) in run.glyphs.iter().enumerate() {
            if replaced_cluster == Some(shaped.cluster) {
                continue;
            }
            if current_cluster == Some(shaped.cluster) {
                position_in_cluster += 1;
            } else {
                current_cluster = Some(shaped.cluster);
                position_in_cluster = 0;
            }

            let cluster =
                text.get(cluster_range(&run.glyphs, position, text.len())).unwrap_or_default();
            let character = cluster
                .chars()
                .nth(position_in_cluster)
                .or_else(|| cluster.chars().next())
                .unwrap_or(REPLACEMENT_CHARACTER);
            if is_control_character(character) {
                continue;
            }

            let multi_codepoint = cluster.chars().nth(1).is_some();
            let cluster_unmapped = run
                .glyphs
                .iter()
                .any(|other| other.cluster == shaped.cluster && other.glyph_index == 0);
            if position_in_cluster == 0 && multi_codepoint && cluster_unmapped {
                let fallback_cluster =
                    self.get_or_append_fallback_cluster(cluster, request, fallbacks);
                if let Some(index) = fallback_cluster {
                    replaced_cluster = Some(shaped.cluster);
                    let cluster_glyphs =
                        self.fallback_cluster_glyphs.get_index(index).map(|(_, glyphs)| glyphs);
                    for cluster_glyph in cluster_glyphs.into_iter().flatten() {
                        let offset = Vector2f::new(
                            cluster_glyph.offset.x as f32,
                            -(cluster_glyph.offset.y as f32),
                        );
                        placed.push(PlacedGlyph {
                            id: cluster_glyph.id(),
                            position: Vector2f::new(pen, 0.0) + offset,
                            full_colour: cluster_glyph.glyph.color_format == ColorFormat::Rgba8,
                        });
                        pen += cluster_glyph.advance as f32 + letter_spacing;
                    }
                    continue;
                }
            }

            let id = self.resolve_glyph(shaped.glyph_index, character, true, fallbacks);
            let shaped_here = id.index != 0 && id.index == shaped.glyph_index;
            let offset = if shaped_here {
                let y_offset = -(from_26_6(shaped.y_offset) as f32);
                Vector2f::new(from_26_6(shaped.x_offset) as f32, y_offset)
            } else {
                Vector2f::ZERO
            };
            let Some((glyph, glyph_advance)) = self.placed(id, Vector2f::new(pen, 0.0) + offset)
            else {
                continue;
            };
            let advance = if shaped_here { from_26_6(shaped.x_advance) } else { glyph_advance };
            placed.push(glyph);
            pen += advance as f32 + letter_spacing;
        }
        (placed, pen.max(0.0))
    }

    /// Pixels of one of this handle's atlas textures
    ///
    /// Requests captured before the last regeneration are rejected as stale.
    pub fn generate_layer_texture(
        &self,
        request: TextureRequest,
        bitmaps: &dyn GlyphBitmapSource,
    ) -> std::result::Result<TextureData, TextureError> {
        if request.handle != self.id {
            return Err(TextureError::UnknownHandle(request.handle));
        }
        if request.version != self.version {
            return Err(TextureError::Stale { requested: request.version, current: self.version });
        }
        let layer =
            self.layers.get(request.layer.0).ok_or(TextureError::UnknownLayer(request.layer))?;
        layer.generate_texture(request.texture_index, self.glyph_maps(), bitmaps)
    }
}
