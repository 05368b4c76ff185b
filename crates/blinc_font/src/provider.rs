//! Font registry: families, faces, sized handles and fallback faces
//!
//! The provider owns every face and every handle. Handles are addressed by
//! [`HandleId`], which indexes a slot table that only grows, so an id stays
//! unique even after [`FontProvider::release_font_resources`] empties its
//! slot. Texture requests that outlive their handle fail with
//! [`TextureError::UnknownHandle`].

use std::path::Path;
use std::rc::Rc;

use fontdb::{Database, Family, Query, Source, Stretch, Style, Weight};
use indexmap::IndexMap;
use rustc_hash::{FxBuildHasher, FxHashMap};

use crate::backend::{FaceBackend, LanguageData, ShapeRequest, SwashFace};
use crate::config::FontEngineConfig;
use crate::effect::FontEffect;
use crate::face::{FaceId, FontFace};
use crate::family::FontFamily;
use crate::glyph::{ClusterGlyph, FontGlyph, FontMetrics, GlyphBitmapSource, GlyphLocation};
use crate::handle::{FallbackFaces, FontFaceHandle, HandleId, StringPaint};
use crate::mesh::TexturedMesh;
use crate::shaping::{TextDirection, TextShapingContext};
use crate::texture::{TextureData, TextureError, TextureRequest};
use crate::types::{FontStyle, FontWeight, Vector2f};
use crate::{FontError, Result};

pub struct FontProvider {
    config: FontEngineConfig,
    /// Lowercased family name to family, in registration order
    families: IndexMap<String, FontFamily, FxBuildHasher>,
    faces: Vec<FontFace>,
    fallback_faces: Vec<FaceId>,
    handles: Vec<Option<FontFaceHandle>>,
    languages: FxHashMap<String, LanguageData>,
    /// System font database, loaded on first use
    system_fonts: Option<Database>,
}

impl Default for FontProvider {
    fn default() -> Self {
        Self::new(FontEngineConfig::default())
    }
}

impl FontProvider {
    pub fn new(config: FontEngineConfig) -> Self {
        Self {
            config,
            families: IndexMap::default(),
            faces: Vec::new(),
            fallback_faces: Vec::new(),
            handles: Vec::new(),
            languages: FxHashMap::default(),
            system_fonts: None,
        }
    }

    pub fn config(&self) -> &FontEngineConfig {
        &self.config
    }

    // Face loading

    /// Register a face backend under its family name
    pub fn add_face(&mut self, backend: Rc<dyn FaceBackend>, fallback_face: bool) -> FaceId {
        self.register_face(backend, None, None, fallback_face)
    }

    fn register_face(
        &mut self,
        backend: Rc<dyn FaceBackend>,
        style: Option<FontStyle>,
        weight: Option<FontWeight>,
        fallback_face: bool,
    ) -> FaceId {
        let id = FaceId(self.faces.len());
        let face = FontFace::new(id, backend, fallback_face).with_overrides(style, weight);
        let name = face.family_name().to_owned();
        tracing::debug!(
            family = %name,
            style = ?face.style(),
            weight = face.weight().0,
            fallback_face,
            "registered font face"
        );

        self.families
            .entry(name.to_lowercase())
            .or_insert_with(|| FontFamily::new(name))
            .add_face(id);
        if fallback_face {
            self.fallback_faces.push(id);
        }
        self.faces.push(face);
        id
    }

    pub fn load_font_face_from_file(&mut self, path: &Path, fallback_face: bool) -> Result<FaceId> {
        let face = SwashFace::from_file(path, 0, None)?
            .with_strike_threshold(self.config.bitmap_strike_threshold);
        Ok(self.add_face(Rc::new(face), fallback_face))
    }

    /// Register a face from font data
    ///
    /// `family`, `style` and `weight` replace what the font declares when
    /// given, which decides how the face is matched by
    /// [`FontProvider::get_font_face_handle`].
    pub fn load_font_face_from_memory(
        &mut self,
        data: Vec<u8>,
        family: Option<&str>,
        style: Option<FontStyle>,
        weight: Option<FontWeight>,
        fallback_face: bool,
    ) -> Result<FaceId> {
        let face = SwashFace::from_data(data, 0, family)?
            .with_strike_threshold(self.config.bitmap_strike_threshold);
        Ok(self.register_face(Rc::new(face), style, weight, fallback_face))
    }

    /// Find `family` in the system font database and register the closest face
    ///
    /// The face is registered under the requested name so it resolves through
    /// [`FontProvider::get_font_face_handle`] with the same string.
    pub fn load_system_font_face(
        &mut self,
        family: &str,
        style: FontStyle,
        weight: FontWeight,
        fallback_face: bool,
    ) -> Result<FaceId> {
        let database = self.system_fonts.get_or_insert_with(|| {
            let mut database = Database::new();
            database.load_system_fonts();
            tracing::debug!(faces = database.len(), "loaded system font database");
            database
        });

        let families = [Family::Name(family)];
        let query_style = |style| Query {
            families: &families,
            weight: Weight(weight.0),
            style,
            stretch: Stretch::Normal,
        };
        let id = match style {
            FontStyle::Normal => database.query(&query_style(Style::Normal)),
            FontStyle::Italic => database
                .query(&query_style(Style::Italic))
                .or_else(|| database.query(&query_style(Style::Oblique))),
        }
        .ok_or_else(|| FontError::FaceNotFound(family.to_owned()))?;

        let (source, face_index) =
            database.face_source(id).ok_or_else(|| FontError::FaceNotFound(family.to_owned()))?;
        let data = match source {
            Source::File(path) => std::fs::read(&path).map_err(|error| FontError::FaceLoad {
                path: path.clone(),
                message: error.to_string(),
            })?,
            Source::Binary(data) => data.as_ref().as_ref().to_vec(),
            Source::SharedFile(_path, data) => data.as_ref().as_ref().to_vec(),
        };
        let face = SwashFace::from_data(data, face_index, Some(family))?;
        let face = face.with_strike_threshold(self.config.bitmap_strike_threshold);
        Ok(self.add_face(Rc::new(face), fallback_face))
    }

    /// Register every face listed in the configuration as a fallback face
    ///
    /// Faces that fail to load are skipped with a warning. Returns how many
    /// were registered.
    pub fn load_configured_fallbacks(&mut self) -> usize {
        let paths = self.config.fallback_faces.clone();
        paths
            .iter()
            .filter(|path| match self.load_font_face_from_file(path, true) {
                Ok(_) => true,
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "skipping fallback face");
                    false
                }
            })
            .count()
    }

    // Lookup

    pub fn family(&self, name: &str) -> Option<&FontFamily> {
        self.families.get(&name.to_lowercase())
    }

    pub fn families(&self) -> impl Iterator<Item = &FontFamily> {
        self.families.values()
    }

    pub fn face(&self, id: FaceId) -> Option<&FontFace> {
        self.faces.get(id.0)
    }

    /// Handle for the closest face of `family` at `size`, created on first use
    ///
    /// Returns `None` when the family is unknown or the face cannot be
    /// rendered at `size`.
    pub fn get_font_face_handle(
        &mut self,
        family: &str,
        style: FontStyle,
        weight: FontWeight,
        size: u32,
    ) -> Option<HandleId> {
        let face = self.family(family)?.find_face(&self.faces, style, weight)?;
        self.face_handle(face, size)
    }

    fn face_handle(&mut self, face_id: FaceId, size: u32) -> Option<HandleId> {
        let face = self.faces.get(face_id.0)?;
        if let Some(handle) = face.handle(size) {
            return Some(handle);
        }

        let id = HandleId(self.handles.len());
        match FontFaceHandle::new(id, Rc::clone(face.backend()), size, &self.config) {
            Ok(handle) => {
                self.handles.push(Some(handle));
                self.faces[face_id.0].insert_handle(size, id);
                Some(id)
            }
            Err(error) => {
                tracing::warn!(
                    family = face.family_name(),
                    size,
                    %error,
                    "cannot create font face handle"
                );
                None
            }
        }
    }

    pub fn handle(&self, id: HandleId) -> Option<&FontFaceHandle> {
        self.handles.get(id.0)?.as_ref()
    }

    pub fn handle_mut(&mut self, id: HandleId) -> Option<&mut FontFaceHandle> {
        self.handles.get_mut(id.0)?.as_mut()
    }

    fn require_handle_mut(&mut self, id: HandleId) -> Result<&mut FontFaceHandle> {
        self.handle_mut(id).ok_or(FontError::UnknownHandle(id))
    }

    pub fn count_fallback_faces(&self) -> usize {
        self.fallback_faces.len()
    }

    /// Handle of fallback face `index` at `size`
    pub fn fallback_face_handle(&mut self, index: usize, size: u32) -> Option<HandleId> {
        let face = *self.fallback_faces.get(index)?;
        self.face_handle(face, size)
    }

    // Languages

    /// Script and default direction used when shaping text tagged `language`
    pub fn register_language(
        &mut self,
        language: &str,
        script: Option<[u8; 4]>,
        direction: TextDirection,
    ) {
        self.languages.insert(language.to_lowercase(), LanguageData { script, direction });
    }

    /// Registered data for a BCP 47 tag, trying the primary subtag second
    pub fn language_data(&self, language: &str) -> Option<LanguageData> {
        if language.is_empty() {
            return None;
        }
        let language = language.to_lowercase();
        self.languages.get(&language).copied().or_else(|| {
            let primary = language.split(['-', '_']).next()?;
            self.languages.get(primary).copied()
        })
    }

    // Handle operations

    pub fn font_metrics(&self, handle: HandleId) -> Result<FontMetrics> {
        self.handle(handle)
            .map(|handle| *handle.metrics())
            .ok_or(FontError::UnknownHandle(handle))
    }

    /// Current version of `handle`; geometry generated under an older version
    /// must be regenerated
    pub fn version(&self, handle: HandleId) -> Result<u32> {
        self.handle(handle).map(FontFaceHandle::version).ok_or(FontError::UnknownHandle(handle))
    }

    pub fn generate_layer_configuration(
        &mut self,
        handle: HandleId,
        effects: &[Rc<dyn FontEffect>],
    ) -> Result<usize> {
        Ok(self.require_handle_mut(handle)?.generate_layer_configuration(effects))
    }

    /// Advance width of `text`
    ///
    /// `prior_character` is the character laid out just before `text` and
    /// kerns against its first glyph.
    pub fn get_string_width(
        &mut self,
        handle: HandleId,
        text: &str,
        shaping: &TextShapingContext,
        prior_character: Option<char>,
    ) -> Result<f32> {
        let language = self.language_data(&shaping.language);
        self.with_handle(handle, |handle, fallbacks| {
            handle.get_string_width(text, shaping, prior_character, language, fallbacks)
        })
    }

    /// Append the quads of `text` to `meshes`; returns the advance width
    #[allow(clippy::too_many_arguments)]
    pub fn generate_string(
        &mut self,
        handle: HandleId,
        meshes: &mut Vec<TexturedMesh>,
        text: &str,
        position: Vector2f,
        paint: StringPaint,
        shaping: &TextShapingContext,
        prior_character: Option<char>,
    ) -> Result<f32> {
        let language = self.language_data(&shaping.language);
        self.with_handle(handle, |handle, fallbacks| {
            handle.generate_string(
                meshes,
                text,
                position,
                paint,
                shaping,
                prior_character,
                language,
                fallbacks,
            )
        })
    }

    /// Pixels for a texture named by a mesh
    pub fn request_texture_data(
        &self,
        request: TextureRequest,
    ) -> std::result::Result<TextureData, TextureError> {
        let handle =
            self.handle(request.handle).ok_or(TextureError::UnknownHandle(request.handle))?;
        let result = handle.generate_layer_texture(request, self);
        if let Err(TextureError::Stale { requested, current }) = &result {
            tracing::debug!(handle = request.handle.0, requested, current, "stale texture request");
        }
        result
    }

    /// Drop every sized handle with its glyphs, layers and textures
    pub fn release_font_resources(&mut self) {
        let mut released = 0;
        for face in &mut self.faces {
            for id in face.release_handles() {
                if self.handles.get_mut(id.0).and_then(Option::take).is_some() {
                    released += 1;
                }
            }
        }
        tracing::debug!(released, "released font face handles");
    }

    /// Run `f` with `handle` taken out of its slot so the provider can serve
    /// fallback glyphs from the other handles meanwhile
    fn with_handle<R>(
        &mut self,
        id: HandleId,
        f: impl FnOnce(&mut FontFaceHandle, &mut dyn FallbackFaces) -> R,
    ) -> Result<R> {
        let mut handle = self
            .handles
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or(FontError::UnknownHandle(id))?;
        let result = f(&mut handle, self);
        self.handles[id.0] = Some(handle);
        Ok(result)
    }
}

impl FallbackFaces for FontProvider {
    fn fallback_count(&self) -> usize {
        self.fallback_faces.len()
    }

    fn fallback_glyph(&mut self, index: usize, character: char, size: u32) -> Option<FontGlyph> {
        let handle = self.fallback_face_handle(index, size)?;
        // A handle never falls back to itself; its slot is empty while in use
        let glyph = self.handle_mut(handle)?.own_glyph(character)?;
        tracing::trace!(
            fallback = index,
            character = %character.escape_unicode(),
            "fallback glyph"
        );
        Some(glyph)
    }

    fn fallback_cluster(
        &mut self,
        index: usize,
        cluster: &str,
        size: u32,
        request: &ShapeRequest<'_>,
    ) -> Option<Vec<ClusterGlyph>> {
        let handle = self.fallback_face_handle(index, size)?;
        self.handle_mut(handle)?.shape_cluster(cluster, request)
    }
}

impl GlyphBitmapSource for FontProvider {
    fn borrowed_pixels(&self, location: GlyphLocation) -> Option<&[u8]> {
        self.handle(location.handle)?.owned_glyph_pixels(location.glyph_index)
    }
}
