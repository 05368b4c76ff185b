//! A loaded font face and its sized handles

use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::backend::FaceBackend;
use crate::handle::HandleId;
use crate::types::{FontStyle, FontWeight};

/// Index of a face in its provider
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaceId(pub(crate) usize);

impl FaceId {
    pub fn index(self) -> usize {
        self.0
    }
}

pub struct FontFace {
    id: FaceId,
    backend: Rc<dyn FaceBackend>,
    style: FontStyle,
    weight: FontWeight,
    is_fallback_face: bool,
    /// Handle per pixel size
    handles: FxHashMap<u32, HandleId>,
}

impl fmt::Debug for FontFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontFace")
            .field("id", &self.id)
            .field("family", &self.backend.family_name())
            .field("style", &self.style)
            .field("weight", &self.weight)
            .field("is_fallback_face", &self.is_fallback_face)
            .field("handles", &self.handles.len())
            .finish()
    }
}

impl FontFace {
    pub(crate) fn new(id: FaceId, backend: Rc<dyn FaceBackend>, is_fallback_face: bool) -> Self {
        let style = backend.style();
        let weight = backend.weight();
        Self { id, backend, style, weight, is_fallback_face, handles: FxHashMap::default() }
    }

    /// Register under `style` and `weight` instead of what the font declares
    pub(crate) fn with_overrides(
        mut self,
        style: Option<FontStyle>,
        weight: Option<FontWeight>,
    ) -> Self {
        self.style = style.unwrap_or(self.style);
        self.weight = weight.unwrap_or(self.weight);
        self
    }

    pub fn id(&self) -> FaceId {
        self.id
    }

    pub fn backend(&self) -> &Rc<dyn FaceBackend> {
        &self.backend
    }

    pub fn family_name(&self) -> &str {
        self.backend.family_name()
    }

    pub fn style(&self) -> FontStyle {
        self.style
    }

    pub fn weight(&self) -> FontWeight {
        self.weight
    }

    pub fn is_fallback_face(&self) -> bool {
        self.is_fallback_face
    }

    /// Handle already created for `size`
    pub fn handle(&self, size: u32) -> Option<HandleId> {
        self.handles.get(&size).copied()
    }

    pub(crate) fn insert_handle(&mut self, size: u32, handle: HandleId) {
        self.handles.insert(size, handle);
    }

    /// Forget every sized handle, yielding their ids
    pub(crate) fn release_handles(&mut self) -> impl Iterator<Item = HandleId> + '_ {
        self.handles.drain().map(|(_, handle)| handle)
    }
}
