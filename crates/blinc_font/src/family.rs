//! Faces sharing a family name

use crate::face::{FaceId, FontFace};
use crate::types::{FontStyle, FontWeight};

#[derive(Debug, Clone)]
pub struct FontFamily {
    name: String,
    faces: Vec<FaceId>,
}

impl FontFamily {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), faces: Vec::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn faces(&self) -> &[FaceId] {
        &self.faces
    }

    pub(crate) fn add_face(&mut self, face: FaceId) {
        self.faces.push(face);
    }

    /// Closest face to `style` and `weight`
    ///
    /// Prefers the nearest weight among faces of the requested style; if the
    /// family has no face in that style, the nearest weight of any style.
    /// Equal distances keep the face added first.
    pub fn find_face(
        &self,
        faces: &[FontFace],
        style: FontStyle,
        weight: FontWeight,
    ) -> Option<FaceId> {
        let members = || self.faces.iter().filter_map(|id| faces.get(id.0));
        members()
            .filter(|face| face.style() == style)
            .min_by_key(|face| face.weight().distance(weight))
            .or_else(|| members().min_by_key(|face| face.weight().distance(weight)))
            .map(FontFace::id)
    }
}
