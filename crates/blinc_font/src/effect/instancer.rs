//! Effect instancing and fingerprints
//!
//! Instancers declare the properties an effect takes along with their
//! defaults. The factory resolves caller-supplied values against those
//! declarations and derives the effect's fingerprint from the effect name and
//! every resolved value.

use std::fmt;
use std::hash::Hasher;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHasher};
use smallvec::SmallVec;

use super::{
    sort_by_layer, BlurInstancer, FontEffect, FontEffectList, GlowInstancer, OutlineInstancer,
    ShadowInstancer,
};
use crate::types::Colourb;
use crate::{FontError, Result};

/// Typed value of an effect property
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PropertyValue {
    /// Length in pixels
    Length(f32),
    Colour(Colourb),
}

impl PropertyValue {
    fn same_kind(&self, other: &PropertyValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Length(px) => write!(f, "{px}px"),
            PropertyValue::Colour(colour) => write!(f, "{colour}"),
        }
    }
}

/// A property an effect accepts and the value used when it is omitted
#[derive(Clone, Copy, Debug)]
pub struct PropertyDefinition {
    pub name: &'static str,
    pub default: PropertyValue,
}

/// Caller-supplied property values for one effect declaration
#[derive(Clone, Debug, Default)]
pub struct PropertyDictionary {
    values: FxHashMap<String, PropertyValue>,
}

impl PropertyDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: PropertyValue) {
        self.values.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<PropertyValue> {
        self.values.get(name).copied()
    }
}

/// Property values after defaults are applied, in declaration order
#[derive(Clone, Debug, Default)]
pub struct ResolvedProperties {
    values: SmallVec<[(&'static str, PropertyValue); 6]>,
}

impl ResolvedProperties {
    fn get(&self, name: &str) -> Option<PropertyValue> {
        self.values.iter().find(|(key, _)| *key == name).map(|(_, value)| *value)
    }

    /// Length rounded to whole pixels, 0 when absent
    pub fn length_px(&self, name: &str) -> i32 {
        match self.get(name) {
            Some(PropertyValue::Length(px)) => px.round() as i32,
            _ => 0,
        }
    }

    pub fn colour(&self, name: &str) -> Colourb {
        match self.get(name) {
            Some(PropertyValue::Colour(colour)) => colour,
            _ => Colourb::WHITE,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, PropertyValue)> + '_ {
        self.values.iter().copied()
    }
}

/// Builds effects of one type from resolved properties
pub trait FontEffectInstancer {
    fn properties(&self) -> &[PropertyDefinition];

    /// `None` when the values describe an effect that cannot be rendered
    fn instance_font_effect(&self, properties: &ResolvedProperties) -> Option<Box<dyn FontEffect>>;
}

/// Hash of the effect name and each resolved property's serialized value
pub fn fingerprint(name: &str, properties: &ResolvedProperties) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(name.as_bytes());
    for (_, value) in properties.iter() {
        hasher.write_u8(0xff);
        hasher.write(value.to_string().as_bytes());
    }
    hasher.finish()
}

/// Registry of effect instancers by name
pub struct FontEffectFactory {
    instancers: FxHashMap<String, Box<dyn FontEffectInstancer>>,
}

impl Default for FontEffectFactory {
    fn default() -> Self {
        let mut factory = Self::empty();
        factory.register("outline", OutlineInstancer);
        factory.register("blur", BlurInstancer);
        factory.register("glow", GlowInstancer);
        factory.register("shadow", ShadowInstancer);
        factory
    }
}

impl FontEffectFactory {
    /// Factory with the built-in outline, blur, glow and shadow effects
    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty() -> Self {
        Self { instancers: FxHashMap::default() }
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        instancer: impl FontEffectInstancer + 'static,
    ) {
        self.instancers.insert(name.into(), Box::new(instancer));
    }

    /// Resolve `properties` against the declarations of effect `name`
    pub fn resolve(
        &self,
        name: &str,
        properties: &PropertyDictionary,
    ) -> Result<ResolvedProperties> {
        let instancer = self
            .instancers
            .get(name)
            .ok_or_else(|| FontError::UnknownEffect(name.to_string()))?;

        let mut resolved = ResolvedProperties::default();
        for definition in instancer.properties() {
            let value = match properties.get(definition.name) {
                Some(value) if value.same_kind(&definition.default) => value,
                Some(_) => {
                    return Err(FontError::InvalidEffectProperty {
                        effect: name.to_string(),
                        property: definition.name.to_string(),
                    })
                }
                None => definition.default,
            };
            resolved.values.push((definition.name, value));
        }
        Ok(resolved)
    }

    /// Instance one effect
    ///
    /// Returns `Ok(None)` when the instancer rejects the values, for example
    /// an outline of width zero.
    pub fn instance(
        &self,
        name: &str,
        properties: &PropertyDictionary,
    ) -> Result<Option<Rc<dyn FontEffect>>> {
        let resolved = self.resolve(name, properties)?;
        let Some(instancer) = self.instancers.get(name) else {
            return Err(FontError::UnknownEffect(name.to_string()));
        };
        let Some(mut effect) = instancer.instance_font_effect(&resolved) else {
            tracing::debug!(effect = name, "font effect declaration produced no effect");
            return Ok(None);
        };
        effect.attributes_mut().fingerprint = fingerprint(name, &resolved);
        Ok(Some(Rc::from(effect)))
    }

    /// Instance a list of declarations ready for a layer configuration:
    /// Back effects first, declaration order kept within each group
    pub fn instance_list(
        &self,
        declarations: &[(&str, PropertyDictionary)],
    ) -> Result<FontEffectList> {
        let mut effects = FontEffectList::with_capacity(declarations.len());
        for (name, properties) in declarations {
            if let Some(effect) = self.instance(name, properties)? {
                effects.push(effect);
            }
        }
        sort_by_layer(&mut effects);
        Ok(effects)
    }
}
