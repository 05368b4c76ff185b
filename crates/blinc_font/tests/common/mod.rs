//! Shared fixtures: a provider built from procedural faces

#![allow(dead_code)]

use std::rc::Rc;

use blinc_font::{
    FaceBackend, FontEngineConfig, FontProvider, FontStyle, FontWeight, HandleId, ProceduralFace,
};

pub const SIZE: u32 = 16;

/// Provider fixture that keeps the concrete faces around for inspection
pub struct Fixture {
    pub provider: FontProvider,
    pub primary: Rc<ProceduralFace>,
    pub fallback: Rc<ProceduralFace>,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn config() -> FontEngineConfig {
    FontEngineConfig::default().with_preload_ascii(false)
}

/// "Arial" regular and bold over printable ASCII, an italic, and a
/// "Symbols" fallback face covering a few non-ASCII characters
pub fn fixture_with(config: FontEngineConfig) -> Fixture {
    init_tracing();

    let primary = Rc::new(ProceduralFace::ascii("Arial"));
    let fallback = Rc::new(
        ProceduralFace::new("Symbols", "\u{2603}e\u{0301}").with_colour_glyphs("\u{1f600}"),
    );

    let mut provider = FontProvider::new(config);
    provider.add_face(Rc::clone(&primary) as Rc<dyn FaceBackend>, false);
    provider.add_face(Rc::new(ProceduralFace::ascii("Arial").with_weight(FontWeight::BOLD)), false);
    provider.add_face(Rc::new(ProceduralFace::ascii("Arial").with_style(FontStyle::Italic)), false);
    provider.add_face(Rc::clone(&fallback) as Rc<dyn FaceBackend>, true);

    Fixture { provider, primary, fallback }
}

pub fn fixture() -> Fixture {
    fixture_with(config())
}

impl Fixture {
    pub fn regular(&mut self) -> HandleId {
        self.provider
            .get_font_face_handle("Arial", FontStyle::Normal, FontWeight::NORMAL, SIZE)
            .expect("regular Arial handle")
    }
}
