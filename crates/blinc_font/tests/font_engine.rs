mod common;

use std::rc::Rc;

use blinc_font::{
    FontEffect, FontEffectFactory, FontEngineConfig, FontError, FontKerning, FontProvider,
    FontStyle, FontWeight, HandleId, LayerId, PropertyDictionary, PropertyValue, ShadowEffect,
    ShapingMode, StringPaint, TextShapingContext, TextureError, TexturedMesh, Vector2f, Vector2i,
};
use common::{fixture, fixture_with, SIZE};

fn outline(width: f32) -> Rc<dyn FontEffect> {
    let properties = PropertyDictionary::new().with("width", PropertyValue::Length(width));
    FontEffectFactory::new().instance("outline", &properties).unwrap().unwrap()
}

fn generate(
    provider: &mut FontProvider,
    handle: HandleId,
    text: &str,
    configuration: usize,
) -> (Vec<TexturedMesh>, f32) {
    let mut meshes = Vec::new();
    let paint = StringPaint { layer_configuration: configuration, ..StringPaint::default() };
    let shaping = TextShapingContext::default();
    let position = Vector2f::new(10.0, 20.0);
    let width = provider
        .generate_string(handle, &mut meshes, text, position, paint, &shaping, None)
        .unwrap();
    (meshes, width)
}

fn width(provider: &mut FontProvider, handle: HandleId, text: &str) -> Result<f32, FontError> {
    provider.get_string_width(handle, text, &TextShapingContext::default(), None)
}

fn cached_advance(provider: &FontProvider, handle: HandleId, character: char) -> i32 {
    provider
        .handle(handle)
        .unwrap()
        .glyphs()
        .values()
        .find(|cached| cached.character == character)
        .map(|cached| cached.glyph.advance)
        .unwrap()
}

#[test]
fn outline_configuration_paints_outline_then_base() {
    let mut fixture = fixture();
    let handle = fixture.regular();
    let provider = &mut fixture.provider;

    assert_eq!(provider.generate_layer_configuration(handle, &[]).unwrap(), 0);
    let configuration = provider.generate_layer_configuration(handle, &[outline(2.0)]).unwrap();
    assert_eq!(configuration, 1);

    let layers = provider.handle(handle).unwrap().layer_configuration(1).unwrap().to_vec();
    assert_eq!(layers.len(), 2);
    assert_ne!(layers[0], LayerId::BASE);
    assert_eq!(layers[1], LayerId::BASE);

    let (meshes, width) = generate(provider, handle, "Hi", configuration);
    assert!(meshes.len() >= 2);
    assert_eq!(meshes.first().unwrap().texture.layer, layers[0]);
    assert_eq!(meshes.last().unwrap().texture.layer, LayerId::BASE);

    let expected = cached_advance(provider, handle, 'H') + cached_advance(provider, handle, 'i');
    assert_eq!(width, expected as f32);
}

#[test]
fn repeated_configuration_request_returns_same_index() {
    let mut fixture = fixture();
    let handle = fixture.regular();
    let provider = &mut fixture.provider;
    let effect = outline(2.0);
    let shadow: Rc<dyn FontEffect> = Rc::new(ShadowEffect::new(Vector2i::new(1, 1)));

    let first = provider.generate_layer_configuration(handle, &[Rc::clone(&effect)]).unwrap();
    let second =
        provider.generate_layer_configuration(handle, &[shadow, Rc::clone(&effect)]).unwrap();
    assert_eq!(provider.generate_layer_configuration(handle, &[effect]).unwrap(), first);
    assert_ne!(first, second);
    assert_eq!(provider.handle(handle).unwrap().num_layer_configurations(), 3);
}

#[test]
fn fallback_glyph_is_recorded_once() {
    let mut fixture = fixture();
    let handle = fixture.regular();

    let snowman = width(&mut fixture.provider, handle, "\u{2603}").unwrap();
    let primary = fixture.provider.handle(handle).unwrap();
    assert!(snowman > 0.0);
    assert_eq!(primary.fallback_glyphs().len(), 1);
    assert!(primary.is_layers_dirty());

    width(&mut fixture.provider, handle, "\u{2603}\u{2603}").unwrap();
    assert_eq!(fixture.provider.handle(handle).unwrap().fallback_glyphs().len(), 1);
}

#[test]
fn character_missing_everywhere_uses_replacement() {
    let mut fixture = fixture();
    let handle = fixture.regular();

    let missing = width(&mut fixture.provider, handle, "\u{4e00}").unwrap();
    let primary = fixture.provider.handle(handle).unwrap();
    assert_eq!(missing, primary.glyphs()[&0].glyph.advance as f32);
    assert!(primary.fallback_glyphs().is_empty());
}

#[test]
fn version_changes_only_when_glyphs_are_added() {
    let mut fixture = fixture();
    let handle = fixture.regular();
    let provider = &mut fixture.provider;
    assert_eq!(provider.version(handle).unwrap(), 0);

    generate(provider, handle, "ab", 0);
    assert_eq!(provider.version(handle).unwrap(), 1);
    generate(provider, handle, "ba", 0);
    assert_eq!(provider.version(handle).unwrap(), 1);
    generate(provider, handle, "abc", 0);
    assert_eq!(provider.version(handle).unwrap(), 2);
}

#[test]
fn glyphs_are_rasterized_once() {
    let mut fixture = fixture();
    let handle = fixture.regular();

    generate(&mut fixture.provider, handle, "hello", 0);
    let renders = fixture.primary.render_count();
    generate(&mut fixture.provider, handle, "hello hello", 0);
    // Only the space is new
    assert_eq!(fixture.primary.render_count(), renders + 1);
}

#[test]
fn equal_effects_share_generated_textures() {
    let mut fixture = fixture();
    let handle = fixture.regular();
    let provider = &mut fixture.provider;

    let first = provider.generate_layer_configuration(handle, &[outline(3.0)]).unwrap();
    let second = provider.generate_layer_configuration(handle, &[outline(3.0)]).unwrap();
    assert_ne!(first, second);
    generate(provider, handle, "shared", second);

    let face = provider.handle(handle).unwrap();
    let owner = face.layer(face.layer_configuration(first).unwrap()[0]).unwrap();
    let clone = face.layer(face.layer_configuration(second).unwrap()[0]).unwrap();
    assert!(owner.owns_textures());
    assert!(!clone.owns_textures());
    assert!(Rc::ptr_eq(owner.textures(), clone.textures()));
}

#[test]
fn shadow_reuses_base_textures() {
    let mut fixture = fixture();
    let handle = fixture.regular();
    let shadow: Rc<dyn FontEffect> = Rc::new(ShadowEffect::new(Vector2i::new(2, 2)));
    let configuration = fixture.provider.generate_layer_configuration(handle, &[shadow]).unwrap();
    let (meshes, _) = generate(&mut fixture.provider, handle, "Shadow", configuration);

    let face = fixture.provider.handle(handle).unwrap();
    let layers = face.layer_configuration(configuration).unwrap();
    let shadow_layer = face.layer(layers[0]).unwrap();
    let base_layer = face.layer(LayerId::BASE).unwrap();
    assert!(Rc::ptr_eq(shadow_layer.textures(), base_layer.textures()));
    assert_eq!(meshes.len(), 2);
    // Both meshes sample the same texture through different layers
    assert_eq!(meshes[0].texture.texture_index, meshes[1].texture.texture_index);
    assert_eq!(meshes[0].mesh.quad_count(), meshes[1].mesh.quad_count());
}

#[test]
fn string_width_matches_cached_advances() {
    let mut fixture = fixture();
    let handle = fixture.regular();
    let shaping = TextShapingContext::default().with_letter_spacing(1.5);
    let text = "Hello";

    let width = fixture.provider.get_string_width(handle, text, &shaping, None).unwrap();
    let expected: f32 = text
        .chars()
        .map(|character| cached_advance(&fixture.provider, handle, character) as f32 + 1.5)
        .sum();
    assert_eq!(width, expected);
}

#[test]
fn kerning_follows_shaping_context() {
    for mode in [ShapingMode::Direct, ShapingMode::Shaped] {
        let mut fixture = fixture_with(common::config().with_shaping(mode));
        let handle = fixture.regular();
        let provider = &mut fixture.provider;
        let kerned = TextShapingContext::default().with_kerning(FontKerning::Normal);
        let plain = TextShapingContext::default().with_kerning(FontKerning::None);

        let with_kerning = provider.get_string_width(handle, "AV", &kerned, None).unwrap();
        let without_kerning = provider.get_string_width(handle, "AV", &plain, None).unwrap();
        assert_eq!(without_kerning - with_kerning, (SIZE / 8) as f32, "{mode:?}");
    }
}

#[test]
fn prior_character_kerns_the_first_quad() {
    for mode in [ShapingMode::Direct, ShapingMode::Shaped] {
        let mut fixture = fixture_with(common::config().with_shaping(mode));
        let handle = fixture.regular();
        let shaping = TextShapingContext::default().with_kerning(FontKerning::Normal);

        let mut first_vertex_x = |prior: Option<char>| {
            let mut meshes = Vec::new();
            let paint = StringPaint::default();
            fixture
                .provider
                .generate_string(handle, &mut meshes, "V", Vector2f::ZERO, paint, &shaping, prior)
                .unwrap();
            meshes[0].mesh.vertices[0].position[0]
        };
        let alone = first_vertex_x(None);
        let after_a = first_vertex_x(Some('A'));
        assert_eq!(alone - after_a, (SIZE / 8) as f32, "{mode:?}");
        assert_eq!(first_vertex_x(Some('x')), alone, "{mode:?}");
    }
}

#[test]
fn texture_data_covers_the_atlas() {
    let mut fixture = fixture();
    let handle = fixture.regular();
    let (meshes, _) = generate(&mut fixture.provider, handle, "Atlas", 0);
    assert_eq!(meshes.len(), 1);

    let data = fixture.provider.request_texture_data(meshes[0].texture).unwrap();
    assert_eq!(data.pixels.len(), data.dimensions.area() * 4);
    assert!(data.pixels.iter().any(|&byte| byte != 0));
    // Requests can be repeated
    assert_eq!(fixture.provider.request_texture_data(meshes[0].texture).unwrap(), data);
}

#[test]
fn stale_texture_request_is_rejected() {
    let mut fixture = fixture();
    let handle = fixture.regular();
    let (meshes, _) = generate(&mut fixture.provider, handle, "a", 0);
    let request = meshes[0].texture;

    generate(&mut fixture.provider, handle, "ab", 0);
    let error = fixture.provider.request_texture_data(request).unwrap_err();
    assert_eq!(error, TextureError::Stale { requested: 1, current: 2 });
}

#[test]
fn released_handle_fails_softly() {
    let mut fixture = fixture();
    let handle = fixture.regular();
    let (meshes, _) = generate(&mut fixture.provider, handle, "gone", 0);

    fixture.provider.release_font_resources();
    assert_eq!(
        fixture.provider.request_texture_data(meshes[0].texture).unwrap_err(),
        TextureError::UnknownHandle(handle)
    );
    let error = width(&mut fixture.provider, handle, "gone").unwrap_err();
    assert!(matches!(error, FontError::UnknownHandle(id) if id == handle));
}

#[test]
fn unmapped_cluster_is_reshaped_with_fallback_face() {
    let mut fixture = fixture();
    let handle = fixture.regular();
    let (meshes, _) = generate(&mut fixture.provider, handle, "xe\u{301}y", 0);

    let face = fixture.provider.handle(handle).unwrap();
    assert_eq!(face.fallback_cluster_glyphs().len(), 1);
    assert_eq!(meshes.iter().map(|mesh| mesh.mesh.quad_count()).sum::<usize>(), 4);
}

#[test]
fn colour_glyphs_are_not_tinted() {
    let mut fixture = fixture();
    let handle = fixture.regular();
    let mut meshes = Vec::new();
    let red = blinc_font::Colourb::new(255, 0, 0, 255);
    let paint = StringPaint { colour: red, ..StringPaint::default() };
    let shaping = TextShapingContext::default();
    fixture
        .provider
        .generate_string(handle, &mut meshes, "a\u{1f600}", Vector2f::ZERO, paint, &shaping, None)
        .unwrap();

    let colours: Vec<[u8; 4]> =
        meshes[0].mesh.vertices.iter().map(|vertex| vertex.colour).collect();
    assert!(colours.contains(&[255, 0, 0, 255]));
    assert!(colours.contains(&[255, 255, 255, 255]));
}

#[test]
fn family_resolution_prefers_style_then_weight() {
    let mut fixture = fixture();
    let provider = &mut fixture.provider;
    let mut resolve = |family: &str, style: FontStyle, weight: FontWeight| {
        provider.get_font_face_handle(family, style, weight, SIZE)
    };

    let regular = resolve("arial", FontStyle::Normal, FontWeight::NORMAL).unwrap();
    let bold = resolve("ARIAL", FontStyle::Normal, FontWeight(650)).unwrap();
    let italic = resolve("Arial", FontStyle::Italic, FontWeight::BOLD).unwrap();
    assert_ne!(regular, bold);
    assert_eq!(resolve("Arial", FontStyle::Normal, FontWeight(450)), Some(regular));
    assert_eq!(resolve("Helvetica", FontStyle::Normal, FontWeight::NORMAL), None);

    assert_eq!(provider.handle(bold).unwrap().backend().weight(), FontWeight::BOLD);
    assert_eq!(provider.handle(italic).unwrap().backend().style(), FontStyle::Italic);
}

#[test]
fn configured_fallbacks_skip_missing_files() {
    let config = FontEngineConfig::from_toml_str(
        r#"
        preload_ascii = false
        fallback_faces = ["/nonexistent/NotoEmoji.ttf"]
        "#,
    )
    .unwrap();
    let mut fixture = fixture_with(config);
    assert_eq!(fixture.provider.load_configured_fallbacks(), 0);
    assert_eq!(fixture.provider.count_fallback_faces(), 1);
}
