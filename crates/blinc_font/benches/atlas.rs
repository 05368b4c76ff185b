//! Benchmarks for atlas packing and glyph convolution.
//!
//! Run with: cargo bench -p blinc_font

use blinc_font::glyph::GlyphImage;
use blinc_font::{ColorFormat, ConvolutionFilter, FilterOperation, TextureLayout, Vector2i};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Glyph-like boxes with a spread of heights
fn glyph_boxes(count: usize) -> Vec<Vector2i> {
    (0..count as i32).map(|i| Vector2i::new(6 + i % 11, 9 + (i * 7) % 15)).collect()
}

fn bench_texture_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("texture_layout");
    for count in [96, 512, 4096] {
        let boxes = glyph_boxes(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &boxes, |b, boxes| {
            b.iter(|| {
                let mut layout = TextureLayout::new();
                for (id, &dimensions) in boxes.iter().enumerate() {
                    layout.add_rectangle(id as u64, dimensions);
                }
                let _ = layout.generate_layout(black_box(1024));
                layout.num_textures()
            })
        });
    }
    group.finish();
}

fn gaussian(radius: i32) -> Option<ConvolutionFilter> {
    let mut filter = ConvolutionFilter::with_radii(Vector2i::new(radius, 0), FilterOperation::Sum)?;
    let sigma = (radius as f32 * 0.4).max(0.5);
    let weights: Vec<f32> =
        (-radius..=radius).map(|x| (-((x * x) as f32) / (2.0 * sigma * sigma)).exp()).collect();
    let total: f32 = weights.iter().sum();
    for (weight, slot) in weights.iter().zip(filter[0].iter_mut()) {
        *slot = weight / total;
    }
    Some(filter)
}

fn bench_convolution(c: &mut Criterion) {
    let source_dimensions = Vector2i::new(24, 32);
    let source: Vec<u8> =
        (0..source_dimensions.area()).map(|i| if i % 3 == 0 { 0xff } else { 0x40 }).collect();

    let mut group = c.benchmark_group("convolution");
    for radius in [1, 4, 8] {
        let destination_dimensions = source_dimensions + Vector2i::new(radius * 2, radius * 2);
        let stride = destination_dimensions.x as usize * 4;
        let mut destination = vec![0u8; stride * destination_dimensions.y as usize];

        let dilation = ConvolutionFilter::new(radius, FilterOperation::Dilation).map(|mut filter| {
            for row in 0..filter.kernel_size().y as usize {
                filter[row].fill(1.0);
            }
            filter
        });
        let blur = gaussian(radius);

        for (name, filter) in [("dilation", dilation), ("blur", blur)] {
            let Some(filter) = filter else { continue };
            group.bench_with_input(BenchmarkId::new(name, radius), &radius, |b, &radius| {
                b.iter(|| {
                    let image = GlyphImage {
                        dimensions: source_dimensions,
                        format: ColorFormat::A8,
                        data: &source,
                    };
                    filter.run(
                        &mut destination,
                        destination_dimensions,
                        stride,
                        ColorFormat::Rgba8,
                        black_box(image),
                        Vector2i::new(radius, radius),
                    );
                })
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_texture_layout, bench_convolution);
criterion_main!(benches);
