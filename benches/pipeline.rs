// Benchmarks for the three pipeline stages on a scattered triangle soup.
use binraster::{
    BinRasterizer, ClipVolume, ConstantShader, FineRasterizer, Pipeline, PointBuffer,
    RasterConfig, VertexShadingStage, allocate_bin_queues,
};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

const TRIANGLES: usize = 2000;

fn clip() -> ClipVolume {
    ClipVolume::new(vec![-3.0, -3.0, 0.5], vec![3.0, 3.0, 10.0])
}

// Small triangles spread over the view volume, deterministic across runs
fn scene() -> PointBuffer {
    let mut state = 0x2545_f491u32;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        state as f32 / u32::MAX as f32
    };

    let mut coords = Vec::with_capacity(TRIANGLES * 9);
    for _ in 0..TRIANGLES {
        let z = 1.0 + next() * 8.0;
        let cx = (next() * 2.0 - 1.0) * z;
        let cy = (next() * 2.0 - 1.0) * z;
        for _ in 0..3 {
            coords.push(cx + (next() - 0.5) * 0.6 * z);
            coords.push(cy + (next() - 0.5) * 0.6 * z);
            coords.push(z);
        }
    }
    PointBuffer::new(3, coords).unwrap()
}

fn bench_vertex_shading(c: &mut Criterion) {
    let points = scene();
    let clip = clip();
    let mut result = PointBuffer::zeroed(3, points.len()).unwrap();
    c.bench_function("vertex_shading", |b| {
        b.iter(|| VertexShadingStage::shade_into(black_box(&points), &clip, &mut result).unwrap());
    });
}

fn bench_binning(c: &mut Criterion) {
    let config = RasterConfig::default();
    let triangles = VertexShadingStage::shade(&scene(), &clip()).unwrap().triangles();
    let mut group = c.benchmark_group("binning");
    for producers in [1, 4, 8] {
        let mut queues = allocate_bin_queues(producers, config.screen, 32, 32, 16).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(producers), &producers, |b, _| {
            b.iter(|| BinRasterizer::bin(&mut queues, black_box(&triangles)).unwrap());
        });
    }
    group.finish();
}

fn bench_fine_rasterization(c: &mut Criterion) {
    let config = RasterConfig::default();
    let triangles = VertexShadingStage::shade(&scene(), &clip()).unwrap().triangles();
    let mut queues = allocate_bin_queues(4, config.screen, 32, 32, 16).unwrap();
    BinRasterizer::bin(&mut queues, &triangles).unwrap();
    let bins = queues.config();
    let mut fine = FineRasterizer::new(config.screen, bins).unwrap();
    let mut frame = config.new_frame_buffer().unwrap();
    let shader = ConstantShader::default();

    c.bench_function("fine_rasterization", |b| {
        b.iter(|| {
            frame.clear(config.background, config.far_depth);
            fine.rasterize(&queues, black_box(&triangles), &shader, &mut frame)
                .unwrap();
        });
    });
}

fn bench_full_frame(c: &mut Criterion) {
    let config = RasterConfig {
        producer_count: 4,
        ..RasterConfig::default()
    };
    let points = scene();
    let clip = clip();
    let mut pipeline = Pipeline::new(config).unwrap();
    let mut frame = config.new_frame_buffer().unwrap();
    let shader = ConstantShader::default();

    c.bench_function("full_frame", |b| {
        b.iter(|| {
            frame.clear(config.background, config.far_depth);
            pipeline
                .render(black_box(&points), &clip, &shader, &mut frame)
                .unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_vertex_shading,
    bench_binning,
    bench_fine_rasterization,
    bench_full_frame
);
criterion_main!(benches);
