use std::time::Instant;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use texdecode::{CpuStrategy, DecodedPixelBuffer, Dimensions, PackedTexelBuffer, PatternGenerator, PixelFormat};

fn cpu_decode_benchmark(c: &mut Criterion) {
    const SIDE: u32 = 1024;

    let dims = Dimensions::square(SIDE).expect("valid benchmark dimensions");
    let mut src = PackedTexelBuffer::new(dims, PixelFormat::Rgb565);
    PatternGenerator::default().refresh(&mut src, Instant::now());
    let mut dst = DecodedPixelBuffer::new(dims);

    let mut group = c.benchmark_group("rgb565 1024x1024");
    for strategy in CpuStrategy::ALL {
        group.bench_function(strategy.name(), |b| {
            b.iter(|| strategy.decode(black_box(&src), black_box(&mut dst)))
        });
    }
    group.finish();
}

criterion_group!(benches, cpu_decode_benchmark);
criterion_main!(benches);
