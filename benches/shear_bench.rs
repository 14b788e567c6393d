// Benchmark for the streaming shear transform
// Run with: cargo bench

use criterion::{Criterion, criterion_group, criterion_main};
use skewcomp::{GCodeShearTransformer, Plane, SkewFactors};
use std::io::Cursor;

fn bench_shear_transform(c: &mut Criterion) {
    let mut gcode = String::new();
    for i in 0..10_000 {
        gcode.push_str(&format!("G1 X{}.25 Y{}.5 E0.04 F1500\n", i % 200, i % 180));
    }
    let factors = SkewFactors::default().with(Plane::Xy, 0.0028);

    c.bench_function("transform 10k movement lines", |b| {
        b.iter(|| {
            let mut transformer = GCodeShearTransformer::new(factors);
            let mut out = Vec::with_capacity(gcode.len() + gcode.len() / 8);
            transformer
                .transform(Cursor::new(gcode.as_bytes()), &mut out)
                .unwrap();
            assert_eq!(transformer.rewritten_lines(), 10_000);
        });
    });

    let passthrough: String = std::iter::repeat("M117 printing...\n").take(10_000).collect();
    c.bench_function("pass through 10k non-movement lines", |b| {
        b.iter(|| {
            let mut transformer = GCodeShearTransformer::new(factors);
            let mut out = Vec::with_capacity(passthrough.len());
            transformer
                .transform(Cursor::new(passthrough.as_bytes()), &mut out)
                .unwrap();
            assert_eq!(transformer.rewritten_lines(), 0);
        });
    });
}

criterion_group!(benches, bench_shear_transform);
criterion_main!(benches);
