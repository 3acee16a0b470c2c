use criterion::{black_box, criterion_group, criterion_main, Criterion};

use jitterbug::audio::{SpectralAnalyzer, SpectralConfig};

fn sine(freq: f32, frames: usize, amplitude: f32) -> Vec<f32> {
    (0..frames)
        .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / 44_100.0).sin())
        .collect()
}

fn bench_execute(c: &mut Criterion) {
    let mut analyzer = SpectralAnalyzer::new(SpectralConfig {
        bands: 24,
        channels: 1,
        ..SpectralConfig::default()
    })
    .unwrap();
    let frame = sine(220.0, 735, 12_000.0);

    c.bench_function("spectral_execute_one_frame", |b| {
        b.iter(|| {
            let out = analyzer.execute(black_box(&frame));
            black_box(out[0])
        })
    });
}

criterion_group!(benches, bench_execute);
criterion_main!(benches);
