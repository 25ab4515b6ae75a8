//! Benchmarks for the Disorder entropy pipeline.
//!
//! Run with: cargo bench -p disorder-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use disorder_core::config::{ColorSpace, OutputConfig, PersistMode};
use disorder_core::math::DEFAULT_COLOR_WEIGHTS;
use disorder_core::methods::{MethodKind, MethodSpec};
use disorder_core::normalization::noise_image;
use disorder_core::pipeline::{PartitionedProcessor, Preprocessor};
use disorder_core::types::{ImageIdentity, LoadedImage, PreprocessedImage};
use disorder_core::{DataSaver, EntropyCalculator, EntropyRecord, EntropyValue, MethodResult};
use image::DynamicImage;
use std::path::PathBuf;

fn identity(side: u32) -> ImageIdentity {
    ImageIdentity {
        path: PathBuf::from("bench.png"),
        size: 0,
        width: side,
        height: side,
        label: String::new(),
    }
}

fn preprocessed(side: u32) -> PreprocessedImage {
    let raw = DynamicImage::ImageRgb8(noise_image(side, 7));
    Preprocessor::new(None, ColorSpace::Rgb).preprocess(LoadedImage {
        identity: identity(side),
        raw,
    })
}

fn benchmark_preprocess(c: &mut Criterion) {
    let raw = DynamicImage::ImageRgb8(noise_image(512, 7));
    let preprocessor = Preprocessor::new(None, ColorSpace::Hsb);

    c.bench_function("preprocess_hsb_512", |b| {
        b.iter(|| {
            let _ = preprocessor.to_array(black_box(&raw));
        })
    });
}

fn benchmark_methods(c: &mut Criterion) {
    let image = preprocessed(128);
    let mut group = c.benchmark_group("method_128");
    group.sample_size(20);

    for kind in MethodKind::ALL {
        let spec = MethodSpec::new(kind);
        group.bench_function(kind.name(), |b| {
            b.iter(|| {
                let _ = spec.transform(black_box(image.pixels.view()));
            })
        });
    }
    group.finish();
}

fn benchmark_partitioned_scoring(c: &mut Criterion) {
    let methods = vec![
        MethodSpec::new(MethodKind::Histogram),
        MethodSpec::new(MethodKind::Frequency),
        MethodSpec::new(MethodKind::Laplace),
    ];
    let processor = PartitionedProcessor::new(methods, 2, DEFAULT_COLOR_WEIGHTS);
    let calculator = EntropyCalculator::unnormalized();
    let pixels = preprocessed(128).pixels;

    c.bench_function("score_depth2_128", |b| {
        b.iter(|| {
            let image = PreprocessedImage {
                identity: identity(128),
                pixels: pixels.clone(),
            };
            let _ = calculator.score(processor.process(black_box(image)));
        })
    });
}

fn benchmark_append_flush(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let config = OutputConfig {
        mode: PersistMode::Append,
        save_images: false,
        ..OutputConfig::default()
    };
    let mut saver = DataSaver::open(dir.path(), vec!["hist".into()], &config).unwrap();
    let batch: Vec<EntropyRecord> = (0..50)
        .map(|i| EntropyRecord {
            path: PathBuf::from(format!("img_{i}.png")),
            size: 1024,
            pixel_size: [128, 128],
            label: "bench".into(),
            entropy_results: vec![MethodResult {
                method: "hist".into(),
                result: EntropyValue::Scalar(i as f64 / 50.0),
            }],
        })
        .collect();

    c.bench_function("append_flush_50", |b| {
        b.iter(|| {
            let _ = saver.flush(black_box(batch.clone()));
        })
    });
}

criterion_group!(
    benches,
    benchmark_preprocess,
    benchmark_methods,
    benchmark_partitioned_scoring,
    benchmark_append_flush,
);
criterion_main!(benches);
