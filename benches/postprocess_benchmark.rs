use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array2;

use ocrpost::{
    ctc_greedy_decode, default_charset, OcrParams, OwnedTensor, QuantInfo, Roi, TextDetection,
};

fn det_roi(h: usize, w: usize) -> Roi {
    let mut data = vec![0u8; h * w];
    // a handful of text-line-shaped blobs
    for (bx, by, bw, bh) in [
        (40usize, 60usize, 180usize, 14usize),
        (260, 58, 120, 16),
        (40, 120, 300, 18),
        (420, 300, 90, 12),
    ] {
        for y in by..by + bh {
            for x in bx..bx + bw {
                data[y * w + x] = 230;
            }
        }
    }
    let mut roi = Roi::new();
    roi.add_tensor(OwnedTensor::new(
        "det_out",
        vec![1, 1, h, w],
        data,
        QuantInfo::unit(),
    ));
    roi
}

fn benchmark_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("detection_postprocess");
    group.sample_size(20);

    let det = TextDetection::new(Arc::new(OcrParams::default()));
    group.bench_function("640x640_map", |b| {
        b.iter(|| {
            let mut roi = det_roi(640, 640);
            det.run(black_box(&mut roi)).expect("detection failed");
            roi.detections().len()
        })
    });

    group.finish();
}

fn benchmark_ctc_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("ctc_decode");

    let charset = default_charset();
    let classes = charset.len();
    let timesteps = 40;
    let mut probs = Array2::<f32>::zeros((timesteps, classes));
    for t in 0..timesteps {
        // deterministic pseudo-peaks spread over the table
        let peak = (t * 7) % classes;
        probs[[t, peak]] = 0.9;
    }

    group.bench_function("40x97", |b| {
        b.iter(|| ctc_greedy_decode(black_box(&probs), 0, &charset))
    });

    group.finish();
}

criterion_group!(benches, benchmark_detection, benchmark_ctc_decode);
criterion_main!(benches);
