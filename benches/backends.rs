//! Benchmark suite for the execution backends
//!
//! Compares the vectorized and thread-parallel backends on the same folded
//! batch, across chunk sizes, worker counts and precisions. The unit
//! computation is the deterministic template metric, so the numbers measure
//! dispatch overhead rather than signal processing.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use half::f16;
use pacbench::backend::{ExecutionBackend, ThreadParallelBackend, VectorizedBackend};
use pacbench::fold::fold;
use pacbench::{
    build_handler, BackendKind, HandlerConfig, MeanScaledTemplate, Precision, Tensor, TensorData,
};

const SEQ_LEN: usize = 1024;

fn create_signal(batch: usize, channels: usize, segments: usize) -> Tensor<f32> {
    let n = batch * channels * segments * SEQ_LEN;
    let data = (0..n).map(|i| ((i * 31) % 97) as f32 * 0.01).collect();
    Tensor::from_vec(vec![batch, channels, segments, SEQ_LEN], data).unwrap()
}

fn benchmark_vectorized_chunk_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("vectorized_chunk_size");
    let signal = create_signal(4, 16, 4);
    let (folded, _) = fold(&signal, 2).unwrap();
    let unit = MeanScaledTemplate::new(10, 10);
    group.throughput(Throughput::Elements(folded.shape()[0] as u64));

    for chunk_size in [1, 3, 8, 32, 64] {
        let backend = VectorizedBackend::new(chunk_size, Precision::F32, SEQ_LEN).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(chunk_size), &chunk_size, |b, _| {
            b.iter(|| backend.run(black_box(&folded), &unit).unwrap());
        });
    }
    group.finish();
}

fn benchmark_parallel_threads(c: &mut Criterion) {
    let mut group = c.benchmark_group("thread_parallel_workers");
    let signal = create_signal(4, 16, 4);
    let (folded, _) = fold(&signal, 2).unwrap();
    let unit = MeanScaledTemplate::new(10, 10);
    group.throughput(Throughput::Elements(folded.shape()[0] as u64));

    for threads in [1, 2, 4, 8] {
        let backend = ThreadParallelBackend::new(threads, Precision::F32, SEQ_LEN).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, _| {
            b.iter(|| backend.run(black_box(&folded), &unit).unwrap());
        });
    }
    group.finish();
}

fn benchmark_handlers(c: &mut Criterion) {
    let mut group = c.benchmark_group("handler_compute");
    let f32_signal = create_signal(2, 8, 4);
    let f16_signal: Tensor<f16> = f32_signal.cast();
    let unit = Arc::new(MeanScaledTemplate::new(30, 30));

    for backend in [BackendKind::Vectorized, BackendKind::ThreadParallel] {
        for precision in [Precision::F32, Precision::F16] {
            let config = HandlerConfig::new(SEQ_LEN, 512.0)
                .with_backend(backend)
                .with_precision(precision);
            let mut handler = build_handler(config, unit.clone()).unwrap();
            let input = match precision {
                Precision::F32 => TensorData::from(f32_signal.clone()),
                Precision::F16 => TensorData::from(f16_signal.clone()),
            };
            let id = BenchmarkId::new(backend.name(), precision);
            group.bench_function(id, |b| {
                b.iter(|| handler.compute(black_box(&input)).unwrap());
            });
        }
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_vectorized_chunk_sizes,
    benchmark_parallel_threads,
    benchmark_handlers
);
criterion_main!(benches);
