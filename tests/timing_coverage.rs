//! Coverage tests for the timing recorder and handler timelines

use std::sync::Arc;
use std::thread;

use pacbench::handler::build_handler_with_recorder;
use pacbench::timing::{CALC_END, CALC_FAILED, CALC_START, INIT_END, INIT_START};
use pacbench::{
    BackendKind, BenchError, HandlerConfig, MeanScaledTemplate, Tensor, TensorData,
    TimingRecorder, UnitError,
};

#[test]
fn test_interleaved_pairs_match_by_position() {
    let recorder = TimingRecorder::new();
    recorder.record("calc_start");
    recorder.record("calc_start");
    recorder.record("calc_end");
    recorder.record("calc_end");

    let stat = recorder.interval_stats(CALC_START, CALC_END).unwrap();
    assert_eq!(stat.count, 2);
    assert!(stat.mean_seconds >= 0.0);
    assert!(stat.std_seconds >= 0.0);
}

#[test]
fn test_unmatched_start_is_stats_error() {
    let recorder = TimingRecorder::new();
    recorder.record(CALC_START);
    assert!(matches!(
        recorder.interval_stats(CALC_START, CALC_END),
        Err(BenchError::Stats { .. })
    ));
}

#[test]
fn test_missing_labels_are_stats_error() {
    let recorder = TimingRecorder::new();
    assert!(recorder.is_empty());
    assert!(matches!(
        recorder.interval_stats(INIT_START, INIT_END),
        Err(BenchError::Stats { .. })
    ));
}

#[test]
fn test_timestamps_are_monotonic() {
    let recorder = TimingRecorder::new();
    for _ in 0..50 {
        recorder.record("tick");
    }
    let ts = recorder.timestamps("tick");
    assert_eq!(ts.len(), 50);
    assert!(ts.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_concurrent_records_are_all_kept() {
    let recorder = TimingRecorder::new();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let recorder = recorder.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    recorder.record(CALC_START);
                    recorder.record(CALC_END);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(recorder.len(), 1600);
    assert_eq!(recorder.interval_stats(CALC_START, CALC_END).unwrap().count, 800);
}

#[test]
fn test_shared_timeline_keeps_per_handler_stats() {
    let recorder = TimingRecorder::new();
    let unit = Arc::new(MeanScaledTemplate::new(3, 2));
    let mut a =
        build_handler_with_recorder(HandlerConfig::new(8, 512.0), unit.clone(), recorder.clone())
            .unwrap();
    let mut b = build_handler_with_recorder(
        HandlerConfig::new(8, 512.0).with_backend(BackendKind::ThreadParallel),
        unit,
        recorder.clone(),
    )
    .unwrap();

    let signal = TensorData::from(Tensor::from_vec(vec![1, 2, 2, 8], vec![1.0f32; 32]).unwrap());
    a.compute(&signal).unwrap();
    for _ in 0..4 {
        b.compute(&signal).unwrap();
    }
    // Unrelated labels on the same timeline
    recorder.record(CALC_START);

    let a_stats = a.stats().unwrap();
    let b_stats = b.stats().unwrap();
    assert_eq!(a_stats.init.count, 1);
    assert_eq!(a_stats.calc.count, 1);
    assert_eq!(b_stats.init.count, 1);
    assert_eq!(b_stats.calc.count, 4);
    assert_eq!(recorder.count(&a.timing_label(CALC_END)), 1);
    assert_eq!(recorder.count(&b.timing_label(CALC_END)), 4);
}

fn reject_all(_: &pacbench::TensorView<'_, f32>) -> Result<Tensor<f32>, UnitError> {
    Err(UnitError::new("rejected"))
}

#[test]
fn test_failed_compute_then_success_keeps_stats_unavailable() {
    let recorder = TimingRecorder::new();
    let mut failing = build_handler_with_recorder(
        HandlerConfig::new(8, 512.0),
        Arc::new(reject_all),
        recorder.clone(),
    )
    .unwrap();
    let signal = TensorData::from(Tensor::from_vec(vec![1, 1, 1, 8], vec![1.0f32; 8]).unwrap());

    assert!(failing.compute(&signal).is_err());
    assert_eq!(recorder.count(&failing.timing_label(CALC_START)), 1);
    assert_eq!(recorder.count(&failing.timing_label(CALC_FAILED)), 1);
    assert_eq!(recorder.count(&failing.timing_label(CALC_END)), 0);
    assert!(matches!(failing.stats(), Err(BenchError::Stats { .. })));
}
