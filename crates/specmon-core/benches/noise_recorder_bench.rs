//! Accumulator Benchmarks
//!
//! Update and query cost of the per-frequency noise history.
//!
//! Run with: cargo bench -p specmon-core --bench noise_recorder_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

use specmon_core::provider::SpectralMaskTable;
use specmon_core::{
    max_noise_bin, FrequencySegment, Microseconds, MonitorConfig, NoiseRecorder, Reception,
    SpectrumMonitor, TimePoint,
};

/// Recorder update over increasing reception durations
fn bench_recorder_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("recorder_update");
    let config = MonitorConfig::default();

    for duration_us in [1_000u64, 10_000, 100_000, 1_000_000].iter() {
        let bins = duration_us / config.noisebinsize.count();
        group.throughput(Throughput::Elements(bins));

        group.bench_with_input(
            BenchmarkId::from_parameter(duration_us),
            duration_us,
            |b, &duration_us| {
                let mut recorder = NoiseRecorder::new(
                    config.noisebinsize,
                    config.noisemaxsegmentoffset,
                    config.noisemaxmessagepropagation,
                    config.noisemaxsegmentduration,
                    2_400_000_000,
                    1_000_000,
                );
                let mut start = TimePoint::from_secs(1_000);
                b.iter(|| {
                    let end = start + Microseconds(duration_us);
                    recorder.update(black_box(start), black_box(end), 1e-7);
                    start += Microseconds(duration_us);
                })
            },
        );
    }

    group.finish();
}

/// One query period: request plus ten max-bin summaries
fn bench_query_period(c: &mut Criterion) {
    let config = MonitorConfig::default();
    let mut monitor = match SpectrumMonitor::new(
        0,
        config.limits(),
        config.bandwidth,
        Arc::new(SpectralMaskTable::new()),
    ) {
        Ok(monitor) => monitor,
        Err(e) => panic!("invalid default limits: {}", e),
    };

    let now = TimePoint::from_secs(1_000);
    let segments = [FrequencySegment::new(2_400_000_000, Microseconds(0), Microseconds(100_000))];
    let reception = Reception {
        tx_time: now,
        propagation_delay: Microseconds(3),
        segments: &segments,
        bandwidth_hz: 1_000_000,
        powers_mw: &[1e-7],
        transmitters: &[2],
        antenna_index: 0,
        spectral_mask_index: 0,
    };
    if let Err(e) = monitor.update(now, &reception) {
        panic!("update failed: {}", e);
    }

    let rate = config.spectrumquery.rate;
    let bin = config.spectrumquery.binsize;

    c.bench_function("query_period", |b| {
        b.iter(|| {
            let Ok(window) = monitor.request(now, 2_400_000_000, rate, Some(now)) else {
                return 0.0;
            };
            (0..config.spectrumquery.bins_per_query())
                .map(|i| {
                    let start = now + bin * i;
                    max_noise_bin(&window, start, Some(start + bin - Microseconds(1)))
                        .unwrap_or_default()
                })
                .fold(0.0, f64::max)
        })
    });
}

criterion_group!(benches, bench_recorder_update, bench_query_period);
criterion_main!(benches);
