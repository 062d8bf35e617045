//! Post-processing of log rows before plotting.
//!
//! Raw logs are sampled at 50ms early on, which makes comparison plots of
//! long runs noisy and heavy. Resampling groups rows into fixed time
//! buckets; gauges (CPU, memory) are averaged within a bucket while
//! cumulative counters (IO reads) and the process count take the bucket
//! maximum.

use std::collections::BTreeMap;

use crate::error::{BenchtraceError, Result};
use crate::logfile::SampleRow;

/// Resample rows into buckets of `interval` seconds.
///
/// Each non-empty bucket produces one output row whose `time` is the
/// bucket start, an exact multiple of `interval`. Output is time-ordered.
pub fn resample(rows: &[SampleRow], interval: f64) -> Result<Vec<SampleRow>> {
    if interval <= 0.0 || !interval.is_finite() {
        return Err(BenchtraceError::InvalidResampleInterval(interval));
    }

    #[derive(Default)]
    struct Bucket {
        cpu_sum: f64,
        mem_sum: f64,
        io_max: f64,
        nproc_max: u64,
        count: u32,
    }

    let mut buckets: BTreeMap<i64, Bucket> = BTreeMap::new();
    for row in rows {
        let idx = (row.time / interval).floor() as i64;
        let bucket = buckets.entry(idx).or_default();
        bucket.cpu_sum += row.cpu_percent;
        bucket.mem_sum += row.mem_bytes;
        bucket.io_max = bucket.io_max.max(row.io_read_bytes);
        bucket.nproc_max = bucket.nproc_max.max(row.nproc);
        bucket.count += 1;
    }

    Ok(buckets
        .into_iter()
        .map(|(idx, b)| SampleRow {
            time: idx as f64 * interval,
            cpu_percent: b.cpu_sum / f64::from(b.count),
            mem_bytes: b.mem_sum / f64::from(b.count),
            io_read_bytes: b.io_max,
            nproc: b.nproc_max,
        })
        .collect())
}

/// Drop rows past `max_time` seconds.
pub fn clip_time(rows: &mut Vec<SampleRow>, max_time: f64) {
    rows.retain(|r| r.time <= max_time);
}

/// Divide CPU percent by the run's worker count.
///
/// Puts runs with different parallelism on a comparable per-worker scale.
pub fn normalize_cpu(rows: &mut [SampleRow], workers: u32) {
    let workers = f64::from(workers.max(1));
    for row in rows.iter_mut() {
        row.cpu_percent /= workers;
    }
}
