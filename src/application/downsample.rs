// Adaptive downsampler - Bounded representative subset of a series
//
// Naive fixed-stride sampling destroys on/off transitions and current
// spikes. This scheme buckets the series by proportional time position
// and keeps, per bucket, the chronologically first point (even temporal
// coverage through flat stretches), the peak and the valley by the
// ranking metric; every state transition in the full series is unioned
// in afterward. The output may exceed the target budget when transitions
// are numerous; that is the contract, not a defect. Points are always
// real samples, never synthesized.
use std::collections::HashMap;

use crate::domain::series::{RankingMetric, TelemetryPoint};
use crate::error::TelemetryError;

/// Reduce `points` to a bounded representative subset of roughly
/// `target_budget` points, sorted by timestamp ascending with no
/// duplicate ids. Stateless and reentrant.
pub fn reduce(
    points: &[TelemetryPoint],
    target_budget: usize,
    metric: RankingMetric,
) -> Result<Vec<TelemetryPoint>, TelemetryError> {
    if target_budget == 0 {
        return Err(TelemetryError::InvalidArgument(
            "target budget must be at least 1".to_string(),
        ));
    }
    if points.is_empty() {
        return Ok(Vec::new());
    }

    // Raw input order is not trusted; everything below assumes ascending.
    let mut ordered: Vec<TelemetryPoint> = points.to_vec();
    ordered.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));

    if ordered.len() <= target_budget {
        return Ok(ordered);
    }

    let bucket_count = (target_budget / 3).max(1);
    let min_ts = ordered[0].timestamp;
    let max_ts = ordered[ordered.len() - 1].timestamp;
    let span_us = (max_ts - min_ts).num_microseconds().unwrap_or(0);

    let bucket_of = |point: &TelemetryPoint| -> usize {
        if span_us <= 0 {
            // All points coincide in time: single bucket.
            return 0;
        }
        let delta_us = (point.timestamp - min_ts).num_microseconds().unwrap_or(span_us);
        let index = (delta_us as i128 * bucket_count as i128 / span_us as i128) as usize;
        index.min(bucket_count - 1)
    };

    #[derive(Clone, Copy)]
    struct BucketPick {
        first: usize,
        peak: usize,
        valley: usize,
    }

    let mut buckets: Vec<Option<BucketPick>> = vec![None; bucket_count];
    for (i, point) in ordered.iter().enumerate() {
        let slot = &mut buckets[bucket_of(point)];
        match slot {
            None => {
                *slot = Some(BucketPick {
                    first: i,
                    peak: i,
                    valley: i,
                });
            }
            Some(pick) => {
                // Strict comparisons keep the first occurrence on ties.
                if metric.value_of(point) > metric.value_of(&ordered[pick.peak]) {
                    pick.peak = i;
                }
                if metric.value_of(point) < metric.value_of(&ordered[pick.valley]) {
                    pick.valley = i;
                }
            }
        }
    }

    // Selection set keyed by id: bucket picks plus every state
    // transition over the full, unbucketed series. The very first point
    // has no predecessor and is never a transition.
    let mut selected: HashMap<i64, usize> = HashMap::new();
    for pick in buckets.iter().flatten() {
        for index in [pick.first, pick.peak, pick.valley] {
            selected.entry(ordered[index].id).or_insert(index);
        }
    }
    for i in 1..ordered.len() {
        if ordered[i].running != ordered[i - 1].running {
            selected.entry(ordered[i].id).or_insert(i);
        }
    }

    let mut indices: Vec<usize> = selected.into_values().collect();
    indices.sort_unstable();
    Ok(indices.into_iter().map(|i| ordered[i].clone()).collect())
}
