// Live-window selector - Trailing window anchored to wall-clock time
//
// "Last N minutes" here means relative to `now`, not to the last
// observed sample; the two differ whenever data delivery lags behind
// real time, and callers choose the anchor explicitly by calling this
// instead of the downsampler.
use chrono::{DateTime, Duration, Utc};

use crate::domain::series::TelemetryPoint;
use crate::error::TelemetryError;

/// Filter `points` to `timestamp in [now - window, now]`, ascending,
/// otherwise untouched (no bucketing, no budget).
pub fn select_window(
    points: &[TelemetryPoint],
    now: DateTime<Utc>,
    window: Duration,
) -> Result<Vec<TelemetryPoint>, TelemetryError> {
    if window < Duration::zero() {
        return Err(TelemetryError::InvalidArgument(
            "window duration must not be negative".to_string(),
        ));
    }
    let start = now - window;
    let mut out: Vec<TelemetryPoint> = points
        .iter()
        .filter(|p| p.timestamp >= start && p.timestamp <= now)
        .cloned()
        .collect();
    out.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
    Ok(out)
}
