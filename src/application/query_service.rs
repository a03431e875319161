// Query facade - Composes cache, downsampler and live-window selector
use std::sync::Arc;

use chrono::Duration;

use crate::application::clock::Clock;
use crate::application::downsample;
use crate::application::live_window;
use crate::application::metadata_cache::CoalescingCache;
use crate::application::telemetry_store::TelemetryStore;
use crate::domain::series::{MotorId, RankingMetric, SeriesFilter, TelemetryPoint};
use crate::error::TelemetryError;
use crate::infrastructure::config::CacheTtls;

/// The operations an external API layer calls. The process owner
/// constructs one instance and passes it to handlers explicitly.
///
/// Hierarchy lookups go through the metadata cache; telemetry queries
/// are recomputed from the backing store on every call, since telemetry
/// changes continuously.
pub struct QueryService {
    store: Arc<dyn TelemetryStore>,
    clock: Arc<dyn Clock>,
    hierarchy: CoalescingCache<Vec<String>>,
    ttls: CacheTtls,
    metric: RankingMetric,
}

impl QueryService {
    pub fn new(
        store: Arc<dyn TelemetryStore>,
        clock: Arc<dyn Clock>,
        ttls: CacheTtls,
        metric: RankingMetric,
    ) -> Self {
        let hierarchy = CoalescingCache::new(Arc::clone(&clock));
        Self {
            store,
            clock,
            hierarchy,
            ttls,
            metric,
        }
    }

    pub async fn zones(&self) -> Result<Vec<String>, TelemetryError> {
        let store = Arc::clone(&self.store);
        self.hierarchy
            .get_with("zones", self.ttls.zones(), move || async move {
                store.list_zones().await
            })
            .await
    }

    pub async fn lines(&self, zone: &str) -> Result<Vec<String>, TelemetryError> {
        require_component("zone", zone)?;
        let key = format!("lines/{}", urlencoding::encode(zone));
        let store = Arc::clone(&self.store);
        let zone = zone.to_string();
        self.hierarchy
            .get_with(&key, self.ttls.lines(), move || async move {
                store.list_lines(&zone).await
            })
            .await
    }

    pub async fn motors(&self, zone: &str, line: &str) -> Result<Vec<String>, TelemetryError> {
        require_component("zone", zone)?;
        require_component("line", line)?;
        // Zone and line names are free-form; encoding keeps a `/` inside
        // a name from colliding with the key separator.
        let key = format!(
            "motors/{}/{}",
            urlencoding::encode(zone),
            urlencoding::encode(line)
        );
        let store = Arc::clone(&self.store);
        let zone = zone.to_string();
        let line = line.to_string();
        self.hierarchy
            .get_with(&key, self.ttls.motors(), move || async move {
                store.list_motors(&zone, &line).await
            })
            .await
    }

    pub async fn weeks(&self) -> Result<Vec<String>, TelemetryError> {
        let store = Arc::clone(&self.store);
        self.hierarchy
            .get_with("weeks", self.ttls.weeks(), move || async move {
                store.list_weeks().await
            })
            .await
    }

    /// Downsampled historical series for one motor. Never cached.
    pub async fn series(
        &self,
        id: &MotorId,
        filter: &SeriesFilter,
        target_budget: usize,
    ) -> Result<Vec<TelemetryPoint>, TelemetryError> {
        id.validate()?;
        if target_budget == 0 {
            return Err(TelemetryError::InvalidArgument(
                "target budget must be at least 1".to_string(),
            ));
        }
        let rows = self.fetch_rows(id, filter).await?;
        tracing::debug!(motor = %id, rows = rows.len(), "downsampling series");
        downsample::reduce(&rows, target_budget, self.metric)
    }

    /// Trailing live window for one motor, anchored to the clock's now.
    /// Never cached.
    pub async fn latest(
        &self,
        id: &MotorId,
        window: Duration,
    ) -> Result<Vec<TelemetryPoint>, TelemetryError> {
        id.validate()?;
        if window < Duration::zero() {
            return Err(TelemetryError::InvalidArgument(
                "window duration must not be negative".to_string(),
            ));
        }
        // Let the store do the time cut instead of shipping the motor's
        // whole history here on every refresh tick.
        let now = self.clock.now();
        let filter = SeriesFilter {
            from: Some(now - window),
            ..SeriesFilter::default()
        };
        let rows = self.fetch_rows(id, &filter).await?;
        live_window::select_window(&rows, now, window)
    }

    async fn fetch_rows(
        &self,
        id: &MotorId,
        filter: &SeriesFilter,
    ) -> Result<Vec<TelemetryPoint>, TelemetryError> {
        self.store
            .fetch_rows(id, filter)
            .await
            .map_err(|err| TelemetryError::StoreUnavailable(err.to_string()))
    }
}

fn require_component(name: &str, value: &str) -> Result<(), TelemetryError> {
    if value.trim().is_empty() {
        return Err(TelemetryError::InvalidArgument(format!(
            "{} must not be empty",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;
    use crate::application::clock::test_support::ManualClock;

    #[derive(Default)]
    struct FakeStore {
        zone_calls: AtomicUsize,
        line_calls: AtomicUsize,
        motor_calls: AtomicUsize,
        row_calls: AtomicUsize,
        rows: Mutex<Vec<TelemetryPoint>>,
        last_filter: Mutex<Option<SeriesFilter>>,
        fail: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl TelemetryStore for FakeStore {
        async fn list_zones(&self) -> anyhow::Result<Vec<String>> {
            self.zone_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("store down");
            }
            Ok(vec!["A".to_string(), "B".to_string()])
        }

        async fn list_lines(&self, zone: &str) -> anyhow::Result<Vec<String>> {
            self.line_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![format!("{}-L1", zone), format!("{}-L2", zone)])
        }

        async fn list_motors(&self, zone: &str, line: &str) -> anyhow::Result<Vec<String>> {
            self.motor_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![format!("zone={} line={}", zone, line)])
        }

        async fn list_weeks(&self) -> anyhow::Result<Vec<String>> {
            Ok(vec!["2024-W10".to_string()])
        }

        async fn fetch_rows(
            &self,
            _id: &MotorId,
            filter: &SeriesFilter,
        ) -> anyhow::Result<Vec<TelemetryPoint>> {
            self.row_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_filter.lock().unwrap() = Some(filter.clone());
            Ok(self.rows.lock().unwrap().clone())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap()
    }

    fn service(store: Arc<FakeStore>) -> QueryService {
        QueryService::new(
            store,
            Arc::new(ManualClock::at(now())),
            CacheTtls::default(),
            RankingMetric::Amps,
        )
    }

    fn motor() -> MotorId {
        MotorId::new("A".to_string(), "L1".to_string(), "M-01".to_string())
    }

    fn point(id: i64, offset_secs: i64, amps: f64, running: bool) -> TelemetryPoint {
        TelemetryPoint::new(
            id,
            now() + Duration::seconds(offset_secs),
            amps,
            running,
            amps,
            20.0,
            0,
        )
    }

    #[tokio::test]
    async fn test_hierarchy_lookups_are_cached() {
        let store = Arc::new(FakeStore::default());
        let service = service(Arc::clone(&store));

        assert_eq!(service.zones().await.unwrap(), vec!["A", "B"]);
        assert_eq!(service.zones().await.unwrap(), vec!["A", "B"]);
        assert_eq!(store.zone_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lines_of_different_zones_do_not_collide() {
        let store = Arc::new(FakeStore::default());
        let service = service(Arc::clone(&store));

        assert_eq!(service.lines("A").await.unwrap(), vec!["A-L1", "A-L2"]);
        assert_eq!(service.lines("B").await.unwrap(), vec!["B-L1", "B-L2"]);
        assert_eq!(service.lines("A").await.unwrap(), vec!["A-L1", "A-L2"]);
        assert_eq!(store.line_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_motor_keys_with_slash_names_do_not_collide() {
        // "A/B" + "C" and "A" + "B/C" are distinct identities and must
        // not share a cache entry just because the names contain `/`.
        let store = Arc::new(FakeStore::default());
        let service = service(Arc::clone(&store));

        let first = service.motors("A/B", "C").await.unwrap();
        let second = service.motors("A", "B/C").await.unwrap();
        assert_eq!(first, vec!["zone=A/B line=C"]);
        assert_eq!(second, vec!["zone=A line=B/C"]);
        assert_eq!(store.motor_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_and_is_retryable() {
        let store = Arc::new(FakeStore::default());
        store.fail.store(true, Ordering::SeqCst);
        let service = service(Arc::clone(&store));

        let err = service.zones().await.unwrap_err();
        assert!(matches!(err, TelemetryError::StoreUnavailable(_)));

        store.fail.store(false, Ordering::SeqCst);
        assert_eq!(service.zones().await.unwrap(), vec!["A", "B"]);
        assert_eq!(store.zone_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalid_identity_is_rejected_before_the_store() {
        let store = Arc::new(FakeStore::default());
        let service = service(Arc::clone(&store));
        let bad = MotorId::new("A".to_string(), String::new(), "M-01".to_string());

        let err = service
            .series(&bad, &SeriesFilter::default(), 100)
            .await
            .unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidArgument(_)));
        assert_eq!(store.row_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_budget_is_rejected_before_the_store() {
        let store = Arc::new(FakeStore::default());
        let service = service(Arc::clone(&store));

        let err = service
            .series(&motor(), &SeriesFilter::default(), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidArgument(_)));
        assert_eq!(store.row_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_series_downsamples_and_is_never_cached() {
        let store = Arc::new(FakeStore::default());
        *store.rows.lock().unwrap() = vec![
            point(0, 0, 5.0, false),
            point(1, 10, 9.0, true),
            point(2, 20, 1.0, true),
            point(3, 30, 7.0, true),
            point(4, 40, 7.0, false),
        ];
        let service = service(Arc::clone(&store));

        let out = service
            .series(&motor(), &SeriesFilter::default(), 3)
            .await
            .unwrap();
        assert_eq!(out.iter().map(|p| p.id).collect::<Vec<_>>(), vec![0, 1, 2, 4]);

        service
            .series(&motor(), &SeriesFilter::default(), 3)
            .await
            .unwrap();
        assert_eq!(store.row_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_latest_is_anchored_to_the_clock() {
        let store = Arc::new(FakeStore::default());
        *store.rows.lock().unwrap() = vec![
            point(1, -3600, 5.0, true), // an hour old
            point(2, -300, 6.0, true),
            point(3, -60, 7.0, true),
        ];
        let service = service(Arc::clone(&store));

        let out = service
            .latest(&motor(), Duration::minutes(10))
            .await
            .unwrap();
        assert_eq!(out.iter().map(|p| p.id).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[tokio::test]
    async fn test_latest_scopes_the_store_fetch_to_the_window() {
        let store = Arc::new(FakeStore::default());
        let service = service(Arc::clone(&store));

        service
            .latest(&motor(), Duration::minutes(10))
            .await
            .unwrap();

        let filter = store.last_filter.lock().unwrap().clone().unwrap();
        assert_eq!(filter.from, Some(now() - Duration::minutes(10)));
        assert_eq!(filter.to, None);
        assert_eq!(filter.week, None);
    }

    #[tokio::test]
    async fn test_empty_result_is_ok_not_an_error() {
        let store = Arc::new(FakeStore::default());
        let service = service(Arc::clone(&store));

        let out = service
            .series(&motor(), &SeriesFilter::default(), 50)
            .await
            .unwrap();
        assert!(out.is_empty());
    }
}
