// Backing-store trait for telemetry data access
use crate::domain::series::{MotorId, SeriesFilter, TelemetryPoint};
use async_trait::async_trait;

/// Black-box backing store: each call either returns data or fails.
/// Timeouts and cancellation are the store's responsibility and
/// propagate as failures.
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Distinct zone names present in the store.
    async fn list_zones(&self) -> anyhow::Result<Vec<String>>;

    /// Distinct line names within a zone.
    async fn list_lines(&self, zone: &str) -> anyhow::Result<Vec<String>>;

    /// Distinct motor names within a zone and line.
    async fn list_motors(&self, zone: &str, line: &str) -> anyhow::Result<Vec<String>>;

    /// Distinct production week labels present in the store.
    async fn list_weeks(&self) -> anyhow::Result<Vec<String>>;

    /// Raw samples for one motor identity, narrowed by the filter.
    /// Order is not guaranteed.
    async fn fetch_rows(
        &self,
        id: &MotorId,
        filter: &SeriesFilter,
    ) -> anyhow::Result<Vec<TelemetryPoint>>;
}
