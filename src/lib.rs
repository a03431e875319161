// Motor-current telemetry core: adaptive downsampling and coalesced
// hierarchy metadata caching, composed behind a query facade. An API
// layer owns one `QueryService` per process and passes it to handlers.
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use crate::application::clock::{Clock, SystemClock};
pub use crate::application::metadata_cache::CoalescingCache;
pub use crate::application::query_service::QueryService;
pub use crate::application::telemetry_store::TelemetryStore;
pub use crate::domain::series::{MotorId, RankingMetric, SeriesFilter, TelemetryPoint};
pub use crate::error::TelemetryError;
