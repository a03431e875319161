// Application layer - Use cases and collaborator seams
pub mod clock;
pub mod downsample;
pub mod live_window;
pub mod metadata_cache;
pub mod query_service;
pub mod telemetry_store;
