// Domain layer - Core data model
pub mod series;
