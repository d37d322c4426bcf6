// Library exports for the GCP workbench
//
// Images live in an upload directory, GCPs in an in-memory catalog, and the
// pixel ↔ GCP associations are persisted as a flat CSV file.

pub mod api;
pub mod core;
pub mod services;
pub mod utils;

#[cfg(test)]
mod test_support;

// Re-export commonly used types and functions
pub use api::{router, AppState};
pub use crate::core::{
    config::Config,
    errors::{ConfigError, GcpError, PersistenceError},
    types::{Association, GcpCoordinate, LoadReport},
};
pub use services::{AssociationStore, GcpCatalog, GcpProject, ImageRegistry};
pub use utils::Metrics;
