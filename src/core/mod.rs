pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use config::{Config, ServerConfig, StorageConfig};
pub use errors::{ConfigError, GcpError, GcpResult, PersistenceError, PersistenceResult};
pub use types::{
    AddAssociationRequest, Association, CreateGcpRequest, GcpCoordinate, IncomingImage,
    LoadReport,
};
