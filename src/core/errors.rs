// Error types for the GCP workbench
//
// Request-level failures, CSV persistence failures and configuration
// failures each get their own enum so callers can match on the kind.

use thiserror::Error;

/// Errors raised by the image registry, the catalog and the association store.
///
/// The Display text of each variant is the `error` message sent to HTTP clients.
#[derive(Debug, Error)]
pub enum GcpError {
    #[error("{0}")]
    MissingField(String),

    #[error("File type not allowed: {0}")]
    InvalidExtension(String),

    #[error("Invalid filename: {0:?}")]
    InvalidFilename(String),

    #[error("GCP name already exists")]
    DuplicateName(String),

    #[error("Image not found")]
    ImageNotFound(String),

    #[error("GCP name does not exist")]
    GcpNotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid coordinate (lat {lat}, lon {lon}): latitude must be within [-90, 90] and longitude within [-180, 180]")]
    InvalidCoordinate { lat: f64, lon: f64 },

    #[error("Malformed upload: {0}")]
    Multipart(String),

    #[error("Upload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV export failed: {0}")]
    Export(#[from] PersistenceError),
}

/// CSV import/export errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Failed to read {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("CSV file {path} is missing required column {column:?}")]
    MissingColumn { path: String, column: &'static str },

    #[error("Malformed row at line {line}: {reason}")]
    MalformedPersistedRow { line: u64, reason: String },

    #[error("CSV serialization failed: {0}")]
    SerializeFailed(#[from] csv::Error),

    #[error("Failed to write {path}: {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid server config: {0}")]
    InvalidServerConfig(String),

    #[error("Invalid storage config: {0}")]
    InvalidStorageConfig(String),

    #[error("Invalid CSV path: {0}")]
    InvalidCsvPath(String),

    #[error("Upload limit must be between 1 and 2048 MiB, got {0}")]
    InvalidUploadLimit(usize),
}

pub type GcpResult<T> = Result<T, GcpError>;
pub type PersistenceResult<T> = Result<T, PersistenceError>;
pub type ConfigResult<T> = Result<T, ConfigError>;

impl GcpError {
    /// Stable kind label, used for log fields and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GcpError::MissingField(_) => "missing_field",
            GcpError::InvalidExtension(_) => "invalid_extension",
            GcpError::InvalidFilename(_) => "invalid_filename",
            GcpError::DuplicateName(_) => "duplicate_name",
            GcpError::ImageNotFound(_) => "image_not_found",
            GcpError::GcpNotFound(_) => "gcp_not_found",
            GcpError::FileNotFound(_) => "file_not_found",
            GcpError::InvalidCoordinate { .. } => "invalid_coordinate",
            GcpError::Multipart(_) => "multipart",
            GcpError::PayloadTooLarge(_) => "payload_too_large",
            GcpError::Io(_) => "io",
            GcpError::Export(_) => "export",
        }
    }
}
