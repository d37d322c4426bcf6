// Domain records and HTTP payloads

use serde::{Deserialize, Deserializer, Serialize};

/// Catalog entry coordinates, keyed by GCP name in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GcpCoordinate {
    pub lat: f64,
    pub lon: f64,
}

/// One pixel ↔ GCP link recorded against an image.
///
/// `lat`/`lon` are copied from the catalog when the link is made and are
/// never refreshed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Association {
    pub x: i64,
    pub y: i64,
    pub lat: f64,
    pub lon: f64,
    pub gcp_name: String,
}

/// Body of `POST /add_gcp`
#[derive(Debug, Clone, Deserialize)]
pub struct AddAssociationRequest {
    pub image_name: String,
    #[serde(deserialize_with = "pixel_coordinate")]
    pub x: i64,
    #[serde(deserialize_with = "pixel_coordinate")]
    pub y: i64,
    pub gcp_name: String,
}

/// Body of `POST /create_gcp`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateGcpRequest {
    pub gcp_name: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchUploadResponse {
    pub message: String,
    pub filenames: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A file received from a client, not yet validated
#[derive(Debug, Clone)]
pub struct IncomingImage {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Outcome of the startup CSV import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Images found in the upload directory
    pub images: usize,
    pub rows_loaded: usize,
    pub rows_skipped: usize,
    pub rows_unknown_image: usize,
    pub gcps_restored: usize,
}

/// Truncate a pixel position toward zero.
///
/// Returns `None` for NaN, infinities and values outside the `i64` range.
pub fn truncate_pixel(value: f64) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    let truncated = value.trunc();
    if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return None;
    }
    Some(truncated as i64)
}

// Browsers report fractional click positions, so accept any JSON number.
fn pixel_coordinate<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    truncate_pixel(value)
        .ok_or_else(|| serde::de::Error::custom(format!("pixel coordinate out of range: {}", value)))
}
