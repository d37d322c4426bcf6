// HTTP handlers
//
// Thin wrappers: decode the request, call the project facade, encode the
// result. Failures are `GcpError`s and render as `{"error": ...}`.

use std::collections::BTreeMap;

use axum::{
    extract::{rejection::JsonRejection, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use tracing::info;

use crate::api::AppState;
use crate::core::errors::GcpError;
use crate::core::types::{
    AddAssociationRequest, Association, BatchUploadResponse, CreateGcpRequest, GcpCoordinate,
    IncomingImage, MessageResponse, UploadResponse,
};
use crate::services::image_registry::content_type_for;

/// Keep axum's 413 for bodies over the upload limit; anything else is a 400.
fn multipart_error(e: axum::extract::multipart::MultipartError) -> GcpError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        GcpError::PayloadTooLarge(e.body_text())
    } else {
        GcpError::Multipart(e.body_text())
    }
}

fn json_error(rejection: JsonRejection) -> GcpError {
    GcpError::MissingField(rejection.body_text())
}

pub async fn root() -> &'static str {
    "GCP Workbench - image ground control point editor"
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Prometheus metrics endpoint
pub async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.to_prometheus(),
    )
}

/// Detailed statistics endpoint (JSON)
pub async fn stats_endpoint(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let snapshot = state.metrics.snapshot();
    serde_json::to_value(snapshot).map(Json).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to serialize metrics: {}", e),
        )
    })
}

/// Upload a single image
///
/// # Request Format:
/// - multipart/form-data
/// - Field "file": one PNG/JPEG file
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, GcpError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() {
            return Err(GcpError::MissingField("No selected file".to_string()));
        }
        let bytes = field.bytes().await.map_err(multipart_error)?;

        let filename = state
            .project
            .store_image(IncomingImage {
                filename,
                bytes: bytes.to_vec(),
            })
            .await?;
        return Ok(Json(UploadResponse {
            message: "File uploaded successfully".to_string(),
            filename,
        }));
    }

    Err(GcpError::MissingField("No file part".to_string()))
}

/// Upload several images at once
///
/// # Request Format:
/// - multipart/form-data
/// - Field "files", repeated: PNG/JPEG files
///
/// Every filename is checked before anything is written.
pub async fn upload_multiple(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<BatchUploadResponse>, GcpError> {
    let mut images = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("files") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        images.push(IncomingImage {
            filename,
            bytes: bytes.to_vec(),
        });
    }

    if images.is_empty() {
        return Err(GcpError::MissingField("No file part".to_string()));
    }

    info!("Received batch of {} files", images.len());
    let filenames = state.project.store_images(images).await?;
    Ok(Json(BatchUploadResponse {
        message: "Files uploaded successfully".to_string(),
        filenames,
    }))
}

pub async fn list_images(State(state): State<AppState>) -> Result<Json<Vec<String>>, GcpError> {
    Ok(Json(state.project.list_images().await?))
}

/// Raw bytes of an uploaded image
pub async fn uploaded_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, GcpError> {
    let bytes = state.project.fetch_image(&filename).await?;
    Ok((
        [(header::CONTENT_TYPE, content_type_for(&filename))],
        bytes,
    )
        .into_response())
}

/// Link a pixel in an image to a catalog GCP
pub async fn add_gcp(
    State(state): State<AppState>,
    payload: Result<Json<AddAssociationRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, GcpError> {
    let Json(req) = payload.map_err(json_error)?;
    state
        .project
        .add_association(&req.image_name, req.x, req.y, &req.gcp_name)
        .await?;
    Ok(Json(MessageResponse {
        message: "GCP added successfully".to_string(),
    }))
}

/// Associations of one image; an unknown image yields `[]`
pub async fn get_gcps(
    State(state): State<AppState>,
    Path(image_name): Path<String>,
) -> Json<Vec<Association>> {
    Json(state.project.get_associations(&image_name).await)
}

pub async fn create_gcp(
    State(state): State<AppState>,
    payload: Result<Json<CreateGcpRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, GcpError> {
    let Json(req) = payload.map_err(json_error)?;
    state
        .project
        .create_gcp(&req.gcp_name, req.lat, req.lon)
        .await?;
    Ok(Json(MessageResponse {
        message: "GCP created successfully".to_string(),
    }))
}

pub async fn get_all_gcps(State(state): State<AppState>) -> Json<BTreeMap<String, GcpCoordinate>> {
    Json(state.project.list_gcps().await)
}

/// Rewrite the CSV file and send it as an attachment
pub async fn download_csv(State(state): State<AppState>) -> Result<Response, GcpError> {
    let bytes = state.project.export_csv().await?;
    let filename = state
        .project
        .csv_path()
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("gcps.csv")
        .replace('"', "");
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response())
}
