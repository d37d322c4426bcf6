use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::{error, warn};

use crate::core::errors::GcpError;
use crate::core::types::ErrorResponse;

impl GcpError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GcpError::MissingField(_)
            | GcpError::InvalidExtension(_)
            | GcpError::InvalidFilename(_)
            | GcpError::DuplicateName(_)
            | GcpError::InvalidCoordinate { .. }
            | GcpError::Multipart(_) => StatusCode::BAD_REQUEST,
            GcpError::ImageNotFound(_) | GcpError::GcpNotFound(_) | GcpError::FileNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            GcpError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            GcpError::Io(_) | GcpError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GcpError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed ({}): {}", self.kind(), self);
        } else {
            warn!("Request rejected ({}): {:?}", self.kind(), self);
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            GcpError::ImageNotFound("a.jpg".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GcpError::GcpNotFound("P1".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GcpError::DuplicateName("P1".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GcpError::InvalidExtension("a.gif".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GcpError::Multipart("bad boundary".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GcpError::PayloadTooLarge("length limit exceeded".into()).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            GcpError::Io(std::io::Error::other("disk")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
