// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use enclave_common::ErrorKind;
use enclave_common::enclaves::NO_ENCLAVE_MESSAGE;
use serde_json::json;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum AppError {
    #[error("error running command: {0:?} {1}")]
    RunError(Option<i32>, String),
    #[error("enclave not found")]
    EnclaveNotFound,
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("internal server error")]
    InternalServerError,
    #[error("validation error: {0}")]
    ValidationError(String),
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::RunError(_, _) => (StatusCode::INTERNAL_SERVER_ERROR, "Run error".to_string()),
            Self::EnclaveNotFound => (
                StatusCode::SERVICE_UNAVAILABLE,
                NO_ENCLAVE_MESSAGE.to_string(),
            ),
            Self::UpstreamUnavailable(msg) => (StatusCode::BAD_GATEWAY, msg),
            Self::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error".to_string(),
            ),
            Self::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::ConfigError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({"code": status.as_u16(), "message": message}));

        (status, body).into_response()
    }
}

impl From<enclave_common::Error> for AppError {
    fn from(source: enclave_common::Error) -> Self {
        tracing::error!("{:?}", source);
        match source {
            enclave_common::Error::TransportUnavailable(message) => {
                if message == NO_ENCLAVE_MESSAGE {
                    AppError::EnclaveNotFound
                } else {
                    AppError::UpstreamUnavailable(message)
                }
            }
            enclave_common::Error::Remote {
                kind: ErrorKind::MalformedRequest,
                message,
            } => AppError::ValidationError(message),
            enclave_common::Error::Remote {
                kind: ErrorKind::TransportUnavailable,
                message,
            } => AppError::UpstreamUnavailable(message),
            enclave_common::Error::Codec(message) => AppError::ValidationError(message),
            enclave_common::Error::InvalidAddress(message) => AppError::ConfigError(message),
            _ => AppError::InternalServerError,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(_source: serde_json::Error) -> Self {
        tracing::error!("{:?}", _source);
        AppError::InternalServerError
    }
}

impl From<std::io::Error> for AppError {
    fn from(_source: std::io::Error) -> Self {
        tracing::error!("{:?}", _source);
        AppError::InternalServerError
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_enclave_is_service_unavailable() {
        let err = AppError::from(enclave_common::Error::TransportUnavailable(
            NO_ENCLAVE_MESSAGE.to_string(),
        ));
        assert_eq!(err, AppError::EnclaveNotFound);
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_unreachable_upstream_is_bad_gateway() {
        let err = AppError::from(enclave_common::Error::TransportUnavailable(
            "connection refused".to_string(),
        ));
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_malformed_frame_is_bad_request() {
        let err = AppError::from(enclave_common::Error::Codec("not base64".to_string()));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
