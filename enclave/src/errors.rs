// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use enclave_common::ErrorKind;
use enclave_common::codec::ErrorResponse;

#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Channel(#[from] enclave_common::Error),
    #[error("invalid {action} request: {reason}")]
    InvalidRequest { action: String, reason: String },
    #[error("NSM request failed: {0}")]
    Nsm(String),
}

impl ServerError {
    pub fn invalid(action: &str, reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            action: action.to_string(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Channel(err) => err.kind(),
            Self::InvalidRequest { .. } => ErrorKind::MalformedRequest,
            Self::Nsm(_) => ErrorKind::Internal,
        }
    }
}

impl From<&ServerError> for ErrorResponse {
    fn from(err: &ServerError) -> Self {
        Self {
            error: err.to_string(),
            kind: err.kind(),
        }
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(source: serde_json::Error) -> Self {
        Self::invalid("process", format!("invalid JSON: {source}"))
    }
}
