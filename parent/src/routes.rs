// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! HTTP route handlers for the relay.
//!
//! | Method | Path | Handler | Description |
//! |--------|------|---------|-------------|
//! | GET | `/health` | [`health`] | Health check endpoint |
//! | GET | `/enclaves` | [`get_enclaves`] | List discovered enclaves |
//! | POST | `/post` | [`forward`] | Forward one envelope upstream |

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use enclave_common::codec::peek_action;
use enclave_common::models::EnclaveDescribeInfo;
use enclave_common::transport::{EnclaveAddress, RelayPayload};
use serde_json::json;
use validator::Validate;

use crate::application::AppState;
use crate::configuration::Upstream;
use crate::errors::AppError;
use crate::models::RelayRequest;

/// Health check endpoint.
///
/// ```json
/// {"status": "ok"}
/// ```
pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

#[tracing::instrument(skip(state))]
pub async fn get_enclaves(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<EnclaveDescribeInfo>>, AppError> {
    let enclaves = state.enclaves.get_enclaves().await;

    Ok(Json(enclaves))
}

async fn resolve(state: &AppState) -> Result<EnclaveAddress, AppError> {
    match &state.upstream {
        Upstream::Fixed(address) => Ok(address.clone()),
        Upstream::Discovered { port, .. } => {
            let cid = state.enclaves.choose_cid().await?;
            Ok(EnclaveAddress::Vsock { cid, port: *port })
        }
    }
}

/// Forwards one envelope to the upstream and returns its reply.
///
/// Only the outer action is read, for logging. The payload goes upstream
/// byte for byte and the reply comes back the same way.
#[tracing::instrument(skip(state, request))]
pub async fn forward(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RelayRequest>,
) -> Result<Json<RelayPayload>, AppError> {
    request.validate().map_err(|e| {
        tracing::error!("[relay] validation failed: {}", e);
        AppError::ValidationError(e.to_string())
    })?;

    let action = peek_action(request.payload.as_bytes())?;
    let address = resolve(&state).await?;

    tracing::debug!(
        "[relay] forwarding {} request ({} bytes) to {}",
        action,
        request.payload.len(),
        address
    );

    // Socket and blocking HTTP I/O run off the async workers.
    let timeout = Duration::from_secs(state.options.upstream_timeout_secs);
    let reply = tokio::task::spawn_blocking(move || {
        address.exchange(request.payload.as_bytes(), timeout)
    })
    .await
    .map_err(|e| {
        tracing::error!("[relay] spawn_blocking task failed: {:?}", e);
        AppError::InternalServerError
    })??;

    let payload = String::from_utf8(reply)
        .map_err(|_| AppError::UpstreamUnavailable("upstream reply is not text".to_string()))?;

    tracing::debug!("[relay] returning {} bytes for {} request", payload.len(), action);

    Ok(Json(RelayPayload { payload }))
}
