// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::serve::Serve;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::configuration::{RelayOptions, Upstream};
use crate::constants::{MAX_BODY_SIZE, REQUEST_TIMEOUT};
use crate::enclaves::Enclaves;
use crate::errors::AppError;
use crate::routes;

pub struct AppState {
    pub options: RelayOptions,
    pub upstream: Upstream,
    pub enclaves: Arc<Enclaves>,
}

pub struct Application {
    port: u16,
    server: Serve<TcpListener, Router, Router>,
}

impl Application {
    pub async fn build(options: RelayOptions, enclaves: Arc<Enclaves>) -> Result<Self, AppError> {
        let address = format!("{}:{}", options.host, options.port);
        let listener = TcpListener::bind(address).await?;
        let host = options.host.clone();
        let router = create_router(options, enclaves)?;
        let server = axum::serve(listener, router);
        let port = server.local_addr()?.port();

        tracing::info!("[relay] listening at http://{}:{}", host, port);

        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

/// Routes plus the body limit and request timeout applied in production.
pub fn create_router(options: RelayOptions, enclaves: Arc<Enclaves>) -> Result<Router, AppError> {
    let upstream = options.upstream()?;
    tracing::info!("[relay] forwarding to {:?}", upstream);

    let state = Arc::new(AppState {
        options,
        upstream,
        enclaves,
    });

    Ok(Router::new()
        .route("/health", get(routes::health))
        .route("/enclaves", get(routes::get_enclaves))
        .route("/post", post(routes::forward))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http()))
}
