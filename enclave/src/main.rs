// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use enclave_server::configuration::EnclaveOptions;
use enclave_server::handlers::DemoHandler;
use enclave_server::identity::IdentityProvider;
use enclave_server::server::Server;
use tracing_subscriber::EnvFilter;

// Avoid musl's default allocator due to terrible performance
#[cfg(target_env = "musl")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        // this needs to be set to remove duplicated information in the log.
        .with_current_span(false)
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .init();

    let options = EnclaveOptions::parse();
    tracing::info!("[enclave] init {:?}", &options);

    let provider = if options.simulate {
        IdentityProvider::simulated().context("failed to load the simulated identity")?
    } else {
        IdentityProvider::hardware().context("failed to initialize the hardware identity")?
    };

    let server = Arc::new(
        Server::new(provider, Box::new(DemoHandler))
            .with_export_private_key(options.export_private_key)
            .with_timeout(Duration::from_secs(options.read_timeout_secs))
            .with_concurrency(options.concurrent),
    );

    if options.simulate {
        let port = u16::try_from(options.port).context("simulation port must fit in 16 bits")?;
        let listener = TcpListener::bind((options.host.as_str(), port))
            .with_context(|| format!("failed to bind {}:{port}", options.host))?;
        server.run_tcp(listener)?;
    } else {
        server.run_vsock(options.port)?;
    }

    tracing::info!("[enclave] finished");

    Ok(())
}
