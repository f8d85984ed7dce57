// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use anyhow::{Context, Result};
use clap::Parser;
use enclave_client::configuration::ClientOptions;
use enclave_client::session::{build_verifier, run_test_sequence};
use enclave_common::client::EnclaveClient;
use tracing_subscriber::EnvFilter;

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

    let options = ClientOptions::parse();
    tracing::info!("[client] {:?}", &options);

    let verifier = build_verifier(&options).context("failed to set up verification")?;
    let address = options.address().context("no enclave to connect to")?;
    tracing::info!("[client] enclave address {address}");

    let client = EnclaveClient::new(address);
    let enclave = client
        .attest(&verifier)
        .context("enclave attestation failed")?;

    if options.test {
        let replies = run_test_sequence(&client, &enclave.public_key)
            .context("test sequence failed")?;
        println!("{}", serde_json::json!({
            "message": replies.message,
            "models": replies.models,
            "process": replies.process,
        }));
    }

    Ok(())
}
