// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use parent_relay::application::Application;
use parent_relay::configuration::{RelayOptions, Upstream};
use parent_relay::constants;
use parent_relay::enclaves::Enclaves;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        // this needs to be set to remove duplicated information in the log.
        .with_current_span(false)
        // this needs to be set to false, otherwise ANSI color codes will
        // show up in a confusing manner in CloudWatch logs.
        .with_ansi(false)
        // disabling time is handy because CloudWatch will add the ingestion time.
        .without_time()
        // remove the name of the function from every log entry
        .with_target(false)
        .init();

    let options = RelayOptions::parse();

    tracing::info!("[relay] {:?}", &options);

    let enclaves = Arc::new(Enclaves::new(options.enclave_name.clone()));
    let discovering = matches!(
        options.upstream().context("invalid upstream")?,
        Upstream::Discovered { .. }
    );

    if discovering && !options.skip_refresh_enclaves {
        tracing::info!(
            "[relay] refreshing enclaves every {:#?}",
            constants::REFRESH_ENCLAVES_INTERVAL
        );
        let enclaves_mut = enclaves.clone();
        tokio::spawn(async move {
            loop {
                if let Err(err) = enclaves_mut.refresh().await {
                    tracing::warn!("[relay] failed to refresh enclaves: {err}");
                }
                tracing::debug!(
                    "[relay] refreshed enclaves, sleeping for {:#?}",
                    constants::REFRESH_ENCLAVES_INTERVAL
                );
                tokio::time::sleep(constants::REFRESH_ENCLAVES_INTERVAL).await;
            }
        });
    } else if discovering {
        tracing::warn!("[relay] skipping refreshing enclaves");
    }

    let application = Application::build(options, enclaves)
        .await
        .context("failed to start the relay")?;

    application.run_until_stopped().await.context("relay stopped")
}
