// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use enclave_common::constants::{ENCLAVE_NAME, ENCLAVE_PORT, SIMULATED_ENCLAVE_HOST};
use enclave_common::enclaves::discover_cid;
use enclave_common::transport::EnclaveAddress;

/// Attests an enclave and talks to it over the sealed channel.
#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct ClientOptions {
    #[arg(long, env("CLIENT_ENCLAVE_CID"))]
    pub cid: Option<u32>,
    /// Enclave host, for a simulated enclave.
    #[arg(long, env("CLIENT_ENCLAVE_HOST"))]
    pub host: Option<String>,
    #[arg(long, default_value_t = ENCLAVE_PORT, env("CLIENT_ENCLAVE_PORT"))]
    pub port: u32,
    /// URL of a relay's `/post` endpoint.
    #[arg(long, env("CLIENT_API_URL"))]
    pub api: Option<String>,
    /// `nitro-cli build-enclave` description holding the expected PCRs.
    #[arg(long, env("CLIENT_DESC"))]
    pub desc: Option<PathBuf>,
    /// PEM root to verify against instead of the AWS Nitro root.
    #[arg(long, env("CLIENT_TRUST_ANCHOR"))]
    pub trust_anchor: Option<PathBuf>,
    #[arg(long, default_value = ENCLAVE_NAME, env("CLIENT_ENCLAVE_NAME"))]
    pub enclave_name: String,
    /// Talk to a simulated enclave and trust the simulated root.
    #[arg(long, default_value = "false", env("CLIENT_SIMULATE"), action = ArgAction::SetTrue)]
    pub simulate: bool,
    /// Reject the enclave when its PCRs differ from `--desc`.
    #[arg(long, default_value = "false", env("CLIENT_ENFORCE_MEASUREMENTS"), action = ArgAction::SetTrue)]
    pub enforce_measurements: bool,
    /// Reject attestations older than this many seconds.
    #[arg(long, env("CLIENT_MAX_AGE_SECS"))]
    pub max_age_secs: Option<u64>,
    /// Send a message, a models and a process request after attesting.
    #[arg(long, default_value = "false", env("CLIENT_TEST"), action = ArgAction::SetTrue)]
    pub test: bool,
}

impl ClientOptions {
    /// The enclave to talk to. Without an explicit address a simulated
    /// enclave is expected on localhost, otherwise one is discovered by name.
    pub fn address(&self) -> enclave_common::Result<EnclaveAddress> {
        let explicit = self.cid.is_some() || self.host.is_some() || self.api.is_some();
        if explicit {
            return EnclaveAddress::from_parts(
                self.cid,
                self.host.clone(),
                self.api.clone(),
                self.port,
            );
        }

        if self.simulate {
            return EnclaveAddress::from_parts(
                None,
                Some(SIMULATED_ENCLAVE_HOST.to_string()),
                None,
                self.port,
            );
        }

        let cid = discover_cid(&self.enclave_name)?;
        Ok(EnclaveAddress::Vsock {
            cid,
            port: self.port,
        })
    }
}
