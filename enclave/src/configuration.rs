// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use clap::{ArgAction, Parser};
use enclave_common::constants::{ENCLAVE_PORT, SIMULATED_ENCLAVE_HOST};

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct EnclaveOptions {
    /// Run over TCP with the predetermined simulated identity.
    #[arg(long, default_value = "false", env("ENCLAVE_SIMULATE"), action = ArgAction::SetTrue, conflicts_with = "export_private_key")]
    pub simulate: bool,
    /// Return the RSA private key with every attestation. Debugging only.
    #[arg(long, default_value = "false", env("ENCLAVE_EXPORT_PRIVATE_KEY"), action = ArgAction::SetTrue)]
    pub export_private_key: bool,
    #[arg(long, default_value_t = ENCLAVE_PORT, env("ENCLAVE_PORT"))]
    pub port: u32,
    /// Bind address in simulation mode.
    #[arg(long, default_value = SIMULATED_ENCLAVE_HOST, env("ENCLAVE_HOST"))]
    pub host: String,
    /// Serve each connection on its own thread.
    #[arg(long, default_value = "false", env("ENCLAVE_CONCURRENT"), action = ArgAction::SetTrue)]
    pub concurrent: bool,
    /// Time allowed for one request and its response on a connection.
    #[arg(long, default_value = "30", env("ENCLAVE_READ_TIMEOUT_SECS"))]
    pub read_timeout_secs: u64,
}
