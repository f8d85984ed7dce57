// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use clap::{ArgAction, Parser};
use enclave_common::constants::{ENCLAVE_NAME, ENCLAVE_PORT};
use enclave_common::transport::EnclaveAddress;

use crate::constants::{DEFAULT_HTTP_HOST, DEFAULT_HTTP_PORT, UPSTREAM_TIMEOUT_SECS};
use crate::errors::AppError;

/// Relay for the parent instance or a bastion host.
///
/// The upstream is the enclave over vsock (`--cid`), a simulated enclave over
/// TCP (`--enclave-host`), or the next relay (`--api`). Without any of them
/// the relay discovers a running enclave by name.
#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct RelayOptions {
    #[arg(long, default_value = DEFAULT_HTTP_HOST, env("RELAY_HTTP_HOST"))]
    pub host: String,
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT, env("RELAY_HTTP_PORT"))]
    pub port: u16,
    #[arg(long, env("RELAY_ENCLAVE_CID"))]
    pub cid: Option<u32>,
    #[arg(long, env("RELAY_ENCLAVE_HOST"))]
    pub enclave_host: Option<String>,
    #[arg(long, default_value_t = ENCLAVE_PORT, env("RELAY_ENCLAVE_PORT"))]
    pub enclave_port: u32,
    /// URL of the next relay's `/post` endpoint.
    #[arg(long, env("RELAY_API_URL"))]
    pub api: Option<String>,
    #[arg(long, default_value = ENCLAVE_NAME, env("RELAY_ENCLAVE_NAME"))]
    pub enclave_name: String,
    #[arg(long, default_value = "false", env("RELAY_SKIP_REFRESH_ENCLAVES"), action = ArgAction::SetTrue)]
    pub skip_refresh_enclaves: bool,
    #[arg(long, default_value_t = UPSTREAM_TIMEOUT_SECS, env("RELAY_UPSTREAM_TIMEOUT_SECS"))]
    pub upstream_timeout_secs: u64,
}

impl Default for RelayOptions {
    fn default() -> Self {
        RelayOptions {
            host: DEFAULT_HTTP_HOST.to_string(),
            port: DEFAULT_HTTP_PORT,
            cid: None,
            enclave_host: None,
            enclave_port: ENCLAVE_PORT,
            api: None,
            enclave_name: ENCLAVE_NAME.to_string(),
            skip_refresh_enclaves: true,
            upstream_timeout_secs: UPSTREAM_TIMEOUT_SECS,
        }
    }
}

/// Where `/post` requests are forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upstream {
    Fixed(EnclaveAddress),
    /// A running enclave found through `nitro-cli`, reached over vsock.
    Discovered { name: String, port: u32 },
}

impl RelayOptions {
    pub fn upstream(&self) -> Result<Upstream, AppError> {
        if self.cid.is_none() && self.enclave_host.is_none() && self.api.is_none() {
            return Ok(Upstream::Discovered {
                name: self.enclave_name.clone(),
                port: self.enclave_port,
            });
        }

        let address = EnclaveAddress::from_parts(
            self.cid,
            self.enclave_host.clone(),
            self.api.clone(),
            self.enclave_port,
        )
        .map_err(|err| AppError::ConfigError(err.to_string()))?;
        Ok(Upstream::Fixed(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_discover_enclaves() {
        let options = RelayOptions::try_parse_from(["parent-relay"]).unwrap();
        assert!(!options.skip_refresh_enclaves);
        assert_eq!(
            options.upstream().unwrap(),
            Upstream::Discovered {
                name: ENCLAVE_NAME.to_string(),
                port: ENCLAVE_PORT
            }
        );
    }

    #[test]
    fn test_api_upstream() {
        let options =
            RelayOptions::try_parse_from(["parent-relay", "--api", "http://10.0.0.5:8080/post"]).unwrap();
        assert_eq!(
            options.upstream().unwrap(),
            Upstream::Fixed(EnclaveAddress::Http {
                url: "http://10.0.0.5:8080/post".to_string()
            })
        );
    }

    #[test]
    fn test_conflicting_upstreams_are_rejected() {
        let options = RelayOptions {
            cid: Some(16),
            api: Some("http://10.0.0.5:8080/post".to_string()),
            ..RelayOptions::default()
        };
        assert!(matches!(options.upstream(), Err(AppError::ConfigError(_))));
    }
}
