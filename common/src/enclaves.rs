// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Locating a running enclave through `nitro-cli describe-enclaves`.

use std::process::Command;

use crate::errors::{Error, Result};
use crate::models::EnclaveDescribeInfo;

pub const NO_ENCLAVE_MESSAGE: &str = "Cannot find an enclave to connect to";

const RUNNING: &str = "RUNNING";

pub fn parse_describe_output(stdout: &[u8]) -> Result<Vec<EnclaveDescribeInfo>> {
    if stdout.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    serde_json::from_slice(stdout)
        .map_err(|err| Error::Codec(format!("invalid describe-enclaves output: {err}")))
}

/// CIDs of the running enclaves called `name`.
pub fn matching_cids(enclaves: &[EnclaveDescribeInfo], name: &str) -> Vec<u32> {
    enclaves
        .iter()
        .filter(|enclave| enclave.state == RUNNING)
        .filter(|enclave| enclave.enclave_name.as_deref() == Some(name))
        .filter_map(|enclave| u32::try_from(enclave.enclave_cid).ok())
        .collect()
}

#[tracing::instrument]
pub fn describe_enclaves() -> Result<Vec<EnclaveDescribeInfo>> {
    let output = Command::new("nitro-cli")
        .arg("describe-enclaves")
        .output()
        .map_err(|err| Error::TransportUnavailable(format!("failed to run nitro-cli: {err}")))?;

    if !output.status.success() {
        return Err(Error::TransportUnavailable(format!(
            "nitro-cli exited with {:?}: {}",
            output.status.code(),
            String::from_utf8_lossy(output.stderr.as_slice())
        )));
    }

    let enclaves = parse_describe_output(output.stdout.as_slice())?;
    tracing::trace!("enclaves: {:?}", enclaves);
    Ok(enclaves)
}

/// CID of a running enclave called `name`.
pub fn discover_cid(name: &str) -> Result<u32> {
    matching_cids(&describe_enclaves()?, name)
        .first()
        .copied()
        .ok_or_else(|| Error::TransportUnavailable(NO_ENCLAVE_MESSAGE.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const OUTPUT: &str = r#"[
        {"EnclaveName": "enclave-channel", "EnclaveID": "i-1-enc1", "EnclaveCID": 16, "State": "RUNNING"},
        {"EnclaveName": "other", "EnclaveID": "i-1-enc2", "EnclaveCID": 17, "State": "RUNNING"},
        {"EnclaveName": "enclave-channel", "EnclaveID": "i-1-enc3", "EnclaveCID": 18, "State": "TERMINATING"}
    ]"#;

    #[test]
    fn test_matching_cids_filters_by_name_and_state() {
        let enclaves = parse_describe_output(OUTPUT.as_bytes()).unwrap();
        assert_eq!(matching_cids(&enclaves, "enclave-channel"), vec![16]);
        assert!(matching_cids(&enclaves, "missing").is_empty());
    }

    #[test]
    fn test_empty_output_means_no_enclaves() {
        assert!(parse_describe_output(b"").unwrap().is_empty());
        assert!(parse_describe_output(b"[]\n").unwrap().is_empty());
        assert!(parse_describe_output(b"{oops").is_err());
    }
}
