// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::time::Duration;

use ciborium::Value as CborValue;
use enclave_common::attestation::{AttestationVerifier, MeasurementPolicy};
use enclave_common::channel::EnclavePublicKey;
use enclave_common::client::EnclaveClient;
use enclave_common::codec::Action;
use enclave_common::models::ExpectedMeasurements;
use enclave_common::nitro_root_cert::TrustAnchor;
use enclave_common::simulation::simulated_trust_anchor;
use enclave_common::{Error, Result};
use tracing::info;

use crate::configuration::ClientOptions;
use crate::constants::{TEST_MESSAGE, TEST_TEXTS};

/// Verifier for the options' trust anchor, measurements and policy.
pub fn build_verifier(options: &ClientOptions) -> Result<AttestationVerifier> {
    let trust_anchor = match (&options.trust_anchor, options.simulate) {
        (Some(path), _) => TrustAnchor::from_file(path)?,
        (None, true) => simulated_trust_anchor()?,
        (None, false) => TrustAnchor::aws_nitro()?,
    };
    info!("[client] trust anchor sha256 {}", trust_anchor.fingerprint());

    let mut verifier = AttestationVerifier::new(trust_anchor);

    if let Some(desc) = &options.desc {
        let expected = ExpectedMeasurements::from_file(desc)?;
        info!("[client] expecting {} measurement(s) from {}", expected.len(), desc.display());
        verifier = verifier.with_expected_measurements(expected);
    } else if options.enforce_measurements {
        return Err(Error::Configuration(
            "--enforce-measurements requires --desc".to_string(),
        ));
    }

    if options.enforce_measurements {
        verifier = verifier.with_policy(MeasurementPolicy::Enforce);
    }
    if let Some(max_age) = options.max_age_secs {
        verifier = verifier.with_max_age(Duration::from_secs(max_age));
    }

    Ok(verifier)
}

/// Replies collected by [`run_test_sequence`].
#[derive(Debug, Clone, PartialEq)]
pub struct TestReplies {
    pub message: String,
    pub models: Vec<String>,
    pub process: serde_json::Value,
}

/// Sends a message, asks for the models and processes the sample texts with
/// the first model.
pub fn run_test_sequence(client: &EnclaveClient, public_key: &EnclavePublicKey) -> Result<TestReplies> {
    let message: String = client.send_encrypted(public_key, Action::Message, &TEST_MESSAGE)?;
    info!("[client] message reply: {message}");

    let models: Vec<String> = client.send_encrypted(public_key, Action::Models, &CborValue::Null)?;
    info!("[client] available models: {models:?}");

    let model = models
        .first()
        .ok_or_else(|| Error::Codec("enclave returned no models".to_string()))?;
    let texts: Vec<serde_json::Value> = TEST_TEXTS
        .iter()
        .map(|content| serde_json::json!({ "content": content }))
        .collect();
    let request = serde_json::json!({ "texts": texts, "model": model }).to_string();

    let reply: String = client.send_encrypted(public_key, Action::Process, &request)?;
    let process: serde_json::Value = serde_json::from_str(&reply)
        .map_err(|err| Error::Codec(format!("invalid process reply: {err}")))?;
    info!("[client] process reply: {process}");

    Ok(TestReplies {
        message,
        models,
        process,
    })
}
