// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Caller side of the channel: fetch and verify an attestation, then talk
//! to the enclave through sealed requests.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::attestation::{AttestationVerifier, VerifiedAttestation};
use crate::channel::{EnclavePublicKey, seal};
use crate::codec::{Action, AttestationResponse, Request, Response, decode, encode};
use crate::constants::DEFAULT_TIMEOUT;
use crate::entropy::{RandomSource, SystemRandomSource};
use crate::errors::{Error, Result};
use crate::transport::EnclaveAddress;

/// A verified enclave and the key to seal requests for it.
#[derive(Debug, Clone)]
pub struct AttestedEnclave {
    pub attestation: VerifiedAttestation,
    pub public_key: EnclavePublicKey,
}

pub struct EnclaveClient {
    address: EnclaveAddress,
    timeout: Duration,
    random: Box<dyn RandomSource>,
}

impl EnclaveClient {
    pub fn new(address: EnclaveAddress) -> Self {
        Self {
            address,
            timeout: DEFAULT_TIMEOUT,
            random: Box::new(SystemRandomSource::new()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_random_source(mut self, random: Box<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    pub fn address(&self) -> &EnclaveAddress {
        &self.address
    }

    fn exchange(&self, request: &Request) -> Result<Response> {
        let frame = encode(request)?;
        debug!(
            "[client] sending {} request ({} bytes) to {}",
            request.action,
            frame.len(),
            self.address
        );
        let reply = self.address.exchange(&frame, self.timeout)?;
        decode::<Response>(&reply)?.into_result()
    }

    /// Raw attestation response, not verified.
    pub fn get_attestation(&self) -> Result<AttestationResponse> {
        match self.exchange(&Request::get_attestation())? {
            Response::Attestation(response) => Ok(response),
            other => Err(Error::Codec(format!(
                "expected an attestation response, got {other:?}"
            ))),
        }
    }

    /// Fetches and verifies an attestation, returning the enclave key.
    pub fn attest(&self, verifier: &AttestationVerifier) -> Result<AttestedEnclave> {
        let response = self.get_attestation()?;
        if response.private_key.is_some() {
            tracing::warn!("[client] enclave exported its private key, it is not confidential");
        }

        let attestation = verifier.verify(&response.attestation)?;
        let public_key = attestation.enclave_public_key()?;
        info!(
            "[client] attested enclave {} ({})",
            attestation.document.module_id, attestation.measurements
        );

        Ok(AttestedEnclave {
            attestation,
            public_key,
        })
    }

    /// Seals `message`, sends it under `action` and opens the reply.
    pub fn send_encrypted<T, R>(
        &self,
        public_key: &EnclavePublicKey,
        action: Action,
        message: &T,
    ) -> Result<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let (sealed, session_key) = seal(public_key, message, self.random.as_ref())?;
        match self.exchange(&Request::sealed(action, &sealed)?)? {
            Response::Sealed(reply) => session_key.decrypt(&reply),
            other => Err(Error::Codec(format!("expected a sealed response, got {other:?}"))),
        }
    }
}
