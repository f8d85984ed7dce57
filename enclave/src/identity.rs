// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! The enclave's long-lived identity: its RSA keypair and the attestation
//! binding the public half to the enclave image.
//!
//! In simulated mode both are predetermined. In hardware mode the keypair is
//! generated at startup from NSM entropy and every attestation comes from
//! the NSM.

use std::sync::{Arc, Mutex};

use enclave_common::channel::{EnclavePrivateKey, EnclavePublicKey, KeyUnwrapper};
use enclave_common::codec::AttestationResponse;
use enclave_common::constants::RSA_KEY_BITS;
use enclave_common::entropy::{RandomSource, SystemRandomSource};
use enclave_common::simulation::{DocumentSigner, SIMULATED_RSA_PRIVATE_KEY_PEM};
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::errors::ServerError;
use crate::nsm::{self, Nsm, NsmRandomSource, SharedNsm};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Simulated,
    Hardware,
}

/// Produces signed attestation documents for a public key.
pub trait AttestationSource: Send + Sync {
    fn attestation(&self) -> Result<Vec<u8>, ServerError>;
}

/// Returns one document, signed with the simulated CA at startup.
pub struct SimulatedAttestor {
    document: Vec<u8>,
}

impl SimulatedAttestor {
    pub fn new(public_key: &[u8]) -> Result<Self, ServerError> {
        let signer = DocumentSigner::simulated()?;
        let document = signer.sign(&signer.document(Some(public_key.to_vec()), None, None)?)?;
        Ok(Self { document })
    }
}

impl AttestationSource for SimulatedAttestor {
    fn attestation(&self) -> Result<Vec<u8>, ServerError> {
        Ok(self.document.clone())
    }
}

/// Asks the NSM for a fresh document on every request.
pub struct NsmAttestor {
    nsm: SharedNsm,
    public_key: Vec<u8>,
}

impl AttestationSource for NsmAttestor {
    fn attestation(&self) -> Result<Vec<u8>, ServerError> {
        nsm::attestation(&self.nsm, &self.public_key)
    }
}

pub struct IdentityProvider {
    mode: Mode,
    private_key: EnclavePrivateKey,
    attestor: Box<dyn AttestationSource>,
    random: Arc<dyn RandomSource>,
}

impl IdentityProvider {
    pub fn simulated() -> Result<Self, ServerError> {
        let private_key = EnclavePrivateKey::from_pkcs8_pem(SIMULATED_RSA_PRIVATE_KEY_PEM)?;
        let attestor = SimulatedAttestor::new(&private_key.public_key().to_der()?)?;
        info!("[enclave] using the simulated identity");
        Ok(Self::from_parts(
            Mode::Simulated,
            private_key,
            Box::new(attestor),
            Arc::new(SystemRandomSource::new()),
        ))
    }

    /// Generates the keypair with NSM entropy only.
    pub fn hardware() -> Result<Self, ServerError> {
        let nsm: SharedNsm = Arc::new(Mutex::new(Nsm::open()?));
        let random: Arc<dyn RandomSource> = Arc::new(NsmRandomSource::new(nsm.clone()));

        info!("[enclave] generating {RSA_KEY_BITS}-bit RSA key");
        let private_key = EnclavePrivateKey::generate(RSA_KEY_BITS, random.as_ref())?;
        let attestor = NsmAttestor {
            nsm,
            public_key: private_key.public_key().to_der()?,
        };

        Ok(Self::from_parts(Mode::Hardware, private_key, Box::new(attestor), random))
    }

    pub fn from_parts(
        mode: Mode,
        private_key: EnclavePrivateKey,
        attestor: Box<dyn AttestationSource>,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            mode,
            private_key,
            attestor,
            random,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn public_key(&self) -> EnclavePublicKey {
        self.private_key.public_key()
    }

    /// Entropy for reply nonces; the NSM in hardware mode.
    pub fn random_source(&self) -> &dyn RandomSource {
        self.random.as_ref()
    }

    pub fn get_attestation(&self, export_private_key: bool) -> Result<AttestationResponse, ServerError> {
        let attestation = self.attestor.attestation()?;

        let private_key = if export_private_key {
            warn!("[enclave] exporting the RSA private key with the attestation, the channel is NOT confidential");
            Some(self.private_key.to_pkcs8_pem()?.to_string())
        } else {
            None
        };

        Ok(AttestationResponse {
            attestation,
            private_key,
        })
    }

    /// RSA-OAEP decryption with the enclave key, blinded with the
    /// provider's random source.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, ServerError> {
        Ok(self.unwrap_key(ciphertext)?)
    }
}

impl KeyUnwrapper for IdentityProvider {
    fn unwrap_key(&self, wrapped: &[u8]) -> enclave_common::Result<Zeroizing<Vec<u8>>> {
        self.private_key.decrypt_with(wrapped, self.random.as_ref())
    }
}
