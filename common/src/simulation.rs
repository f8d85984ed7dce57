// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Predetermined key material for running without Nitro hardware.
//!
//! The simulated CA mirrors the shape of the AWS hierarchy (root ->
//! intermediate -> signing certificate, all P-384) so simulated documents go
//! through exactly the same verification as real ones once the simulated
//! root is pinned. None of this material is secret.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use coset::{CborSerializable, CoseSign1Builder, HeaderBuilder, iana};
use p384::ecdsa::signature::Signer;
use p384::ecdsa::{Signature, SigningKey};
use p384::pkcs8::DecodePrivateKey;
use x509_cert::Certificate;
use x509_cert::der::{DecodePem, Encode};

use crate::errors::{Error, Result};
use crate::models::{AttestationDocument, DigestAlgorithm};
use crate::nitro_root_cert::TrustAnchor;

pub const SIMULATED_ROOT_CERT_PEM: &str = include_str!("../fixtures/simulated/root.pem");
pub const SIMULATED_INTERMEDIATE_CERT_PEM: &str =
    include_str!("../fixtures/simulated/intermediate.pem");
pub const SIMULATED_LEAF_CERT_PEM: &str = include_str!("../fixtures/simulated/leaf.pem");
pub const SIMULATED_LEAF_KEY_PEM: &str = include_str!("../fixtures/simulated/leaf_key.pem");
/// RSA-2048 channel key of the simulated enclave.
pub const SIMULATED_RSA_PRIVATE_KEY_PEM: &str =
    include_str!("../fixtures/simulated/rsa_private_key.pem");

pub const SIMULATED_MODULE_ID: &str = "i-00000000000000000-enc0000000000000000";

/// Number of PCRs a Nitro enclave reports.
const SIMULATED_PCR_COUNT: u8 = 16;

pub fn simulated_trust_anchor() -> Result<TrustAnchor> {
    TrustAnchor::from_pem(SIMULATED_ROOT_CERT_PEM)
}

fn certificate_der(pem: &str) -> Result<Vec<u8>> {
    Certificate::from_pem(pem.as_bytes())
        .and_then(|cert| cert.to_der())
        .map_err(|err| Error::Configuration(format!("invalid certificate PEM: {err}")))
}

/// Signs attestation documents the way the NSM does.
pub struct DocumentSigner {
    signing_key: SigningKey,
    certificate: Vec<u8>,
    cabundle: Vec<Vec<u8>>,
}

impl DocumentSigner {
    /// `cabundle` is ordered root first, as in a Nitro document.
    pub fn new(signing_key_pem: &str, certificate_pem: &str, cabundle: &[&str]) -> Result<Self> {
        let signing_key = SigningKey::from_pkcs8_pem(signing_key_pem)
            .map_err(|err| Error::Configuration(format!("invalid signing key: {err}")))?;
        Ok(Self {
            signing_key,
            certificate: certificate_der(certificate_pem)?,
            cabundle: cabundle
                .iter()
                .map(|pem| certificate_der(pem))
                .collect::<Result<_>>()?,
        })
    }

    pub fn simulated() -> Result<Self> {
        Self::new(
            SIMULATED_LEAF_KEY_PEM,
            SIMULATED_LEAF_CERT_PEM,
            &[SIMULATED_ROOT_CERT_PEM, SIMULATED_INTERMEDIATE_CERT_PEM],
        )
    }

    /// A document stamped now, with all-zero PCRs as in debug mode.
    pub fn document(
        &self,
        public_key: Option<Vec<u8>>,
        user_data: Option<Vec<u8>>,
        nonce: Option<Vec<u8>>,
    ) -> Result<AttestationDocument> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| Error::Configuration("system time before Unix epoch".to_string()))?
            .as_millis();

        Ok(AttestationDocument {
            module_id: SIMULATED_MODULE_ID.to_string(),
            digest: DigestAlgorithm::Sha384,
            timestamp: u64::try_from(timestamp)
                .map_err(|_| Error::Configuration("timestamp overflow".to_string()))?,
            pcrs: (0..SIMULATED_PCR_COUNT).map(|i| (i, vec![0; 48])).collect::<BTreeMap<_, _>>(),
            certificate: self.certificate.clone(),
            cabundle: self.cabundle.clone(),
            public_key,
            user_data,
            nonce,
        })
    }

    pub fn sign(&self, document: &AttestationDocument) -> Result<Vec<u8>> {
        self.sign_payload(document.to_cbor()?)
    }

    /// Wraps an arbitrary payload in an ES384 COSE Sign1 envelope.
    pub fn sign_payload(&self, payload: Vec<u8>) -> Result<Vec<u8>> {
        let protected = HeaderBuilder::new()
            .algorithm(iana::Algorithm::ES384)
            .build();
        CoseSign1Builder::new()
            .protected(protected)
            .payload(payload)
            .create_signature(b"", |data| {
                let signature: Signature = self.signing_key.sign(data);
                signature.to_bytes().to_vec()
            })
            .build()
            .to_vec()
            .map_err(|err| Error::Codec(format!("failed to encode COSE Sign1: {err:?}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::attestation::AttestationVerifier;

    #[test]
    fn test_simulated_documents_verify_against_simulated_root() {
        let signer = DocumentSigner::simulated().unwrap();
        let document = signer.document(Some(vec![1; 32]), None, None).unwrap();
        let blob = signer.sign(&document).unwrap();

        let verifier = AttestationVerifier::new(simulated_trust_anchor().unwrap());
        let verified = verifier.verify(&blob).unwrap();
        assert_eq!(verified.document.module_id, SIMULATED_MODULE_ID);
        assert_eq!(verified.document.pcrs.len(), 16);
    }

    #[test]
    fn test_simulated_documents_fail_against_aws_root() {
        let signer = DocumentSigner::simulated().unwrap();
        let blob = signer.sign(&signer.document(None, None, None).unwrap()).unwrap();

        let verifier = AttestationVerifier::new(TrustAnchor::aws_nitro().unwrap());
        assert!(matches!(
            verifier.verify(&blob),
            Err(Error::UntrustedCertificateChain(_))
        ));
    }
}
