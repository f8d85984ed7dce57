// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Pinned root of trust for attestation certificate chains.
//!
//! The AWS Nitro Enclaves Root Certificate (G1) is embedded and checked
//! against its published fingerprint before use. It is downloaded from:
//! <https://aws-nitro-enclaves.amazonaws.com/AWS_NitroEnclaves_Root-G1.zip>
//!
//! Any other PEM root (for example the simulated CA) can be pinned instead.

use std::path::Path;

use sha2::{Digest, Sha256};
use x509_cert::Certificate;
use x509_cert::der::{Decode, DecodePem, Encode};

use crate::errors::{Error, Result};

/// SHA-256 fingerprint of the DER encoded AWS Nitro Enclaves Root-G1.
pub const AWS_NITRO_ROOT_CERT_SHA256: &str =
    "641a0321a3e244efe456463195d606317ed7cdcc3c1756e09893f3c68f79bb5b";

/// Subject: CN = aws.nitro-enclaves, valid until Oct 28 2049, P-384.
pub const AWS_NITRO_ROOT_CERT_PEM: &str = r#"-----BEGIN CERTIFICATE-----
MIICETCCAZagAwIBAgIRAPkxdWgbkK/hHUbMtOTn+FYwCgYIKoZIzj0EAwMwSTEL
MAkGA1UEBhMCVVMxDzANBgNVBAoMBkFtYXpvbjEMMAoGA1UECwwDQVdTMRswGQYD
VQQDDBJhd3Mubml0cm8tZW5jbGF2ZXMwHhcNMTkxMDI4MTMyODA1WhcNNDkxMDI4
MTQyODA1WjBJMQswCQYDVQQGEwJVUzEPMA0GA1UECgwGQW1hem9uMQwwCgYDVQQL
DANBV1MxGzAZBgNVBAMMEmF3cy5uaXRyby1lbmNsYXZlczB2MBAGByqGSM49AgEG
BSuBBAAiA2IABPwCVOumCMHzaHDimtqQvkY4MpJzbolL//Zy2YlES1BR5TSksfbb
48C8WBoyt7F2Bw7eEtaaP+ohG2bnUs990d0JX28TcPQXCEPZ3BABIeTPYwEoCWZE
h8l5YoQwTcU/9KNCMEAwDwYDVR0TAQH/BAUwAwEB/zAdBgNVHQ4EFgQUkCW1DdkF
R+eWw5b6cp3PmanfS5YwDgYDVR0PAQH/BAQDAgGGMAoGCCqGSM49BAMDA2kAMGYC
MQCjfy+Rocm9Xue4YnwWmNJVA44fA0P5W2OpYow9OYCVRaEevL8uO1XYru5xtMPW
rfMCMQCi85sWBbJwKKXdS6BptQFuZbT73o/gBh1qUxl/nNr12UO8Yfwr6wPLb+6N
IwLz3/Y=
-----END CERTIFICATE-----"#;

/// A single pinned root certificate. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct TrustAnchor {
    certificate: Certificate,
    fingerprint: String,
}

impl TrustAnchor {
    /// Loads the embedded AWS root and refuses it if its fingerprint differs.
    pub fn aws_nitro() -> Result<Self> {
        let anchor = Self::from_pem(AWS_NITRO_ROOT_CERT_PEM)?;
        if anchor.fingerprint != AWS_NITRO_ROOT_CERT_SHA256 {
            return Err(Error::Configuration(
                "embedded Nitro root certificate fingerprint mismatch".to_string(),
            ));
        }
        Ok(anchor)
    }

    pub fn from_pem(pem: &str) -> Result<Self> {
        let certificate = Certificate::from_pem(pem.as_bytes())
            .map_err(|err| Error::Configuration(format!("invalid trust anchor PEM: {err}")))?;
        Self::new(certificate)
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        let certificate = Certificate::from_der(der)
            .map_err(|err| Error::Configuration(format!("invalid trust anchor DER: {err}")))?;
        Self::new(certificate)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let pem = std::fs::read_to_string(path)?;
        Self::from_pem(&pem)
    }

    fn new(certificate: Certificate) -> Result<Self> {
        let der = certificate
            .to_der()
            .map_err(|err| Error::Configuration(format!("failed to encode trust anchor: {err}")))?;
        let fingerprint = data_encoding::HEXLOWER.encode(&Sha256::digest(&der));
        Ok(Self {
            certificate,
            fingerprint,
        })
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Lowercase hex SHA-256 of the DER encoding.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}
