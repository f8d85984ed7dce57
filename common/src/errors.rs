// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Error taxonomy shared by the verifier, the secure channel and the transport.
//!
//! Every failure is a distinct variant so a caller can tell "the enclave is
//! lying" (verification errors) from "the enclave is unreachable"
//! ([`Error::TransportUnavailable`]) from "my request was malformed".

use serde::{Deserialize, Serialize};

use crate::attestation::PcrMismatch;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("malformed attestation: {0}")]
    MalformedAttestation(String),
    #[error("invalid attestation field '{field}': {reason}")]
    InvalidAttestationField { field: &'static str, reason: String },
    #[error("untrusted certificate chain: {0}")]
    UntrustedCertificateChain(String),
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    #[error("{} PCR measurement(s) do not match", .0.len())]
    MeasurementMismatch(Vec<PcrMismatch>),
    #[error("encryption failure: {0}")]
    EncryptionFailure(String),
    #[error("decryption failure: {0}")]
    DecryptionFailure(String),
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error("invalid enclave address: {0}")]
    InvalidAddress(String),
    #[error("codec error: {0}")]
    Codec(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("enclave returned {kind:?}: {message}")]
    Remote { kind: ErrorKind, message: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Wire-level classification of an [`Error`], carried in error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    MalformedAttestation,
    InvalidAttestationField,
    UntrustedCertificateChain,
    InvalidSignature,
    MeasurementMismatch,
    EncryptionFailure,
    DecryptionFailure,
    TransportUnavailable,
    UnknownAction,
    MalformedRequest,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedAttestation(_) => ErrorKind::MalformedAttestation,
            Self::InvalidAttestationField { .. } => ErrorKind::InvalidAttestationField,
            Self::UntrustedCertificateChain(_) => ErrorKind::UntrustedCertificateChain,
            Self::InvalidSignature(_) => ErrorKind::InvalidSignature,
            Self::MeasurementMismatch(_) => ErrorKind::MeasurementMismatch,
            Self::EncryptionFailure(_) => ErrorKind::EncryptionFailure,
            Self::DecryptionFailure(_) => ErrorKind::DecryptionFailure,
            Self::TransportUnavailable(_) => ErrorKind::TransportUnavailable,
            Self::UnknownAction(_) => ErrorKind::UnknownAction,
            Self::Codec(_) | Self::InvalidAddress(_) => ErrorKind::MalformedRequest,
            Self::Remote { kind, .. } => *kind,
            Self::Configuration(_) | Self::Io(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidAttestationField {
            field,
            reason: reason.into(),
        }
    }
}

impl From<ciborium::de::Error<std::io::Error>> for Error {
    fn from(source: ciborium::de::Error<std::io::Error>) -> Self {
        Error::Codec(format!("failed to decode CBOR: {source:?}"))
    }
}

impl From<ciborium::ser::Error<std::io::Error>> for Error {
    fn from(source: ciborium::ser::Error<std::io::Error>) -> Self {
        Error::Codec(format!("failed to encode CBOR: {source:?}"))
    }
}

impl From<data_encoding::DecodeError> for Error {
    fn from(source: data_encoding::DecodeError) -> Self {
        Error::Codec(format!("failed to base64 decode frame: {source}"))
    }
}
