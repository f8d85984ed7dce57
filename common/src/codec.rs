// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Request and response envelopes.
//!
//! An envelope is encoded as CBOR and then base64 before it is put on a
//! socket. Relays only ever look at the `action` of a request (see
//! [`peek_action`]) and forward the encoded frame untouched.

use std::fmt;

use ciborium::Value as CborValue;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, ErrorKind, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    GetAttestation,
    Message,
    Models,
    Process,
    Unknown(String),
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Self::GetAttestation => "get-attestation",
            Self::Message => "message",
            Self::Models => "models",
            Self::Process => "process",
            Self::Unknown(action) => action,
        }
    }
}

impl From<&str> for Action {
    fn from(action: &str) -> Self {
        match action {
            "get-attestation" => Self::GetAttestation,
            "message" => Self::Message,
            "models" => Self::Models,
            "process" => Self::Process,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl From<String> for Action {
    fn from(action: String) -> Self {
        Self::from(action.as_str())
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.as_str().to_string()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hybrid-encrypted payload. `encrypted_key` is only present on requests;
/// replies are sealed under the key the request carried.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedMessage {
    #[serde(default, with = "serde_bytes", skip_serializing_if = "Option::is_none")]
    pub encrypted_key: Option<Vec<u8>>,
    #[serde(with = "serde_bytes")]
    pub nonce: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub tag: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub ciphertext: Vec<u8>,
}

impl fmt::Debug for SealedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealedMessage")
            .field("encrypted_key", &self.encrypted_key.as_ref().map(Vec::len))
            .field("nonce", &self.nonce.len())
            .field("tag", &self.tag.len())
            .field("ciphertext", &self.ciphertext.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub action: Action,
    /// `Null` for `get-attestation`, a [`SealedMessage`] otherwise.
    #[serde(default = "null")]
    pub parameter: CborValue,
}

fn null() -> CborValue {
    CborValue::Null
}

impl Request {
    pub fn get_attestation() -> Self {
        Self {
            action: Action::GetAttestation,
            parameter: CborValue::Null,
        }
    }

    pub fn sealed(action: Action, sealed: &SealedMessage) -> Result<Self> {
        Ok(Self {
            action,
            parameter: to_value(sealed)?,
        })
    }

    /// The sealed parameter, or `None` when the request carries none.
    pub fn sealed_parameter(&self) -> Result<Option<SealedMessage>> {
        match &self.parameter {
            CborValue::Null => Ok(None),
            value => from_value(value.clone()).map(Some),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationResponse {
    #[serde(with = "serde_bytes")]
    pub attestation: Vec<u8>,
    /// PKCS#8 PEM, only when the enclave was started with key export enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
}

impl fmt::Debug for AttestationResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttestationResponse")
            .field("attestation", &self.attestation.len())
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
}

impl From<&Error> for ErrorResponse {
    fn from(err: &Error) -> Self {
        Self {
            error: err.to_string(),
            kind: err.kind(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Attestation(AttestationResponse),
    Sealed(SealedMessage),
    Error(ErrorResponse),
}

impl Response {
    /// Turns a structured error response into [`Error::Remote`].
    pub fn into_result(self) -> Result<Self> {
        match self {
            Self::Error(ErrorResponse { error, kind }) => Err(Error::Remote {
                kind,
                message: error,
            }),
            response => Ok(response),
        }
    }
}

pub fn to_value<T: Serialize>(message: &T) -> Result<CborValue> {
    CborValue::serialized(message).map_err(|err| Error::Codec(format!("{err}")))
}

pub fn from_value<T: DeserializeOwned>(value: CborValue) -> Result<T> {
    value
        .deserialized()
        .map_err(|err| Error::Codec(format!("{err}")))
}

pub fn to_cbor<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    ciborium::into_writer(message, &mut buffer)?;
    Ok(buffer)
}

pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(ciborium::from_reader(bytes)?)
}

/// CBOR, then base64.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    Ok(data_encoding::BASE64.encode(&to_cbor(message)?).into_bytes())
}

pub fn decode<T: DeserializeOwned>(frame: &[u8]) -> Result<T> {
    from_cbor(&data_encoding::BASE64.decode(frame)?)
}

#[derive(Deserialize)]
struct ActionOnly {
    action: Action,
}

/// Reads the action of an encoded request without touching its parameter.
pub fn peek_action(frame: &[u8]) -> Result<Action> {
    decode::<ActionOnly>(frame).map(|request| request.action)
}
