// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Attestation document and measurement types.
//!
//! [`AttestationDocument`] is the validated form of the CBOR payload carried
//! inside the COSE Sign1 envelope produced by the Nitro Secure Module. Field
//! constraints follow the AWS attestation process:
//! <https://github.com/aws/aws-nitro-enclaves-nsm-api/blob/main/docs/attestation_process.md>

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use ciborium::Value as CborValue;
use serde::{Deserialize, Serialize};

use crate::constants::{
    MAX_CABUNDLE_ENTRY_LENGTH, MAX_NONCE_LENGTH, MAX_PCR_COUNT, MAX_PCR_INDEX,
    MAX_PUBLIC_KEY_LENGTH, MAX_USER_DATA_LENGTH, MIN_PCR_COUNT, PCR_LENGTHS,
};
use crate::errors::{Error, Result};

/// Digest algorithms accepted in the `digest` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha384,
}

impl DigestAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha384 => "SHA384",
        }
    }

    /// Named curve of the signing key that goes with this digest.
    pub fn curve(&self) -> &'static str {
        match self {
            Self::Sha384 => "P-384",
        }
    }
}

impl TryFrom<&str> for DigestAlgorithm {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        match value {
            "SHA384" => Ok(Self::Sha384),
            other => Err(Error::field("digest", format!("unsupported digest {other:?}"))),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationDocument {
    pub module_id: String,
    pub digest: DigestAlgorithm,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub pcrs: BTreeMap<u8, Vec<u8>>,
    /// DER encoded signing certificate.
    pub certificate: Vec<u8>,
    /// DER encoded CA bundle; index 0 is the (untrusted) root.
    pub cabundle: Vec<Vec<u8>>,
    pub public_key: Option<Vec<u8>>,
    pub user_data: Option<Vec<u8>>,
    pub nonce: Option<Vec<u8>>,
}

impl AttestationDocument {
    /// Decodes and validates a CBOR attestation payload.
    ///
    /// Undecodable input is reported as [`Error::MalformedAttestation`]; a
    /// decodable map whose fields are missing, mistyped or out of range is
    /// reported as [`Error::InvalidAttestationField`].
    pub fn from_cbor(payload: &[u8]) -> Result<Self> {
        let value: CborValue = ciborium::from_reader(payload)
            .map_err(|err| Error::MalformedAttestation(format!("invalid CBOR payload: {err:?}")))?;
        Self::from_value(value)
    }

    pub fn from_value(value: CborValue) -> Result<Self> {
        let entries = match value {
            CborValue::Map(entries) => entries,
            _ => {
                return Err(Error::MalformedAttestation(
                    "attestation payload is not a CBOR map".to_string(),
                ));
            }
        };

        let mut fields: BTreeMap<String, CborValue> = BTreeMap::new();
        for (key, value) in entries {
            let CborValue::Text(key) = key else {
                return Err(Error::MalformedAttestation(
                    "attestation payload has a non-text key".to_string(),
                ));
            };
            if fields.insert(key.clone(), value).is_some() {
                return Err(Error::MalformedAttestation(format!("duplicate field {key:?}")));
            }
        }

        let module_id = match required(&mut fields, "module_id")? {
            CborValue::Text(text) => text,
            _ => return Err(Error::field("module_id", "must be text")),
        };

        let digest = match required(&mut fields, "digest")? {
            CborValue::Text(text) => DigestAlgorithm::try_from(text.as_str())?,
            _ => return Err(Error::field("digest", "must be text")),
        };

        let timestamp = match required(&mut fields, "timestamp")? {
            CborValue::Integer(integer) => u64::try_from(i128::from(integer))
                .map_err(|_| Error::field("timestamp", "must be a non-negative integer"))?,
            _ => return Err(Error::field("timestamp", "must be an integer")),
        };

        let pcrs = match required(&mut fields, "pcrs")? {
            CborValue::Map(entries) => {
                let mut pcrs = BTreeMap::new();
                for (index, value) in entries {
                    let index = match index {
                        CborValue::Integer(integer) => i128::from(integer),
                        _ => return Err(Error::field("pcrs", "PCR indices must be integers")),
                    };
                    let index = u8::try_from(index)
                        .ok()
                        .filter(|index| u64::from(*index) <= MAX_PCR_INDEX)
                        .ok_or_else(|| {
                            Error::field("pcrs", format!("PCR index {index} out of range"))
                        })?;
                    let CborValue::Bytes(value) = value else {
                        return Err(Error::field("pcrs", "PCR content must be a byte string"));
                    };
                    if pcrs.insert(index, value).is_some() {
                        return Err(Error::field("pcrs", format!("duplicate PCR{index}")));
                    }
                }
                pcrs
            }
            _ => return Err(Error::field("pcrs", "must be a map")),
        };

        let certificate = bytes(required(&mut fields, "certificate")?, "certificate")?;

        let cabundle = match required(&mut fields, "cabundle")? {
            CborValue::Array(items) => items
                .into_iter()
                .map(|item| bytes(item, "cabundle"))
                .collect::<Result<Vec<_>>>()?,
            _ => return Err(Error::field("cabundle", "must be an array")),
        };

        let document = Self {
            module_id,
            digest,
            timestamp,
            pcrs,
            certificate,
            cabundle,
            public_key: optional(&mut fields, "public_key")?,
            user_data: optional(&mut fields, "user_data")?,
            nonce: optional(&mut fields, "nonce")?,
        };

        document.validate()?;

        Ok(document)
    }

    /// Checks every mandatory and optional field constraint.
    pub fn validate(&self) -> Result<()> {
        if self.module_id.is_empty() {
            return Err(Error::field("module_id", "must not be empty"));
        }

        if self.timestamp == 0 {
            return Err(Error::field("timestamp", "must be greater than 0"));
        }

        if !(MIN_PCR_COUNT..=MAX_PCR_COUNT).contains(&self.pcrs.len()) {
            return Err(Error::field(
                "pcrs",
                format!(
                    "expected between {MIN_PCR_COUNT} and {MAX_PCR_COUNT} entries, got {}",
                    self.pcrs.len()
                ),
            ));
        }
        for (index, value) in &self.pcrs {
            if u64::from(*index) > MAX_PCR_INDEX {
                return Err(Error::field("pcrs", format!("PCR index {index} out of range")));
            }
            if !PCR_LENGTHS.contains(&value.len()) {
                return Err(Error::field(
                    "pcrs",
                    format!(
                        "PCR{index} has length {}, expected one of {PCR_LENGTHS:?}",
                        value.len()
                    ),
                ));
            }
        }

        if self.certificate.is_empty() {
            return Err(Error::field("certificate", "must not be empty"));
        }

        if self.cabundle.is_empty() {
            return Err(Error::field("cabundle", "must not be empty"));
        }
        for (i, entry) in self.cabundle.iter().enumerate() {
            if entry.is_empty() || entry.len() > MAX_CABUNDLE_ENTRY_LENGTH {
                return Err(Error::field(
                    "cabundle",
                    format!(
                        "entry {i} has length {}, expected 1..={MAX_CABUNDLE_ENTRY_LENGTH}",
                        entry.len()
                    ),
                ));
            }
        }

        if let Some(public_key) = &self.public_key {
            if public_key.is_empty() || public_key.len() > MAX_PUBLIC_KEY_LENGTH {
                return Err(Error::field(
                    "public_key",
                    format!("length must be 1..={MAX_PUBLIC_KEY_LENGTH}"),
                ));
            }
        }
        if let Some(user_data) = &self.user_data {
            if user_data.len() > MAX_USER_DATA_LENGTH {
                return Err(Error::field(
                    "user_data",
                    format!("length must be at most {MAX_USER_DATA_LENGTH}"),
                ));
            }
        }
        if let Some(nonce) = &self.nonce {
            if nonce.len() > MAX_NONCE_LENGTH {
                return Err(Error::field(
                    "nonce",
                    format!("length must be at most {MAX_NONCE_LENGTH}"),
                ));
            }
        }

        Ok(())
    }

    pub fn to_value(&self) -> CborValue {
        let optional = |value: &Option<Vec<u8>>| match value {
            Some(bytes) => CborValue::Bytes(bytes.clone()),
            None => CborValue::Null,
        };

        CborValue::Map(vec![
            (text("module_id"), CborValue::Text(self.module_id.clone())),
            (text("digest"), CborValue::Text(self.digest.as_str().to_string())),
            (text("timestamp"), CborValue::Integer(self.timestamp.into())),
            (
                text("pcrs"),
                CborValue::Map(
                    self.pcrs
                        .iter()
                        .map(|(index, value)| {
                            (CborValue::Integer((*index).into()), CborValue::Bytes(value.clone()))
                        })
                        .collect(),
                ),
            ),
            (text("certificate"), CborValue::Bytes(self.certificate.clone())),
            (
                text("cabundle"),
                CborValue::Array(
                    self.cabundle
                        .iter()
                        .map(|cert| CborValue::Bytes(cert.clone()))
                        .collect(),
                ),
            ),
            (text("public_key"), optional(&self.public_key)),
            (text("user_data"), optional(&self.user_data)),
            (text("nonce"), optional(&self.nonce)),
        ])
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        ciborium::into_writer(&self.to_value(), &mut buffer)?;
        Ok(buffer)
    }

    /// PCR values as lowercase hex keyed by index.
    pub fn pcrs_hex(&self) -> BTreeMap<u8, String> {
        self.pcrs
            .iter()
            .map(|(index, value)| (*index, data_encoding::HEXLOWER.encode(value)))
            .collect()
    }
}

fn text(key: &str) -> CborValue {
    CborValue::Text(key.to_string())
}

fn required(fields: &mut BTreeMap<String, CborValue>, field: &'static str) -> Result<CborValue> {
    match fields.remove(field) {
        Some(CborValue::Null) | None => Err(Error::field(field, "missing mandatory field")),
        Some(value) => Ok(value),
    }
}

fn optional(
    fields: &mut BTreeMap<String, CborValue>,
    field: &'static str,
) -> Result<Option<Vec<u8>>> {
    match fields.remove(field) {
        Some(CborValue::Null) | None => Ok(None),
        Some(value) => bytes(value, field).map(Some),
    }
}

fn bytes(value: CborValue, field: &'static str) -> Result<Vec<u8>> {
    match value {
        CborValue::Bytes(bytes) => Ok(bytes),
        _ => Err(Error::field(field, "must be a byte string")),
    }
}

/// Build measurements of an enclave image, as printed by
/// `nitro-cli build-enclave` and `nitro-cli describe-enclaves`.
#[derive(Serialize, Clone, Deserialize, Debug, Default)]
pub struct EnclaveBuildInfo {
    #[serde(rename = "Measurements")]
    pub measurements: BTreeMap<String, String>,
}

/// Expected PCR values, lowercase hex keyed by PCR index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectedMeasurements(BTreeMap<u8, String>);

impl ExpectedMeasurements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: u8, hex_value: &str) -> Result<()> {
        if u64::from(index) > MAX_PCR_INDEX {
            return Err(Error::Configuration(format!("PCR index {index} out of range")));
        }
        data_encoding::HEXLOWER_PERMISSIVE
            .decode(hex_value.as_bytes())
            .map_err(|_| Error::Configuration(format!("invalid hex for PCR{index}")))?;
        self.0.insert(index, hex_value.to_ascii_lowercase());
        Ok(())
    }

    /// Collects every `PCR<n>` entry of an enclave description; other keys
    /// such as `HashAlgorithm` are ignored.
    pub fn from_build_info(info: &EnclaveBuildInfo) -> Result<Self> {
        let mut expected = Self::new();
        for (label, value) in &info.measurements {
            let Some(index) = label.strip_prefix("PCR").and_then(|n| n.parse::<u8>().ok()) else {
                continue;
            };
            expected.insert(index, value)?;
        }
        Ok(expected)
    }

    pub fn from_json(description: &str) -> Result<Self> {
        let info: EnclaveBuildInfo = serde_json::from_str(description)
            .map_err(|err| Error::Configuration(format!("invalid enclave description: {err}")))?;
        Self::from_build_info(&info)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let description = std::fs::read_to_string(path)?;
        Self::from_json(&description)
    }

    pub fn get(&self, index: u8) -> Option<&str> {
        self.0.get(&index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &str)> {
        self.0.iter().map(|(index, value)| (*index, value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Subset of the `nitro-cli describe-enclaves` output used to locate an
/// enclave.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnclaveDescribeInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "EnclaveName")]
    pub enclave_name: Option<String>,
    #[serde(rename = "EnclaveID")]
    pub enclave_id: String,
    #[serde(rename = "EnclaveCID")]
    pub enclave_cid: u64,
    #[serde(rename = "State")]
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(flatten)]
    pub build_info: Option<EnclaveBuildInfo>,
}
