// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Attestation document verification.
//!
//! A document is accepted only after every step below succeeds, in order:
//!
//! 1. Decode the COSE Sign1 envelope and its CBOR payload
//! 2. Validate every field constraint of the payload
//! 3. Build the certificate chain leaf -> `cabundle[1..]` -> pinned root
//!    (`cabundle[0]` is never trusted)
//! 4. Verify the COSE signature with the leaf key (ES384)
//! 5. Compare PCRs with the expected measurements, if any
//!
//! References:
//! - <https://docs.aws.amazon.com/enclaves/latest/user/verify-root.html>
//! - <https://blog.trailofbits.com/2024/02/16/a-few-notes-on-aws-nitro-enclaves-images-and-attestation/>

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use coset::iana;
use coset::{CborSerializable, CoseSign1, RegisteredLabelWithPrivate, TaggedCborSerializable};
use p384::ecdsa::{Signature, VerifyingKey, signature::Verifier};
use tracing::{debug, warn};
use x509_cert::Certificate;
use x509_cert::der::oid::ObjectIdentifier;
use x509_cert::der::{Decode, Encode};
use x509_cert::time::Time;

use crate::channel::EnclavePublicKey;
use crate::constants::PCR_PREFIX_LENGTH;
use crate::errors::{Error, Result};
use crate::models::{AttestationDocument, DigestAlgorithm, ExpectedMeasurements};
use crate::nitro_root_cert::TrustAnchor;

/// ecdsa-with-SHA384
const ECDSA_WITH_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");

/// Tolerated clock skew for documents stamped in the future.
const MAX_CLOCK_SKEW: Duration = Duration::from_secs(60);

/// What to do when PCRs differ from the expected measurements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MeasurementPolicy {
    /// Report mismatches and accept the document.
    #[default]
    Advisory,
    /// Reject the document with [`Error::MeasurementMismatch`].
    Enforce,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcrMismatch {
    pub index: u8,
    pub expected: String,
    /// `None` when the document carries no value for this index.
    pub actual: Option<String>,
}

fn prefix(value: &str) -> &str {
    value.get(..PCR_PREFIX_LENGTH).unwrap_or(value)
}

impl fmt::Display for PcrMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PCR{}: expected {}..., got {}",
            self.index,
            prefix(&self.expected),
            match &self.actual {
                Some(actual) => format!("{}...", prefix(actual)),
                None => "nothing".to_string(),
            }
        )
    }
}

/// Result of comparing a document's PCRs with the expected measurements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeasurementReport {
    pub checked: usize,
    pub mismatches: Vec<PcrMismatch>,
}

impl MeasurementReport {
    pub fn compare(document: &AttestationDocument, expected: &ExpectedMeasurements) -> Self {
        let actual = document.pcrs_hex();
        let mismatches = expected
            .iter()
            .filter_map(|(index, expected)| {
                let actual = actual.get(&index);
                (actual.map(String::as_str) != Some(expected)).then(|| PcrMismatch {
                    index,
                    expected: expected.to_string(),
                    actual: actual.cloned(),
                })
            })
            .collect();

        Self {
            checked: expected.len(),
            mismatches,
        }
    }

    /// `true` when every expected PCR matched.
    pub fn matches(&self) -> bool {
        self.mismatches.is_empty()
    }
}

impl fmt::Display for MeasurementReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.matches() {
            return write!(f, "{} PCR(s) match", self.checked);
        }
        write!(f, "{} of {} PCR(s) differ", self.mismatches.len(), self.checked)?;
        for mismatch in &self.mismatches {
            write!(f, "; {mismatch}")?;
        }
        Ok(())
    }
}

/// A document that passed verification.
#[derive(Debug, Clone)]
pub struct VerifiedAttestation {
    pub document: AttestationDocument,
    pub measurements: MeasurementReport,
}

impl VerifiedAttestation {
    /// The enclave's channel key, the only thing a caller should derive
    /// from a verified document.
    pub fn enclave_public_key(&self) -> Result<EnclavePublicKey> {
        let der = self
            .document
            .public_key
            .as_deref()
            .ok_or_else(|| Error::field("public_key", "document carries no public key"))?;
        EnclavePublicKey::from_der(der)
    }
}

#[derive(Debug, Clone)]
pub struct AttestationVerifier {
    trust_anchor: TrustAnchor,
    expected: ExpectedMeasurements,
    policy: MeasurementPolicy,
    max_age: Option<Duration>,
}

impl AttestationVerifier {
    pub fn new(trust_anchor: TrustAnchor) -> Self {
        Self {
            trust_anchor,
            expected: ExpectedMeasurements::default(),
            policy: MeasurementPolicy::default(),
            max_age: None,
        }
    }

    pub fn with_expected_measurements(mut self, expected: ExpectedMeasurements) -> Self {
        self.expected = expected;
        self
    }

    pub fn with_policy(mut self, policy: MeasurementPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Rejects documents older than `max_age`. Disabled unless set.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn verify(&self, document: &[u8]) -> Result<VerifiedAttestation> {
        self.verify_at(document, SystemTime::now())
    }

    /// Verifies `document` as if the current time were `now`.
    pub fn verify_at(&self, document: &[u8], now: SystemTime) -> Result<VerifiedAttestation> {
        let now = now
            .duration_since(UNIX_EPOCH)
            .map_err(|_| Error::Configuration("system time before Unix epoch".to_string()))?;

        let cose = parse_envelope(document)?;

        let payload = cose
            .payload
            .as_deref()
            .ok_or_else(|| Error::MalformedAttestation("COSE Sign1 has no payload".to_string()))?;
        let document = AttestationDocument::from_cbor(payload)?;

        let leaf = validate_certificate_chain(&self.trust_anchor, &document, now)?;
        verify_signature(&cose, &leaf, document.digest)?;

        if let Some(max_age) = self.max_age {
            verify_timestamp(document.timestamp, now, max_age)?;
        }

        let measurements = MeasurementReport::compare(&document, &self.expected);
        if !measurements.matches() {
            match self.policy {
                MeasurementPolicy::Enforce => {
                    return Err(Error::MeasurementMismatch(measurements.mismatches));
                }
                MeasurementPolicy::Advisory => {
                    for mismatch in &measurements.mismatches {
                        warn!("[attestation] measurement mismatch: {mismatch}");
                    }
                }
            }
        }

        debug!(
            module_id = %document.module_id,
            "[attestation] verified document ({measurements})"
        );

        Ok(VerifiedAttestation {
            document,
            measurements,
        })
    }
}

/// The NSM emits untagged COSE Sign1; tagged input is accepted as well.
fn parse_envelope(document: &[u8]) -> Result<CoseSign1> {
    CoseSign1::from_slice(document)
        .or_else(|_| CoseSign1::from_tagged_slice(document))
        .map_err(|err| Error::MalformedAttestation(format!("failed to parse COSE Sign1: {err:?}")))
}

fn parse_certificate(der: &[u8], name: &str) -> Result<Certificate> {
    Certificate::from_der(der).map_err(|err| {
        Error::UntrustedCertificateChain(format!("failed to parse {name} certificate: {err}"))
    })
}

/// Walks root -> intermediates -> leaf and returns the parsed leaf.
fn validate_certificate_chain(
    trust_anchor: &TrustAnchor,
    document: &AttestationDocument,
    now: Duration,
) -> Result<Certificate> {
    let leaf = parse_certificate(&document.certificate, "enclave")?;

    let mut chain = Vec::with_capacity(document.cabundle.len() + 1);
    chain.push(trust_anchor.certificate().clone());
    for (i, der) in document.cabundle.iter().enumerate().skip(1) {
        chain.push(parse_certificate(der, &format!("cabundle[{i}]"))?);
    }
    chain.push(leaf);

    for cert in &chain {
        check_validity(cert, now)?;
    }
    for pair in chain.windows(2) {
        let [issuer, subject] = pair else {
            continue;
        };
        verify_issued_by(subject, issuer)?;
    }

    chain.pop().ok_or_else(|| {
        Error::UntrustedCertificateChain("certificate chain is empty".to_string())
    })
}

fn check_validity(cert: &Certificate, now: Duration) -> Result<()> {
    let validity = &cert.tbs_certificate.validity;
    let not_before = unix_duration(&validity.not_before);
    let not_after = unix_duration(&validity.not_after);
    if now < not_before || now > not_after {
        return Err(Error::UntrustedCertificateChain(format!(
            "certificate '{}' is outside its validity period",
            cert.tbs_certificate.subject
        )));
    }
    Ok(())
}

fn unix_duration(time: &Time) -> Duration {
    match time {
        Time::UtcTime(t) => t.to_unix_duration(),
        Time::GeneralTime(t) => t.to_unix_duration(),
    }
}

fn verify_issued_by(subject: &Certificate, issuer: &Certificate) -> Result<()> {
    let untrusted = |reason: &str| {
        Error::UntrustedCertificateChain(format!(
            "'{}' not issued by '{}': {reason}",
            subject.tbs_certificate.subject, issuer.tbs_certificate.subject
        ))
    };

    if subject.tbs_certificate.issuer != issuer.tbs_certificate.subject {
        return Err(untrusted("issuer name mismatch"));
    }
    if subject.signature_algorithm.oid != ECDSA_WITH_SHA384 {
        return Err(untrusted("unsupported signature algorithm"));
    }

    let issuer_key = issuer
        .tbs_certificate
        .subject_public_key_info
        .subject_public_key
        .as_bytes()
        .and_then(|bytes| VerifyingKey::from_sec1_bytes(bytes).ok())
        .ok_or_else(|| untrusted("issuer key is not a P-384 key"))?;

    let signature = subject
        .signature
        .as_bytes()
        .and_then(|bytes| Signature::from_der(bytes).ok())
        .ok_or_else(|| untrusted("malformed signature"))?;

    let tbs = subject
        .tbs_certificate
        .to_der()
        .map_err(|_| untrusted("failed to encode TBS certificate"))?;

    issuer_key
        .verify(&tbs, &signature)
        .map_err(|_| untrusted("bad signature"))
}

fn verify_signature(cose: &CoseSign1, leaf: &Certificate, digest: DigestAlgorithm) -> Result<()> {
    if cose.protected.header.alg != Some(RegisteredLabelWithPrivate::Assigned(iana::Algorithm::ES384))
    {
        return Err(Error::InvalidSignature(
            "COSE algorithm is not ES384".to_string(),
        ));
    }

    let key_bytes = leaf
        .tbs_certificate
        .subject_public_key_info
        .subject_public_key
        .as_bytes()
        .ok_or_else(|| Error::InvalidSignature("leaf certificate has no key".to_string()))?;

    let verifying_key = match digest {
        DigestAlgorithm::Sha384 => VerifyingKey::from_sec1_bytes(key_bytes).map_err(|_| {
            Error::InvalidSignature(format!("leaf key is not a {} key", digest.curve()))
        })?,
    };

    // COSE signatures are raw r || s.
    cose.verify_signature(b"", |signature, data| {
        let signature = Signature::from_slice(signature)?;
        verifying_key.verify(data, &signature)
    })
    .map_err(|_| Error::InvalidSignature("COSE signature does not verify".to_string()))
}

fn verify_timestamp(timestamp_ms: u64, now: Duration, max_age: Duration) -> Result<()> {
    let issued = Duration::from_millis(timestamp_ms);
    if issued > now + MAX_CLOCK_SKEW {
        return Err(Error::field("timestamp", "issued in the future"));
    }
    if now.saturating_sub(issued) > max_age {
        return Err(Error::field(
            "timestamp",
            format!("older than {} seconds", max_age.as_secs()),
        ));
    }
    Ok(())
}
