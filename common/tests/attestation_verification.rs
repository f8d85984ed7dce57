// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use ciborium::Value as CborValue;
use coset::{CborSerializable, CoseSign1, CoseSign1Builder, HeaderBuilder, TaggedCborSerializable, iana};
use enclave_common::Error;
use enclave_common::attestation::{AttestationVerifier, MeasurementPolicy};
use enclave_common::channel::EnclavePrivateKey;
use enclave_common::models::{AttestationDocument, ExpectedMeasurements};
use enclave_common::simulation::{
    DocumentSigner, SIMULATED_INTERMEDIATE_CERT_PEM, SIMULATED_LEAF_CERT_PEM,
    SIMULATED_LEAF_KEY_PEM, SIMULATED_ROOT_CERT_PEM, SIMULATED_RSA_PRIVATE_KEY_PEM,
    simulated_trust_anchor,
};
use p384::ecdsa::signature::Signer;
use p384::ecdsa::{Signature, SigningKey};
use p384::pkcs8::DecodePrivateKey;

const ATTACKER_ROOT_PEM: &str = include_str!("fixtures/attacker_root.pem");
const ATTACKER_LEAF_PEM: &str = include_str!("fixtures/attacker_leaf.pem");
const ATTACKER_LEAF_KEY_PEM: &str = include_str!("fixtures/attacker_leaf_key.pem");

fn verifier() -> AttestationVerifier {
    AttestationVerifier::new(simulated_trust_anchor().unwrap())
}

fn public_key_der() -> Vec<u8> {
    EnclavePrivateKey::from_pkcs8_pem(SIMULATED_RSA_PRIVATE_KEY_PEM)
        .unwrap()
        .public_key()
        .to_der()
        .unwrap()
}

fn signed_document() -> (DocumentSigner, AttestationDocument, Vec<u8>) {
    let signer = DocumentSigner::simulated().unwrap();
    let document = signer.document(Some(public_key_der()), None, None).unwrap();
    let blob = signer.sign(&document).unwrap();
    (signer, document, blob)
}

/// Simulated certificate chain, but the signature is made with another key.
fn forging_signer() -> DocumentSigner {
    DocumentSigner::new(
        ATTACKER_LEAF_KEY_PEM,
        SIMULATED_LEAF_CERT_PEM,
        &[SIMULATED_ROOT_CERT_PEM, SIMULATED_INTERMEDIATE_CERT_PEM],
    )
    .unwrap()
}

fn without_field(document: &AttestationDocument, field: &str) -> Vec<u8> {
    let CborValue::Map(entries) = document.to_value() else {
        panic!("document is not a map");
    };
    let entries = entries
        .into_iter()
        .filter(|(key, _)| key.as_text() != Some(field))
        .collect();
    let mut payload = Vec::new();
    ciborium::into_writer(&CborValue::Map(entries), &mut payload).unwrap();
    payload
}

#[test]
fn test_valid_document_yields_public_key() {
    let (_, document, blob) = signed_document();
    let verified = verifier().verify(&blob).unwrap();

    assert_eq!(verified.document, document);
    assert!(verified.measurements.matches());
    assert_eq!(
        verified.enclave_public_key().unwrap().to_der().unwrap(),
        public_key_der()
    );
}

#[test]
fn test_tagged_envelope_is_accepted() {
    let (_, _, blob) = signed_document();
    let tagged = CoseSign1::from_slice(&blob).unwrap().to_tagged_vec().unwrap();
    assert!(verifier().verify(&tagged).is_ok());
}

#[test]
fn test_attacker_root_in_cabundle_is_untrusted() {
    let attacker =
        DocumentSigner::new(ATTACKER_LEAF_KEY_PEM, ATTACKER_LEAF_PEM, &[ATTACKER_ROOT_PEM]).unwrap();
    let blob = attacker
        .sign(&attacker.document(Some(public_key_der()), None, None).unwrap())
        .unwrap();

    assert!(matches!(
        verifier().verify(&blob),
        Err(Error::UntrustedCertificateChain(_))
    ));
}

#[test]
fn test_cabundle_root_is_replaced_by_trust_anchor() {
    let signer = DocumentSigner::new(
        SIMULATED_LEAF_KEY_PEM,
        SIMULATED_LEAF_CERT_PEM,
        &[ATTACKER_ROOT_PEM, SIMULATED_INTERMEDIATE_CERT_PEM],
    )
    .unwrap();
    let blob = signer.sign(&signer.document(None, None, None).unwrap()).unwrap();

    assert!(verifier().verify(&blob).is_ok());
}

#[test]
fn test_missing_intermediate_is_untrusted() {
    let signer = DocumentSigner::new(
        SIMULATED_LEAF_KEY_PEM,
        SIMULATED_LEAF_CERT_PEM,
        &[SIMULATED_ROOT_CERT_PEM],
    )
    .unwrap();
    let blob = signer.sign(&signer.document(None, None, None).unwrap()).unwrap();

    assert!(matches!(
        verifier().verify(&blob),
        Err(Error::UntrustedCertificateChain(_))
    ));
}

#[test]
fn test_forged_signature_is_rejected() {
    let signer = forging_signer();
    let blob = signer.sign(&signer.document(None, None, None).unwrap()).unwrap();

    assert!(matches!(verifier().verify(&blob), Err(Error::InvalidSignature(_))));
}

#[test]
fn test_invalid_fields_are_rejected_before_signature_check() {
    let signer = forging_signer();
    let document = signer.document(None, None, None).unwrap();

    let mut empty_pcrs = document.clone();
    empty_pcrs.pcrs.clear();

    let mut too_many_pcrs = document.clone();
    too_many_pcrs.pcrs = (0..33u8).map(|i| (i, vec![0; 48])).collect::<BTreeMap<_, _>>();

    let mut short_pcr = document.clone();
    short_pcr.pcrs.insert(0, vec![0; 16]);

    for payload in [
        empty_pcrs.to_cbor().unwrap(),
        too_many_pcrs.to_cbor().unwrap(),
        short_pcr.to_cbor().unwrap(),
    ] {
        let blob = signer.sign_payload(payload).unwrap();
        assert!(matches!(
            verifier().verify(&blob),
            Err(Error::InvalidAttestationField { field: "pcrs", .. })
        ));
    }

    for field in ["module_id", "digest", "timestamp", "pcrs", "certificate", "cabundle"] {
        let blob = signer.sign_payload(without_field(&document, field)).unwrap();
        match verifier().verify(&blob) {
            Err(Error::InvalidAttestationField { field: named, .. }) => assert_eq!(named, field),
            other => panic!("unexpected result without {field}: {other:?}"),
        }
    }
}

#[test]
fn test_undecodable_payload_is_malformed() {
    let signer = DocumentSigner::simulated().unwrap();
    let blob = signer.sign_payload(vec![0xff, 0xff, 0xff]).unwrap();
    assert!(matches!(
        verifier().verify(&blob),
        Err(Error::MalformedAttestation(_))
    ));
}

#[test]
fn test_non_es384_envelope_is_rejected() {
    let signer = DocumentSigner::simulated().unwrap();
    let payload = signer.document(None, None, None).unwrap().to_cbor().unwrap();
    let signing_key = SigningKey::from_pkcs8_pem(SIMULATED_LEAF_KEY_PEM).unwrap();

    let blob = CoseSign1Builder::new()
        .protected(HeaderBuilder::new().algorithm(iana::Algorithm::ES256).build())
        .payload(payload)
        .create_signature(b"", |data| {
            let signature: Signature = signing_key.sign(data);
            signature.to_bytes().to_vec()
        })
        .build()
        .to_vec()
        .unwrap();

    assert!(matches!(verifier().verify(&blob), Err(Error::InvalidSignature(_))));
}

#[test]
fn test_measurement_mismatch_is_reported_for_differing_index_only() {
    let (_, _, blob) = signed_document();
    let mut expected = ExpectedMeasurements::new();
    expected.insert(0, &"ab".repeat(48)).unwrap();
    expected.insert(1, &"00".repeat(48)).unwrap();

    let verified = verifier()
        .with_expected_measurements(expected.clone())
        .verify(&blob)
        .unwrap();
    assert!(!verified.measurements.matches());
    assert_eq!(verified.measurements.mismatches.len(), 1);
    assert_eq!(verified.measurements.mismatches[0].index, 0);

    let enforced = verifier()
        .with_expected_measurements(expected)
        .with_policy(MeasurementPolicy::Enforce)
        .verify(&blob);
    match enforced {
        Err(Error::MeasurementMismatch(mismatches)) => {
            assert_eq!(mismatches.len(), 1);
            assert_eq!(mismatches[0].index, 0);
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn test_matching_measurements_from_description_file() {
    let (_, _, blob) = signed_document();
    let description = format!(
        r#"{{"Measurements": {{"HashAlgorithm": "Sha384 {{ ... }}", "PCR0": "{0}", "PCR1": "{0}", "PCR2": "{0}"}}}}"#,
        "0".repeat(96)
    );
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), description).unwrap();

    let verified = verifier()
        .with_expected_measurements(ExpectedMeasurements::from_file(file.path()).unwrap())
        .with_policy(MeasurementPolicy::Enforce)
        .verify(&blob)
        .unwrap();
    assert_eq!(verified.measurements.checked, 3);
    assert!(verified.measurements.matches());
}

#[test]
fn test_expired_chain_is_untrusted() {
    let (_, _, blob) = signed_document();
    let far_future = SystemTime::now() + Duration::from_secs(200 * 365 * 24 * 3600);
    assert!(matches!(
        verifier().verify_at(&blob, far_future),
        Err(Error::UntrustedCertificateChain(_))
    ));
}

#[test]
fn test_stale_document_is_rejected_when_max_age_is_set() {
    let (_, _, blob) = signed_document();
    let later = SystemTime::now() + Duration::from_secs(3600);

    assert!(verifier().verify_at(&blob, later).is_ok());
    assert!(matches!(
        verifier()
            .with_max_age(Duration::from_secs(300))
            .verify_at(&blob, later),
        Err(Error::InvalidAttestationField { field: "timestamp", .. })
    ));
}
