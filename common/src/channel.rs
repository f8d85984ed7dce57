// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Hybrid secure channel.
//!
//! A sender draws a fresh 256-bit [`SessionKey`], wraps it with RSA-OAEP
//! (SHA-256) under the enclave's public key and encrypts the CBOR encoded
//! message with AES-256-GCM. The enclave unwraps the key with its private
//! key and answers under the same session key with a fresh nonce.

use aws_lc_rs::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::codec::{SealedMessage, from_cbor, to_cbor};
use crate::constants::SYMMETRIC_KEY_LENGTH;
use crate::entropy::{EntropyRng, RandomSource, SystemRandomSource};
use crate::errors::{Error, Result};

/// Length of the AES-GCM authentication tag.
pub const TAG_LENGTH: usize = 16;

/// The enclave's RSA public key, as carried in the attestation document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnclavePublicKey(RsaPublicKey);

impl EnclavePublicKey {
    /// Parses a DER SubjectPublicKeyInfo.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        RsaPublicKey::from_public_key_der(der)
            .map(Self)
            .map_err(|err| Error::field("public_key", format!("not an RSA public key: {err}")))
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.0
            .to_public_key_der()
            .map(|document| document.as_bytes().to_vec())
            .map_err(|err| Error::EncryptionFailure(format!("failed to encode public key: {err}")))
    }
}

/// The enclave's RSA private key. Read-only once created.
pub struct EnclavePrivateKey(RsaPrivateKey);

impl EnclavePrivateKey {
    pub fn generate(bits: usize, source: &dyn RandomSource) -> Result<Self> {
        RsaPrivateKey::new(&mut EntropyRng::checked(source)?, bits)
            .map(Self)
            .map_err(|err| Error::EncryptionFailure(format!("RSA key generation failed: {err}")))
    }

    pub fn from_pkcs8_pem(pem: &str) -> Result<Self> {
        RsaPrivateKey::from_pkcs8_pem(pem)
            .map(Self)
            .map_err(|err| Error::Configuration(format!("invalid RSA private key: {err}")))
    }

    pub fn to_pkcs8_pem(&self) -> Result<Zeroizing<String>> {
        self.0
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|err| Error::EncryptionFailure(format!("failed to encode private key: {err}")))
    }

    pub fn public_key(&self) -> EnclavePublicKey {
        EnclavePublicKey(self.0.to_public_key())
    }

    /// RSA-OAEP decryption with the private exponentiation blinded by
    /// randomness from `source`.
    pub fn decrypt_with(&self, wrapped: &[u8], source: &dyn RandomSource) -> Result<Zeroizing<Vec<u8>>> {
        let mut rng = EntropyRng::checked(source)?;
        self.0
            .decrypt_blinded(&mut rng, Oaep::new::<Sha256>(), wrapped)
            .map(Zeroizing::new)
            .map_err(|_| Error::DecryptionFailure("failed to unwrap session key".to_string()))
    }
}

impl std::fmt::Debug for EnclavePrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EnclavePrivateKey(<redacted>)")
    }
}

/// Recovers a session key wrapped under the enclave's public key.
pub trait KeyUnwrapper {
    fn unwrap_key(&self, wrapped: &[u8]) -> Result<Zeroizing<Vec<u8>>>;
}

impl KeyUnwrapper for EnclavePrivateKey {
    fn unwrap_key(&self, wrapped: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        self.decrypt_with(wrapped, &SystemRandomSource::new())
    }
}

/// Ephemeral AES-256-GCM key for one exchange.
pub struct SessionKey(Zeroizing<[u8; SYMMETRIC_KEY_LENGTH]>);

impl SessionKey {
    pub fn generate(source: &dyn RandomSource) -> Result<Self> {
        let mut key = Zeroizing::new([0u8; SYMMETRIC_KEY_LENGTH]);
        source.fill(&mut key[..])?;
        Ok(Self(key))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let key: [u8; SYMMETRIC_KEY_LENGTH] = bytes.try_into().map_err(|_| {
            Error::DecryptionFailure(format!(
                "session key must be {SYMMETRIC_KEY_LENGTH} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(Zeroizing::new(key)))
    }

    /// RSA-OAEP wraps this key under `public_key`.
    pub fn wrap(&self, public_key: &EnclavePublicKey, source: &dyn RandomSource) -> Result<Vec<u8>> {
        public_key
            .0
            .encrypt(&mut EntropyRng::checked(source)?, Oaep::new::<Sha256>(), &self.0[..])
            .map_err(|err| Error::EncryptionFailure(format!("failed to wrap session key: {err}")))
    }

    fn aead_key(&self) -> Result<LessSafeKey> {
        UnboundKey::new(&AES_256_GCM, &self.0[..])
            .map(LessSafeKey::new)
            .map_err(|_| Error::EncryptionFailure("invalid AES-256-GCM key".to_string()))
    }

    pub fn encrypt_bytes(
        &self,
        plaintext: &[u8],
        source: &dyn RandomSource,
    ) -> Result<SealedMessage> {
        let mut nonce = [0u8; NONCE_LEN];
        source.fill(&mut nonce)?;

        let mut in_out = plaintext.to_vec();
        let tag = self
            .aead_key()?
            .seal_in_place_separate_tag(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut in_out)
            .map_err(|_| Error::EncryptionFailure("AES-256-GCM seal failed".to_string()))?;

        Ok(SealedMessage {
            encrypted_key: None,
            nonce: nonce.to_vec(),
            tag: tag.as_ref().to_vec(),
            ciphertext: in_out,
        })
    }

    pub fn decrypt_bytes(&self, sealed: &SealedMessage) -> Result<Zeroizing<Vec<u8>>> {
        let nonce = Nonce::try_assume_unique_for_key(&sealed.nonce)
            .map_err(|_| Error::DecryptionFailure(format!("nonce must be {NONCE_LEN} bytes")))?;
        if sealed.tag.len() != TAG_LENGTH {
            return Err(Error::DecryptionFailure(format!(
                "tag must be {TAG_LENGTH} bytes"
            )));
        }

        let mut in_out = Zeroizing::new(Vec::with_capacity(sealed.ciphertext.len() + TAG_LENGTH));
        in_out.extend_from_slice(&sealed.ciphertext);
        in_out.extend_from_slice(&sealed.tag);

        let plaintext_len = self
            .aead_key()?
            .open_in_place(nonce, Aad::empty(), in_out.as_mut_slice())
            .map_err(|_| Error::DecryptionFailure("message authentication failed".to_string()))?
            .len();
        in_out.truncate(plaintext_len);

        Ok(in_out)
    }

    /// CBOR encodes `message` and encrypts it under this key.
    pub fn encrypt<T: Serialize>(&self, message: &T, source: &dyn RandomSource) -> Result<SealedMessage> {
        let plaintext = Zeroizing::new(to_cbor(message)?);
        self.encrypt_bytes(&plaintext, source)
    }

    pub fn decrypt<T: DeserializeOwned>(&self, sealed: &SealedMessage) -> Result<T> {
        from_cbor(&self.decrypt_bytes(sealed)?)
    }
}

/// Seals `message` for the enclave owning `public_key`.
///
/// Returns the session key as well so the caller can open the reply.
pub fn seal<T: Serialize>(
    public_key: &EnclavePublicKey,
    message: &T,
    source: &dyn RandomSource,
) -> Result<(SealedMessage, SessionKey)> {
    let session_key = SessionKey::generate(source)?;
    let mut sealed = session_key.encrypt(message, source)?;
    sealed.encrypted_key = Some(session_key.wrap(public_key, source)?);
    Ok((sealed, session_key))
}

/// Opens a sealed request, returning the message and the session key to
/// answer with.
pub fn unseal<T: DeserializeOwned, U: KeyUnwrapper + ?Sized>(
    unwrapper: &U,
    sealed: &SealedMessage,
) -> Result<(T, SessionKey)> {
    let wrapped = sealed
        .encrypted_key
        .as_deref()
        .ok_or_else(|| Error::DecryptionFailure("sealed message carries no key".to_string()))?;
    let session_key = SessionKey::from_bytes(&unwrapper.unwrap_key(wrapped)?)?;
    let message = session_key.decrypt(sealed)?;
    Ok((message, session_key))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::simulation::SIMULATED_RSA_PRIVATE_KEY_PEM;

    fn private_key() -> EnclavePrivateKey {
        EnclavePrivateKey::from_pkcs8_pem(SIMULATED_RSA_PRIVATE_KEY_PEM).unwrap()
    }

    struct Failing;

    impl RandomSource for Failing {
        fn fill(&self, _dest: &mut [u8]) -> Result<()> {
            Err(Error::EncryptionFailure("no entropy".to_string()))
        }
    }

    #[derive(Default)]
    struct Counting {
        draws: AtomicUsize,
        inner: SystemRandomSource,
    }

    impl RandomSource for Counting {
        fn fill(&self, dest: &mut [u8]) -> Result<()> {
            self.draws.fetch_add(1, Ordering::SeqCst);
            self.inner.fill(dest)
        }
    }

    #[test]
    fn test_key_generation_with_failing_source_is_an_error() {
        assert!(matches!(
            EnclavePrivateKey::generate(2048, &Failing),
            Err(Error::EncryptionFailure(_))
        ));
    }

    #[test]
    fn test_wrap_with_failing_source_is_an_error() {
        let session_key = SessionKey::generate(&SystemRandomSource::new()).unwrap();
        assert!(session_key.wrap(&private_key().public_key(), &Failing).is_err());
    }

    #[test]
    fn test_unwrap_draws_blinding_randomness() {
        let key = private_key();
        let session_key = SessionKey::generate(&SystemRandomSource::new()).unwrap();
        let wrapped = session_key
            .wrap(&key.public_key(), &SystemRandomSource::new())
            .unwrap();

        let source = Counting::default();
        let unwrapped = key.decrypt_with(&wrapped, &source).unwrap();
        assert_eq!(&unwrapped[..], &session_key.0[..]);
        // One readiness draw plus at least one for the blinding factor.
        assert!(source.draws.load(Ordering::SeqCst) >= 2);

        assert!(key.decrypt_with(&wrapped, &Failing).is_err());
    }

    #[test]
    fn test_seal_unseal_roundtrip() {
        let source = SystemRandomSource::new();
        let key = private_key();
        let (sealed, _) = seal(&key.public_key(), &"ping".to_string(), &source).unwrap();
        assert_ne!(sealed.ciphertext, b"ping");

        let (message, _): (String, _) = unseal(&key, &sealed).unwrap();
        assert_eq!(message, "ping");
    }

    #[test]
    fn test_reply_under_same_session_key() {
        let source = SystemRandomSource::new();
        let key = private_key();
        let (request, client_key) = seal(&key.public_key(), &"ping".to_string(), &source).unwrap();

        let (_, server_key): (String, _) = unseal(&key, &request).unwrap();
        let reply = server_key.encrypt(&"pong".to_string(), &source).unwrap();
        assert!(reply.encrypted_key.is_none());
        assert_ne!(reply.nonce, request.nonce);

        let answer: String = client_key.decrypt(&reply).unwrap();
        assert_eq!(answer, "pong");
    }

    #[test]
    fn test_bit_flips_are_rejected() {
        let source = SystemRandomSource::new();
        let session_key = SessionKey::generate(&source).unwrap();
        let sealed = session_key.encrypt_bytes(b"attack at dawn", &source).unwrap();

        for i in 0..sealed.ciphertext.len() {
            let mut tampered = sealed.clone();
            tampered.ciphertext[i] ^= 0x01;
            assert!(matches!(
                session_key.decrypt_bytes(&tampered),
                Err(Error::DecryptionFailure(_))
            ));
        }
        for i in 0..sealed.tag.len() {
            let mut tampered = sealed.clone();
            tampered.tag[i] ^= 0x80;
            assert!(matches!(
                session_key.decrypt_bytes(&tampered),
                Err(Error::DecryptionFailure(_))
            ));
        }
    }

    #[test]
    fn test_malformed_sealed_messages_are_rejected() {
        let source = SystemRandomSource::new();
        let session_key = SessionKey::generate(&source).unwrap();
        let sealed = session_key.encrypt_bytes(b"hello", &source).unwrap();

        let mut short_nonce = sealed.clone();
        short_nonce.nonce.pop();
        assert!(matches!(
            session_key.decrypt_bytes(&short_nonce),
            Err(Error::DecryptionFailure(_))
        ));

        let mut short_tag = sealed.clone();
        short_tag.tag.truncate(8);
        assert!(matches!(
            session_key.decrypt_bytes(&short_tag),
            Err(Error::DecryptionFailure(_))
        ));

        let key = private_key();
        assert!(matches!(
            unseal::<String, _>(&key, &sealed),
            Err(Error::DecryptionFailure(_))
        ));
    }

    #[test]
    fn test_wrong_private_key_cannot_unseal() {
        let source = SystemRandomSource::new();
        let key = private_key();
        let (mut sealed, _) = seal(&key.public_key(), &"secret".to_string(), &source).unwrap();
        if let Some(wrapped) = sealed.encrypted_key.as_mut() {
            wrapped[0] ^= 0xff;
        }
        assert!(matches!(
            unseal::<String, _>(&key, &sealed),
            Err(Error::DecryptionFailure(_))
        ));
    }

    #[test]
    fn test_public_key_der_roundtrip() {
        let public_key = private_key().public_key();
        let der = public_key.to_der().unwrap();
        assert_eq!(EnclavePublicKey::from_der(&der).unwrap(), public_key);
        assert!(EnclavePublicKey::from_der(b"junk").is_err());
    }
}
