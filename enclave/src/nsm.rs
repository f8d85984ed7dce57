// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Nitro Secure Module access.
//!
//! The NSM device is the enclave's only source of attestation documents and
//! of hardware entropy. A single [`Nsm`] handle is shared behind a mutex so
//! requests to the device are serialized.

use std::sync::{Arc, Mutex};

use enclave_common::entropy::RandomSource;

use crate::constants::NSM_RANDOM_CHUNK;
use crate::errors::ServerError;
#[cfg(target_env = "musl")]
use enclave_common::constants::MAX_PUBLIC_KEY_LENGTH;

#[cfg(target_env = "musl")]
pub struct Nsm {
    fd: i32,
}

#[cfg(target_env = "musl")]
impl Nsm {
    pub fn open() -> Result<Self, ServerError> {
        let fd = aws_nitro_enclaves_nsm_api::driver::nsm_init();
        if fd < 0 {
            return Err(ServerError::Nsm(format!(
                "failed to initialize NSM device: fd={fd}"
            )));
        }
        Ok(Self { fd })
    }

    /// COSE Sign1 attestation document binding `public_key`.
    pub fn attestation(&self, public_key: &[u8]) -> Result<Vec<u8>, ServerError> {
        use aws_nitro_enclaves_nsm_api::api::{Request, Response};

        if public_key.len() > MAX_PUBLIC_KEY_LENGTH {
            return Err(ServerError::Nsm(format!(
                "public_key must be at most {MAX_PUBLIC_KEY_LENGTH} bytes, got {}",
                public_key.len()
            )));
        }

        let request = Request::Attestation {
            user_data: None,
            nonce: None,
            public_key: Some(serde_bytes::ByteBuf::from(public_key.to_vec())),
        };
        match aws_nitro_enclaves_nsm_api::driver::nsm_process_request(self.fd, request) {
            Response::Attestation { document } => Ok(document),
            Response::Error(error_code) => Err(ServerError::Nsm(format!(
                "attestation failed with error code: {error_code:?}"
            ))),
            _ => Err(ServerError::Nsm("unexpected NSM response type".to_string())),
        }
    }

    pub fn random(&self) -> Result<Vec<u8>, ServerError> {
        use aws_nitro_enclaves_nsm_api::api::{Request, Response};

        match aws_nitro_enclaves_nsm_api::driver::nsm_process_request(self.fd, Request::GetRandom) {
            Response::GetRandom { random } if !random.is_empty() => Ok(random),
            Response::GetRandom { .. } => Err(ServerError::Nsm("NSM returned no entropy".to_string())),
            Response::Error(error_code) => Err(ServerError::Nsm(format!(
                "GetRandom failed with error code: {error_code:?}"
            ))),
            _ => Err(ServerError::Nsm("unexpected NSM response type".to_string())),
        }
    }
}

#[cfg(target_env = "musl")]
impl Drop for Nsm {
    fn drop(&mut self) {
        aws_nitro_enclaves_nsm_api::driver::nsm_exit(self.fd);
    }
}

/// Stand-in for non-musl targets (development and testing), where there is
/// no NSM device.
#[cfg(not(target_env = "musl"))]
pub struct Nsm {
    _private: (),
}

#[cfg(not(target_env = "musl"))]
impl Nsm {
    pub fn open() -> Result<Self, ServerError> {
        Err(ServerError::Nsm(
            "the NSM is only available inside a Nitro Enclave (musl target)".to_string(),
        ))
    }

    pub fn attestation(&self, _public_key: &[u8]) -> Result<Vec<u8>, ServerError> {
        Err(ServerError::Nsm("no NSM device".to_string()))
    }

    pub fn random(&self) -> Result<Vec<u8>, ServerError> {
        Err(ServerError::Nsm("no NSM device".to_string()))
    }
}

pub type SharedNsm = Arc<Mutex<Nsm>>;

fn lock(nsm: &SharedNsm) -> Result<std::sync::MutexGuard<'_, Nsm>, ServerError> {
    nsm.lock()
        .map_err(|_| ServerError::Nsm("NSM lock poisoned".to_string()))
}

pub fn attestation(nsm: &SharedNsm, public_key: &[u8]) -> Result<Vec<u8>, ServerError> {
    lock(nsm)?.attestation(public_key)
}

/// Hardware entropy drawn from the NSM.
pub struct NsmRandomSource {
    nsm: SharedNsm,
}

impl NsmRandomSource {
    pub fn new(nsm: SharedNsm) -> Self {
        Self { nsm }
    }
}

impl RandomSource for NsmRandomSource {
    fn fill(&self, dest: &mut [u8]) -> enclave_common::Result<()> {
        let to_common = |err: ServerError| enclave_common::Error::EncryptionFailure(err.to_string());
        let nsm = lock(&self.nsm).map_err(to_common)?;
        for chunk in dest.chunks_mut(NSM_RANDOM_CHUNK) {
            let mut filled = 0;
            while filled < chunk.len() {
                let random = nsm.random().map_err(to_common)?;
                let n = random.len().min(chunk.len() - filled);
                chunk[filled..filled + n].copy_from_slice(&random[..n]);
                filled += n;
            }
        }
        Ok(())
    }
}
