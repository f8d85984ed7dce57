// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Injectable randomness.
//!
//! Key generation and nonces draw from a [`RandomSource`] handed in by the
//! caller, so the enclave can route every random byte through the NSM while
//! everything else uses the platform generator.

use aws_lc_rs::rand::{SecureRandom, SystemRandom};
use rand_core::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use crate::errors::{Error, Result};

pub trait RandomSource: Send + Sync {
    fn fill(&self, dest: &mut [u8]) -> Result<()>;
}

/// Platform CSPRNG.
#[derive(Debug, Clone)]
pub struct SystemRandomSource(SystemRandom);

impl SystemRandomSource {
    pub fn new() -> Self {
        Self(SystemRandom::new())
    }
}

impl Default for SystemRandomSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for SystemRandomSource {
    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        self.0
            .fill(dest)
            .map_err(|_| Error::EncryptionFailure("system random source failed".to_string()))
    }
}

/// Bytes drawn by [`EntropyRng::checked`] before handing out the adapter.
const READINESS_CHECK_LEN: usize = 32;

/// Adapts a [`RandomSource`] to the `rand_core` traits the RSA crate expects.
///
/// The RSA crate draws through the infallible [`RngCore::fill_bytes`], which
/// panics when the source fails. Use [`EntropyRng::checked`] so a source that
/// is already broken surfaces as an error instead.
pub struct EntropyRng<'a> {
    source: &'a dyn RandomSource,
}

impl<'a> EntropyRng<'a> {
    pub fn new(source: &'a dyn RandomSource) -> Self {
        Self { source }
    }

    /// Draws from `source` once and returns its error, if any, before
    /// building the adapter.
    pub fn checked(source: &'a dyn RandomSource) -> Result<Self> {
        let mut scratch = Zeroizing::new([0u8; READINESS_CHECK_LEN]);
        source.fill(&mut scratch[..])?;
        Ok(Self::new(source))
    }
}

impl RngCore for EntropyRng<'_> {
    fn next_u32(&mut self) -> u32 {
        rand_core::impls::next_u32_via_fill(self)
    }

    fn next_u64(&mut self) -> u64 {
        rand_core::impls::next_u64_via_fill(self)
    }

    /// Panics if the underlying source fails, like `OsRng`.
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        if let Err(err) = self.try_fill_bytes(dest) {
            panic!("random source failed: {err}");
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand_core::Error> {
        self.source.fill(dest).map_err(rand_core::Error::new)
    }
}

impl CryptoRng for EntropyRng<'_> {}
