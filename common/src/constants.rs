// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::time::Duration;

/// vsock port the enclave server listens on; also the TCP port in simulation.
pub const ENCLAVE_PORT: u32 = 5050;
pub const ENCLAVE_NAME: &str = "enclave-channel";
pub const SIMULATED_ENCLAVE_HOST: &str = "127.0.0.1";

/// Maximum allowed frame size (10 MB) to prevent memory exhaustion DoS attacks
pub const MAX_MESSAGE_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// Attestation document field limits
pub const MAX_PCR_INDEX: u64 = 31;
pub const MIN_PCR_COUNT: usize = 1;
pub const MAX_PCR_COUNT: usize = 32;
pub const PCR_LENGTHS: [usize; 3] = [32, 48, 64];
pub const MAX_CABUNDLE_ENTRY_LENGTH: usize = 1024;
pub const MAX_PUBLIC_KEY_LENGTH: usize = 1024;
pub const MAX_USER_DATA_LENGTH: usize = 512;
pub const MAX_NONCE_LENGTH: usize = 512;

/// Number of hex characters shown when reporting a PCR mismatch.
pub const PCR_PREFIX_LENGTH: usize = 30;

// Secure channel parameters
pub const SYMMETRIC_KEY_LENGTH: usize = 32;
pub const RSA_KEY_BITS: usize = 4096;

pub const UNKNOWN_ACTION_RESPONSE: &str = "Unknown action request.";
