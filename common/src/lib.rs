// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Building blocks shared by the enclave server, the relays and the client:
//! attestation verification, the hybrid secure channel and the wire format.

pub mod attestation;
pub mod channel;
pub mod client;
pub mod codec;
pub mod constants;
pub mod enclaves;
pub mod entropy;
pub mod errors;
pub mod models;
pub mod nitro_root_cert;
pub mod protocol;
pub mod simulation;
pub mod transport;

pub use errors::{Error, ErrorKind, Result};
