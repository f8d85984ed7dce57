// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! # Parent Relay
//!
//! HTTP hop between callers and an enclave. The same binary runs on the
//! parent instance, forwarding to the enclave over vsock, and on a bastion
//! host, forwarding to the parent's relay over HTTP.
//!
//! ```text
//! Client -> bastion relay -> parent relay -> vsock -> Enclave
//! ```
//!
//! Envelopes are forwarded unchanged. The relay reads the outer action tag
//! for logging and never sees plaintext.
//!
//! ## Modules
//!
//! - [`application`]: HTTP server setup with Axum, body limit and timeout
//! - [`configuration`]: CLI argument parsing with clap
//! - [`constants`]: Configuration constants for the application
//! - [`enclaves`]: Nitro Enclave discovery
//! - [`errors`]: Application error types with HTTP response mapping
//! - [`models`]: Request types with validation
//! - [`routes`]: HTTP route handlers (health, enclaves, post)

pub mod application;
pub mod configuration;
pub mod constants;
pub mod enclaves;
pub mod errors;
pub mod models;
pub mod routes;
