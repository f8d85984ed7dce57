// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::time::Duration;

use enclave_common::constants::MAX_MESSAGE_SIZE;

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8080;

pub const REFRESH_ENCLAVES_INTERVAL: Duration = Duration::from_secs(10);

/// Bound on one upstream exchange (enclave socket or next relay).
pub const UPSTREAM_TIMEOUT_SECS: u64 = 30;
/// Bound on a whole HTTP request, upstream exchange included.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Encoded frames are already base64, so the payload limit is the frame limit.
pub const MAX_PAYLOAD_LENGTH: u64 = MAX_MESSAGE_SIZE;
pub const MAX_BODY_SIZE: usize = MAX_MESSAGE_SIZE as usize + 1024;
