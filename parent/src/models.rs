// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::constants::MAX_PAYLOAD_LENGTH;

/// Body of `POST /post`: one encoded request envelope.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RelayRequest {
    #[validate(length(min = 1, max = MAX_PAYLOAD_LENGTH), custom(function = "validate_base64"))]
    pub payload: String,
}

fn validate_base64(payload: &str) -> Result<(), validator::ValidationError> {
    let valid = payload
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='));
    if valid {
        Ok(())
    } else {
        Err(validator::ValidationError::new("invalid_base64")
            .with_message("payload must be base64".into()))
    }
}
