// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::time::Duration;

/// Appended to every `message` request.
pub const MESSAGE_SUFFIX: &str = " - Added by server";

pub const MODEL_NAMES: [&str; 2] = ["socsec_ner_fr", "socsec_ner_nl"];
pub const DEFAULT_MODEL: &str = "socsec_ner_nl";

/// Maximum number of texts accepted in one `process` request.
pub const MAX_TEXTS: usize = 100;

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest chunk the NSM returns for one GetRandom request.
pub const NSM_RANDOM_CHUNK: usize = 256;
