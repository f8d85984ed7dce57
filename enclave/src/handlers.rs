// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Application logic behind the secure channel.
//!
//! A [`RequestHandler`] only ever sees decrypted plaintext and returns the
//! plaintext reply; sealing and unsealing happen in the server.

use ciborium::Value as CborValue;
use enclave_common::Error;
use enclave_common::codec::Action;

use crate::constants::{MAX_TEXTS, MESSAGE_SUFFIX, MODEL_NAMES};
use crate::errors::ServerError;
use crate::models::{ProcessRequest, ProcessResponse, ProcessedText};

pub trait RequestHandler: Send + Sync {
    fn handle(&self, action: &Action, request: CborValue) -> Result<CborValue, ServerError>;
}

/// Bundled handler: echoes messages, lists models and shapes `process`
/// results. Entity recognition itself runs outside the enclave.
#[derive(Debug, Default, Clone)]
pub struct DemoHandler;

impl DemoHandler {
    fn message(&self, request: CborValue) -> Result<CborValue, ServerError> {
        match request {
            CborValue::Text(text) => Ok(CborValue::Text(format!("{text}{MESSAGE_SUFFIX}"))),
            _ => Err(ServerError::invalid("message", "expected a text message")),
        }
    }

    fn models(&self) -> CborValue {
        CborValue::Array(
            MODEL_NAMES
                .iter()
                .map(|name| CborValue::Text(name.to_string()))
                .collect(),
        )
    }

    fn process(&self, request: CborValue) -> Result<CborValue, ServerError> {
        let CborValue::Text(json) = request else {
            return Err(ServerError::invalid("process", "expected a JSON document"));
        };

        let request: ProcessRequest = serde_json::from_str(&json)?;
        if !MODEL_NAMES.contains(&request.model.as_str()) {
            return Err(ServerError::invalid(
                "process",
                format!("unknown model {:?}", request.model),
            ));
        }
        if request.texts.len() > MAX_TEXTS {
            return Err(ServerError::invalid(
                "process",
                format!("at most {MAX_TEXTS} texts per request"),
            ));
        }

        tracing::debug!(
            "[enclave] processing {} text(s) with {}",
            request.texts.len(),
            request.model
        );

        let response = ProcessResponse {
            result: request
                .texts
                .into_iter()
                .map(|text| ProcessedText {
                    text: text.content,
                    entities: Vec::new(),
                    html: String::new(),
                })
                .collect(),
        };
        Ok(CborValue::Text(serde_json::to_string(&response)?))
    }
}

impl RequestHandler for DemoHandler {
    fn handle(&self, action: &Action, request: CborValue) -> Result<CborValue, ServerError> {
        match action {
            Action::Message => self.message(request),
            Action::Models => Ok(self.models()),
            Action::Process => self.process(request),
            Action::GetAttestation | Action::Unknown(_) => {
                Err(Error::UnknownAction(action.to_string()).into())
            }
        }
    }
}
