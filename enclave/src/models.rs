// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! JSON documents exchanged by the `process` action.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_MODEL;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Text {
    pub content: String,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRequest {
    pub texts: Vec<Text>,
    #[serde(default = "default_model")]
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    pub label: String,
    pub start: usize,
    pub end: usize,
    pub person_title: String,
    pub company_legal_form: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedText {
    pub text: String,
    #[serde(default)]
    pub entities: Vec<Entity>,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub result: Vec<ProcessedText>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_defaults_when_absent() {
        let request: ProcessRequest =
            serde_json::from_str(r#"{"texts": [{"content": "hello"}]}"#).unwrap();
        assert_eq!(request.model, DEFAULT_MODEL);
        assert_eq!(request.texts[0].content, "hello");
    }

    #[test]
    fn test_texts_are_required() {
        assert!(serde_json::from_str::<ProcessRequest>(r#"{"model": "socsec_ner_fr"}"#).is_err());
    }
}
