// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Running enclaves known to this relay.
//!
//! The relay periodically calls [`refresh`](Enclaves::refresh), which runs
//! `nitro-cli describe-enclaves` and keeps the running enclaves carrying the
//! configured name. Requests are spread over them at random.

use enclave_common::enclaves::{matching_cids, parse_describe_output};
use enclave_common::models::EnclaveDescribeInfo;
use tokio::{process::Command, sync::RwLock};

use crate::errors::AppError;

pub struct Enclaves {
    name: String,
    enclaves: RwLock<Vec<EnclaveDescribeInfo>>,
}

impl Enclaves {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enclaves: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a copy of the current list.
    #[tracing::instrument(skip(self))]
    pub async fn get_enclaves(&self) -> Vec<EnclaveDescribeInfo> {
        let enclaves = self.enclaves.read().await;
        enclaves.clone()
    }

    /// Replaces the list, keeping only running enclaves with our name.
    pub async fn update(&self, enclaves: Vec<EnclaveDescribeInfo>) {
        let cids = matching_cids(&enclaves, &self.name);
        let mut enclaves_writer = self.enclaves.write().await;
        enclaves_writer.clear();
        enclaves_writer.extend(enclaves.into_iter().filter(|e| {
            u32::try_from(e.enclave_cid).is_ok_and(|cid| cids.contains(&cid))
        }));
    }

    #[tracing::instrument(skip(self))]
    pub async fn refresh(&self) -> Result<(), AppError> {
        let output = Command::new("nitro-cli")
            .arg("describe-enclaves")
            .output()
            .await?;

        if !output.status.success() {
            return Err(AppError::RunError(
                output.status.code(),
                String::from_utf8_lossy(output.stderr.as_slice()).to_string(),
            ));
        }

        let enclaves = parse_describe_output(output.stdout.as_slice())?;

        tracing::trace!("[relay] enclaves: {:?}", enclaves);

        self.update(enclaves).await;

        Ok(())
    }

    /// CID of a random known enclave.
    pub async fn choose_cid(&self) -> Result<u32, AppError> {
        let enclaves = self.enclaves.read().await;
        if enclaves.is_empty() {
            return Err(AppError::EnclaveNotFound);
        }

        let index = fastrand::usize(..enclaves.len());
        let enclave = enclaves.get(index).ok_or(AppError::EnclaveNotFound)?;
        enclave
            .enclave_cid
            .try_into()
            .map_err(|_| AppError::InternalServerError)
    }
}
