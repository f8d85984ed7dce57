// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

pub mod configuration;
pub mod constants;
pub mod errors;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod nsm;
pub mod server;
