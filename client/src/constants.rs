// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

pub const TEST_MESSAGE: &str = "Test message";

/// Sample texts sent by `--test`.
pub const TEST_TEXTS: [&str; 3] = [
    "Jan Peeters woont in de Kerkstraat 12 te Gent.",
    "Marie Dubois travaille chez Dupont SA à Liège.",
    "Contact: dr. Pieter Janssens, Janssens BV, Antwerpen.",
];
