// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::net::TcpListener;
use std::sync::Arc;
use std::thread;

use clap::Parser;
use enclave_client::configuration::ClientOptions;
use enclave_client::constants::{TEST_MESSAGE, TEST_TEXTS};
use enclave_client::session::{build_verifier, run_test_sequence};
use enclave_common::client::EnclaveClient;
use enclave_server::handlers::DemoHandler;
use enclave_server::identity::IdentityProvider;
use enclave_server::server::Server;

fn start_simulated_enclave() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = Arc::new(
        Server::new(IdentityProvider::simulated().unwrap(), Box::new(DemoHandler)).with_concurrency(true),
    );
    thread::spawn(move || server.run_tcp(listener));
    port
}

#[test]
fn test_sequence_against_simulated_enclave() {
    let port = start_simulated_enclave().to_string();
    let options = ClientOptions::try_parse_from(["enclave-client", "--simulate", "--port", &port]).unwrap();

    let verifier = build_verifier(&options).unwrap();
    let client = EnclaveClient::new(options.address().unwrap());
    let enclave = client.attest(&verifier).unwrap();

    let replies = run_test_sequence(&client, &enclave.public_key).unwrap();
    assert_eq!(replies.message, format!("{TEST_MESSAGE} - Added by server"));
    assert_eq!(replies.models, vec!["socsec_ner_fr", "socsec_ner_nl"]);
    assert_eq!(
        replies.process["result"].as_array().unwrap().len(),
        TEST_TEXTS.len()
    );
}

#[test]
fn test_simulated_enclave_fails_against_nitro_root() {
    let port = start_simulated_enclave().to_string();
    let options = ClientOptions::try_parse_from(["enclave-client", "--port", &port, "--host", "127.0.0.1"]).unwrap();

    let verifier = build_verifier(&options).unwrap();
    let client = EnclaveClient::new(options.address().unwrap());
    assert!(matches!(
        client.attest(&verifier),
        Err(enclave_common::Error::UntrustedCertificateChain(_))
    ));
}
