// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use ciborium::Value as CborValue;
use enclave_common::attestation::AttestationVerifier;
use enclave_common::client::{AttestedEnclave, EnclaveClient};
use enclave_common::codec::{Action, Request, Response, decode, encode};
use enclave_common::constants::UNKNOWN_ACTION_RESPONSE;
use enclave_common::simulation::simulated_trust_anchor;
use enclave_common::transport::EnclaveAddress;
use enclave_common::{Error, ErrorKind};
use enclave_server::handlers::DemoHandler;
use enclave_server::identity::IdentityProvider;
use enclave_server::server::Server;

fn start_server(export_private_key: bool) -> EnclaveAddress {
    spawn(
        Server::new(IdentityProvider::simulated().unwrap(), Box::new(DemoHandler))
            .with_export_private_key(export_private_key)
            .with_timeout(Duration::from_secs(5))
            .with_concurrency(true),
    )
}

fn spawn(server: Server) -> EnclaveAddress {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = Arc::new(server);
    thread::spawn(move || server.run_tcp(listener));

    EnclaveAddress::Tcp {
        host: "127.0.0.1".to_string(),
        port,
    }
}

fn attest(client: &EnclaveClient) -> AttestedEnclave {
    let verifier = AttestationVerifier::new(simulated_trust_anchor().unwrap());
    client.attest(&verifier).unwrap()
}

#[test]
fn test_ping_round_trip() {
    let client = EnclaveClient::new(start_server(false));
    let enclave = attest(&client);

    let reply: String = client
        .send_encrypted(&enclave.public_key, Action::Message, &"ping")
        .unwrap();
    assert_eq!(reply, "ping - Added by server");
}

#[test]
fn test_models_and_process() {
    let client = EnclaveClient::new(start_server(false));
    let enclave = attest(&client);

    let models: Vec<String> = client
        .send_encrypted(&enclave.public_key, Action::Models, &CborValue::Null)
        .unwrap();
    assert_eq!(models, vec!["socsec_ner_fr", "socsec_ner_nl"]);

    let request = r#"{"texts": [{"content": "Marie Dubois habite à Liège"}], "model": "socsec_ner_fr"}"#;
    let reply: String = client
        .send_encrypted(&enclave.public_key, Action::Process, &request)
        .unwrap();
    let reply: serde_json::Value = serde_json::from_str(&reply).unwrap();
    assert_eq!(reply["result"][0]["text"], "Marie Dubois habite à Liège");
    assert_eq!(reply["result"][0]["entities"], serde_json::json!([]));
}

#[test]
fn test_unknown_action_gets_sealed_fixed_reply() {
    let client = EnclaveClient::new(start_server(false));
    let enclave = attest(&client);

    let reply: String = client
        .send_encrypted(&enclave.public_key, Action::from("reboot"), &"now")
        .unwrap();
    assert_eq!(reply, UNKNOWN_ACTION_RESPONSE);
}

#[test]
fn test_invalid_process_request_is_a_remote_error() {
    let client = EnclaveClient::new(start_server(false));
    let enclave = attest(&client);

    let result: Result<String, Error> =
        client.send_encrypted(&enclave.public_key, Action::Process, &"{\"texts\": 3}");
    assert!(matches!(
        result,
        Err(Error::Remote {
            kind: ErrorKind::MalformedRequest,
            ..
        })
    ));
}

#[test]
fn test_listener_survives_a_bad_connection() {
    let address = start_server(false);

    let garbage = address.exchange(b"%%% not an envelope %%%", Duration::from_secs(5)).unwrap();
    assert!(matches!(decode::<Response>(&garbage).unwrap(), Response::Error(_)));

    let frame = encode(&Request::get_attestation()).unwrap();
    let reply = address.exchange(&frame, Duration::from_secs(5)).unwrap();
    assert!(matches!(decode::<Response>(&reply).unwrap(), Response::Attestation(_)));
}

#[test]
fn test_exported_key_is_returned_when_enabled() {
    let client = EnclaveClient::new(start_server(true));
    let response = client.get_attestation().unwrap();
    assert!(response.private_key.is_some());
}

#[test]
fn test_slow_peer_cannot_hold_a_sequential_listener() {
    let address = spawn(
        Server::new(IdentityProvider::simulated().unwrap(), Box::new(DemoHandler))
            .with_timeout(Duration::from_secs(1))
            .with_concurrency(false),
    );
    let EnclaveAddress::Tcp { host, port } = address.clone() else {
        unreachable!()
    };

    // Announces 100 bytes, then sends one every 300 ms: each read finishes
    // well inside the timeout but the whole frame would take 30 s.
    let mut slow = TcpStream::connect((host.as_str(), port)).unwrap();
    slow.write_all(&100u64.to_le_bytes()).unwrap();
    thread::spawn(move || {
        for _ in 0..100 {
            if slow.write_all(b"A").is_err() {
                break;
            }
            thread::sleep(Duration::from_millis(300));
        }
    });
    thread::sleep(Duration::from_millis(100));

    let started = Instant::now();
    let frame = encode(&Request::get_attestation()).unwrap();
    let reply = address.exchange(&frame, Duration::from_secs(10)).unwrap();
    assert!(matches!(decode::<Response>(&reply).unwrap(), Response::Attestation(_)));
    assert!(started.elapsed() < Duration::from_secs(5));
}
