// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! One request, one response, one connection.
//!
//! An [`EnclaveAddress`] names where the next hop lives: the enclave itself
//! over vsock, a simulated enclave over TCP, or a relay over HTTP.

use std::fmt;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::OnceLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use vsock::VsockStream;

use crate::errors::{Error, ErrorKind, Result};
use crate::protocol::{recv_message, send_message};

/// JSON body exchanged with an HTTP relay; `payload` is an encoded frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayPayload {
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnclaveAddress {
    Vsock { cid: u32, port: u32 },
    Tcp { host: String, port: u16 },
    Http { url: String },
}

impl EnclaveAddress {
    /// Builds an address from exactly one of a vsock CID, a host or a relay
    /// URL.
    pub fn from_parts(
        cid: Option<u32>,
        host: Option<String>,
        api: Option<String>,
        port: u32,
    ) -> Result<Self> {
        match (cid, host, api) {
            (Some(cid), None, None) => Ok(Self::Vsock { cid, port }),
            (None, Some(host), None) => Ok(Self::Tcp {
                host,
                port: u16::try_from(port)
                    .map_err(|_| Error::InvalidAddress(format!("port {port} is not a TCP port")))?,
            }),
            (None, None, Some(url)) => Ok(Self::Http { url }),
            (None, None, None) => Err(Error::InvalidAddress(
                "one of a CID, a host or an API URL is required".to_string(),
            )),
            _ => Err(Error::InvalidAddress(
                "only one of a CID, a host or an API URL may be given".to_string(),
            )),
        }
    }

    /// Sends one encoded frame and returns the encoded reply.
    #[tracing::instrument(skip(frame), fields(len = frame.len()))]
    pub fn exchange(&self, frame: &[u8], timeout: Duration) -> Result<Vec<u8>> {
        match self {
            Self::Vsock { cid, port } => {
                let mut stream = VsockStream::connect_with_cid_port(*cid, *port).map_err(|err| {
                    Error::TransportUnavailable(format!("failed to connect to {self}: {err}"))
                })?;
                stream.set_read_timeout(Some(timeout))?;
                stream.set_write_timeout(Some(timeout))?;
                send_message(&mut stream, frame)?;
                recv_message(&mut stream)
            }
            Self::Tcp { host, port } => {
                let mut stream = connect_tcp(host, *port, timeout)?;
                stream.set_read_timeout(Some(timeout))?;
                stream.set_write_timeout(Some(timeout))?;
                send_message(&mut stream, frame)?;
                recv_message(&mut stream)
            }
            Self::Http { url } => post_frame(url, frame, timeout),
        }
    }
}

impl fmt::Display for EnclaveAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vsock { cid, port } => write!(f, "vsock://{cid}:{port}"),
            Self::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
            Self::Http { url } => f.write_str(url),
        }
    }
}

fn connect_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let unavailable =
        |reason: String| Error::TransportUnavailable(format!("failed to connect to {host}:{port}: {reason}"));

    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|err| unavailable(err.to_string()))?;

    let mut last_error = "no address resolved".to_string();
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                debug!("connection to {addr} failed: {err}");
                last_error = err.to_string();
            }
        }
    }
    Err(unavailable(last_error))
}

#[derive(Deserialize)]
struct RelayError {
    message: String,
}

static HTTP_CLIENT: OnceLock<reqwest::blocking::Client> = OnceLock::new();

/// Process-wide relay client; connections are pooled across exchanges.
fn http_client() -> Result<&'static reqwest::blocking::Client> {
    if let Some(client) = HTTP_CLIENT.get() {
        return Ok(client);
    }
    let client = reqwest::blocking::Client::builder()
        .build()
        .map_err(|err| Error::Configuration(format!("failed to build HTTP client: {err}")))?;
    Ok(HTTP_CLIENT.get_or_init(|| client))
}

fn post_frame(url: &str, frame: &[u8], timeout: Duration) -> Result<Vec<u8>> {
    let payload = String::from_utf8(frame.to_vec())
        .map_err(|_| Error::Codec("frame is not base64 text".to_string()))?;

    let response = http_client()?
        .post(url)
        .timeout(timeout)
        .json(&RelayPayload { payload })
        .send()
        .map_err(|err| Error::TransportUnavailable(format!("failed to reach {url}: {err}")))?;

    let status = response.status();
    if !status.is_success() {
        let message = response
            .json::<RelayError>()
            .map(|body| body.message)
            .unwrap_or_else(|_| status.to_string());
        return Err(match status.as_u16() {
            502..=504 => Error::TransportUnavailable(message),
            400 => Error::Remote {
                kind: ErrorKind::MalformedRequest,
                message,
            },
            _ => Error::Remote {
                kind: ErrorKind::Internal,
                message,
            },
        });
    }

    let body: RelayPayload = response
        .json()
        .map_err(|err| Error::Codec(format!("invalid relay response: {err}")))?;
    Ok(body.payload.into_bytes())
}
