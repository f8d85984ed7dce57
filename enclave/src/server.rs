// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Accept loop and per-connection request handling.
//!
//! Every connection carries exactly one framed request and one framed
//! response. A failing connection is answered with an error envelope when
//! possible and never stops the listener. The configured timeout bounds
//! the whole exchange, not each read, so a peer trickling bytes cannot hold
//! a sequential listener past it.

use std::io::{self, Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use ciborium::Value as CborValue;
use enclave_common::Error;
use enclave_common::channel::{SessionKey, unseal};
use enclave_common::codec::{Action, ErrorResponse, Request, Response, decode, encode};
use enclave_common::constants::UNKNOWN_ACTION_RESPONSE;
use enclave_common::protocol::{recv_message, send_message};
use tracing::{debug, error, info, warn};
use vsock::{VMADDR_CID_ANY, VsockAddr, VsockListener, VsockStream};

use crate::constants::DEFAULT_READ_TIMEOUT;
use crate::errors::ServerError;
use crate::handlers::RequestHandler;
use crate::identity::IdentityProvider;

/// A stream the server can bound in time.
pub trait Connection: Read + Write + Send + 'static {
    fn set_timeouts(&self, timeout: Duration) -> io::Result<()>;
}

impl Connection for std::net::TcpStream {
    fn set_timeouts(&self, timeout: Duration) -> io::Result<()> {
        self.set_read_timeout(Some(timeout))?;
        self.set_write_timeout(Some(timeout))
    }
}

impl Connection for VsockStream {
    fn set_timeouts(&self, timeout: Duration) -> io::Result<()> {
        self.set_read_timeout(Some(timeout))?;
        self.set_write_timeout(Some(timeout))
    }
}

/// Wraps a connection so every read and write shares one deadline.
struct Deadline<S> {
    stream: S,
    expires: Instant,
}

impl<S: Connection> Deadline<S> {
    fn new(stream: S, timeout: Duration) -> Self {
        Self {
            stream,
            expires: Instant::now() + timeout,
        }
    }

    fn arm(&self) -> io::Result<()> {
        let remaining = self.expires.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "connection deadline exceeded",
            ));
        }
        self.stream.set_timeouts(remaining)
    }
}

impl<S: Connection> Read for Deadline<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.arm()?;
        self.stream.read(buf)
    }
}

impl<S: Connection> Write for Deadline<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.arm()?;
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

pub struct Server {
    provider: IdentityProvider,
    handler: Box<dyn RequestHandler>,
    export_private_key: bool,
    timeout: Duration,
    concurrent: bool,
}

impl Server {
    pub fn new(provider: IdentityProvider, handler: Box<dyn RequestHandler>) -> Self {
        Self {
            provider,
            handler,
            export_private_key: false,
            timeout: DEFAULT_READ_TIMEOUT,
            concurrent: false,
        }
    }

    pub fn with_export_private_key(mut self, export_private_key: bool) -> Self {
        self.export_private_key = export_private_key;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Serve each connection on its own thread.
    pub fn with_concurrency(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    pub fn provider(&self) -> &IdentityProvider {
        &self.provider
    }

    /// Answers one decoded frame. Failures become an error envelope.
    pub fn respond(&self, frame: &[u8]) -> Response {
        match self.process(frame) {
            Ok(response) => response,
            Err(err) => {
                error!("[enclave error] {err}");
                Response::Error(ErrorResponse::from(&err))
            }
        }
    }

    fn process(&self, frame: &[u8]) -> Result<Response, ServerError> {
        let request: Request = decode(frame)?;
        debug!("[enclave] received {} request", request.action);

        if request.action == Action::GetAttestation {
            let attestation = self.provider.get_attestation(self.export_private_key)?;
            return Ok(Response::Attestation(attestation));
        }

        let Some(sealed) = request.sealed_parameter()? else {
            return Err(match request.action {
                Action::Unknown(action) => Error::UnknownAction(action).into(),
                action => ServerError::invalid(action.as_str(), "missing sealed parameter"),
            });
        };

        let (message, session_key): (CborValue, SessionKey) = unseal(&self.provider, &sealed)?;

        let reply = match &request.action {
            Action::Unknown(action) => {
                warn!("[enclave] unknown action {action:?}");
                CborValue::Text(UNKNOWN_ACTION_RESPONSE.to_string())
            }
            action => self.handler.handle(action, message)?,
        };

        // Same session key, fresh nonce.
        let sealed_reply = session_key.encrypt(&reply, self.provider.random_source())?;
        Ok(Response::Sealed(sealed_reply))
    }

    /// Reads one request from `stream` and writes one response.
    pub fn serve_connection<S: Read + Write>(&self, stream: &mut S) -> Result<(), ServerError> {
        let response = match recv_message(stream) {
            Ok(frame) => self.respond(&frame),
            Err(Error::Io(err)) if err.kind() == io::ErrorKind::ConnectionAborted => {
                return Err(Error::Io(err).into());
            }
            Err(err) => {
                error!("[enclave error] failed to receive message: {err}");
                Response::Error(ErrorResponse::from(&err))
            }
        };

        let payload = encode(&response)?;
        send_message(stream, &payload)?;
        Ok(())
    }

    fn handle_client<S: Connection>(&self, stream: S) {
        debug!("[enclave] handling client");
        let mut stream = Deadline::new(stream, self.timeout);
        match self.serve_connection(&mut stream) {
            Ok(()) => debug!("[enclave] finished client"),
            Err(err) => error!("[enclave error] {err}"),
        }
    }

    fn accept<S, I>(self: Arc<Self>, incoming: I)
    where
        S: Connection,
        I: Iterator<Item = io::Result<S>>,
    {
        for stream in incoming {
            let stream = match stream {
                Ok(stream) => stream,
                Err(err) => {
                    error!("[enclave error] failed to accept connection: {err}");
                    continue;
                }
            };

            if self.concurrent {
                let server = Arc::clone(&self);
                thread::spawn(move || server.handle_client(stream));
            } else {
                self.handle_client(stream);
            }
        }
    }

    /// Listens on the enclave's vsock port.
    pub fn run_vsock(self: Arc<Self>, port: u32) -> Result<(), ServerError> {
        let listener = VsockListener::bind(&VsockAddr::new(VMADDR_CID_ANY, port)).map_err(Error::from)?;
        info!("[enclave] listening on vsock port {port}");
        self.accept(listener.incoming());
        Ok(())
    }

    /// Serves a bound TCP listener (simulation mode).
    pub fn run_tcp(self: Arc<Self>, listener: TcpListener) -> Result<(), ServerError> {
        let address = listener.local_addr().map_err(Error::from)?;
        info!("[enclave] listening on {address}");
        self.accept(listener.incoming());
        Ok(())
    }
}
