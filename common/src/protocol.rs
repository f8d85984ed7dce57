// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Length-prefixed framing for socket transports (vsock and TCP).
//!
//! ```text
//! +------------------+-------------------------+
//! | Length (8 bytes) | Frame (N bytes)         |
//! | little-endian    | base64 of CBOR envelope |
//! +------------------+-------------------------+
//! ```
//!
//! Frames larger than [`MAX_MESSAGE_SIZE`] are rejected before any payload
//! buffer is allocated.

use std::io::{self, Read, Write};
use std::mem::size_of;

use byteorder::{ByteOrder, LittleEndian};

use crate::constants::MAX_MESSAGE_SIZE;
use crate::errors::{Error, Result};

#[tracing::instrument(skip(stream, frame), fields(len = frame.len()))]
pub fn send_message<W: Write>(stream: &mut W, frame: &[u8]) -> Result<()> {
    let payload_len: u64 = frame
        .len()
        .try_into()
        .map_err(|err| Error::Codec(format!("failed to compute message length: {err:?}")))?;
    if payload_len > MAX_MESSAGE_SIZE {
        return Err(Error::Codec(format!(
            "message size {payload_len} exceeds maximum allowed size {MAX_MESSAGE_SIZE}"
        )));
    }

    let mut header_buf = [0; size_of::<u64>()];
    LittleEndian::write_u64(&mut header_buf, payload_len);
    stream.write_all(&header_buf)?;
    stream.write_all(frame)?;
    stream.flush()?;

    Ok(())
}

/// Reads one frame. A peer that hangs up mid-frame yields
/// `ConnectionAborted`.
#[tracing::instrument(skip(stream))]
pub fn recv_message<R: Read>(stream: &mut R) -> Result<Vec<u8>> {
    let mut size_buf = [0; size_of::<u64>()];
    stream.read_exact(&mut size_buf).map_err(aborted)?;

    let size = LittleEndian::read_u64(&size_buf);
    if size > MAX_MESSAGE_SIZE {
        return Err(Error::Codec(format!(
            "message size {size} exceeds maximum allowed size {MAX_MESSAGE_SIZE}"
        )));
    }

    let len = usize::try_from(size)
        .map_err(|_| Error::Codec(format!("message size {size} does not fit in memory")))?;
    let mut payload_buffer = vec![0; len];
    stream.read_exact(&mut payload_buffer).map_err(aborted)?;

    Ok(payload_buffer)
}

fn aborted(err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::UnexpectedEof => Error::Io(io::Error::new(
            io::ErrorKind::ConnectionAborted,
            "peer closed the connection",
        )),
        _ => Error::Io(err),
    }
}
