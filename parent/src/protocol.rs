// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! vsock message protocol for enclave-to-parent evidence delivery.
//!
//! Each message consists of:
//!
//! 1. A 4-byte big-endian length header
//! 2. The message payload (the raw COSE-encoded attestation document)
//!
//! # Wire Format
//!
//! ```text
//! +------------------+-------------------+
//! | Length (4 bytes) | Payload (N bytes) |
//! | big-endian       | COSE_Sign1 (CBOR) |
//! +------------------+-------------------+
//! ```
//!
//! The format has no magic number, version byte or checksum.
//!
//! # Size Limits
//!
//! Declared lengths above the configured maximum (default [`MAX_MESSAGE_SIZE`],
//! 10 MB) are rejected before any receive buffer is allocated.
//!
//! # Timeouts and cancellation
//!
//! Reads block until the bytes arrive or the stream ends. Callers bound the
//! wait with a socket read timeout, which surfaces as
//! [`EvidenceError::Timeout`]. Once the header has been consumed the stream
//! cannot be rewound, so a connection that failed mid-frame must be dropped
//! rather than read again.

use std::io::{ErrorKind, Read, Write};

use byteorder::{BigEndian, ByteOrder};

use crate::constants::{LENGTH_PREFIX_SIZE, MAX_MESSAGE_SIZE};
use crate::errors::EvidenceError;

/// Sends a single length-prefixed message.
///
/// # Errors
///
/// Returns [`EvidenceError::Io`] if the payload length does not fit in the
/// 4-byte header or if a write fails.
#[tracing::instrument(skip(stream, msg), fields(len = msg.len()))]
pub fn send_message<W: Write>(stream: &mut W, msg: &[u8]) -> Result<(), EvidenceError> {
    let payload_len: u32 = msg
        .len()
        .try_into()
        .map_err(|_| {
            EvidenceError::Io(format!(
                "message length {} does not fit the length header",
                msg.len()
            ))
        })?;
    let mut header_buf = [0; LENGTH_PREFIX_SIZE];
    BigEndian::write_u32(&mut header_buf, payload_len);
    stream
        .write_all(&header_buf)
        .map_err(|err| EvidenceError::Io(format!("failed to write message header: {err:?}")))?;

    stream
        .write_all(msg)
        .map_err(|err| EvidenceError::Io(format!("failed to write message body: {err:?}")))?;
    stream
        .flush()
        .map_err(|err| EvidenceError::Io(format!("failed to flush message: {err:?}")))?;

    Ok(())
}

/// Receives a single message using the default [`MAX_MESSAGE_SIZE`] bound.
pub fn recv_message<R: Read>(stream: &mut R) -> Result<Vec<u8>, EvidenceError> {
    recv_message_bounded(stream, MAX_MESSAGE_SIZE)
}

/// Receives a single message, rejecting declared lengths above `max_size`.
///
/// # Errors
///
/// - [`EvidenceError::TruncatedMessage`] if the stream ends inside the header or body
/// - [`EvidenceError::MessageTooLarge`] if the header declares more than `max_size` bytes
/// - [`EvidenceError::Timeout`] if the socket read timeout elapses
/// - [`EvidenceError::Io`] for any other read failure
#[tracing::instrument(skip(stream))]
pub fn recv_message_bounded<R: Read>(
    stream: &mut R,
    max_size: u32,
) -> Result<Vec<u8>, EvidenceError> {
    let mut size_buf = [0; LENGTH_PREFIX_SIZE];
    stream
        .read_exact(&mut size_buf)
        .map_err(|err| read_error("header", err))?;

    let size = BigEndian::read_u32(&size_buf);
    if size > max_size {
        return Err(EvidenceError::MessageTooLarge {
            size,
            max: max_size,
        });
    }

    tracing::debug!("[parent] expecting message of {} bytes", size);

    let mut payload_buffer = vec![0; size as usize];
    stream
        .read_exact(&mut payload_buffer)
        .map_err(|err| read_error("body", err))?;

    Ok(payload_buffer)
}

fn read_error(part: &str, err: std::io::Error) -> EvidenceError {
    match err.kind() {
        ErrorKind::UnexpectedEof => {
            EvidenceError::TruncatedMessage(format!("stream closed while reading message {part}"))
        }
        ErrorKind::WouldBlock | ErrorKind::TimedOut => EvidenceError::Timeout,
        _ => EvidenceError::Io(format!("failed to read message {part}: {err:?}")),
    }
}
