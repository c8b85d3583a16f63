// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::{io::Write, mem::size_of};

use anyhow::{anyhow, Result};
use byteorder::{BigEndian, ByteOrder};

/// Writes `msg` preceded by its length as a 4-byte big-endian header.
pub fn send_message<W: Write>(stream: &mut W, msg: &[u8]) -> Result<()> {
    // write message length
    let payload_len: u32 = msg
        .len()
        .try_into()
        .map_err(|err| anyhow!("failed to compute message length: {:?}", err))?;
    let mut header_buf = [0; size_of::<u32>()];
    BigEndian::write_u32(&mut header_buf, payload_len);
    stream
        .write_all(&header_buf)
        .map_err(|err| anyhow!("failed to write message header: {:?}", err))?;

    // write message body
    stream
        .write_all(msg)
        .map_err(|err| anyhow!("failed to write message body: {:?}", err))?;
    stream
        .flush()
        .map_err(|err| anyhow!("failed to flush message: {:?}", err))?;

    Ok(())
}
