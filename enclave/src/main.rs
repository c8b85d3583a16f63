// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::thread;

use anyhow::{anyhow, Result};
use enclave_attestation::{
    constants::{
        BOOT_DELAY, CONNECT_ATTEMPTS, CONNECT_RETRY_INTERVAL, PARENT_CID, PARENT_PORT, USER_DATA,
    },
    nsm::{get_attestation_document, time_nonce},
    protocol::send_message,
};
use vsock::{VsockAddr, VsockStream};

// Avoid musl's default allocator due to terrible performance
#[cfg(target_env = "musl")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn connect_parent() -> Result<VsockStream> {
    let addr = VsockAddr::new(PARENT_CID, PARENT_PORT);
    let mut attempt = 1;
    loop {
        match VsockStream::connect(&addr) {
            Ok(stream) => return Ok(stream),
            Err(err) if attempt < CONNECT_ATTEMPTS => {
                println!(
                    "[enclave] connect to CID {} port {} failed (attempt {}): {:?}",
                    PARENT_CID, PARENT_PORT, attempt, err
                );
                attempt += 1;
                thread::sleep(CONNECT_RETRY_INTERVAL);
            }
            Err(err) => {
                return Err(anyhow!(
                    "failed to dial vsock to parent CID {PARENT_CID} port {PARENT_PORT}: {err:?}"
                ))
            }
        }
    }
}

fn run() -> Result<()> {
    let nonce = time_nonce();
    let document = get_attestation_document(Some(USER_DATA), Some(&nonce), None)
        .map_err(|err| anyhow!("failed to get attestation document: {err:?}"))?;

    println!("[enclave] obtained attestation document ({} bytes)", document.len());

    let mut stream = connect_parent()?;

    println!("[enclave] connected to parent (CID {PARENT_CID}, port {PARENT_PORT})");

    send_message(&mut stream, &document)?;

    println!("[enclave] attestation document sent");

    Ok(())
}

fn main() -> Result<()> {
    println!("[enclave] init");

    // give nitro-cli time to attach the console before anything is logged
    thread::sleep(BOOT_DELAY);

    if let Err(err) = run() {
        println!("[enclave error] {err:?}");
        return Err(err);
    }

    println!("[enclave] finished");

    Ok(())
}
