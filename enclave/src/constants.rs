// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::time::Duration;

/// CID of the parent instance as seen from inside an enclave.
pub const PARENT_CID: u32 = 3;
/// Port the parent listens on for the attestation document.
pub const PARENT_PORT: u32 = 5000;

/// Time given to the enclave (and nitro-cli's console attach) before attesting.
pub const BOOT_DELAY: Duration = Duration::from_secs(10);
pub const CONNECT_ATTEMPTS: u32 = 5;
pub const CONNECT_RETRY_INTERVAL: Duration = Duration::from_secs(2);

pub const NONCE_PREFIX: &str = "my-enclave-nonce-";
pub const USER_DATA: &[u8] = b"hello-world-enclave-data";

/// Minimum nonce length (128 bits)
pub const MIN_NONCE_LENGTH: usize = 16;
pub const MAX_NONCE_LENGTH: usize = 512;
pub const MAX_USER_DATA_LENGTH: usize = 512;
pub const MAX_PUBLIC_KEY_LENGTH: usize = 1024;
