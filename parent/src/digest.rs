// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Extend-style SHA-384 digest.
//!
//! A PCR starts at 48 zero bytes and is extended with
//! `PCR = SHA384(PCR || data)`. Extending a fresh register once with `data`
//! therefore yields `SHA384(0^48 || data)`, which is what Nitro records in
//! PCR4 for the parent instance ID. Comparing this digest against a table
//! entry correlates an externally known identity with the enclave's evidence.

use data_encoding::HEXLOWER;
use sha2::{Digest, Sha384};

use crate::constants::{PCR_DIGEST_LENGTH, ZERO_PCR};

/// Returns `SHA384(0^48 || input)`.
pub fn extend_from_zero(input: &[u8]) -> [u8; PCR_DIGEST_LENGTH] {
    let mut hasher = Sha384::new();
    hasher.update(ZERO_PCR);
    hasher.update(input);
    let mut digest = [0; PCR_DIGEST_LENGTH];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

/// Lowercase hex of [`extend_from_zero`] over the UTF-8 bytes of `input`.
///
/// Always 96 characters long.
pub fn measurement_digest(input: &str) -> String {
    HEXLOWER.encode(&extend_from_zero(input.as_bytes()))
}
