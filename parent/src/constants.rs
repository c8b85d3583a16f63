// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::time::Duration;

/// vsock port the enclave dials to deliver its attestation document.
pub const HOST_PORT: u32 = 5000;
/// CID assigned to the enclave on launch. Must not collide with another enclave.
pub const ENCLAVE_CID: u32 = 16;
pub const RUN_ENCLAVE_EIF_PATH: &str = "enclave-attestation.eif";
pub const RUN_ENCLAVE_CPU_COUNT: u32 = 2;
pub const RUN_ENCLAVE_MEMORY_SIZE: u32 = 64;
pub const DOCKER_IMAGE: &str = "enclave-attestation";
pub const DOCKER_CONTEXT_DIR: &str = ".";
pub const DOCKERFILE: &str = "enclave/Dockerfile";
pub const TARGET_ARCH: &str = "amd64";

/// Upper bound on a declared frame length, checked before the receive buffer is allocated.
pub const MAX_MESSAGE_SIZE: u32 = 10 * 1024 * 1024; // 10 MB
/// Size of the big-endian length prefix in front of every frame.
pub const LENGTH_PREFIX_SIZE: usize = 4;

pub const READ_TIMEOUT: Duration = Duration::from_secs(30);
/// How long a launched enclave has to dial the parent.
pub const ACCEPT_TIMEOUT: Duration = Duration::from_secs(120);
pub const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const IMDS_TIMEOUT: Duration = Duration::from_secs(5);
pub const IMDS_TOKEN_TTL: Duration = Duration::from_secs(300); // 5 minutes
pub const IMDS_ENDPOINT: &str = "http://169.254.169.254:80";
pub const IMDS_IDENTITY_DOCUMENT_PATH: &str = "/latest/dynamic/instance-identity/document";

/// SHA-384 digest length, the width of every Nitro PCR.
pub const PCR_DIGEST_LENGTH: usize = 48;
/// The "unset" register value.
pub const ZERO_PCR: [u8; PCR_DIGEST_LENGTH] = [0; PCR_DIGEST_LENGTH];
/// Nitro extends the parent instance ID into PCR4.
pub const INSTANCE_ID_PCR: i64 = 4;

/// CBOR tag of a COSE_Sign1 message (RFC 8152). The NSM emits it untagged.
pub const COSE_SIGN1_TAG: u64 = 18;
pub const COSE_MIN_ELEMENTS: usize = 4;
pub const COSE_PROTECTED_INDEX: usize = 0;
pub const COSE_PAYLOAD_INDEX: usize = 2;
pub const COSE_SIGNATURE_INDEX: usize = 3;
/// COSE header label of the signing algorithm.
pub const COSE_ALG_LABEL: i64 = 1;
/// ECDSA w/ SHA-384, the only algorithm the NSM signs with.
pub const COSE_ALG_ES384: i64 = -35;
pub const PCRS_KEY: &str = "pcrs";
