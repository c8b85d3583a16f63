// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! # Parent Attestation
//!
//! The parent tier of a Nitro Enclaves attestation relay.
//!
//! This crate receives the enclave's attestation document over vsock, decodes
//! the COSE_Sign1 envelope and its CBOR payload, extracts the PCR table, and
//! correlates PCR4 with the parent's EC2 instance ID.
//!
//! ## Architecture
//!
//! ```text
//! Enclave (NSM) -> vsock -> protocol -> cose -> evidence -> validator -> report
//!                                                               |
//!                                       IMDS (instance ID) -> digest
//! ```
//!
//! ## Modules
//!
//! - [`application`]: enclave launch, vsock accept loop and report generation
//! - [`configuration`]: CLI argument parsing with clap
//! - [`constants`]: Configuration constants for the application
//! - [`cose`]: COSE_Sign1 envelope decoding
//! - [`digest`]: extend-style SHA-384 digest for PCR correlation
//! - [`enclaves`]: Nitro Enclave build/launch/terminate via `docker` and `nitro-cli`
//! - [`errors`]: pipeline and application error types
//! - [`evidence`]: attestation payload decoding and PCR extraction
//! - [`imds`]: EC2 instance identity from the Instance Metadata Service
//! - [`models`]: nitro-cli, IMDS and report types
//! - [`nitro_root_cert`]: pinned AWS Nitro Enclaves root certificate
//! - [`protocol`]: vsock message framing protocol (length-prefixed)
//! - [`signature`]: opt-in COSE signature and certificate chain verification
//! - [`validator`]: the decode pipeline and PCR rendering
//!
//! ## Usage
//!
//! ```bash
//! parent-attestation --port 5000 --enclave-cid 16 --eif-path enclave-attestation.eif
//! ```
//!
//! ## Security Considerations
//!
//! - **The COSE signature and certificate chain are not verified unless
//!   `--verify-signature` is set.** Without it the PCR table is
//!   unauthenticated and must not gate access to secrets.
//! - The enclave must connect within `--accept-timeout-secs` of launch
//! - Declared frame lengths above `--max-message-size` are rejected before allocation
//! - Every read is bounded by `--read-timeout-secs`
//! - Malformed PCR entries are skipped and reported, never trusted

pub mod application;
pub mod configuration;
pub mod constants;
pub mod cose;
pub mod digest;
pub mod enclaves;
pub mod errors;
pub mod evidence;
pub mod imds;
pub mod models;
pub mod nitro_root_cert;
pub mod protocol;
pub mod signature;
pub mod validator;
