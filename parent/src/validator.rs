// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Evidence validation pipeline.
//!
//! ```text
//! framed bytes -> protocol -> cose (payload bstr) -> evidence (PCR table) -> ValidatedEvidence
//! ```
//!
//! Each stage short-circuits with its own [`EvidenceError`] variant, so
//! [`EvidenceError::stage`] tells the caller where a document was rejected.
//! Every call decodes from scratch; nothing is cached between documents.
//!
//! [`validate_evidence`] decodes only. [`validate_signed_evidence`] also runs
//! the signature stage from [`crate::signature`].

use std::collections::BTreeMap;
use std::io::Read;

use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};

use crate::constants::ZERO_PCR;
use crate::cose::decode_envelope;
use crate::digest::extend_from_zero;
use crate::errors::EvidenceError;
use crate::evidence::{EvidenceMetadata, PcrTable, SkippedEntry, decode_evidence};
use crate::protocol::recv_message_bounded;
use crate::signature::verify_document;

/// PCR index (decimal) to lowercase hex digest.
pub type RenderedPcrTable = BTreeMap<String, String>;

/// Outcome of comparing an identity digest against one PCR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum IdentityMatch {
    Match,
    Mismatch { actual: String },
    Missing,
}

/// A decoded attestation document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedEvidence {
    /// Every accepted entry, including all-zero registers.
    pub pcrs: PcrTable,
    pub rendered: RenderedPcrTable,
    pub skipped: Vec<SkippedEntry>,
    pub metadata: EvidenceMetadata,
    /// Set only once the COSE signature and certificate chain have verified.
    pub signature_verified: bool,
}

impl ValidatedEvidence {
    /// Rendered table without the all-zero registers. For display only.
    pub fn non_zero_pcrs(&self) -> RenderedPcrTable {
        self.pcrs
            .iter()
            .filter(|(_, digest)| digest.as_slice() != ZERO_PCR.as_slice())
            .map(|(index, digest)| (index.to_string(), HEXLOWER.encode(digest)))
            .collect()
    }

    /// Compares `SHA384(0^48 || identity)` against PCR `index` of the unfiltered table.
    pub fn identity_match(&self, index: i64, identity: &str) -> IdentityMatch {
        let expected = extend_from_zero(identity.as_bytes());
        match self.pcrs.get(&index) {
            Some(actual) if actual.as_slice() == expected.as_slice() => IdentityMatch::Match,
            Some(actual) => IdentityMatch::Mismatch {
                actual: HEXLOWER.encode(actual),
            },
            None => IdentityMatch::Missing,
        }
    }
}

pub fn render_pcrs(pcrs: &PcrTable) -> RenderedPcrTable {
    pcrs.iter()
        .map(|(index, digest)| (index.to_string(), HEXLOWER.encode(digest)))
        .collect()
}

fn decode_document(document: &[u8]) -> Result<ValidatedEvidence, EvidenceError> {
    let payload = decode_envelope(document)?;
    let decoded = decode_evidence(&payload)?;

    for (index, digest) in &decoded.pcrs {
        if digest.len() != ZERO_PCR.len() {
            tracing::warn!(
                "[parent] PCR{} has unexpected length {} (expected {})",
                index,
                digest.len(),
                ZERO_PCR.len()
            );
        }
    }

    Ok(ValidatedEvidence {
        rendered: render_pcrs(&decoded.pcrs),
        pcrs: decoded.pcrs,
        skipped: decoded.skipped,
        metadata: decoded.metadata,
        signature_verified: false,
    })
}

/// Decodes an unframed COSE_Sign1 attestation document.
///
/// The signature and certificate chain are **not** verified.
pub fn validate_evidence(document: &[u8]) -> Result<ValidatedEvidence, EvidenceError> {
    let evidence = decode_document(document)?;

    tracing::warn!("[parent] attestation signature and certificate chain NOT verified");

    Ok(evidence)
}

/// Decodes an unframed COSE_Sign1 attestation document and verifies its
/// signature and certificate chain against the AWS Nitro Enclaves root.
pub fn validate_signed_evidence(document: &[u8]) -> Result<ValidatedEvidence, EvidenceError> {
    let mut evidence = decode_document(document)?;

    verify_document(document, &evidence.metadata)?;
    evidence.signature_verified = true;

    tracing::info!("[parent] attestation signature and certificate chain verified");

    Ok(evidence)
}

/// Reads one framed document from `stream` and validates it, verifying the
/// signature when `verify_signature` is set.
#[tracing::instrument(skip(stream))]
pub fn receive_evidence<R: Read>(
    stream: &mut R,
    max_size: u32,
    verify_signature: bool,
) -> Result<ValidatedEvidence, EvidenceError> {
    let document = recv_message_bounded(stream, max_size)?;

    tracing::info!("[parent] received attestation document ({} bytes)", document.len());

    if verify_signature {
        validate_signed_evidence(&document)
    } else {
        validate_evidence(&document)
    }
}
