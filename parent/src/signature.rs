// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Opt-in COSE_Sign1 signature and certificate chain verification.
//!
//! The NSM signs the attestation payload with ECDSA P-384 (COSE `ES384`).
//! The signing certificate travels in the payload's `certificate` field and
//! chains through `cabundle`, which lists the root first, to the AWS Nitro
//! Enclaves root pinned in [`crate::nitro_root_cert`].
//!
//! Verification checks, in order:
//!
//! 1. The protected header names `ES384`
//! 2. `cabundle[0]` is the pinned root
//! 3. Each certificate is within its validity period and signed by the one
//!    before it, ending with the signing certificate
//! 4. The COSE signature over the `Sig_structure` verifies with the signing
//!    certificate's key
//!
//! Freshness of the document `timestamp` and nonce matching are left to the
//! caller.

use std::time::{SystemTime, UNIX_EPOCH};

use ciborium::Value as CborValue;
use p384::ecdsa::{Signature, VerifyingKey, signature::Verifier};
use x509_cert::Certificate;
use x509_cert::der::{Decode, Encode};

use crate::constants::{COSE_ALG_ES384, COSE_ALG_LABEL};
use crate::cose::{CoseSign1, decode_sign1, decode_single};
use crate::errors::EvidenceError;
use crate::evidence::EvidenceMetadata;
use crate::nitro_root_cert;

fn invalid(msg: impl Into<String>) -> EvidenceError {
    EvidenceError::SignatureInvalid(msg.into())
}

/// Verifies `document` against the pinned root at the current time.
///
/// `metadata` must come from decoding the same document.
pub fn verify_document(
    document: &[u8],
    metadata: &EvidenceMetadata,
) -> Result<(), EvidenceError> {
    let now_secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| invalid(format!("system time error: {e}")))?
        .as_secs();
    verify_document_at(document, metadata, now_secs)
}

/// Verifies `document` with certificate validity evaluated at `now_secs`.
pub fn verify_document_at(
    document: &[u8],
    metadata: &EvidenceMetadata,
    now_secs: u64,
) -> Result<(), EvidenceError> {
    let sign1 = decode_sign1(document)?;
    check_algorithm(&sign1.protected)?;

    let leaf_der = metadata
        .certificate
        .as_deref()
        .ok_or_else(|| invalid("signing certificate missing"))?;
    let leaf = parse_certificate(leaf_der, "signing certificate")?;

    verify_chain(&leaf, &metadata.cabundle, now_secs)?;
    verify_sign1(&sign1, &public_key(&leaf, "signing certificate")?)
}

fn check_algorithm(protected: &[u8]) -> Result<(), EvidenceError> {
    let header = decode_single(protected, "protected header")
        .map_err(|e| invalid(format!("protected header: {e}")))?;
    let CborValue::Map(entries) = header else {
        return Err(invalid("protected header is not a CBOR map"));
    };

    let alg = entries.iter().find_map(|(label, value)| match (label, value) {
        (CborValue::Integer(l), CborValue::Integer(v))
            if i128::from(*l) == i128::from(COSE_ALG_LABEL) =>
        {
            Some(i128::from(*v))
        }
        _ => None,
    });

    match alg {
        Some(alg) if alg == i128::from(COSE_ALG_ES384) => Ok(()),
        Some(alg) => Err(invalid(format!("unsupported COSE algorithm {alg}"))),
        None => Err(invalid("protected header has no algorithm")),
    }
}

fn parse_certificate(der: &[u8], name: &str) -> Result<Certificate, EvidenceError> {
    Certificate::from_der(der).map_err(|e| invalid(format!("failed to parse {name}: {e}")))
}

fn public_key(cert: &Certificate, name: &str) -> Result<VerifyingKey, EvidenceError> {
    let key_bytes = cert
        .tbs_certificate
        .subject_public_key_info
        .subject_public_key
        .as_bytes()
        .ok_or_else(|| invalid(format!("{name} has no public key bytes")))?;

    VerifyingKey::from_sec1_bytes(key_bytes)
        .map_err(|e| invalid(format!("{name} key is not P-384: {e}")))
}

/// Checks that `cabundle` starts at the pinned root and chains to `leaf`.
pub(crate) fn verify_chain(
    leaf: &Certificate,
    cabundle: &[Vec<u8>],
    now_secs: u64,
) -> Result<(), EvidenceError> {
    let root_der = nitro_root_cert::root_cert_der()?;
    let Some((bundle_root, intermediates)) = cabundle.split_first() else {
        return Err(invalid("cabundle is empty"));
    };
    if *bundle_root != root_der {
        return Err(invalid("cabundle does not start with the AWS Nitro Enclaves root"));
    }

    let mut issuer = parse_certificate(&root_der, "root certificate")?;
    check_validity(&issuer, now_secs, "root certificate")?;

    for (i, der) in intermediates.iter().enumerate() {
        let name = format!("cabundle[{}]", i + 1);
        let cert = parse_certificate(der, &name)?;
        check_validity(&cert, now_secs, &name)?;
        check_issued_by(&cert, &issuer, &name)?;
        issuer = cert;
    }

    check_validity(leaf, now_secs, "signing certificate")?;
    check_issued_by(leaf, &issuer, "signing certificate")
}

fn check_validity(cert: &Certificate, now_secs: u64, name: &str) -> Result<(), EvidenceError> {
    let validity = &cert.tbs_certificate.validity;

    let not_before = match &validity.not_before {
        x509_cert::time::Time::UtcTime(t) => t.to_unix_duration().as_secs(),
        x509_cert::time::Time::GeneralTime(t) => t.to_unix_duration().as_secs(),
    };
    let not_after = match &validity.not_after {
        x509_cert::time::Time::UtcTime(t) => t.to_unix_duration().as_secs(),
        x509_cert::time::Time::GeneralTime(t) => t.to_unix_duration().as_secs(),
    };

    if now_secs < not_before || now_secs > not_after {
        return Err(invalid(format!(
            "{name} not valid at {now_secs} (valid {not_before}..={not_after})"
        )));
    }
    Ok(())
}

fn check_issued_by(
    subject: &Certificate,
    issuer: &Certificate,
    name: &str,
) -> Result<(), EvidenceError> {
    let key = public_key(issuer, &format!("issuer of {name}"))?;

    let signature_bytes = subject
        .signature
        .as_bytes()
        .ok_or_else(|| invalid(format!("{name} has no signature bytes")))?;
    let signature = Signature::from_der(signature_bytes)
        .map_err(|e| invalid(format!("{name} signature is malformed: {e}")))?;

    let tbs_der = subject
        .tbs_certificate
        .to_der()
        .map_err(|e| invalid(format!("failed to encode {name}: {e}")))?;

    key.verify(&tbs_der, &signature)
        .map_err(|_| invalid(format!("{name} is not signed by its issuer")))
}

/// Encodes the RFC 8152 `Sig_structure` for a COSE_Sign1 with no external AAD.
pub fn sig_structure(sign1: &CoseSign1) -> Result<Vec<u8>, EvidenceError> {
    let structure = CborValue::Array(vec![
        CborValue::Text("Signature1".to_string()),
        CborValue::Bytes(sign1.protected.clone()),
        CborValue::Bytes(vec![]),
        CborValue::Bytes(sign1.payload.clone()),
    ]);

    let mut buf = Vec::new();
    ciborium::into_writer(&structure, &mut buf)
        .map_err(|e| invalid(format!("failed to encode Sig_structure: {e}")))?;
    Ok(buf)
}

/// Checks the raw `r || s` COSE signature against `key`.
pub fn verify_sign1(sign1: &CoseSign1, key: &VerifyingKey) -> Result<(), EvidenceError> {
    let signature = Signature::from_slice(&sign1.signature)
        .map_err(|e| invalid(format!("malformed ES384 signature: {e}")))?;

    key.verify(&sig_structure(sign1)?, &signature)
        .map_err(|_| invalid("COSE signature does not match the signing certificate"))
}
