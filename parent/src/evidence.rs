// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Attestation payload decoding and PCR table extraction.
//!
//! The payload is a CBOR map with text keys. Only `pcrs` is mandatory; it must
//! map PCR indexes to digests. Each table entry is coerced independently:
//!
//! - keys: any non-negative CBOR integer up to `i64::MAX` (see [`coerce_pcr_index`])
//! - values: a byte string, or an array of integers in `0..=255`
//!   (see [`coerce_pcr_value`])
//!
//! An entry that fails coercion is dropped and recorded as a [`SkippedEntry`];
//! the rest of the table still decodes.
//!
//! The remaining document fields (`module_id`, `timestamp`, `nonce`, ...) are
//! collected into [`EvidenceMetadata`] on a best-effort basis and never fail
//! the decode. If a text key appears more than once, the last value wins.
//!
//! The payload must be exactly one CBOR map; bytes after it are rejected.

use std::collections::BTreeMap;

use ciborium::Value as CborValue;
use serde::{Deserialize, Serialize};

use crate::constants::PCRS_KEY;
use crate::cose::decode_single;
use crate::errors::EvidenceError;

/// PCR index to raw digest bytes.
pub type PcrTable = BTreeMap<i64, Vec<u8>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// The key was not an integer.
    KeyType(String),
    /// The key was a negative integer or above `i64::MAX`.
    KeyOutOfRange(String),
    /// The value was neither a byte string nor an array of bytes.
    ValueType(String),
}

/// A PCR table entry dropped during decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    /// Debug rendering of the offending key.
    pub key: String,
    pub reason: SkipReason,
}

/// Optional fields of the attestation document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvidenceMetadata {
    pub module_id: Option<String>,
    pub timestamp: Option<u64>,
    pub digest: Option<String>,
    pub nonce: Option<Vec<u8>>,
    pub user_data: Option<Vec<u8>>,
    pub public_key: Option<Vec<u8>>,
    /// DER signing certificate of the enclave.
    pub certificate: Option<Vec<u8>>,
    /// DER CA bundle, root first.
    pub cabundle: Vec<Vec<u8>>,
}

/// Result of decoding one attestation payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEvidence {
    pub pcrs: PcrTable,
    pub skipped: Vec<SkippedEntry>,
    pub metadata: EvidenceMetadata,
}

/// Short name of a CBOR value's major type, for diagnostics.
pub fn cbor_kind(value: &CborValue) -> &'static str {
    match value {
        CborValue::Integer(_) => "integer",
        CborValue::Bytes(_) => "bytes",
        CborValue::Float(_) => "float",
        CborValue::Text(_) => "text",
        CborValue::Bool(_) => "bool",
        CborValue::Null => "null",
        CborValue::Tag(_, _) => "tag",
        CborValue::Array(_) => "array",
        CborValue::Map(_) => "map",
        _ => "unknown",
    }
}

/// Coerces a PCR table key into an index.
///
/// PCR indexes are non-negative. Any CBOR integer in `0..=i64::MAX` is
/// accepted; negative and wider values are rejected.
pub fn coerce_pcr_index(key: &CborValue) -> Result<i64, SkipReason> {
    match key {
        CborValue::Integer(i) => {
            let wide: i128 = (*i).into();
            i64::try_from(wide)
                .ok()
                .filter(|index| *index >= 0)
                .ok_or_else(|| SkipReason::KeyOutOfRange(wide.to_string()))
        }
        other => Err(SkipReason::KeyType(cbor_kind(other).to_string())),
    }
}

/// Coerces a PCR table value into digest bytes.
///
/// A byte string is taken as-is. An array is accepted only if every element
/// is an integer in `0..=255`.
pub fn coerce_pcr_value(value: &CborValue) -> Result<Vec<u8>, SkipReason> {
    match value {
        CborValue::Bytes(bytes) => Ok(bytes.clone()),
        CborValue::Array(items) => items
            .iter()
            .map(|item| match item {
                CborValue::Integer(i) => {
                    let wide: i128 = (*i).into();
                    u8::try_from(wide).ok()
                }
                _ => None,
            })
            .collect::<Option<Vec<u8>>>()
            .ok_or_else(|| SkipReason::ValueType("array with non-byte element".to_string())),
        other => Err(SkipReason::ValueType(cbor_kind(other).to_string())),
    }
}

/// Decodes an attestation payload and extracts its PCR table.
///
/// # Errors
///
/// Returns [`EvidenceError::MalformedEvidence`] if the payload is not a single
/// CBOR map, or if `pcrs` is missing or not a map.
pub fn decode_evidence(payload: &[u8]) -> Result<DecodedEvidence, EvidenceError> {
    let value = decode_single(payload, "payload").map_err(EvidenceError::MalformedEvidence)?;

    let CborValue::Map(document) = value else {
        return Err(EvidenceError::MalformedEvidence(
            "attestation payload is not a CBOR map".to_string(),
        ));
    };

    let Some(CborValue::Map(pcr_map)) = field(&document, PCRS_KEY) else {
        return Err(EvidenceError::MalformedEvidence(
            "pcrs missing or wrong type".to_string(),
        ));
    };

    let mut pcrs = PcrTable::new();
    let mut skipped = Vec::new();
    for (key, value) in pcr_map {
        let entry = coerce_pcr_index(key)
            .and_then(|index| coerce_pcr_value(value).map(|digest| (index, digest)));
        match entry {
            Ok((index, digest)) => {
                pcrs.insert(index, digest);
            }
            Err(reason) => {
                tracing::warn!(
                    "[parent] skipping PCR entry {:?} ({}): {:?}",
                    key,
                    cbor_kind(value),
                    reason
                );
                skipped.push(SkippedEntry {
                    key: format!("{key:?}"),
                    reason,
                });
            }
        }
    }

    if !skipped.is_empty() {
        tracing::warn!("[parent] skipped {} malformed PCR entries", skipped.len());
    }

    Ok(DecodedEvidence {
        pcrs,
        skipped,
        metadata: extract_metadata(&document),
    })
}

/// Looks up a text-keyed field in a CBOR map. The last occurrence wins.
fn field<'a>(map: &'a [(CborValue, CborValue)], key: &str) -> Option<&'a CborValue> {
    map.iter().rev().find_map(|(k, v)| match k {
        CborValue::Text(name) if name == key => Some(v),
        _ => None,
    })
}

fn extract_metadata(document: &[(CborValue, CborValue)]) -> EvidenceMetadata {
    let text = |key: &str| match field(document, key) {
        Some(CborValue::Text(s)) => Some(s.clone()),
        _ => None,
    };
    let bytes = |key: &str| match field(document, key) {
        Some(CborValue::Bytes(b)) => Some(b.clone()),
        _ => None,
    };
    let timestamp = match field(document, "timestamp") {
        Some(CborValue::Integer(i)) => {
            let wide: i128 = (*i).into();
            u64::try_from(wide).ok()
        }
        _ => None,
    };

    let cabundle = match field(document, "cabundle") {
        Some(CborValue::Array(certs)) => certs
            .iter()
            .map(|cert| match cert {
                CborValue::Bytes(der) => Some(der.clone()),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    EvidenceMetadata {
        module_id: text("module_id"),
        timestamp,
        digest: text("digest"),
        nonce: bytes("nonce"),
        user_data: bytes("user_data"),
        public_key: bytes("public_key"),
        certificate: bytes("certificate"),
        cabundle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: &CborValue) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf).unwrap();
        buf
    }

    fn document(pcrs: CborValue) -> Vec<u8> {
        encode(&CborValue::Map(vec![
            (
                CborValue::Text("module_id".to_string()),
                CborValue::Text("i-0123456789abcdef0-enc0123456789abcdef".to_string()),
            ),
            (CborValue::Text(PCRS_KEY.to_string()), pcrs),
        ]))
    }

    // ==================== Key Coercion Tests ====================

    #[test]
    fn test_index_from_unsigned_integer() {
        assert_eq!(coerce_pcr_index(&CborValue::Integer(15u64.into())), Ok(15));
    }

    #[test]
    fn test_index_from_negative_integer_rejected() {
        assert_eq!(
            coerce_pcr_index(&CborValue::Integer((-1i64).into())),
            Err(SkipReason::KeyOutOfRange("-1".to_string()))
        );
        assert_eq!(coerce_pcr_index(&CborValue::Integer(0.into())), Ok(0));
    }

    #[test]
    fn test_index_at_i64_max() {
        assert_eq!(
            coerce_pcr_index(&CborValue::Integer((i64::MAX as u64).into())),
            Ok(i64::MAX)
        );
    }

    #[test]
    fn test_index_out_of_range() {
        assert_eq!(
            coerce_pcr_index(&CborValue::Integer(u64::MAX.into())),
            Err(SkipReason::KeyOutOfRange(u64::MAX.to_string()))
        );
    }

    #[test]
    fn test_index_rejects_non_integers() {
        assert_eq!(
            coerce_pcr_index(&CborValue::Float(1.5)),
            Err(SkipReason::KeyType("float".to_string()))
        );
        assert_eq!(
            coerce_pcr_index(&CborValue::Text("0".to_string())),
            Err(SkipReason::KeyType("text".to_string()))
        );
    }

    // ==================== Value Coercion Tests ====================

    #[test]
    fn test_value_from_bytes() {
        assert_eq!(
            coerce_pcr_value(&CborValue::Bytes(vec![1, 2, 3])),
            Ok(vec![1, 2, 3])
        );
    }

    #[test]
    fn test_value_from_byte_array_matches_bytes() {
        let array = CborValue::Array((0u8..48).map(|b| CborValue::Integer(b.into())).collect());
        let bytes = CborValue::Bytes((0u8..48).collect());
        assert_eq!(coerce_pcr_value(&array), coerce_pcr_value(&bytes));
    }

    #[test]
    fn test_value_array_with_wide_element_rejected() {
        let array = CborValue::Array(vec![
            CborValue::Integer(1.into()),
            CborValue::Integer(256.into()),
        ]);
        assert!(matches!(
            coerce_pcr_value(&array),
            Err(SkipReason::ValueType(_))
        ));
    }

    #[test]
    fn test_value_rejects_text() {
        assert_eq!(
            coerce_pcr_value(&CborValue::Text("00".to_string())),
            Err(SkipReason::ValueType("text".to_string()))
        );
    }

    // ==================== Document Tests ====================

    #[test]
    fn test_decodes_pcr_table_and_metadata() {
        let payload = document(CborValue::Map(vec![
            (CborValue::Integer(0.into()), CborValue::Bytes(vec![0xAB; 48])),
            (CborValue::Integer(4.into()), CborValue::Bytes(vec![0xCD; 48])),
        ]));

        let decoded = decode_evidence(&payload).unwrap();
        assert_eq!(decoded.pcrs.len(), 2);
        assert_eq!(decoded.pcrs[&0], vec![0xAB; 48]);
        assert_eq!(decoded.pcrs[&4], vec![0xCD; 48]);
        assert!(decoded.skipped.is_empty());
        assert_eq!(
            decoded.metadata.module_id.as_deref(),
            Some("i-0123456789abcdef0-enc0123456789abcdef")
        );
        assert_eq!(decoded.metadata.timestamp, None);
    }

    #[test]
    fn test_malformed_entry_is_skipped_not_fatal() {
        let payload = document(CborValue::Map(vec![
            (CborValue::Float(2.5), CborValue::Bytes(vec![0x11; 48])),
            (CborValue::Integer(1.into()), CborValue::Bytes(vec![0x22; 48])),
            (CborValue::Integer(2.into()), CborValue::Bool(true)),
        ]));

        let decoded = decode_evidence(&payload).unwrap();
        assert_eq!(decoded.pcrs.keys().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(decoded.skipped.len(), 2);
        assert_eq!(
            decoded.skipped[0].reason,
            SkipReason::KeyType("float".to_string())
        );
        assert_eq!(
            decoded.skipped[1].reason,
            SkipReason::ValueType("bool".to_string())
        );
    }

    #[test]
    fn test_missing_pcrs_is_malformed() {
        let payload = encode(&CborValue::Map(vec![(
            CborValue::Text("module_id".to_string()),
            CborValue::Text("m".to_string()),
        )]));
        assert_eq!(
            decode_evidence(&payload).unwrap_err(),
            EvidenceError::MalformedEvidence("pcrs missing or wrong type".to_string())
        );
    }

    #[test]
    fn test_pcrs_as_string_is_malformed() {
        let payload = document(CborValue::Text("not a map".to_string()));
        assert_eq!(
            decode_evidence(&payload).unwrap_err(),
            EvidenceError::MalformedEvidence("pcrs missing or wrong type".to_string())
        );
    }

    #[test]
    fn test_non_map_payload_is_malformed() {
        let payload = encode(&CborValue::Array(vec![]));
        assert!(matches!(
            decode_evidence(&payload),
            Err(EvidenceError::MalformedEvidence(_))
        ));
        assert!(matches!(
            decode_evidence(b""),
            Err(EvidenceError::MalformedEvidence(_))
        ));
    }

    #[test]
    fn test_wrong_typed_metadata_is_ignored() {
        let payload = encode(&CborValue::Map(vec![
            (
                CborValue::Text("timestamp".to_string()),
                CborValue::Text("yesterday".to_string()),
            ),
            (
                CborValue::Text("nonce".to_string()),
                CborValue::Bytes(b"my-enclave-nonce-1".to_vec()),
            ),
            (CborValue::Text(PCRS_KEY.to_string()), CborValue::Map(vec![])),
        ]));

        let decoded = decode_evidence(&payload).unwrap();
        assert!(decoded.pcrs.is_empty());
        assert_eq!(decoded.metadata.timestamp, None);
        assert_eq!(decoded.metadata.nonce.as_deref(), Some(&b"my-enclave-nonce-1"[..]));
    }

    #[test]
    fn test_negative_key_is_skipped() {
        let payload = document(CborValue::Map(vec![
            (CborValue::Integer((-1i64).into()), CborValue::Bytes(vec![0x33; 48])),
            (CborValue::Integer(3.into()), CborValue::Bytes(vec![0x44; 48])),
        ]));

        let decoded = decode_evidence(&payload).unwrap();
        assert_eq!(decoded.pcrs.keys().copied().collect::<Vec<_>>(), vec![3]);
        assert_eq!(
            decoded.skipped,
            vec![SkippedEntry {
                key: format!("{:?}", CborValue::Integer((-1i64).into())),
                reason: SkipReason::KeyOutOfRange("-1".to_string()),
            }]
        );
    }

    #[test]
    fn test_trailing_bytes_after_payload_rejected() {
        let mut payload = document(CborValue::Map(vec![]));
        payload.push(0x00);
        assert_eq!(
            decode_evidence(&payload).unwrap_err(),
            EvidenceError::MalformedEvidence("1 trailing bytes after payload".to_string())
        );
    }

    #[test]
    fn test_duplicate_pcrs_key_last_wins() {
        let payload = encode(&CborValue::Map(vec![
            (
                CborValue::Text(PCRS_KEY.to_string()),
                CborValue::Map(vec![(CborValue::Integer(0.into()), CborValue::Bytes(vec![1]))]),
            ),
            (
                CborValue::Text(PCRS_KEY.to_string()),
                CborValue::Map(vec![(CborValue::Integer(7.into()), CborValue::Bytes(vec![2]))]),
            ),
        ]));

        let decoded = decode_evidence(&payload).unwrap();
        assert_eq!(decoded.pcrs, PcrTable::from([(7, vec![2])]));
    }

    #[test]
    fn test_certificate_and_cabundle_extracted() {
        let payload = encode(&CborValue::Map(vec![
            (CborValue::Text(PCRS_KEY.to_string()), CborValue::Map(vec![])),
            (
                CborValue::Text("certificate".to_string()),
                CborValue::Bytes(vec![0x30, 0x01]),
            ),
            (
                CborValue::Text("cabundle".to_string()),
                CborValue::Array(vec![CborValue::Bytes(vec![0x30]), CborValue::Bytes(vec![0x31])]),
            ),
        ]));

        let metadata = decode_evidence(&payload).unwrap().metadata;
        assert_eq!(metadata.certificate, Some(vec![0x30, 0x01]));
        assert_eq!(metadata.cabundle, vec![vec![0x30], vec![0x31]]);
    }
}
