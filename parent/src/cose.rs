// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Outer COSE_Sign1 envelope decoding.
//!
//! The envelope is decoded structurally with [`ciborium`] rather than through a
//! typed COSE library so that malformed documents yield a precise
//! [`EvidenceError::MalformedEnvelope`] instead of a generic parse failure.
//!
//! ```text
//! [ protected: bstr, unprotected: map, payload: bstr, signature: bstr ]
//! ```
//!
//! Only the payload is interpreted by [`decode_envelope`]. The protected
//! header, unprotected header and signature are carried on the wire but not
//! checked there: **the COSE signature and the certificate chain are only
//! verified when the caller opts in** (see [`crate::signature`]), which reads
//! them through [`decode_sign1`].
//!
//! A document must be exactly one CBOR data item; bytes after it are
//! rejected.

use ciborium::Value as CborValue;

use crate::constants::{
    COSE_MIN_ELEMENTS, COSE_PAYLOAD_INDEX, COSE_PROTECTED_INDEX, COSE_SIGN1_TAG,
    COSE_SIGNATURE_INDEX,
};
use crate::errors::EvidenceError;

/// The signed parts of a COSE_Sign1 message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoseSign1 {
    /// Serialized protected header, exactly as received.
    pub protected: Vec<u8>,
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

/// Decodes exactly one CBOR data item from `bytes`.
///
/// `what` names the item in the error for leftover bytes.
pub(crate) fn decode_single(bytes: &[u8], what: &str) -> Result<CborValue, String> {
    let mut reader = bytes;
    let value: CborValue =
        ciborium::from_reader(&mut reader).map_err(|e| format!("invalid CBOR: {e}"))?;
    if !reader.is_empty() {
        return Err(format!("{} trailing bytes after {}", reader.len(), what));
    }
    Ok(value)
}

fn decode_elements(document: &[u8]) -> Result<Vec<CborValue>, EvidenceError> {
    let value = decode_single(document, "envelope").map_err(EvidenceError::MalformedEnvelope)?;

    let value = match value {
        CborValue::Tag(COSE_SIGN1_TAG, inner) => *inner,
        CborValue::Tag(tag, _) => {
            return Err(EvidenceError::MalformedEnvelope(format!(
                "unexpected CBOR tag {tag}"
            )));
        }
        other => other,
    };

    let CborValue::Array(elements) = value else {
        return Err(EvidenceError::MalformedEnvelope(
            "expected a CBOR array".to_string(),
        ));
    };

    if elements.len() < COSE_MIN_ELEMENTS {
        return Err(EvidenceError::MalformedEnvelope(format!(
            "expected at least {} elements, got {}",
            COSE_MIN_ELEMENTS,
            elements.len()
        )));
    }

    Ok(elements)
}

fn take_bytes(
    elements: &mut [CborValue],
    index: usize,
    name: &str,
) -> Result<Vec<u8>, EvidenceError> {
    match std::mem::replace(&mut elements[index], CborValue::Null) {
        CborValue::Bytes(bytes) => Ok(bytes),
        _ => Err(EvidenceError::MalformedEnvelope(format!("{name} not bytes"))),
    }
}

/// Decodes a COSE_Sign1 message and returns its raw payload bytes.
///
/// A CBOR tag 18 wrapper is accepted and removed before the shape checks.
pub fn decode_envelope(document: &[u8]) -> Result<Vec<u8>, EvidenceError> {
    let mut elements = decode_elements(document)?;
    take_bytes(&mut elements, COSE_PAYLOAD_INDEX, "payload")
}

/// Decodes a COSE_Sign1 message keeping the parts covered by its signature.
///
/// Unlike [`decode_envelope`], the protected header and the signature must
/// also be byte strings.
pub fn decode_sign1(document: &[u8]) -> Result<CoseSign1, EvidenceError> {
    let mut elements = decode_elements(document)?;
    Ok(CoseSign1 {
        payload: take_bytes(&mut elements, COSE_PAYLOAD_INDEX, "payload")?,
        protected: take_bytes(&mut elements, COSE_PROTECTED_INDEX, "protected header")?,
        signature: take_bytes(&mut elements, COSE_SIGNATURE_INDEX, "signature")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: &CborValue) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf).unwrap();
        buf
    }

    fn envelope(payload: CborValue) -> CborValue {
        CborValue::Array(vec![
            CborValue::Bytes(vec![0xa1, 0x01, 0x38, 0x22]),
            CborValue::Map(vec![]),
            payload,
            CborValue::Bytes(vec![0x55; 96]),
        ])
    }

    #[test]
    fn test_extracts_payload() {
        let doc = encode(&envelope(CborValue::Bytes(b"payload".to_vec())));
        assert_eq!(decode_envelope(&doc).unwrap(), b"payload");
    }

    #[test]
    fn test_accepts_cose_sign1_tag() {
        let tagged = CborValue::Tag(
            COSE_SIGN1_TAG,
            Box::new(envelope(CborValue::Bytes(vec![1, 2, 3]))),
        );
        assert_eq!(decode_envelope(&encode(&tagged)).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_rejects_foreign_tag() {
        let tagged = CborValue::Tag(99, Box::new(envelope(CborValue::Bytes(vec![]))));
        assert!(matches!(
            decode_envelope(&encode(&tagged)),
            Err(EvidenceError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_extra_elements_are_ignored() {
        let CborValue::Array(mut elements) = envelope(CborValue::Bytes(vec![9])) else {
            unreachable!()
        };
        elements.push(CborValue::Null);
        let doc = encode(&CborValue::Array(elements));
        assert_eq!(decode_envelope(&doc).unwrap(), vec![9]);
    }

    #[test]
    fn test_three_elements_is_malformed() {
        let doc = encode(&CborValue::Array(vec![
            CborValue::Bytes(vec![]),
            CborValue::Map(vec![]),
            CborValue::Bytes(vec![]),
        ]));
        assert_eq!(
            decode_envelope(&doc).unwrap_err(),
            EvidenceError::MalformedEnvelope("expected at least 4 elements, got 3".to_string())
        );
    }

    #[test]
    fn test_text_payload_is_malformed() {
        let doc = encode(&envelope(CborValue::Text("payload".to_string())));
        assert_eq!(
            decode_envelope(&doc).unwrap_err(),
            EvidenceError::MalformedEnvelope("payload not bytes".to_string())
        );
    }

    #[test]
    fn test_map_is_malformed() {
        let doc = encode(&CborValue::Map(vec![]));
        assert!(matches!(
            decode_envelope(&doc),
            Err(EvidenceError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_scalar_is_malformed() {
        let doc = encode(&CborValue::Integer(7.into()));
        assert!(matches!(
            decode_envelope(&doc),
            Err(EvidenceError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_trailing_bytes_after_envelope_rejected() {
        let mut doc = encode(&envelope(CborValue::Bytes(vec![0x01; 48])));
        doc.extend_from_slice(b"\xff\xff GARBAGE");
        assert_eq!(
            decode_envelope(&doc).unwrap_err(),
            EvidenceError::MalformedEnvelope("10 trailing bytes after envelope".to_string())
        );
    }

    #[test]
    fn test_second_cbor_item_rejected() {
        let mut doc = encode(&envelope(CborValue::Bytes(vec![1])));
        doc.extend(encode(&CborValue::Integer(0.into())));
        assert!(matches!(
            decode_envelope(&doc),
            Err(EvidenceError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_decode_sign1_keeps_signed_parts() {
        let doc = encode(&envelope(CborValue::Bytes(b"payload".to_vec())));
        let sign1 = decode_sign1(&doc).unwrap();
        assert_eq!(sign1.protected, vec![0xa1, 0x01, 0x38, 0x22]);
        assert_eq!(sign1.payload, b"payload");
        assert_eq!(sign1.signature, vec![0x55; 96]);
    }

    #[test]
    fn test_decode_sign1_requires_byte_signature() {
        let doc = encode(&CborValue::Array(vec![
            CborValue::Bytes(vec![]),
            CborValue::Map(vec![]),
            CborValue::Bytes(vec![1]),
            CborValue::Null,
        ]));
        assert_eq!(decode_envelope(&doc).unwrap(), vec![1]);
        assert_eq!(
            decode_sign1(&doc).unwrap_err(),
            EvidenceError::MalformedEnvelope("signature not bytes".to_string())
        );
    }

    #[test]
    fn test_empty_and_garbage_input_is_malformed() {
        assert!(matches!(
            decode_envelope(&[]),
            Err(EvidenceError::MalformedEnvelope(_))
        ));
        // array header claiming 4 elements followed by nothing
        assert!(matches!(
            decode_envelope(&[0x84]),
            Err(EvidenceError::MalformedEnvelope(_))
        ));
    }
}
