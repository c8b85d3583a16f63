// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Nitro Secure Module (NSM) interface for attestation document generation.
//!
//! The NSM returns a COSE_Sign1 document, signed by the Nitro hypervisor,
//! whose payload carries the enclave's PCRs, module ID and timestamp along
//! with the nonce, user data and public key supplied in the request.

use anyhow::{anyhow, bail, Result};
use chrono::Utc;

use crate::constants::{
    MAX_NONCE_LENGTH, MAX_PUBLIC_KEY_LENGTH, MAX_USER_DATA_LENGTH, MIN_NONCE_LENGTH, NONCE_PREFIX,
};

/// Builds a time-based nonce of the form `my-enclave-nonce-<unix nanos>`.
pub fn time_nonce() -> Vec<u8> {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{NONCE_PREFIX}{nanos}").into_bytes()
}

fn validate_request(
    user_data: Option<&[u8]>,
    nonce: Option<&[u8]>,
    public_key: Option<&[u8]>,
) -> Result<()> {
    let n = nonce.ok_or_else(|| anyhow!("nonce is required for attestation"))?;
    if n.len() < MIN_NONCE_LENGTH {
        bail!(
            "nonce must be at least {} bytes, got {}",
            MIN_NONCE_LENGTH,
            n.len()
        );
    }
    if n.len() > MAX_NONCE_LENGTH {
        bail!(
            "nonce must be at most {} bytes, got {}",
            MAX_NONCE_LENGTH,
            n.len()
        );
    }

    if let Some(ud) = user_data {
        if ud.len() > MAX_USER_DATA_LENGTH {
            bail!(
                "user_data must be at most {} bytes, got {}",
                MAX_USER_DATA_LENGTH,
                ud.len()
            );
        }
    }

    if let Some(pk) = public_key {
        if pk.len() > MAX_PUBLIC_KEY_LENGTH {
            bail!(
                "public_key must be at most {} bytes, got {}",
                MAX_PUBLIC_KEY_LENGTH,
                pk.len()
            );
        }
    }

    Ok(())
}

/// Requests an attestation document from the NSM.
///
/// # Errors
///
/// Returns an error if:
/// - The nonce is missing or outside `MIN_NONCE_LENGTH..=MAX_NONCE_LENGTH`
/// - `user_data` or `public_key` exceed their maximum length
/// - The NSM device cannot be opened or rejects the request
#[cfg(target_env = "musl")]
pub fn get_attestation_document(
    user_data: Option<&[u8]>,
    nonce: Option<&[u8]>,
    public_key: Option<&[u8]>,
) -> Result<Vec<u8>> {
    use aws_nitro_enclaves_nsm_api::api::{Request, Response};
    use aws_nitro_enclaves_nsm_api::driver;
    use serde_bytes::ByteBuf;

    validate_request(user_data, nonce, public_key)?;

    let nsm_fd = driver::nsm_init();
    if nsm_fd < 0 {
        bail!("failed to initialize NSM device: fd={}", nsm_fd);
    }

    let request = Request::Attestation {
        user_data: user_data.map(|d| ByteBuf::from(d.to_vec())),
        nonce: nonce.map(|n| ByteBuf::from(n.to_vec())),
        public_key: public_key.map(|pk| ByteBuf::from(pk.to_vec())),
    };

    let response = driver::nsm_process_request(nsm_fd, request);

    driver::nsm_exit(nsm_fd);

    match response {
        Response::Attestation { document } => {
            if document.is_empty() {
                bail!("NSM device did not return an attestation document");
            }
            Ok(document)
        }
        Response::Error(error_code) => {
            bail!("NSM attestation failed with error code: {:?}", error_code)
        }
        _ => bail!("unexpected NSM response type"),
    }
}

/// Stub for non-musl targets (development/testing).
///
/// Applies the same request validation, then reports that attestation is only
/// available inside a Nitro Enclave.
#[cfg(not(target_env = "musl"))]
pub fn get_attestation_document(
    user_data: Option<&[u8]>,
    nonce: Option<&[u8]>,
    public_key: Option<&[u8]>,
) -> Result<Vec<u8>> {
    validate_request(user_data, nonce, public_key)?;

    Err(anyhow!(
        "attestation documents are only available inside a Nitro Enclave (musl target)"
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::constants::USER_DATA;

    #[test]
    fn test_time_nonce_has_prefix_and_min_length() {
        let nonce = time_nonce();
        assert!(nonce.starts_with(NONCE_PREFIX.as_bytes()));
        assert!(nonce.len() >= MIN_NONCE_LENGTH);
    }

    #[test]
    fn test_nonce_too_short() {
        let short_nonce = vec![0u8; MIN_NONCE_LENGTH - 1];
        let err = get_attestation_document(None, Some(&short_nonce), None)
            .unwrap_err()
            .to_string();
        assert!(err.contains("nonce must be at least"));
        assert!(err.contains(&MIN_NONCE_LENGTH.to_string()));
    }

    #[test]
    fn test_nonce_none_is_rejected() {
        let err = get_attestation_document(None, None, None)
            .unwrap_err()
            .to_string();
        assert!(err.contains("nonce is required"));
    }

    #[test]
    fn test_nonce_too_long() {
        let long_nonce = vec![0u8; MAX_NONCE_LENGTH + 1];
        let err = get_attestation_document(None, Some(&long_nonce), None)
            .unwrap_err()
            .to_string();
        assert!(err.contains("nonce must be at most"));
    }

    #[test]
    fn test_user_data_too_long() {
        let nonce = time_nonce();
        let user_data = vec![0u8; MAX_USER_DATA_LENGTH + 1];
        let err = get_attestation_document(Some(&user_data), Some(&nonce), None)
            .unwrap_err()
            .to_string();
        assert!(err.contains("user_data must be at most"));
    }

    #[test]
    fn test_default_request_is_valid() {
        let nonce = time_nonce();
        assert!(validate_request(Some(USER_DATA), Some(&nonce), None).is_ok());
    }

    #[cfg(not(target_env = "musl"))]
    #[test]
    fn test_non_musl_returns_error() {
        let nonce = time_nonce();
        let result = get_attestation_document(Some(USER_DATA), Some(&nonce), None);
        assert!(result.unwrap_err().to_string().contains("Nitro Enclave"));
    }
}
