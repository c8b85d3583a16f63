// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! AWS Nitro Enclaves Root Certificate (G1).
//!
//! Every NSM signing certificate chains up to this root. It is published at
//! <https://aws-nitro-enclaves.amazonaws.com/AWS_NitroEnclaves_Root-G1.zip>
//! and pinned here by the SHA-256 fingerprint of its DER encoding.

use data_encoding::{BASE64, HEXLOWER};
use sha2::{Digest, Sha256};

use crate::errors::EvidenceError;

/// SHA-256 fingerprint of the DER-encoded root certificate.
pub const AWS_NITRO_ROOT_CERT_SHA256: &str =
    "641a0321a3e244efe456463195d606317ed7cdcc3c1756e09893f3c68f79bb5b";

/// Subject: CN = aws.nitro-enclaves, valid Oct 28 2019 to Oct 28 2049,
/// ecdsa-with-SHA384 over a P-384 key.
pub const AWS_NITRO_ROOT_CERT_PEM: &str = r#"-----BEGIN CERTIFICATE-----
MIICETCCAZagAwIBAgIRAPkxdWgbkK/hHUbMtOTn+FYwCgYIKoZIzj0EAwMwSTEL
MAkGA1UEBhMCVVMxDzANBgNVBAoMBkFtYXpvbjEMMAoGA1UECwwDQVdTMRswGQYD
VQQDDBJhd3Mubml0cm8tZW5jbGF2ZXMwHhcNMTkxMDI4MTMyODA1WhcNNDkxMDI4
MTQyODA1WjBJMQswCQYDVQQGEwJVUzEPMA0GA1UECgwGQW1hem9uMQwwCgYDVQQL
DANBV1MxGzAZBgNVBAMMEmF3cy5uaXRyby1lbmNsYXZlczB2MBAGByqGSM49AgEG
BSuBBAAiA2IABPwCVOumCMHzaHDimtqQvkY4MpJzbolL//Zy2YlES1BR5TSksfbb
48C8WBoyt7F2Bw7eEtaaP+ohG2bnUs990d0JX28TcPQXCEPZ3BABIeTPYwEoCWZE
h8l5YoQwTcU/9KNCMEAwDwYDVR0TAQH/BAUwAwEB/zAdBgNVHQ4EFgQUkCW1DdkF
R+eWw5b6cp3PmanfS5YwDgYDVR0PAQH/BAQDAgGGMAoGCCqGSM49BAMDA2kAMGYC
MQCjfy+Rocm9Xue4YnwWmNJVA44fA0P5W2OpYow9OYCVRaEevL8uO1XYru5xtMPW
rfMCMQCi85sWBbJwKKXdS6BptQFuZbT73o/gBh1qUxl/nNr12UO8Yfwr6wPLb+6N
IwLz3/Y=
-----END CERTIFICATE-----"#;

/// Decodes the embedded PEM and checks it against the pinned fingerprint.
pub fn root_cert_der() -> Result<Vec<u8>, EvidenceError> {
    let pem_body = AWS_NITRO_ROOT_CERT_PEM
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .collect::<String>();

    let der = BASE64.decode(pem_body.as_bytes()).map_err(|e| {
        EvidenceError::SignatureInvalid(format!("failed to decode root certificate: {e}"))
    })?;

    if HEXLOWER.encode(&Sha256::digest(&der)) != AWS_NITRO_ROOT_CERT_SHA256 {
        return Err(EvidenceError::SignatureInvalid(
            "embedded root certificate does not match its pinned fingerprint".to_string(),
        ));
    }

    Ok(der)
}
