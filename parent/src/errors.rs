// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::fmt;

use tokio::task::JoinError;

/// Pipeline stage an [`EvidenceError`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Transport,
    Envelope,
    Evidence,
    Signature,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Transport => "transport",
            Self::Envelope => "envelope",
            Self::Evidence => "evidence",
            Self::Signature => "signature",
        };
        f.write_str(name)
    }
}

/// Structural failures of the evidence pipeline.
///
/// Every variant aborts the decode of the current document. Individual PCR
/// entries that cannot be coerced are not errors; they are reported as
/// [`SkippedEntry`](crate::evidence::SkippedEntry) records instead.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EvidenceError {
    #[error("truncated message: {0}")]
    TruncatedMessage(String),
    #[error("message size {size} exceeds maximum allowed size {max}")]
    MessageTooLarge { size: u32, max: u32 },
    #[error("timed out waiting for message")]
    Timeout,
    #[error("i/o error: {0}")]
    Io(String),
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
    #[error("malformed evidence: {0}")]
    MalformedEvidence(String),
    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),
}

impl EvidenceError {
    pub fn stage(&self) -> Stage {
        match self {
            Self::TruncatedMessage(_)
            | Self::MessageTooLarge { .. }
            | Self::Timeout
            | Self::Io(_) => Stage::Transport,
            Self::MalformedEnvelope(_) => Stage::Envelope,
            Self::MalformedEvidence(_) => Stage::Evidence,
            Self::SignatureInvalid(_) => Stage::Signature,
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum AppError {
    #[error("error running command: {0:?} {1}")]
    RunError(Option<i32>, String),
    #[error("error executing command")]
    ExecError,
    #[error("configuration error: {0}")]
    ConfigError(String),
    #[error("instance metadata error: {0}")]
    ImdsError(String),
    #[error("enclave did not connect within {0} seconds")]
    AcceptTimeout(u64),
    #[error("{stage} stage failed: {0}", stage = .0.stage())]
    Evidence(#[from] EvidenceError),
    #[error("internal server error")]
    InternalServerError,
}

impl From<serde_json::Error> for AppError {
    fn from(_source: serde_json::Error) -> Self {
        tracing::error!("{:?}", _source);
        AppError::InternalServerError
    }
}

impl From<anyhow::Error> for AppError {
    fn from(_source: anyhow::Error) -> Self {
        tracing::error!("{:?}", _source);
        AppError::InternalServerError
    }
}

impl From<std::io::Error> for AppError {
    fn from(_source: std::io::Error) -> Self {
        tracing::error!("{:?}", _source);
        AppError::InternalServerError
    }
}

impl From<JoinError> for AppError {
    fn from(_source: JoinError) -> Self {
        tracing::error!("{:?}", _source);
        AppError::InternalServerError
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_report_transport_stage() {
        assert_eq!(
            EvidenceError::TruncatedMessage("eof".to_string()).stage(),
            Stage::Transport
        );
        assert_eq!(
            EvidenceError::MessageTooLarge { size: 2, max: 1 }.stage(),
            Stage::Transport
        );
        assert_eq!(EvidenceError::Timeout.stage(), Stage::Transport);
    }

    #[test]
    fn test_decode_errors_report_their_stage() {
        assert_eq!(
            EvidenceError::MalformedEnvelope("x".to_string()).stage(),
            Stage::Envelope
        );
        assert_eq!(
            EvidenceError::MalformedEvidence("x".to_string()).stage(),
            Stage::Evidence
        );
        assert_eq!(
            EvidenceError::SignatureInvalid("x".to_string()).stage(),
            Stage::Signature
        );
    }

    #[test]
    fn test_app_error_names_failing_stage() {
        let err = AppError::from(EvidenceError::MalformedEnvelope("payload not bytes".to_string()));
        assert_eq!(
            err.to_string(),
            "envelope stage failed: malformed envelope: payload not bytes"
        );
    }
}
