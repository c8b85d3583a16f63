// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! EC2 instance identity lookup through IMDSv2.
//!
//! The instance ID is the external identity correlated with PCR4 via
//! [`crate::digest::measurement_digest`]. Lookup is bounded by a caller
//! deadline; retries are left to the IMDS client's classifier.

use std::time::Duration;

use aws_config::imds::client::{Client, ImdsResponseRetryClassifier};
use aws_smithy_runtime_api::client::retries::classifiers::SharedRetryClassifier;

use crate::constants;
use crate::errors::AppError;
use crate::models::InstanceIdentityDocument;

fn imds_client() -> Result<Client, AppError> {
    let client = Client::builder()
        .endpoint(constants::IMDS_ENDPOINT)
        .map_err(|e| AppError::ConfigError(e.to_string()))?
        .token_ttl(constants::IMDS_TOKEN_TTL)
        .retry_classifier(SharedRetryClassifier::new(
            ImdsResponseRetryClassifier::default().with_retry_connect_timeouts(true),
        ))
        .build();
    Ok(client)
}

/// Fetches and parses the instance identity document, giving up after `timeout`.
#[tracing::instrument]
pub async fn get_identity_document(
    timeout: Duration,
) -> Result<InstanceIdentityDocument, AppError> {
    let client = imds_client()?;

    let body = tokio::time::timeout(
        timeout,
        client.get(constants::IMDS_IDENTITY_DOCUMENT_PATH),
    )
    .await
    .map_err(|_| AppError::ImdsError(format!("no response within {timeout:?}")))?
    .map_err(|e| AppError::ImdsError(e.to_string()))?;

    parse_identity_document(body.as_ref())
}

/// Returns the EC2 instance ID of the parent instance.
pub async fn get_instance_id(timeout: Duration) -> Result<String, AppError> {
    let document = get_identity_document(timeout).await?;

    tracing::info!("[parent] instance ID: {}", document.instance_id);

    Ok(document.instance_id)
}

fn parse_identity_document(body: &str) -> Result<InstanceIdentityDocument, AppError> {
    serde_json::from_str(body)
        .map_err(|e| AppError::ImdsError(format!("invalid identity document: {e}")))
}
