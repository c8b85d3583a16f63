// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use data_encoding::BASE64;
use serde::{Deserialize, Serialize};

use crate::evidence::SkippedEntry;
use crate::validator::{IdentityMatch, RenderedPcrTable, ValidatedEvidence};

/// The information to be provided for a `run-enclave` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnclaveRunInfo {
    #[serde(rename = "EnclaveName", default)]
    /// The name of the enclave.
    pub enclave_name: Option<String>,
    #[serde(rename = "EnclaveID")]
    /// The full ID of the enclave.
    pub enclave_id: String,
    #[serde(rename = "ProcessID", default)]
    /// The PID of the enclave process which manages the enclave.
    pub process_id: Option<u32>,
    #[serde(rename = "EnclaveCID", default)]
    /// The enclave's CID.
    pub enclave_cid: Option<u64>,
    #[serde(rename = "NumberOfCPUs", default)]
    /// The number of CPUs used by the enclave.
    pub cpu_count: Option<usize>,
    #[serde(rename = "MemoryMiB", default)]
    /// The memory provided to the enclave (in MiB).
    pub memory_mib: Option<u64>,
}

/// Subset of the EC2 instance identity document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceIdentityDocument {
    #[serde(rename = "instanceId")]
    pub instance_id: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(rename = "instanceType", default)]
    pub instance_type: Option<String>,
}

/// Summary of one attestation exchange, printed at the end of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceReport {
    /// Non-zero PCRs only.
    pub pcrs: RenderedPcrTable,
    pub skipped: Vec<SkippedEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    /// Base64 encoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Base64 encoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id_digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_pcr: Option<IdentityMatch>,
    pub signature_verified: bool,
}

impl From<&ValidatedEvidence> for EvidenceReport {
    fn from(evidence: &ValidatedEvidence) -> Self {
        let metadata = &evidence.metadata;
        EvidenceReport {
            pcrs: evidence.non_zero_pcrs(),
            skipped: evidence.skipped.clone(),
            module_id: metadata.module_id.clone(),
            timestamp: metadata.timestamp,
            nonce: metadata.nonce.as_ref().map(|n| BASE64.encode(n)),
            user_data: metadata.user_data.as_ref().map(|d| BASE64.encode(d)),
            signature_verified: evidence.signature_verified,
            ..Default::default()
        }
    }
}
