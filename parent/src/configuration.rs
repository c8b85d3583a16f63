// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::constants;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct HostOptions {
    /// vsock port to listen on for the enclave's attestation document
    #[arg(long, default_value_t = constants::HOST_PORT, env("ATTEST_VSOCK_PORT"))]
    pub port: u32,
    #[arg(long, default_value_t = constants::ENCLAVE_CID, env("ATTEST_ENCLAVE_CID"))]
    pub enclave_cid: u32,
    #[arg(long, default_value = constants::RUN_ENCLAVE_EIF_PATH, env("ATTEST_EIF_PATH"))]
    pub eif_path: String,
    #[arg(long, default_value = constants::DOCKER_CONTEXT_DIR, env("ATTEST_DOCKER_DIR"))]
    pub docker_dir: String,
    #[arg(long, default_value = constants::DOCKERFILE, env("ATTEST_DOCKERFILE"))]
    pub dockerfile: String,
    #[arg(long, default_value = constants::DOCKER_IMAGE, env("ATTEST_DOCKER_IMAGE"))]
    pub docker_image: String,
    #[arg(long, default_value = constants::TARGET_ARCH, env("TARGETARCH"))]
    pub target_arch: String,
    #[arg(long, default_value_t = constants::RUN_ENCLAVE_CPU_COUNT, env("ATTEST_CPU_COUNT"))]
    pub cpu_count: u32,
    #[arg(long, default_value_t = constants::RUN_ENCLAVE_MEMORY_SIZE, env("ATTEST_MEMORY_MIB"))]
    pub memory_mib: u32,
    /// Largest accepted frame, in bytes
    #[arg(long, default_value_t = constants::MAX_MESSAGE_SIZE, env("ATTEST_MAX_MESSAGE_SIZE"))]
    pub max_message_size: u32,
    #[arg(
        long,
        default_value_t = constants::READ_TIMEOUT.as_secs(),
        env("ATTEST_READ_TIMEOUT_SECS")
    )]
    pub read_timeout_secs: u64,
    /// Seconds a launched enclave has to connect; 0 waits forever
    #[arg(
        long,
        default_value_t = constants::ACCEPT_TIMEOUT.as_secs(),
        env("ATTEST_ACCEPT_TIMEOUT_SECS")
    )]
    pub accept_timeout_secs: u64,
    #[arg(
        long,
        default_value_t = constants::IMDS_TIMEOUT.as_secs(),
        env("ATTEST_IMDS_TIMEOUT_SECS")
    )]
    pub imds_timeout_secs: u64,
    /// PCR expected to hold the extended instance ID
    #[arg(long, default_value_t = constants::INSTANCE_ID_PCR, env("ATTEST_IDENTITY_PCR"))]
    pub identity_pcr: i64,
    #[arg(long, default_value = "false", env("ATTEST_SKIP_BUILD"), action = ArgAction::SetTrue)]
    pub skip_build: bool,
    #[arg(long, default_value = "false", env("ATTEST_SKIP_LAUNCH"), action = ArgAction::SetTrue)]
    pub skip_launch: bool,
    #[arg(
        long,
        default_value = "false",
        env("ATTEST_SKIP_INSTANCE_ID"),
        action = ArgAction::SetTrue
    )]
    pub skip_instance_id: bool,
    /// Verify the COSE signature and certificate chain against the AWS Nitro root
    #[arg(
        long,
        default_value = "false",
        env("ATTEST_VERIFY_SIGNATURE"),
        action = ArgAction::SetTrue
    )]
    pub verify_signature: bool,
    /// Keep accepting enclave connections instead of exiting after one document
    #[arg(long, default_value = "false", env("ATTEST_SERVE"), action = ArgAction::SetTrue)]
    pub serve: bool,
}

impl HostOptions {
    pub fn read_timeout(&self) -> Option<Duration> {
        match self.read_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn accept_timeout(&self) -> Option<Duration> {
        match self.accept_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn imds_timeout(&self) -> Duration {
        Duration::from_secs(self.imds_timeout_secs)
    }
}

impl Default for HostOptions {
    fn default() -> Self {
        HostOptions {
            port: constants::HOST_PORT,
            enclave_cid: constants::ENCLAVE_CID,
            eif_path: constants::RUN_ENCLAVE_EIF_PATH.to_string(),
            docker_dir: constants::DOCKER_CONTEXT_DIR.to_string(),
            dockerfile: constants::DOCKERFILE.to_string(),
            docker_image: constants::DOCKER_IMAGE.to_string(),
            target_arch: constants::TARGET_ARCH.to_string(),
            cpu_count: constants::RUN_ENCLAVE_CPU_COUNT,
            memory_mib: constants::RUN_ENCLAVE_MEMORY_SIZE,
            max_message_size: constants::MAX_MESSAGE_SIZE,
            read_timeout_secs: constants::READ_TIMEOUT.as_secs(),
            accept_timeout_secs: constants::ACCEPT_TIMEOUT.as_secs(),
            imds_timeout_secs: constants::IMDS_TIMEOUT.as_secs(),
            identity_pcr: constants::INSTANCE_ID_PCR,
            skip_build: true,
            skip_launch: true,
            skip_instance_id: true,
            verify_signature: false,
            serve: false,
        }
    }
}
