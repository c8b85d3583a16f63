// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Nitro Enclave lifecycle management.
//!
//! The parent drives the enclave through external tools:
//!
//! 1. **Image**: `docker build` of `enclave/Dockerfile` from the workspace root
//! 2. **EIF**: `nitro-cli build-enclave` from the Docker image
//! 3. **Launch**: `nitro-cli run-enclave` with a fixed CID so the parent knows
//!    which peer to expect
//! 4. **Teardown**: `nitro-cli terminate-enclave` and removal of the EIF
//!
//! `nitro-cli` may print log lines around its JSON result, so the JSON block
//! is cut out of the output before it is parsed.

use std::process::{Output, Stdio};

use tokio::process::Command;

use crate::configuration::HostOptions;
use crate::errors::AppError;
use crate::models::EnclaveRunInfo;

/// Launch parameters for the attesting enclave.
#[derive(Debug, Clone)]
pub struct Enclaves {
    eif_path: String,
    docker_dir: String,
    dockerfile: String,
    docker_image: String,
    target_arch: String,
    cpu_count: u32,
    memory_mib: u32,
    enclave_cid: u32,
}

impl From<&HostOptions> for Enclaves {
    fn from(options: &HostOptions) -> Self {
        Self {
            eif_path: options.eif_path.clone(),
            docker_dir: options.docker_dir.clone(),
            dockerfile: options.dockerfile.clone(),
            docker_image: options.docker_image.clone(),
            target_arch: options.target_arch.clone(),
            cpu_count: options.cpu_count,
            memory_mib: options.memory_mib,
            enclave_cid: options.enclave_cid,
        }
    }
}

impl Enclaves {
    /// Builds the enclave Docker image and converts it into an EIF.
    ///
    /// Tool output is passed through to the parent's stdout/stderr.
    #[tracing::instrument(skip(self))]
    pub async fn build_eif(&self) -> Result<(), AppError> {
        tracing::info!("[parent] building docker image {}", self.docker_image);

        let status = Command::new("docker")
            .arg("build")
            .args(["-t", self.docker_image.as_str()])
            .args(["-f", self.dockerfile.as_str()])
            .arg("--build-arg")
            .arg(format!("TARGETARCH={}", self.target_arch))
            .arg(&self.docker_dir)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(exec_error)?;
        if !status.success() {
            return Err(AppError::RunError(
                status.code(),
                "docker build failed".to_string(),
            ));
        }

        tracing::info!("[parent] building EIF {}", self.eif_path);

        let status = Command::new("nitro-cli")
            .arg("build-enclave")
            .args(["--docker-uri", self.docker_image.as_str()])
            .args(["--output-file", self.eif_path.as_str()])
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(exec_error)?;
        if !status.success() {
            return Err(AppError::RunError(
                status.code(),
                "nitro-cli build-enclave failed".to_string(),
            ));
        }

        tracing::info!("[parent] EIF file created: {}", self.eif_path);

        Ok(())
    }

    /// Launches the enclave from the EIF and returns its run information.
    #[tracing::instrument(skip(self))]
    pub async fn run_enclave(&self) -> Result<EnclaveRunInfo, AppError> {
        let output = Command::new("nitro-cli")
            .arg("run-enclave")
            .arg("--cpu-count")
            .arg(self.cpu_count.to_string())
            .arg("--memory")
            .arg(self.memory_mib.to_string())
            .arg("--enclave-cid")
            .arg(self.enclave_cid.to_string())
            .args(["--eif-path", self.eif_path.as_str()])
            .output()
            .await
            .map_err(exec_error)?;
        check_status(&output)?;

        let stdout = String::from_utf8_lossy(output.stdout.as_slice());
        let enclave: EnclaveRunInfo = serde_json::from_str(extract_json_block(&stdout)?)?;

        tracing::info!(
            "[parent] enclave launched with ID {} on CID {}",
            enclave.enclave_id,
            self.enclave_cid
        );

        Ok(enclave)
    }

    /// Terminates a running enclave.
    #[tracing::instrument(skip(self))]
    pub async fn terminate_enclave(&self, enclave_id: &str) -> Result<(), AppError> {
        tracing::info!("[parent] terminating enclave {}", enclave_id);

        let output = Command::new("nitro-cli")
            .arg("terminate-enclave")
            .args(["--enclave-id", enclave_id])
            .output()
            .await
            .map_err(exec_error)?;
        check_status(&output)?;

        tracing::info!("[parent] enclave {} terminated", enclave_id);

        Ok(())
    }

    /// Deletes the EIF produced by [`build_eif`](Self::build_eif). Failures are logged only.
    pub async fn remove_eif(&self) {
        if let Err(err) = tokio::fs::remove_file(&self.eif_path).await {
            tracing::warn!("[parent] failed to remove EIF file {}: {:?}", self.eif_path, err);
        }
    }
}

fn exec_error(err: std::io::Error) -> AppError {
    tracing::error!("[parent] failed to spawn command: {:?}", err);
    AppError::ExecError
}

fn check_status(output: &Output) -> Result<(), AppError> {
    if output.status.success() {
        return Ok(());
    }
    Err(AppError::RunError(
        output.status.code(),
        String::from_utf8_lossy(output.stderr.as_slice()).to_string(),
    ))
}

/// Returns the text between the first `{` and the last `}` (inclusive).
pub fn extract_json_block(output: &str) -> Result<&str, AppError> {
    let start = output
        .find('{')
        .ok_or_else(|| AppError::ConfigError("no JSON object in nitro-cli output".to_string()))?;
    let end = output
        .rfind('}')
        .ok_or_else(|| AppError::ConfigError("no JSON object in nitro-cli output".to_string()))?;
    if start > end {
        return Err(AppError::ConfigError(
            "malformed JSON object in nitro-cli output".to_string(),
        ));
    }
    Ok(&output[start..=end])
}
