// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Host-side orchestration of an attestation exchange.
//!
//! The vsock listener is bound before the enclave is launched so the enclave
//! never dials a closed port. A single run waits at most
//! `--accept-timeout-secs` for the enclave to connect, so an enclave that
//! never dials is still terminated. Reads and decoding are blocking and run on
//! tokio's blocking pool; in serve mode every connection gets its own task so
//! a silent or slow peer only holds up itself.

use std::io::ErrorKind;
use std::sync::Arc;
use std::time::{Duration, Instant};

use vsock::{VMADDR_CID_ANY, VsockAddr, VsockListener, VsockStream};

use crate::configuration::HostOptions;
use crate::constants::ACCEPT_POLL_INTERVAL;
use crate::digest::measurement_digest;
use crate::enclaves::Enclaves;
use crate::errors::AppError;
use crate::imds;
use crate::models::EvidenceReport;
use crate::validator::{ValidatedEvidence, receive_evidence};

pub struct Application {
    options: HostOptions,
    enclaves: Enclaves,
    listener: Arc<VsockListener>,
}

impl Application {
    pub fn build(options: HostOptions) -> Result<Self, AppError> {
        let listener = VsockListener::bind(&VsockAddr::new(VMADDR_CID_ANY, options.port))?;

        tracing::info!("[parent] listening for enclave on vsock port {}", options.port);

        Ok(Self {
            enclaves: Enclaves::from(&options),
            options,
            listener: Arc::new(listener),
        })
    }

    /// Builds and launches the enclave, receives one attestation document,
    /// then terminates the enclave whatever the outcome.
    pub async fn run(self) -> Result<EvidenceReport, AppError> {
        if !self.options.skip_build {
            self.enclaves.build_eif().await?;
        }

        let enclave = if self.options.skip_launch {
            tracing::warn!("[parent] skipping enclave launch");
            None
        } else {
            Some(self.enclaves.run_enclave().await?)
        };

        let result = self.exchange().await;

        if let Some(enclave) = enclave
            && let Err(err) = self.enclaves.terminate_enclave(&enclave.enclave_id).await
        {
            tracing::error!("[parent] error terminating enclave {}: {:?}", enclave.enclave_id, err);
        }
        if !self.options.skip_build {
            self.enclaves.remove_eif().await;
        }

        result
    }

    /// Accepts enclave connections until the listener fails, handling each one
    /// in its own task.
    pub async fn serve(self) -> Result<(), AppError> {
        let handle = tokio::runtime::Handle::current();
        let listener = self.listener.clone();
        let options = self.options.clone();

        tokio::task::spawn_blocking(move || {
            for stream in listener.incoming() {
                let stream = match stream {
                    Ok(s) => s,
                    Err(e) => {
                        tracing::warn!("[parent] failed to accept connection: {:?}", e);
                        continue;
                    }
                };

                let options = options.clone();
                handle.spawn(async move {
                    match process_connection(stream, options).await {
                        Ok(report) => print_report(&report),
                        Err(err) => {
                            tracing::error!("[parent] attestation exchange failed: {}", err)
                        }
                    }
                });
            }
        })
        .await?;

        Ok(())
    }

    async fn exchange(&self) -> Result<EvidenceReport, AppError> {
        let listener = self.listener.clone();
        let timeout = self.options.accept_timeout();
        let stream =
            tokio::task::spawn_blocking(move || accept_within(&listener, timeout)).await??;

        process_connection(stream, self.options.clone()).await
    }
}

/// Accepts one connection, giving up after `timeout` when one is set.
fn accept_within(
    listener: &VsockListener,
    timeout: Option<Duration>,
) -> Result<VsockStream, AppError> {
    let Some(timeout) = timeout else {
        return Ok(listener.accept()?.0);
    };

    listener.set_nonblocking(true)?;
    let accepted = poll_until(timeout, || listener.accept().map(|(stream, _)| stream));
    listener.set_nonblocking(false)?;

    let stream = accepted?;
    stream.set_nonblocking(false)?;
    Ok(stream)
}

/// Retries a non-blocking `attempt` while it reports `WouldBlock`, until
/// `timeout` has elapsed.
fn poll_until<T>(
    timeout: Duration,
    mut attempt: impl FnMut() -> std::io::Result<T>,
) -> Result<T, AppError> {
    let deadline = Instant::now() + timeout;
    loop {
        match attempt() {
            Ok(value) => return Ok(value),
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    return Err(AppError::AcceptTimeout(timeout.as_secs()));
                }
                std::thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(err) => return Err(err.into()),
        }
    }
}

async fn process_connection(
    stream: VsockStream,
    options: HostOptions,
) -> Result<EvidenceReport, AppError> {
    if let Ok(peer) = stream.peer_addr() {
        tracing::info!("[parent] enclave connected from CID {}", peer.cid());
    }

    let read_options = options.clone();
    let evidence =
        tokio::task::spawn_blocking(move || read_evidence(stream, &read_options)).await??;

    Ok(build_report(&evidence, &options).await)
}

fn read_evidence(
    mut stream: VsockStream,
    options: &HostOptions,
) -> Result<ValidatedEvidence, AppError> {
    stream.set_read_timeout(options.read_timeout())?;
    // a failed read drops the stream; a partially consumed frame is never resumed
    Ok(receive_evidence(
        &mut stream,
        options.max_message_size,
        options.verify_signature,
    )?)
}

async fn build_report(evidence: &ValidatedEvidence, options: &HostOptions) -> EvidenceReport {
    let mut report = EvidenceReport::from(evidence);

    tracing::info!("[parent] attestation document PCRs:");
    for (index, digest) in &report.pcrs {
        tracing::info!("[parent] PCR{}: {}", index, digest);
    }

    if options.skip_instance_id {
        return report;
    }

    match imds::get_instance_id(options.imds_timeout()).await {
        Ok(instance_id) => {
            let digest = measurement_digest(&instance_id);
            let identity = evidence.identity_match(options.identity_pcr, &instance_id);

            tracing::info!("[parent] SHA384 extend digest of instance ID: {}", digest);
            tracing::info!("[parent] PCR{} identity check: {:?}", options.identity_pcr, identity);

            report.instance_id = Some(instance_id);
            report.instance_id_digest = Some(digest);
            report.identity_pcr = Some(identity);
        }
        Err(err) => tracing::warn!("[parent] error getting instance ID: {}", err),
    }

    report
}

pub fn print_report(report: &EvidenceReport) {
    match serde_json::to_string(report) {
        Ok(json) => println!("{json}"),
        Err(err) => tracing::error!("[parent] failed to serialize report: {:?}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Error;

    #[test]
    fn test_poll_until_times_out_while_blocked() {
        let mut attempts = 0;
        let result: Result<(), AppError> = poll_until(Duration::ZERO, || {
            attempts += 1;
            Err(Error::from(ErrorKind::WouldBlock))
        });
        assert_eq!(result.unwrap_err(), AppError::AcceptTimeout(0));
        assert_eq!(attempts, 1);
    }

    #[test]
    fn test_poll_until_returns_once_ready() {
        let mut attempts = 0;
        let result = poll_until(Duration::from_secs(5), || {
            attempts += 1;
            if attempts < 3 {
                Err(Error::from(ErrorKind::WouldBlock))
            } else {
                Ok(attempts)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_poll_until_propagates_other_errors() {
        let result: Result<(), AppError> =
            poll_until(Duration::from_secs(5), || Err(Error::from(ErrorKind::ConnectionReset)));
        assert_eq!(result.unwrap_err(), AppError::InternalServerError);
    }

    #[test]
    fn test_accept_timeout_message() {
        assert_eq!(
            AppError::AcceptTimeout(120).to_string(),
            "enclave did not connect within 120 seconds"
        );
    }
}
