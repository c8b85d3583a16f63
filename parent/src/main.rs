// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use clap::Parser;
use parent_attestation::application::{Application, print_report};
use parent_attestation::configuration::HostOptions;
use parent_attestation::errors::AppError;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    eprintln!("[parent] init");

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        // this needs to be set to remove duplicated information in the log.
        .with_current_span(false)
        .with_ansi(false)
        .without_time()
        // remove the name of the function from every log entry
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // get configuration options from arguments and environment variables
    let options = HostOptions::parse();

    tracing::info!("[parent] {:?}", &options);

    let serve = options.serve;
    let application = Application::build(options)?;

    if serve {
        return application.serve().await;
    }

    let report = application.run().await?;
    print_report(&report);

    tracing::info!("[parent] finished");

    Ok(())
}
