/*
 * main.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Rover, a command-line web client.
 *
 * Rover is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Rover is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Rover.  If not, see <http://www.gnu.org/licenses/>.
 */

//! rover: fetch a web resource and print a report (status, headers, body) to standard output.
//!
//! Diagnostics go to standard error through `tracing`; filter with RUST_LOG (default "info").

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use rover_core::protocol::http::{HttpClient, RequestBuilder, Response, TransactionState};
use rover_core::uri::Url;
use rover_core::{Cancellation, ClientTransport, TcpTransport, TlsConfig, TlsDecorator};

/// Root certificate bundle picked up from the executable's directory when no --ca-file is given.
const EXE_CA_FILE: &str = "cert.pem";

#[derive(Parser)]
#[command(name = "rover")]
#[command(version, about = "Fetch a web resource and output its contents to the standard output stream.", long_about = None)]
struct Cli {
    /// Locator for resource to fetch
    url: String,

    /// PEM bundle of trusted root certificates (default: cert.pem next to the executable, else
    /// the platform store)
    #[arg(long, value_name = "PATH")]
    ca_file: Option<PathBuf>,

    /// Do not verify the server certificate
    #[arg(long)]
    insecure: bool,

    /// Verify the certificate chain but not the server name
    #[arg(long)]
    insecure_names: bool,

    /// Seconds to wait for the response
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    timeout: u64,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn exe_ca_file() -> Option<PathBuf> {
    let path = std::env::current_exe().ok()?.parent()?.join(EXE_CA_FILE);
    path.is_file().then_some(path)
}

fn tls_config(cli: &Cli) -> Result<TlsConfig, rover_core::ConfigError> {
    let mut config = TlsConfig::new();
    if let Some(path) = cli.ca_file.clone().or_else(exe_ca_file) {
        info!("using root certificates from '{}'", path.display());
        config = config.with_root_pem_file(path)?;
    }
    if cli.insecure {
        warn!("server certificate verification disabled");
        config = config.insecure_skip_certificate_verification();
    }
    if cli.insecure_names {
        warn!("server name verification disabled");
        config = config.insecure_skip_name_verification();
    }
    Ok(config)
}

fn print_report(response: &Response) -> io::Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out, "Response: {} {}", response.code, response.reason)?;
    writeln!(out, "Headers: ---------------")?;
    for (name, value) in &response.headers {
        writeln!(out, "{}: {}", name, value)?;
    }
    writeln!(out, "------------------------")?;
    if !response.body.is_empty() {
        out.write_all(&response.body)?;
        writeln!(out)?;
    }
    out.flush()
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let url = match Url::parse(&cli.url) {
        Ok(url) => url,
        Err(e) => {
            error!("bad URL given: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to create tokio runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let tcp = Arc::new(TcpTransport::new(runtime.handle().clone()));
    let transport: Arc<dyn ClientTransport> = if url.scheme.is_secure() {
        match tls_config(&cli) {
            Ok(config) => Arc::new(TlsDecorator::new(tcp, config)),
            Err(e) => {
                error!("{}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        tcp
    };

    let cancel = Cancellation::new();
    {
        let cancel = cancel.clone();
        runtime.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    info!("web client up and running");
    let client = HttpClient::new(transport).with_timeout(Duration::from_secs(cli.timeout));
    let transaction = client.fetch(&RequestBuilder::get(url), &cancel);
    let code = match transaction.state {
        TransactionState::Completed => match print_report(&transaction.response) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("unable to write report: {}", e);
                ExitCode::FAILURE
            }
        },
        TransactionState::UnableToConnect => {
            error!("unable to connect");
            ExitCode::FAILURE
        }
        TransactionState::Broken => {
            error!("connection broken by server");
            ExitCode::FAILURE
        }
        TransactionState::Timeout => {
            error!("timeout waiting for response");
            ExitCode::FAILURE
        }
        TransactionState::Cancelled => {
            warn!("fetch cancelled");
            ExitCode::FAILURE
        }
    };
    info!("exiting");
    runtime.shutdown_timeout(Duration::from_millis(100));
    code
}
