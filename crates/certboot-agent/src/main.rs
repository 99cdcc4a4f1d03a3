//! certboot - first-time certificate enrollment against a Puppet CA.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use certboot_agent::{Enrollment, EnrollmentReport, HttpCaClient, TokioWaiter};
use certboot_core::{ConfigInputs, EnrollError, EnrollmentConfig, RetryPolicy};

/// certboot - bootstrap this host's certificate from a Puppet CA
#[derive(Parser)]
#[command(name = "certboot")]
#[command(about = "Enroll this host with a Puppet CA", long_about = None)]
struct Cli {
    /// Certificate name (defaults to $CERTNAME, then the local hostname)
    #[arg(long)]
    certname: Option<String>,

    /// CA host name
    #[arg(long, env = "PUPPETSERVER_HOSTNAME")]
    ca_host: Option<String>,

    /// CA port
    #[arg(long, env = "PUPPETSERVER_PORT")]
    ca_port: Option<u16>,

    /// SSL directory
    #[arg(long, env = "SSLDIR")]
    ssldir: Option<PathBuf>,

    /// Seconds to wait for the CA to sign the request
    #[arg(long, env = "WAITFORCERT")]
    waitforcert: Option<u64>,

    /// Seconds between polls for the signed certificate
    #[arg(long, env = "CERTBOOT_POLL_INTERVAL")]
    poll_interval: Option<u64>,

    /// Comma-separated DNS alternative names to request
    #[arg(long, env = "DNS_ALT_NAMES")]
    dns_alt_names: Option<String>,

    /// Connection attempts per CA request
    #[arg(long, default_value_t = 5)]
    retry_attempts: u32,

    /// Seconds between connection attempts
    #[arg(long, default_value_t = 2)]
    retry_delay: u64,

    /// Log format
    #[arg(long, env = "CERTBOOT_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.log_format) {
        eprintln!("failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    let log_format = cli.log_format;
    match run(cli).await {
        Ok(report) => {
            print_report(&report, log_format);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, exit_code = e.exit_code(), "Enrollment failed");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<EnrollmentReport, EnrollError> {
    let inputs = ConfigInputs {
        certname: cli.certname,
        certname_env: std::env::var("CERTNAME").ok(),
        ca_host: cli.ca_host,
        ca_port: cli.ca_port,
        ssl_root: cli.ssldir,
        wait_timeout_secs: cli.waitforcert,
        poll_interval_secs: cli.poll_interval,
        dns_alt_names: cli.dns_alt_names,
        retry: Some(RetryPolicy {
            attempts: cli.retry_attempts,
            delay: Duration::from_secs(cli.retry_delay),
        }),
    };
    let config = EnrollmentConfig::resolve(inputs, local_hostname)?;

    info!(
        certname = %config.certname,
        ca = %config.ca_base_url(),
        wait_timeout_secs = config.wait_timeout_secs,
        dns_alt_names = ?config.dns_alt_names,
        "Configuration resolved"
    );

    let client = HttpCaClient::new(&config)
        .map_err(|e| EnrollError::TrustBootstrap(e.to_string()))?;
    let mut enrollment = Enrollment::new(config, client, TokioWaiter);
    enrollment.run().await
}

fn local_hostname() -> Option<String> {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .map(|name| name.to_lowercase())
}

fn init_tracing(format: LogFormat) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
}

fn print_report(report: &EnrollmentReport, format: LogFormat) {
    match format {
        LogFormat::Json => match serde_json::to_string(report) {
            Ok(json) => println!("{}", json),
            Err(e) => error!(error = %e, "Failed to serialize enrollment report"),
        },
        LogFormat::Text => {
            println!("Enrolled:");
            println!("  Certname:    {}", report.certname);
            println!("  Certificate: {}", report.certificate_path.display());
            println!("  Subject:     {}", report.subject);
            println!("  Issuer:      {}", report.issuer);
            println!("  Serial:      {}", report.serial);
            if let Some(not_after) = report.not_after {
                println!("  Expires:     {}", not_after.to_rfc3339());
            }
        }
    }
}
