//! # Email Herald CLI
//!
//! Command-line interface for the Email Herald library (`email_herald_core`).
//! This binary parses arguments, sets up configuration, and drives the
//! validation, discovery, dispatch and scheduling operations.

use email_herald_core::{
    initialize_discovery, initialize_validator, validate_addresses, Config, ConfigBuilder,
    EmailDispatcher, EmailScheduler, SmtpCredentials,
};

// Dependencies specific to the CLI binary
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Validates email deliverability, harvests addresses from websites, and schedules bulk sends.",
    long_about = "Email Herald validates addresses through syntax, DNS, MX and SMTP-probe stages, \
                  crawls company domains for published addresses, dispatches bulk mail through an \
                  authenticated relay, and keeps a durable schedule of future sends."
)]
struct AppArgs {
    /// Path to a configuration file (TOML format) to load settings from. CLI args override file settings.
    #[arg(long, global = true, env = "EMAIL_HERALD_CONFIG")]
    config_file: Option<String>,

    /// DNS resolution timeout in seconds.
    #[arg(long, global = true, env = "EMAIL_HERALD_DNS_TIMEOUT")]
    dns_timeout: Option<u64>,

    /// Comma-separated list of DNS servers to use for lookups.
    #[arg(long, global = true, value_delimiter = ',', env = "EMAIL_HERALD_DNS_SERVERS")]
    dns_servers: Option<Vec<String>>,

    /// HTTP request timeout in seconds.
    #[arg(long, global = true, env = "EMAIL_HERALD_REQUEST_TIMEOUT")]
    request_timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate one or more email addresses.
    Validate {
        /// Addresses to validate. Omit to read from --input instead.
        emails: Vec<String>,

        /// Path to a JSON file containing an array of addresses.
        #[arg(short, long, env = "EMAIL_HERALD_INPUT")]
        input: Option<String>,

        /// Skip the SMTP mailbox probe (faster; caps confidence at 75).
        #[arg(long, default_value = "false")]
        skip_smtp: bool,

        /// Path to write results as JSON. Prints to stdout when omitted.
        #[arg(short, long, env = "EMAIL_HERALD_OUTPUT")]
        output: Option<String>,
    },

    /// Crawl a domain for published addresses and generate role-based guesses.
    Discover {
        /// Domain or website URL to crawl.
        domain: String,

        /// Maximum number of conventional pages to fetch.
        #[arg(long, env = "EMAIL_HERALD_MAX_PAGES")]
        max_pages: Option<usize>,

        /// Run generated patterns through the validator.
        #[arg(long, default_value = "false")]
        verify_patterns: bool,

        /// Skip the SMTP probe when verifying patterns.
        #[arg(long, default_value = "false")]
        skip_smtp: bool,

        /// Path to write results as JSON. Prints to stdout when omitted.
        #[arg(short, long, env = "EMAIL_HERALD_OUTPUT")]
        output: Option<String>,
    },

    /// Send a message to one or more recipients immediately.
    Send {
        /// Recipient addresses.
        #[arg(long = "to", required = true)]
        recipients: Vec<String>,

        /// Message subject line.
        #[arg(long)]
        subject: String,

        /// Message body text.
        #[arg(long)]
        body: String,

        /// Treat the body as HTML instead of plain text.
        #[arg(long, default_value = "false")]
        html: bool,

        /// Seconds to pause between consecutive sends (overrides config).
        #[arg(long, env = "EMAIL_HERALD_SEND_DELAY")]
        delay: Option<f32>,

        #[command(flatten)]
        smtp: SmtpArgs,
    },

    /// Verify SMTP host and credentials without sending any mail.
    TestConnection {
        #[command(flatten)]
        smtp: SmtpArgs,
    },

    /// Manage the durable send schedule.
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },
}

#[derive(Subcommand, Debug)]
enum ScheduleAction {
    /// Queue a send for a future time.
    Add {
        /// Recipient addresses.
        #[arg(long = "to", required = true)]
        recipients: Vec<String>,

        /// Message subject line.
        #[arg(long)]
        subject: String,

        /// Message body text.
        #[arg(long)]
        body: String,

        /// Treat the body as HTML instead of plain text.
        #[arg(long, default_value = "false")]
        html: bool,

        /// When to send, as an RFC 3339 timestamp (e.g. 2026-09-01T09:00:00Z).
        #[arg(long)]
        at: String,

        #[command(flatten)]
        smtp: SmtpArgs,
    },

    /// List every job in the schedule.
    List,

    /// Cancel a pending job by id.
    Cancel {
        /// The job id reported by `schedule add`.
        id: String,
    },

    /// Remove every finished job from the schedule.
    Clear,

    /// Run the scheduler service until interrupted.
    Run,
}

/// Relay credentials shared by the sending commands.
#[derive(Args, Debug)]
struct SmtpArgs {
    /// SMTP relay hostname.
    #[arg(long, env = "EMAIL_HERALD_SMTP_HOST")]
    smtp_host: String,

    /// SMTP relay port (STARTTLS).
    #[arg(long, default_value_t = 587, env = "EMAIL_HERALD_SMTP_PORT")]
    smtp_port: u16,

    /// Sender email address, also used as the login username.
    #[arg(long, env = "EMAIL_HERALD_SMTP_EMAIL")]
    smtp_email: String,

    /// Password or app password for the relay account.
    #[arg(long, env = "EMAIL_HERALD_SMTP_PASSWORD")]
    smtp_password: String,
}

impl From<SmtpArgs> for SmtpCredentials {
    fn from(args: SmtpArgs) -> Self {
        SmtpCredentials {
            host: args.smtp_host,
            port: args.smtp_port,
            email: args.smtp_email,
            password: args.smtp_password,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_thread_names(true)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Setting up tracing subscriber failed")?;

    tracing::info!(
        "Email Herald CLI v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let args = AppArgs::parse();
    tracing::debug!("Parsed CLI arguments: {:?}", args);

    let mut config_builder = ConfigBuilder::new();
    if let Some(ref path) = args.config_file {
        config_builder = config_builder.config_file(path);
    }
    if let Some(t) = args.dns_timeout {
        config_builder = config_builder.dns_timeout(Duration::from_secs(t));
    }
    if let Some(ref servers) = args.dns_servers {
        if !servers.is_empty() {
            config_builder = config_builder.dns_servers(servers.clone());
        }
    }
    if let Some(t) = args.request_timeout {
        config_builder = config_builder.request_timeout(Duration::from_secs(t));
    }

    let config = match config_builder.build() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            tracing::error!("Configuration error: {}", e);
            return Err(anyhow::anyhow!("Failed to build configuration: {}", e));
        }
    };
    tracing::debug!("Effective configuration loaded: {:?}", *config);

    match args.command {
        Command::Validate {
            emails,
            input,
            skip_smtp,
            output,
        } => run_validate(config, emails, input, skip_smtp, output).await,
        Command::Discover {
            domain,
            max_pages,
            verify_patterns,
            skip_smtp,
            output,
        } => run_discover(config, domain, max_pages, verify_patterns, skip_smtp, output).await,
        Command::Send {
            recipients,
            subject,
            body,
            html,
            delay,
            smtp,
        } => run_send(config, recipients, subject, body, html, delay, smtp.into()).await,
        Command::TestConnection { smtp } => run_test_connection(smtp.into()).await,
        Command::Schedule { action } => run_schedule(config, action).await,
    }
}

async fn run_validate(
    config: Arc<Config>,
    emails: Vec<String>,
    input: Option<String>,
    skip_smtp: bool,
    output: Option<String>,
) -> Result<()> {
    let emails = if let Some(ref path) = input {
        if !emails.is_empty() {
            return Err(anyhow::anyhow!(
                "Pass addresses either on the command line or via --input, not both"
            ));
        }
        load_addresses(path)?
    } else {
        emails
    };
    if emails.is_empty() {
        return Err(anyhow::anyhow!(
            "No addresses given. Pass them as arguments or via --input."
        ));
    }

    let validator = initialize_validator(config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize validator: {}", e))?;

    tracing::info!(
        "Validating {} address(es) (SMTP probe: {})...",
        emails.len(),
        if skip_smtp { "off" } else { "on" }
    );
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .context("Failed to set progress bar template")?,
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!("Validating {} address(es)...", emails.len()));

    let results = validate_addresses(&validator, &emails, !skip_smtp).await;
    let valid_count = results.iter().filter(|r| r.is_valid).count();
    pb.finish_with_message(format!("{}/{} valid", valid_count, results.len()));

    emit_json(&results, output.as_deref())?;
    tracing::info!(
        "Validation finished: {}/{} addresses valid.",
        valid_count,
        results.len()
    );
    Ok(())
}

async fn run_discover(
    config: Arc<Config>,
    domain: String,
    max_pages: Option<usize>,
    verify_patterns: bool,
    skip_smtp: bool,
    output: Option<String>,
) -> Result<()> {
    let max_pages = max_pages.unwrap_or(config.max_pages);
    let discovery = initialize_discovery(config.clone())
        .map_err(|e| anyhow::anyhow!("Failed to initialize discovery: {}", e))?;

    let mut result = discovery
        .discover(&domain, max_pages)
        .await
        .map_err(|e| anyhow::anyhow!("Discovery failed for '{}': {}", domain, e))?;

    if verify_patterns && !result.common_patterns.is_empty() {
        tracing::info!(
            "Verifying {} generated pattern(s)...",
            result.common_patterns.len()
        );
        let validator = initialize_validator(config)
            .map_err(|e| anyhow::anyhow!("Failed to initialize validator: {}", e))?;
        let verification = discovery
            .verify_patterns(&result.common_patterns, &validator, !skip_smtp)
            .await;
        // Keep only patterns that held up under verification.
        result.common_patterns = verification
            .valid
            .iter()
            .map(|v| v.email.clone())
            .collect();
        tracing::info!(
            "Pattern verification: {}/{} held up.",
            verification.valid.len(),
            verification.total_checked
        );
    }

    emit_json(&result, output.as_deref())?;
    tracing::info!(
        "Discovery finished: {} address(es) found on {} page(s).",
        result.emails_found.len(),
        result.pages_scanned.len()
    );
    Ok(())
}

async fn run_send(
    config: Arc<Config>,
    recipients: Vec<String>,
    subject: String,
    body: String,
    html: bool,
    delay: Option<f32>,
    credentials: SmtpCredentials,
) -> Result<()> {
    let dispatcher = EmailDispatcher::new(credentials);
    tracing::info!("Sending to {} recipient(s)...", recipients.len());
    let results = dispatcher
        .send_many(
            &recipients,
            &subject,
            &body,
            html,
            delay.unwrap_or(config.send_delay),
        )
        .await
        .map_err(|e| anyhow::anyhow!("Send failed: {}", e))?;

    let delivered = results.iter().filter(|r| r.success).count();
    emit_json(&results, None)?;
    tracing::info!("Send finished: {}/{} delivered.", delivered, results.len());
    if delivered < results.len() {
        return Err(anyhow::anyhow!(
            "{} of {} sends failed",
            results.len() - delivered,
            results.len()
        ));
    }
    Ok(())
}

async fn run_test_connection(credentials: SmtpCredentials) -> Result<()> {
    let host = credentials.host.clone();
    let port = credentials.port;
    let dispatcher = EmailDispatcher::new(credentials);
    dispatcher
        .test_connection()
        .await
        .map_err(|e| anyhow::anyhow!("Connection test failed: {}", e))?;
    println!("Connection to {}:{} succeeded.", host, port);
    Ok(())
}

async fn run_schedule(config: Arc<Config>, action: ScheduleAction) -> Result<()> {
    let scheduler = EmailScheduler::with_smtp_dispatch(&config);

    match action {
        ScheduleAction::Add {
            recipients,
            subject,
            body,
            html,
            at,
            smtp,
        } => {
            let send_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&at)
                .with_context(|| format!("'{}' is not an RFC 3339 timestamp", at))?
                .with_timezone(&Utc);
            let job_id = scheduler
                .schedule(recipients, subject, body, send_at, smtp.into(), html)
                .map_err(|e| anyhow::anyhow!("Failed to schedule job: {}", e))?;
            println!("Scheduled job {} for {}.", job_id, send_at);
        }
        ScheduleAction::List => {
            let jobs = scheduler
                .list_jobs()
                .map_err(|e| anyhow::anyhow!("Failed to read the schedule: {}", e))?;
            emit_json(&jobs, None)?;
        }
        ScheduleAction::Cancel { id } => {
            let cancelled = scheduler
                .cancel(&id)
                .map_err(|e| anyhow::anyhow!("Failed to cancel job '{}': {}", id, e))?;
            if cancelled {
                println!("Cancelled job {}.", id);
            } else {
                return Err(anyhow::anyhow!(
                    "Job '{}' was not found or is no longer pending",
                    id
                ));
            }
        }
        ScheduleAction::Clear => {
            scheduler
                .clear_completed()
                .map_err(|e| anyhow::anyhow!("Failed to clear finished jobs: {}", e))?;
            println!("Removed all finished jobs from the schedule.");
        }
        ScheduleAction::Run => {
            scheduler.start();
            tracing::info!("Scheduler running (store: {}). Press Ctrl-C to stop.", config.jobs_file);
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for the interrupt signal")?;
            tracing::info!("Interrupt received, shutting down...");
            scheduler.stop().await;
        }
    }
    Ok(())
}

fn load_addresses(file_path: &str) -> Result<Vec<String>> {
    tracing::debug!("Opening input file: {}", file_path);
    let file = File::open(file_path)
        .with_context(|| format!("Failed to open input file '{}'", file_path))?;
    let reader = BufReader::new(file);
    let addresses: Vec<String> = serde_json::from_reader(reader).with_context(|| {
        format!(
            "Failed to parse JSON from '{}'. Ensure it's an array of address strings.",
            file_path
        )
    })?;
    Ok(addresses)
}

/// Writes a value as pretty JSON to the given path, or stdout when none.
fn emit_json<T: serde::Serialize>(value: &T, output: Option<&str>) -> Result<()> {
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file '{}'", path))?;
            let writer = BufWriter::new(file);
            serde_json::to_writer_pretty(writer, value)
                .with_context(|| format!("Failed to serialize results to JSON for '{}'", path))?;
            tracing::info!("Results saved to '{}'.", path);
        }
        None => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
    }
    Ok(())
}
