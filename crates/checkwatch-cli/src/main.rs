//! checkwatch - watch the CI checks of a revision until they settle.
//!
//! ## Commands
//!
//! - `summarize`: aggregate one check payload and print the verdict
//! - `watch`: poll a check payload file until every check is terminal

mod provider;
mod render;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use checkwatch_core::{
    aggregate, init_tracing, ChannelSink, LogFormat, PollConfig, PollSession, RevisionKey,
    SessionEvent, SessionPhase,
};
use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, Level};

use crate::provider::{read_checks, JsonFileProvider};
use crate::render::{render_result, OutputFormat};

#[derive(Parser)]
#[command(name = "checkwatch")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Consolidated CI check status for a revision", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate a check payload once and print the result
    Summarize {
        /// Path to a JSON check payload
        #[arg(short, long)]
        checks: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Poll a check payload until every check is terminal
    Watch {
        /// Path to a JSON check payload, re-read on every poll
        #[arg(short, long)]
        checks: PathBuf,

        /// Revision to watch, as <repo>@<commit-sha>
        #[arg(short, long)]
        revision: RevisionKey,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        #[command(flatten)]
        poll: PollArgs,
    },
}

/// Poll settings; flags and environment override the config file.
#[derive(Args, Debug, Default)]
struct PollArgs {
    /// TOML file with poll settings
    #[arg(long, env = "CHECKWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Seconds between polls
    #[arg(long, env = "CHECKWATCH_INTERVAL_SECS")]
    interval_secs: Option<f64>,

    /// Give up after this many consecutive fetch failures
    #[arg(long, env = "CHECKWATCH_MAX_FAILURES")]
    max_failures: Option<u32>,

    /// Multiply the retry delay by this factor per consecutive failure
    #[arg(long, env = "CHECKWATCH_BACKOFF_FACTOR")]
    backoff_factor: Option<f64>,

    /// Upper bound on the retry delay, in seconds
    #[arg(long, env = "CHECKWATCH_MAX_DELAY_SECS")]
    max_delay_secs: Option<f64>,
}

impl PollArgs {
    /// Resolve file < env/flags into a validated config.
    fn resolve(&self) -> Result<PollConfig> {
        let mut config = match &self.config {
            Some(path) => PollConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => PollConfig::default(),
        };
        if let Some(secs) = self.interval_secs {
            config.interval = seconds("interval-secs", secs)?;
        }
        if let Some(max) = self.max_failures {
            config.retry.max_consecutive_failures = Some(max);
        }
        if let Some(factor) = self.backoff_factor {
            config.retry.backoff_factor = factor;
        }
        if let Some(secs) = self.max_delay_secs {
            config.retry.max_delay = seconds("max-delay-secs", secs)?;
        }
        config.validate()?;
        Ok(config)
    }
}

fn seconds(flag: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).with_context(|| format!("--{flag} {secs} is not a valid duration"))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    let format = if cli.json { LogFormat::Json } else { LogFormat::Text };
    init_tracing(format, level);

    let verdict = match cli.command {
        Commands::Summarize { checks, format } => cmd_summarize(&checks, format).await?,
        Commands::Watch {
            checks,
            revision,
            format,
            poll,
        } => cmd_watch(checks, revision, format, &poll).await?,
    };
    Ok(verdict.exit_code())
}

/// How a command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Passed,
    Failed,
    Interrupted,
}

impl Verdict {
    fn from_passing(passing: bool) -> Self {
        if passing {
            Verdict::Passed
        } else {
            Verdict::Failed
        }
    }

    fn exit_code(self) -> ExitCode {
        match self {
            Verdict::Passed => ExitCode::SUCCESS,
            Verdict::Failed => ExitCode::FAILURE,
            Verdict::Interrupted => ExitCode::from(130),
        }
    }
}

async fn cmd_summarize(checks: &Path, format: OutputFormat) -> Result<Verdict> {
    let set = read_checks(checks)
        .await
        .with_context(|| format!("reading {}", checks.display()))?;
    let result = aggregate(&set.checks);
    for warning in &result.decode_errors {
        eprintln!("warning: {warning}");
    }
    println!("{}", render_result(format, None, &result)?);
    Ok(Verdict::from_passing(result.is_passing()))
}

async fn cmd_watch(
    checks: PathBuf,
    revision: RevisionKey,
    format: OutputFormat,
    poll: &PollArgs,
) -> Result<Verdict> {
    let config = poll.resolve()?;
    let (sink, mut events) = ChannelSink::new();
    let session = PollSession::builder(Arc::new(JsonFileProvider::new(checks)))
        .sink(Arc::new(sink))
        .config(config)
        .build()?;

    info!(revision = %revision, "watching checks");
    session.start(revision);

    let mut stdout = io::stdout();
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                report_event(&mut stdout, format, event)?;
                if !session.is_active() {
                    drain_events(&mut stdout, format, &mut events)?;
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                session.stop();
                eprintln!("interrupted");
                return Ok(Verdict::Interrupted);
            }
        }
    }

    let snapshot = session.snapshot();
    if snapshot.phase == SessionPhase::Exhausted {
        eprintln!(
            "giving up after {} consecutive fetch failures",
            snapshot.consecutive_failures
        );
    }
    let passing = snapshot.phase == SessionPhase::Complete
        && snapshot.last_result.is_some_and(|r| r.is_passing());
    Ok(Verdict::from_passing(passing))
}

/// Print one session event: results to `out`, warnings and errors to stderr.
fn report_event(out: &mut impl Write, format: OutputFormat, event: SessionEvent) -> Result<()> {
    match event {
        SessionEvent::Result { origin, result } => {
            for warning in &result.decode_errors {
                eprintln!("warning: {warning}");
            }
            writeln!(out, "{}", render_result(format, Some(&origin), &result)?)?;
        }
        SessionEvent::Error { error, .. } => eprintln!("fetch failed: {error}"),
    }
    Ok(())
}

/// Report every event already queued. Returns how many were reported.
fn drain_events(
    out: &mut impl Write,
    format: OutputFormat,
    events: &mut UnboundedReceiver<SessionEvent>,
) -> Result<usize> {
    let mut reported = 0;
    while let Ok(event) = events.try_recv() {
        report_event(out, format, event)?;
        reported += 1;
    }
    Ok(reported)
}
