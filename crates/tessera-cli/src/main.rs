//! tessera-join: join a group through an invite link.
//!
//! Parses the invite link, runs the join workflow against the group
//! service daemon, and reports the result through stdout/stderr and the
//! process exit code.

mod config;
mod report;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tessera_join::rpc::RpcGroupService;
use tessera_types::Identity;
use tracing::{debug, info};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;
use crate::report::{exit, OutputFormat};

#[derive(Parser)]
#[command(name = "tessera-join", about = "Join a group through an invite link")]
struct Cli {
    /// Group invitation link.
    #[arg(long)]
    uri: String,

    /// Path to a TOML configuration file.
    #[arg(long, env = "TESSERA_CONFIG")]
    config: Option<PathBuf>,

    /// Group service daemon socket (overrides the config file).
    #[arg(long, env = "TESSERA_SOCKET")]
    socket: Option<PathBuf>,

    /// Account to join as (overrides the config file).
    #[arg(long, env = "TESSERA_ACCOUNT")]
    account: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "TESSERA_LOG_LEVEL")]
    log_level: Option<String>,

    /// Output format for the join result.
    #[arg(long, value_enum, default_value_t = OutputFormat::Plain)]
    output: OutputFormat,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(exit::FAILURE)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<u8> {
    let config = CliConfig::load(cli.config.as_deref())?;
    init_tracing(cli.log_level.as_deref().unwrap_or(&config.logging.log_level))?;

    let link = match tessera_invite::parse(&cli.uri) {
        Ok(link) => link,
        Err(e) => {
            debug!(error = %e, "invite link rejected");
            return Ok(report::link_error(&e).emit());
        }
    };

    let account = cli
        .account
        .as_deref()
        .or_else(|| config.identity())
        .context("no account configured; pass --account or set account.identity")?;
    let requester = Identity::new(account)?;

    let socket_path = cli.socket.unwrap_or_else(|| config.socket_path());
    info!(socket = %socket_path.display(), "using group service daemon");
    let service = RpcGroupService::new(socket_path, config.timeout())?;

    let report = match tessera_join::run(&link, &requester, &service) {
        Ok(outcome) => report::outcome(&outcome, cli.output),
        Err(e) => report::join_error(&e),
    };
    Ok(report.emit())
}

/// Initialize tracing to stderr.
///
/// `RUST_LOG` takes precedence; otherwise `level` applies to all Tessera crates.
fn init_tracing(level: &str) -> anyhow::Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(log_filter(rust_log.as_deref(), level)?)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;
    Ok(())
}

/// Build the log filter from `RUST_LOG` when it is set and valid, else from `level`.
fn log_filter(rust_log: Option<&str>, level: &str) -> anyhow::Result<EnvFilter> {
    if let Some(filter) = rust_log.and_then(|directives| EnvFilter::try_new(directives).ok()) {
        return Ok(filter);
    }
    let directive: Directive = format!("tessera={level}")
        .parse()
        .with_context(|| format!("invalid log level {level:?}"))?;
    Ok(EnvFilter::default().add_directive(directive))
}
