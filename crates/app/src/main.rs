use std::fmt;
use std::path::PathBuf;

use drill_core::leaderboard::{DurationFilter, LeaderboardMetric};
use drill_core::modes::PracticeMode;
use services::{AppServices, Clock};
use storage::EphemeralStore;
use tracing::{info, warn};

mod commands;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidMode { raw: String },
    InvalidDuration { raw: String },
    InvalidMetric { raw: String },
    InvalidFilter { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidMode { raw } => write!(f, "invalid --mode value: {raw}"),
            ArgsError::InvalidDuration { raw } => write!(f, "invalid --duration value: {raw}"),
            ArgsError::InvalidMetric { raw } => write!(f, "invalid --metric value: {raw}"),
            ArgsError::InvalidFilter { raw } => write!(f, "invalid --filter value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- play          [--mode <mode>] [--duration <secs>] [common]");
    eprintln!("  cargo run -p app -- leaderboard   [--mode <mode>] [--metric <m>] [--filter <f>] [common]");
    eprintln!("  cargo run -p app -- history       [common]");
    eprintln!("  cargo run -p app -- clear-history [common]");
    eprintln!();
    eprintln!("Common options:");
    eprintln!("  --db <sqlite_url>     default sqlite:drill.sqlite3");
    eprintln!("  --legacy <json_file>  legacy key/value dump to migrate");
    eprintln!();
    eprintln!("Modes: {}", mode_list());
    eprintln!("Metrics: speed, percentile, combined. Filters: all or a duration in seconds.");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  DRILL_DB_URL, DRILL_MODE, DRILL_LEGACY_STORE, RUST_LOG");
}

fn mode_list() -> String {
    PracticeMode::ALL
        .iter()
        .map(|m| m.slug())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Play,
    Leaderboard,
    History,
    ClearHistory,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "play" => Some(Self::Play),
            "leaderboard" => Some(Self::Leaderboard),
            "history" => Some(Self::History),
            "clear-history" => Some(Self::ClearHistory),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Args {
    db_url: String,
    legacy: Option<PathBuf>,
    mode: Option<PracticeMode>,
    duration: Option<u32>,
    metric: Option<LeaderboardMetric>,
    filter: Option<DurationFilter>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            db_url: std::env::var("DRILL_DB_URL")
                .ok()
                .map_or_else(|| normalize_sqlite_url("sqlite:drill.sqlite3".into()), normalize_sqlite_url),
            legacy: std::env::var_os("DRILL_LEGACY_STORE").map(PathBuf::from),
            mode: std::env::var("DRILL_MODE")
                .ok()
                .and_then(|value| value.parse().ok()),
            ..Self::default()
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = normalize_sqlite_url(value);
                }
                "--legacy" => {
                    parsed.legacy = Some(PathBuf::from(require_value(args, "--legacy")?));
                }
                "--mode" => {
                    let value = require_value(args, "--mode")?;
                    let mode = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidMode { raw: value.clone() })?;
                    parsed.mode = Some(mode);
                }
                "--duration" => {
                    let value = require_value(args, "--duration")?;
                    let secs: u32 = value
                        .parse()
                        .ok()
                        .filter(|s| *s > 0)
                        .ok_or_else(|| ArgsError::InvalidDuration { raw: value.clone() })?;
                    parsed.duration = Some(secs);
                }
                "--metric" => {
                    let value = require_value(args, "--metric")?;
                    let metric = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidMetric { raw: value.clone() })?;
                    parsed.metric = Some(metric);
                }
                "--filter" => {
                    let value = require_value(args, "--filter")?;
                    let filter = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidFilter { raw: value.clone() })?;
                    parsed.filter = Some(filter);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Create the database file and its directory so `SQLite` can open it.
///
/// Failures are left for the gateway to report; it falls back to the ephemeral store.
fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // Default behavior: play a round when no subcommand is provided.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Play,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Play,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let fallback = match &parsed.legacy {
        Some(path) => EphemeralStore::load_json_file(path)?,
        None => EphemeralStore::new(),
    };

    if let Err(err) = prepare_sqlite_file(&parsed.db_url) {
        warn!(db_url = %parsed.db_url, error = %err, "cannot prepare database file");
    }
    let services = AppServices::new_sqlite(&parsed.db_url, Clock::default_clock(), fallback).await;
    let migration = services.migration();
    if migration.sessions_copied > 0 || migration.settings_copied > 0 {
        println!(
            "Migrated {} sessions and {} settings from the legacy store.",
            migration.sessions_copied, migration.settings_copied
        );
    }
    info!(status = %services.storage_status(), "storage ready");

    match cmd {
        Command::Play => commands::play(&services, parsed.mode, parsed.duration).await?,
        Command::Leaderboard => {
            commands::leaderboard(&services, parsed.mode, parsed.metric, parsed.filter).await;
        }
        Command::History => commands::history(&services).await,
        Command::ClearHistory => commands::clear_history(&services).await,
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
