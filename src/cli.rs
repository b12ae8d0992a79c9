//! Command-line interface definitions using clap derive macros.
//!
//! Contains the top-level [`Cli`] parser, the [`Commands`] enum for
//! subcommands (run, validate, health), and their associated argument
//! structs. Every flag has an environment variable equivalent for
//! container deployments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_USER_AGENT: &str = "Stratum-Server/1.0 (github.com/PythonicVarun/Stratum)";

#[derive(Parser)]
#[command(
    name = "stratum",
    version,
    about = "Read-only HTTP gateway over databases and APIs, fronted by Redis",
    propagate_version = true,
    after_help = "\x1b[1mQuick start:\x1b[0m\n  \
        stratum run -c stratum.yaml          Start with a config file\n  \
        stratum run                          Start from PROJECT_{n}_* env vars\n  \
        stratum validate -c stratum.yaml     Check a config without starting"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway
    Run(Box<RunArgs>),

    /// Validate configuration without starting
    Validate(ValidateArgs),

    /// Check health of a running instance
    Health(HealthArgs),
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        stratum run -c stratum.yaml                          Config file\n  \
        stratum run -c stratum.yaml -p 9000 --pretty         Local dev mode\n  \
        stratum run --redis-url redis://cache:6379           With a Redis cache")]
pub struct RunArgs {
    /// Config file path (.yaml, .json, .toml); env scanning when absent
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Listen port [default: 8080]
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Listen port used when neither --port nor PORT is given
    #[arg(long, env = "SERVER_PORT", hide = true)]
    pub server_port: Option<u16>,

    /// Listen address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Redis URL for the response cache; caching is disabled when absent
    #[arg(long, env = "REDIS_URL", help_heading = "Cache")]
    pub redis_url: Option<String>,

    // -- Outbound --
    /// User-Agent sent to APIs and indirect URLs; empty to send none
    #[arg(
        long,
        env = "API_CLIENT_USER_AGENT",
        default_value = DEFAULT_USER_AGENT,
        help_heading = "Outbound"
    )]
    pub user_agent: String,

    /// Outbound request timeout in milliseconds
    #[arg(
        long,
        env = "UPSTREAM_TIMEOUT_MS",
        default_value_t = 10_000,
        help_heading = "Outbound"
    )]
    pub upstream_timeout: u64,

    // -- Database --
    /// Max connections per database pool
    #[arg(
        long,
        env = "DB_MAX_CONNECTIONS",
        default_value_t = 10,
        help_heading = "Database"
    )]
    pub db_max_connections: u32,

    /// Pool acquire timeout in milliseconds
    #[arg(
        long,
        env = "DB_ACQUIRE_TIMEOUT_MS",
        default_value_t = 5_000,
        help_heading = "Database"
    )]
    pub db_acquire_timeout: u64,

    // -- Logging --
    /// Log level
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Force pretty (human-readable) log output
    #[arg(long)]
    pub pretty: bool,

    /// Force JSON log output (overrides TTY detection)
    #[arg(long, conflicts_with = "pretty")]
    pub json: bool,
}

impl RunArgs {
    /// `--port`, then `PORT`, then `SERVER_PORT`, then the default.
    #[must_use]
    pub fn listen_port(&self) -> u16 {
        self.port.or(self.server_port).unwrap_or(DEFAULT_PORT)
    }
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Config file to validate; env scanning when absent
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: ValidateFormat,
}

#[derive(Args)]
pub struct HealthArgs {
    /// URL of the running instance
    #[arg(default_value = "http://localhost:8080")]
    pub url: String,
}

#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
pub enum ValidateFormat {
    Text,
    Json,
}
