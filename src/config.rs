use clap::Parser;
use std::path::PathBuf;

const DEFAULT_LOG_LEVEL: &str = "warn";

/// Startup settings for the sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "nuclassd")]
#[command(about = "NU:CLASS roster sidecar (JSON lines over stdio)")]
#[command(version)]
pub struct Config {
    /// Workspace to open before the first request
    #[arg(long, env = "NUCLASSD_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Tracing filter, e.g. `info` or `nuclassd=debug`; falls back to RUST_LOG
    #[arg(long, env = "NUCLASSD_LOG")]
    pub log_level: Option<String>,
}

impl Config {
    pub fn load() -> Self {
        Self::parse()
    }

    /// Filter directive for the subscriber.
    pub fn log_filter(&self) -> String {
        self.log_level
            .clone()
            .or_else(|| std::env::var("RUST_LOG").ok())
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
    }
}

/// Compact logs on stderr; stdout carries the IPC responses.
pub fn init_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
