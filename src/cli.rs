use std::path::PathBuf;
use clap::{Parser, ValueEnum};

pub const DEFAULT_CONFIG_FILE: &str = "filemon.toml";

#[derive(Parser)]
#[command(name = "filemon")]
#[command(version)]
#[command(about = "Poll-based file presence monitor with optional cleanup")]
#[command(long_about = "filemon periodically scans configured files and directories, reports entries matching glob rules and can delete them. Scans are gated by a check interval and an optional hour-of-day window.")]
pub struct Cli {
    /// Configuration file
    #[arg(value_name = "CONFIG", help = "TOML configuration (defaults to ./filemon.toml)")]
    pub config: Option<PathBuf>,

    /// Run a single pass and exit
    #[arg(long, help = "Run one pass and exit")]
    pub once: bool,

    /// Heartbeat between refresh attempts in milliseconds
    #[arg(long, default_value = "1000", help = "Polling heartbeat in ms")]
    pub poll_interval: u64,

    /// Output format for reports
    #[arg(long, default_value = "text", help = "Output format")]
    pub output: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Section report text (default)
    Text,
    /// One JSON document per pass
    Json,
}

impl Cli {
    pub fn get_config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    pub fn setup_logging(&self) {
        let level = if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        };

        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_writer(std::io::stderr)
            .init();
    }

    pub fn validate(&self) -> Result<(), String> {
        let path = self.get_config_path();

        if !path.is_file() {
            return Err(format!("Configuration file does not exist: {}", path.display()));
        }

        if self.poll_interval == 0 {
            return Err("Poll interval must be greater than 0".to_string());
        }

        Ok(())
    }
}
