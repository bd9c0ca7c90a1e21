//! CLI argument definitions using Clap

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

/// viva-recorder - timed spoken-response capture
#[derive(Parser, Debug)]
#[command(name = "viva-recorder")]
#[command(version)]
#[command(about = "Record timed spoken responses with an optional preparation phase")]
#[command(long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record one response
    Record(RecordArgs),
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// List audio input devices
    Devices,
}

/// Options for `record`
#[derive(Args, Debug, Clone, Default)]
pub struct RecordArgs {
    /// Speaking time limit (e.g., 30s, 1m, 2m30s)
    #[arg(short = 't', long, value_name = "TIME")]
    pub time_limit: Option<String>,

    /// Preparation window before speaking; makes the question two-phase
    #[arg(short = 'p', long, value_name = "TIME")]
    pub prep: Option<String>,

    /// Offer to discard and record again after each take
    #[arg(long, conflicts_with = "no_re_record")]
    pub allow_re_record: bool,

    /// Keep the first recorded response
    #[arg(long)]
    pub no_re_record: bool,

    /// Output file (defaults to <output_dir>/response-<id>.<ext>)
    #[arg(short, long, value_name = "PATH")]
    pub out: Option<PathBuf>,

    /// Write raw 16-bit PCM instead of FLAC
    #[arg(long)]
    pub raw: bool,

    /// Record a generated tone instead of the microphone
    #[arg(long)]
    pub synthetic: bool,

    /// Input device name (see `viva-recorder devices`)
    #[arg(long, value_name = "NAME", conflicts_with = "synthetic")]
    pub device: Option<String>,
}

impl RecordArgs {
    /// Re-record flag as a config override
    pub fn allow_re_record(&self) -> Option<bool> {
        match (self.allow_re_record, self.no_re_record) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

/// Valid config keys
pub const VALID_CONFIG_KEYS: &[&str] = &[
    "time_limit",
    "preparation",
    "speaking_default",
    "allow_re_record",
    "tick_interval_ms",
    "sample_buffer_len",
    "output_dir",
];

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
}
