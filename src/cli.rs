// CLI definitions using clap

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ds-mapper")]
#[command(author, version, about = "DualSense to keyboard/mouse mapper")]
pub struct Cli {
    /// Config file path (default: ~/.config/ds-mapper/config.toml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Auto-detect devices, ignoring paths from the config
    #[arg(short, long)]
    pub auto: bool,
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(crate::config::MappingConfig::default_path)
    }

    /// Default log filter when RUST_LOG is unset
    pub fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}
