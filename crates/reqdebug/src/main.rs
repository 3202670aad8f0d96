// reqdebug - Request-scoped debugging toolkit
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! reqdebug - Request-scoped debugging toolkit
//!
//! Renders JSON documents as collapsible dump trees, prints value markers and sends
//! webhook notifications with the same configuration hosts use.

use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand, ValueEnum};
use eyre::{Result, WrapErr};
use reqdebug_common::{DebugConfig, OutputFormat};
use reqdebug_engine::{DumpValue, OutputSession, RequestInfo};

/// Command-line interface for reqdebug
#[derive(Debug, Parser)]
#[command(name = "reqdebug")]
#[command(about = "Request-scoped debugging toolkit - dump trees, markers and notifications")]
#[command(version)]
pub struct Cli {
    /// TOML configuration file, environment variables still apply on top
    #[arg(long, env = "REQDEBUG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Also write diagnostics to a daily log file in the temporary directory
    #[arg(long)]
    pub log_file: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Output formats of the `dump` command
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FormatArg {
    /// Interactive HTML with embedded stylesheet and script
    Html,
    /// Plain-text tree
    Text,
}

impl From<FormatArg> for OutputFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Html => Self::Html,
            FormatArg::Text => Self::Text,
        }
    }
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Render JSON files as dump trees
    Dump {
        /// JSON files to dump, `-` reads standard input
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output format (default: configured format)
        #[arg(long, value_enum)]
        format: Option<FormatArg>,

        /// Keep keys in document order
        #[arg(long)]
        no_sort: bool,

        /// Nesting depth from which objects start collapsed
        #[arg(long)]
        depth: Option<usize>,

        /// Comma separated keys highlighted as primary keys
        #[arg(long)]
        mark: Option<String>,

        /// Append the stats line to every dump
        #[arg(long)]
        stats: bool,
    },
    /// Print a coloured marker for a JSON value, or a random one
    Marker {
        /// JSON value, e.g. `42` or `{"id":1}`
        json: Option<String>,

        /// Print label and colour instead of HTML
        #[arg(long)]
        text: bool,
    },
    /// Send a message to the configured webhook
    Notify {
        /// Message text
        text: String,

        /// Recipient channel (`#channel`, `@user`, `D…`, `C…`), may be repeated
        #[arg(long = "channel")]
        channels: Vec<String>,

        /// Skip the configured default channels
        #[arg(long)]
        private: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    reqdebug_common::logging::init_logging("reqdebug", cli.log_file)?;

    let config = load_config(&cli)?;
    tracing::debug!(format = %config.format, enabled = config.enabled, "Resolved configuration");

    match cli.command {
        Commands::Dump { files, format, no_sort, depth, mark, stats } => {
            let config = DebugConfig {
                enabled: true,
                format: format.map(Into::into).unwrap_or(config.format),
                sort_keys: config.sort_keys && !no_sort,
                depth: depth.unwrap_or(config.depth),
                show_trace: false,
                show_request: false,
                show_stats: stats,
                ..config
            };
            let mut session = OutputSession::builder(config, RequestInfo::new())
                .without_notifier()
                .build();
            if let Some(mark) = mark {
                session.flag("mark_fields", Some(&mark))?;
            }

            for file in &files {
                tracing::info!("Dumping {}", file.display());
                let value = read_json(file)?;
                session.dump(&[DumpValue::from(value)]);
            }
            println!("{}", session.flush());
        }
        Commands::Marker { json, text } => {
            let value = json
                .map(|raw| serde_json::from_str::<serde_json::Value>(&raw))
                .transpose()
                .wrap_err("Marker data is not valid JSON")?
                .map(DumpValue::from);
            let marker = reqdebug_engine::marker(value.as_ref(), &[]);
            if text {
                println!("{} {}", marker.color, marker.text);
            } else {
                println!("{}", marker.html);
            }
        }
        Commands::Notify { text, channels, private } => {
            if config.slack.hook.is_empty() {
                eyre::bail!("No webhook configured, set REQDEBUG_SLACK_HOOK");
            }
            let mut session = OutputSession::builder(config, RequestInfo::new()).build();
            let channels: Vec<&str> = channels.iter().map(String::as_str).collect();
            if !session.notify(text.as_str(), 0, &channels, private) {
                eyre::bail!("Nothing to send");
            }
            tracing::info!("Notification sent");
        }
    }

    Ok(())
}

/// Configuration file (if any) plus environment overrides
fn load_config(cli: &Cli) -> Result<DebugConfig> {
    match &cli.config {
        Some(path) => {
            let mut config = DebugConfig::load(path)?;
            config.apply_env_with(|name| std::env::var(name).ok());
            Ok(config)
        }
        None => DebugConfig::from_env(),
    }
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let content = if path.as_os_str() == "-" {
        let mut content = String::new();
        io::stdin().read_to_string(&mut content).wrap_err("Failed to read standard input")?;
        content
    } else {
        fs::read_to_string(path).wrap_err_with(|| format!("Failed to read {}", path.display()))?
    };
    serde_json::from_str(&content).wrap_err_with(|| format!("{} is not valid JSON", path.display()))
}
