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

//! Debug configuration
//!
//! The configuration is resolved once per process (or per request in hosts that
//! re-read it) and then handed to the output session, which copies it into its
//! user-overridable flags.

use std::{env, fmt, fs, path::Path, str::FromStr};

use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::env::*;

/// Output format of rendered debug blocks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Interactive HTML with collapsible trees
    #[default]
    Html,
    /// Plain text, used for logs and background requests
    Text,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Html => write!(f, "html"),
            Self::Text => write!(f, "text"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" => Ok(Self::Html),
            "text" | "plain" => Ok(Self::Text),
            other => Err(eyre::eyre!("Unknown output format '{other}'")),
        }
    }
}

/// Slack webhook settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Webhook path after `https://hooks.slack.com/services/`
    pub hook: String,
    /// Sender name, `@USER` is replaced by the current user
    pub name: String,
    /// Sender emoji icon
    pub icon: String,
    /// Comma separated default channels
    pub channel: String,
}

/// Resolved debug configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Master switch
    pub enabled: bool,
    /// Client IPs that activate debugging while the master switch is off
    pub with_ip: Vec<String>,
    /// Cookie that activates debugging while the master switch is off
    pub with_cookie: Option<String>,
    /// Replaces `enabled` for background requests when set
    pub background_enabled: Option<bool>,
    /// Default output format
    pub format: OutputFormat,
    /// Sort keys of dumped composites
    pub sort_keys: bool,
    /// Field names highlighted as primary keys
    pub mark_fields: Vec<String>,
    /// Nesting depth from which composites start collapsed
    pub depth: usize,
    /// Append a stack trace to every dump
    pub show_trace: bool,
    /// Append the HTTP request details to every dump
    pub show_request: bool,
    /// Append the stats line to every dump
    pub show_stats: bool,
    /// Replace redirects by a confirmation page
    pub stop_redirect: bool,
    /// Offer the browser console helper on interactive pages
    pub console: bool,
    /// Directory of the debug log file
    pub log_dir: String,
    /// File name of the debug log file
    pub log_file: String,
    /// Webhook notification settings
    pub slack: SlackConfig,
}

/// Default log file name
pub const DEFAULT_LOG_FILE: &str = "debug-info.log";

/// Default collapse depth
pub const DEFAULT_DEPTH: usize = 3;

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            with_ip: Vec::new(),
            with_cookie: None,
            background_enabled: None,
            format: OutputFormat::Html,
            sort_keys: true,
            mark_fields: vec!["ID".to_string(), "id".to_string()],
            depth: DEFAULT_DEPTH,
            show_trace: true,
            show_request: true,
            show_stats: true,
            stop_redirect: false,
            console: true,
            log_dir: default_log_dir(),
            log_file: DEFAULT_LOG_FILE.to_string(),
            slack: SlackConfig::default(),
        }
    }
}

fn default_log_dir() -> String {
    env::current_dir().map(|dir| dir.display().to_string()).unwrap_or_else(|_| ".".to_string())
}

impl DebugConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path:?}"))?;

        let config: Self =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Resolve configuration from `REQDEBUG_CONFIG` (if set) plus environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = match env::var(REQDEBUG_CONFIG) {
            Ok(path) if !path.is_empty() => Self::load(path)?,
            _ => Self::default(),
        };
        config.apply_env_with(|name| env::var(name).ok());
        Ok(config)
    }

    /// Apply overrides from a variable lookup function
    ///
    /// Malformed values are ignored with a warning so a typo never disables a request.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |name: &str| lookup(name).and_then(|raw| parse_bool_named(name, &raw));

        if let Some(enabled) = flag(REQDEBUG) {
            self.enabled = enabled;
        }
        if let Some(ips) = lookup(REQDEBUG_WITH_IP) {
            self.with_ip = split_list(&ips);
        }
        if let Some(cookie) = lookup(REQDEBUG_WITH_COOKIE) {
            let cookie = cookie.trim().to_string();
            self.with_cookie = (!cookie.is_empty()).then_some(cookie);
        }
        if let Some(background) = flag(REQDEBUG_BACKGROUND) {
            self.background_enabled = Some(background);
        }
        if let Some(format) = lookup(REQDEBUG_FORMAT) {
            match format.parse() {
                Ok(format) => self.format = format,
                Err(e) => warn!("Ignoring {}: {}", REQDEBUG_FORMAT, e),
            }
        }
        if let Some(sort) = flag(REQDEBUG_SORT) {
            self.sort_keys = sort;
        }
        if let Some(fields) = lookup(REQDEBUG_MARK_FIELDS) {
            self.mark_fields = split_list(&fields);
        }
        if let Some(depth) = lookup(REQDEBUG_DEPTH) {
            match depth.trim().parse() {
                Ok(depth) => self.depth = depth,
                Err(_) => warn!("Ignoring {}: '{}' is not a depth", REQDEBUG_DEPTH, depth),
            }
        }
        if let Some(show) = flag(REQDEBUG_TRACE) {
            self.show_trace = show;
        }
        if let Some(show) = flag(REQDEBUG_REQUEST) {
            self.show_request = show;
        }
        if let Some(show) = flag(REQDEBUG_STATS) {
            self.show_stats = show;
        }
        if let Some(stop) = flag(REQDEBUG_STOP_REDIRECT) {
            self.stop_redirect = stop;
        }
        if let Some(console) = flag(REQDEBUG_CONSOLE) {
            self.console = console;
        }
        if let Some(dir) = lookup(REQDEBUG_LOG_DIR) {
            self.log_dir = dir;
        }
        if let Some(file) = lookup(REQDEBUG_LOG_FILE) {
            self.log_file = file;
        }
        if let Some(hook) = lookup(REQDEBUG_SLACK_HOOK) {
            self.slack.hook = hook;
        }
        if let Some(name) = lookup(REQDEBUG_SLACK_NAME) {
            self.slack.name = name;
        }
        if let Some(icon) = lookup(REQDEBUG_SLACK_ICON) {
            self.slack.icon = icon;
        }
        if let Some(channel) = lookup(REQDEBUG_SLACK_CHANNEL) {
            self.slack.channel = channel;
        }
    }
}

/// Split a comma separated list, trimming entries and dropping empty ones
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

/// Parse a boolean switch value (`1/0`, `true/false`, `yes/no`, `on/off`)
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

fn parse_bool_named(name: &str, raw: &str) -> Option<bool> {
    let parsed = parse_bool(raw);
    if parsed.is_none() {
        warn!("Ignoring {}: '{}' is not a boolean", name, raw);
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = DebugConfig::default();
        assert!(!config.enabled);
        assert!(config.sort_keys);
        assert_eq!(config.mark_fields, vec!["ID", "id"]);
        assert_eq!(config.depth, 3);
        assert_eq!(config.format, OutputFormat::Html);
        assert_eq!(config.log_file, "debug-info.log");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = DebugConfig::default();
        config.apply_env_with(lookup_from(&[
            (REQDEBUG, "yes"),
            (REQDEBUG_FORMAT, "TEXT"),
            (REQDEBUG_MARK_FIELDS, " uuid , key ,"),
            (REQDEBUG_DEPTH, "5"),
            (REQDEBUG_TRACE, "off"),
            (REQDEBUG_CONSOLE, "0"),
            (REQDEBUG_WITH_IP, "127.0.0.1, 10.0.0.1"),
        ]));

        assert!(config.enabled);
        assert_eq!(config.format, OutputFormat::Text);
        assert_eq!(config.mark_fields, vec!["uuid", "key"]);
        assert_eq!(config.depth, 5);
        assert!(!config.show_trace);
        assert!(!config.console);
        assert_eq!(config.with_ip, vec!["127.0.0.1", "10.0.0.1"]);
    }

    #[test]
    fn test_malformed_env_values_are_ignored() {
        let mut config = DebugConfig::default();
        config.apply_env_with(lookup_from(&[
            (REQDEBUG, "maybe"),
            (REQDEBUG_DEPTH, "deep"),
            (REQDEBUG_FORMAT, "pdf"),
        ]));

        assert_eq!(config, DebugConfig::default());
    }

    #[test]
    fn test_toml_roundtrip_with_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reqdebug.toml");
        fs::write(
            &path,
            r##"
enabled = true
format = "text"
mark_fields = ["pk"]

[slack]
hook = "T000/B111/abc"
channel = "#dev"
"##,
        )
        .unwrap();

        let config = DebugConfig::load(&path).unwrap();
        assert!(config.enabled);
        assert_eq!(config.format, OutputFormat::Text);
        assert_eq!(config.mark_fields, vec!["pk"]);
        assert_eq!(config.slack.hook, "T000/B111/abc");
        // untouched keys keep their defaults
        assert!(config.sort_keys);
        assert_eq!(config.depth, DEFAULT_DEPTH);
    }

    #[test]
    fn test_load_missing_file_fails_with_context() {
        let err = DebugConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
