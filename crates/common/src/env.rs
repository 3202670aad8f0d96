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

//! Environment variable name constants for reqdebug configuration.
//!
//! This module provides constant string names for all environment variables read by
//! [`crate::DebugConfig::from_env`]. They are the single source of truth for variable
//! names, so the host bootstrap, the binary and the tests agree on them.
//!
//! # Environment Variables
//!
//! ## Activation
//! - [`REQDEBUG`] - Master switch for debug output
//! - [`REQDEBUG_WITH_IP`] - Comma separated IP allow-list that activates debugging
//! - [`REQDEBUG_WITH_COOKIE`] - Cookie name that activates debugging
//! - [`REQDEBUG_BACKGROUND`] - Override of the switch for background requests
//!
//! ## Output
//! - [`REQDEBUG_FORMAT`], [`REQDEBUG_SORT`], [`REQDEBUG_MARK_FIELDS`], [`REQDEBUG_DEPTH`]
//! - [`REQDEBUG_TRACE`], [`REQDEBUG_REQUEST`], [`REQDEBUG_STATS`], [`REQDEBUG_STOP_REDIRECT`]
//! - [`REQDEBUG_CONSOLE`]
//!
//! ## Sinks
//! - [`REQDEBUG_LOG_DIR`], [`REQDEBUG_LOG_FILE`]
//! - [`REQDEBUG_SLACK_HOOK`], [`REQDEBUG_SLACK_NAME`], [`REQDEBUG_SLACK_ICON`],
//!   [`REQDEBUG_SLACK_CHANNEL`]

/// Path of a TOML configuration file that is loaded before the other variables apply.
///
/// # Examples
///
/// ```bash
/// REQDEBUG_CONFIG=/etc/reqdebug.toml reqdebug dump payload.json
/// ```
pub const REQDEBUG_CONFIG: &str = "REQDEBUG_CONFIG";

/// Master switch for debug output.
///
/// Accepts `1/0`, `true/false`, `yes/no` and `on/off`.
///
/// # Default
///
/// When not set, debug output is **disabled** unless one of the activation rules
/// ([`REQDEBUG_WITH_IP`], [`REQDEBUG_WITH_COOKIE`]) matches.
pub const REQDEBUG: &str = "REQDEBUG";

/// Comma separated list of client IP addresses for which debugging is switched on.
///
/// Only consulted when [`REQDEBUG`] is off.
///
/// # Examples
///
/// ```bash
/// REQDEBUG_WITH_IP=127.0.0.1,10.0.0.7
/// ```
pub const REQDEBUG_WITH_IP: &str = "REQDEBUG_WITH_IP";

/// Name of a cookie that switches debugging on when present with a non-empty value.
///
/// Only consulted when [`REQDEBUG`] is off and no IP allow-list is configured.
pub const REQDEBUG_WITH_COOKIE: &str = "REQDEBUG_WITH_COOKIE";

/// Replaces the master switch for background (non-interactive) requests.
///
/// Background requests are ajax calls, cron runs and other automated requests as
/// classified by the host.
pub const REQDEBUG_BACKGROUND: &str = "REQDEBUG_BACKGROUND";

/// Default output format, either `html` or `text`.
pub const REQDEBUG_FORMAT: &str = "REQDEBUG_FORMAT";

/// Whether keys of dumped collections and objects are sorted alphabetically.
pub const REQDEBUG_SORT: &str = "REQDEBUG_SORT";

/// Comma separated field names that are highlighted as primary keys in dumps.
///
/// # Default
///
/// `ID,id`
pub const REQDEBUG_MARK_FIELDS: &str = "REQDEBUG_MARK_FIELDS";

/// Nesting depth from which composite values start collapsed. Default `3`.
pub const REQDEBUG_DEPTH: &str = "REQDEBUG_DEPTH";

/// Whether every dump carries a stack trace.
pub const REQDEBUG_TRACE: &str = "REQDEBUG_TRACE";

/// Whether every dump carries the HTTP request details.
pub const REQDEBUG_REQUEST: &str = "REQDEBUG_REQUEST";

/// Whether every dump carries the runtime stats line.
pub const REQDEBUG_STATS: &str = "REQDEBUG_STATS";

/// Whether redirects are replaced by a page showing the destination link.
pub const REQDEBUG_STOP_REDIRECT: &str = "REQDEBUG_STOP_REDIRECT";

/// Whether interactive pages get the browser console search helper. Default `true`.
///
/// Background requests and headless browsers never get it.
pub const REQDEBUG_CONSOLE: &str = "REQDEBUG_CONSOLE";

/// Directory of the persistent debug log file.
pub const REQDEBUG_LOG_DIR: &str = "REQDEBUG_LOG_DIR";

/// File name of the persistent debug log file. Default `debug-info.log`.
pub const REQDEBUG_LOG_FILE: &str = "REQDEBUG_LOG_FILE";

/// Slack webhook path, the part after `https://hooks.slack.com/services/`.
///
/// # Examples
///
/// ```bash
/// REQDEBUG_SLACK_HOOK=T00000000/B11111111/q22222222222222222222222
/// ```
pub const REQDEBUG_SLACK_HOOK: &str = "REQDEBUG_SLACK_HOOK";

/// Sender name for Slack notifications. `@USER` is replaced by the current user.
pub const REQDEBUG_SLACK_NAME: &str = "REQDEBUG_SLACK_NAME";

/// Emoji icon for Slack notifications, e.g. `:bug:`.
pub const REQDEBUG_SLACK_ICON: &str = "REQDEBUG_SLACK_ICON";

/// Comma separated default channels that receive every public notification.
pub const REQDEBUG_SLACK_CHANNEL: &str = "REQDEBUG_SLACK_CHANNEL";
