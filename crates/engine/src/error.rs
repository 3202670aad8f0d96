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

//! Errors of the dump engine
//!
//! Rendering itself never fails: unknown shapes degrade to plain text and cycles
//! are cut. Errors only surface from flag updates, hook pattern compilation and
//! the side channels (log file, webhook) the output session talks to.

use thiserror::Error;

/// Errors reported by the output session and its sinks
#[derive(Debug, Error)]
pub enum DebugError {
    /// A flag name that the session does not know
    #[error("unknown debug flag '{0}'")]
    UnknownFlag(String),

    /// A flag value that could not be parsed for its flag
    #[error("invalid value '{value}' for debug flag '{name}'")]
    InvalidFlag {
        /// Flag name
        name: String,
        /// Rejected raw value
        value: String,
    },

    /// A hook pattern starting with `/` that is not a valid regular expression
    #[error("invalid hook pattern '{pattern}': {source}")]
    HookPattern {
        /// Raw pattern as given by the caller
        pattern: String,
        /// Regex compilation error
        #[source]
        source: regex::Error,
    },

    /// Log file access failed
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A webhook delivery failed
    #[error("notification delivery failed: {0}")]
    Notification(String),

    /// A payload could not be serialized
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// Result alias of the dump engine
pub type Result<T, E = DebugError> = std::result::Result<T, E>;

impl From<reqwest::Error> for DebugError {
    fn from(err: reqwest::Error) -> Self {
        Self::Notification(err.to_string())
    }
}
