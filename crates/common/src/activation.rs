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

//! Per-request activation
//!
//! The master switch wins when it is on. Otherwise an IP allow-list, or failing
//! that a cookie name, may switch debugging on for a single client.

use tracing::debug;

use crate::DebugConfig;

/// Decides whether debug output is active for one request
#[derive(Debug, Clone, Copy)]
pub struct Activation<'a> {
    config: &'a DebugConfig,
}

impl<'a> Activation<'a> {
    /// Create activation rules from a resolved configuration
    pub fn new(config: &'a DebugConfig) -> Self {
        Self { config }
    }

    /// Resolve the switch for a client address and its raw `Cookie` header
    pub fn resolve(&self, remote_addr: Option<&str>, cookie_header: Option<&str>) -> bool {
        if self.config.enabled {
            return true;
        }

        if !self.config.with_ip.is_empty() {
            let active = remote_addr
                .map(str::trim)
                .is_some_and(|addr| self.config.with_ip.iter().any(|ip| ip.trim() == addr));
            debug!(?remote_addr, active, "Resolved debug activation from IP allow-list");
            return active;
        }

        if let Some(name) = &self.config.with_cookie {
            let active = cookie_header
                .and_then(|header| cookie_value(header, name))
                .is_some_and(|value| !value.is_empty() && value != "0");
            debug!(cookie = %name, active, "Resolved debug activation from cookie");
            return active;
        }

        false
    }
}

/// Find a cookie value in a raw `Cookie` header
pub fn cookie_value<'h>(header: &'h str, name: &str) -> Option<&'h str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        (key.trim() == name).then(|| value.trim())
    })
}
