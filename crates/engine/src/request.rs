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

//! Request context
//!
//! [`RequestInfo`] is the read-only view of the current request that the host
//! hands to the output session: CGI-style server variables, whether the request is
//! a background request, when it started and, if the host tracks it, how much
//! memory it uses. The blocks rendered from it are appended to dumps.

use std::{collections::BTreeMap, env, time::Instant};

use reqdebug_common::OutputFormat;

use crate::html;

/// Memory figures reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    /// Bytes in use
    pub used: u64,
    /// Configured limit in bytes
    pub limit: Option<u64>,
}

/// Read-only request metadata
#[derive(Debug, Clone)]
pub struct RequestInfo {
    server: BTreeMap<String, String>,
    background: bool,
    started: Instant,
    memory: Option<MemoryUsage>,
}

impl Default for RequestInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestInfo {
    /// An empty interactive request starting now
    pub fn new() -> Self {
        Self { server: BTreeMap::new(), background: false, started: Instant::now(), memory: None }
    }

    /// Set a server variable
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.server.insert(name.into(), value.into());
        self
    }

    /// Set `REQUEST_URI`
    pub fn with_uri(self, uri: impl Into<String>) -> Self {
        self.with_var("REQUEST_URI", uri)
    }

    /// Set `REQUEST_METHOD`
    pub fn with_method(self, method: impl Into<String>) -> Self {
        self.with_var("REQUEST_METHOD", method)
    }

    /// Set a request header, stored as `HTTP_{NAME}`
    pub fn with_header(self, name: &str, value: impl Into<String>) -> Self {
        let var = format!("HTTP_{}", name.trim().to_ascii_uppercase().replace('-', "_"));
        self.with_var(var, value)
    }

    /// Set the raw `Cookie` header
    pub fn with_cookie_header(self, cookies: impl Into<String>) -> Self {
        self.with_var("HTTP_COOKIE", cookies)
    }

    /// Set `REMOTE_ADDR`
    pub fn with_remote_addr(self, addr: impl Into<String>) -> Self {
        self.with_var("REMOTE_ADDR", addr)
    }

    /// Set `SERVER_NAME`
    pub fn with_server_name(self, name: impl Into<String>) -> Self {
        self.with_var("SERVER_NAME", name)
    }

    /// Mark the request as background (ajax, cron, cli or other automation)
    pub fn with_background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }

    /// Report memory figures
    pub fn with_memory(mut self, used: u64, limit: Option<u64>) -> Self {
        self.memory = Some(MemoryUsage { used, limit });
        self
    }

    /// Override the start of the request
    pub fn with_started_at(mut self, started: Instant) -> Self {
        self.started = started;
        self
    }

    /// A server variable
    pub fn var(&self, name: &str) -> Option<&str> {
        self.server.get(name).map(String::as_str)
    }

    fn non_empty(&self, name: &str) -> Option<&str> {
        self.var(name).filter(|v| !v.is_empty())
    }

    /// Client address
    pub fn remote_addr(&self) -> Option<&str> {
        self.non_empty("REMOTE_ADDR")
    }

    /// Raw `Cookie` header
    pub fn cookie_header(&self) -> Option<&str> {
        self.var("HTTP_COOKIE")
    }

    /// Server name, falling back to the `HOST` variable
    pub fn server_name(&self) -> Option<&str> {
        self.non_empty("SERVER_NAME").or_else(|| self.non_empty("HOST"))
    }

    /// Client `User-Agent` header
    pub fn user_agent(&self) -> Option<&str> {
        self.non_empty("HTTP_USER_AGENT")
    }

    /// Whether this is a background request
    pub fn is_background(&self) -> bool {
        self.background
    }

    /// Seconds since the request started
    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Name of the user on whose behalf the request runs
    pub fn current_user(&self) -> String {
        self.current_user_with(|name| env::var(name).ok())
    }

    /// [`Self::current_user`] with a custom environment lookup
    pub fn current_user_with<F>(&self, lookup: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        ["USERNAME", "USER"]
            .into_iter()
            .find_map(|name| lookup(name).filter(|v| !v.is_empty()))
            .or_else(|| {
                ["AUTH_USER", "HTTP_AUTH_USER", "REMOTE_USER", "HTTP_REMOTE_USER", "REMOTE_ADDR"]
                    .into_iter()
                    .find_map(|name| self.non_empty(name).map(str::to_string))
            })
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Request line, cookies and headers
    pub fn http_request_block(&self, format: OutputFormat, block_id: &str) -> String {
        let mut groups: Vec<(&str, Vec<(String, String)>)> = Vec::new();

        groups.push((
            "Request",
            vec![
                ("URI".to_string(), self.var("REQUEST_URI").unwrap_or_default().to_string()),
                ("Method".to_string(), self.var("REQUEST_METHOD").unwrap_or_default().to_string()),
            ],
        ));

        if let Some(header) = self.cookie_header() {
            let mut cookies: Vec<(String, String)> = header
                .split(';')
                .map(|pair| {
                    let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
                    (name.trim().to_string(), value.to_string())
                })
                .collect();
            cookies.sort_by(|a, b| a.0.cmp(&b.0));
            groups.push(("Cookie", cookies));
        }

        let mut headers: Vec<(String, String)> = self
            .server
            .iter()
            .filter(|(key, _)| key.as_str() != "HTTP_COOKIE")
            .filter_map(|(key, value)| {
                key.strip_prefix("HTTP_").map(|name| (header_label(name), value.clone()))
            })
            .collect();
        headers.sort_by(|a, b| a.0.cmp(&b.0));
        groups.push(("HTTP", headers));

        let mut out = String::new();
        if format == OutputFormat::Html {
            out.push_str(&format!(
                "<span class=\"wdev-trace-toggle\" onclick=\"_debToggle('{block_id}-request')\"><b>HTTP Request</b></span>\
                 <div class=\"{block_id}-request\" style=\"display:none\">\
                 <table class=\"wdev-trace\" width=\"100%\" cellspacing=\"0\" cellpadding=\"3\" border=\"1\">\n"
            ));
        }
        for (label, entries) in groups {
            match format {
                OutputFormat::Text => out.push_str(&format!("\n  {label}:")),
                OutputFormat::Html => out.push_str(&format!(
                    "<tr><td class='trc-group' colspan='2'>{label}</td></tr>\n"
                )),
            }
            for (key, value) in entries {
                match format {
                    OutputFormat::Text => out.push_str(&format!("\n  {key}: \t {value}")),
                    OutputFormat::Html => out.push_str(&format!(
                        "<tr><td class='trc-key' onclick='_debMark(this)'>{}</td><td class='trc-val'>{}</td></tr>\n",
                        html::escape(&key),
                        html::escape(&value)
                    )),
                }
            }
        }
        match format {
            OutputFormat::Text => out.push_str("\n-----\n"),
            OutputFormat::Html => out.push_str("</table></div>"),
        }
        out
    }

    /// Memory, elapsed time and toolkit version on one line
    pub fn stats_block(&self, format: OutputFormat) -> String {
        let mut infos = Vec::new();
        if let Some(memory) = self.memory {
            infos.push(format_size(memory.used, 2));
            if let Some(limit) = memory.limit.filter(|limit| *limit > 0) {
                let share = (memory.used as f64 / limit as f64 * 100.0).round();
                infos.push(format!("{share}% of {}", format_size(limit, 2)));
            }
        }
        infos.push(format!("{} sec", round_to(self.elapsed_secs(), 2)));
        infos.push(format!("reqdebug {}", env!("CARGO_PKG_VERSION")));

        match format {
            OutputFormat::Text => format!("\n {}", infos.join(" | ")),
            OutputFormat::Html => {
                let infos: Vec<String> = infos.iter().map(|info| html::escape(info)).collect();
                format!("<span class='wdev-trace-stats'><b>{}</b></span>\n", infos.join("</b> | <b>"))
            }
        }
    }
}

/// `ACCEPT_LANGUAGE` becomes `Accept Language`
fn header_label(name: &str) -> String {
    name.to_ascii_lowercase()
        .replace('_', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Human readable byte size with 1024-based suffixes
pub fn format_size(bytes: u64, precision: u32) -> String {
    const SUFFIXES: [&str; 5] = ["", "K", "M", "G", "T"];

    let mut value = bytes as f64;
    let mut index = 0;
    while value >= 1024.0 && index < SUFFIXES.len() - 1 {
        value /= 1024.0;
        index += 1;
    }
    format!("{} {}", round_to(value, precision), SUFFIXES[index]).trim_end().to_string()
}

fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RequestInfo {
        RequestInfo::new()
            .with_uri("/cart?add=1")
            .with_method("POST")
            .with_header("Accept-Language", "en")
            .with_header("user-agent", "curl/8")
            .with_cookie_header("theme=dark; sid=a=b")
            .with_remote_addr("10.1.2.3")
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0, 2), "0");
        assert_eq!(format_size(512, 2), "512");
        assert_eq!(format_size(1024, 2), "1 K");
        assert_eq!(format_size(1536, 2), "1.5 K");
        assert_eq!(format_size(1_048_576, 2), "1 M");
        assert_eq!(format_size(134_217_728, 2), "128 M");
        assert_eq!(format_size(1_234_567, 2), "1.18 M");
    }

    #[test]
    fn test_http_request_block_text() {
        let text = request().http_request_block(OutputFormat::Text, "x");
        let expected = "\n  Request:\
                        \n  URI: \t /cart?add=1\
                        \n  Method: \t POST\
                        \n  Cookie:\
                        \n  sid: \t a=b\
                        \n  theme: \t dark\
                        \n  HTTP:\
                        \n  Accept Language: \t en\
                        \n  User Agent: \t curl/8\
                        \n-----\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_http_request_block_without_cookies() {
        let text = RequestInfo::new().http_request_block(OutputFormat::Text, "x");
        assert!(!text.contains("Cookie:"));
        assert!(text.contains("HTTP:"));
    }

    #[test]
    fn test_http_request_block_html_escapes() {
        let html = RequestInfo::new()
            .with_uri("/?q=<script>")
            .http_request_block(OutputFormat::Html, "blk");
        assert!(html.contains("_debToggle('blk-request')"));
        assert!(html.contains("/?q=&lt;script&gt;"));
    }

    #[test]
    fn test_stats_block() {
        let stats = RequestInfo::new()
            .with_memory(2 * 1_048_576, Some(128 * 1_048_576))
            .stats_block(OutputFormat::Text);
        assert!(stats.starts_with("\n 2 M | 2% of 128 M | "));
        assert!(stats.contains(" sec | reqdebug "));

        let bare = RequestInfo::new().stats_block(OutputFormat::Html);
        assert!(bare.starts_with("<span class='wdev-trace-stats'><b>"));
    }

    #[test]
    fn test_current_user_order() {
        let no_env = |_: &str| None;
        assert_eq!(request().current_user_with(no_env), "10.1.2.3");
        assert_eq!(
            request().with_var("REMOTE_USER", "alice").current_user_with(no_env),
            "alice"
        );
        assert_eq!(request().current_user_with(|name| (name == "USER").then(|| "bob".into())), "bob");
        assert_eq!(RequestInfo::new().current_user_with(no_env), "unknown");
    }

    #[test]
    fn test_server_name_fallback() {
        assert_eq!(RequestInfo::new().with_var("HOST", "h").server_name(), Some("h"));
        assert_eq!(RequestInfo::new().server_name(), None);
    }
}
