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

//! Hook tracing
//!
//! Hosts with an event or hook system report every fired hook to the session.
//! [`HookTracer`] filters the hooks through a black- or whitelist, counts them for
//! the summary printed on flush, and keeps the stack of currently running hooks so
//! dumps can show where they were taken.

use std::collections::HashMap;

use regex::{Regex, RegexBuilder};
use reqdebug_common::OutputFormat;
use tracing::debug;

use crate::{
    error::{DebugError, Result},
    html,
};

/// Noisy hooks that a blacklist always ignores
pub const DEFAULT_IGNORED_HOOKS: [&str; 5] =
    ["alloptions", "/^n?gettext.*/", "/^sanitize_.*/", "/^esc_.*/", "attribute_escape"];

/// A hook name or, when written as `/regex/flags`, a regular expression
#[derive(Debug, Clone)]
pub enum HookPattern {
    /// Matches one hook name
    Exact(String),
    /// Matches hook names with a regular expression
    Regex(Regex),
}

impl HookPattern {
    /// Parse a pattern; `/…/` delimits a regex with optional `i`, `m`, `s`, `x` flags
    pub fn parse(raw: &str) -> Result<Self> {
        let Some(body) = raw.strip_prefix('/') else {
            return Ok(Self::Exact(raw.to_string()));
        };
        let (expr, flags) = body.rsplit_once('/').unwrap_or((body, ""));
        RegexBuilder::new(expr)
            .case_insensitive(flags.contains('i'))
            .multi_line(flags.contains('m'))
            .dot_matches_new_line(flags.contains('s'))
            .ignore_whitespace(flags.contains('x'))
            .build()
            .map(Self::Regex)
            .map_err(|source| DebugError::HookPattern { pattern: raw.to_string(), source })
    }

    /// Whether the pattern matches a hook name
    pub fn matches(&self, hook: &str) -> bool {
        match self {
            Self::Exact(name) => name == hook,
            Self::Regex(regex) => regex.is_match(hook),
        }
    }
}

/// A hook that is currently running
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveHook {
    /// Hook name
    pub name: String,
    /// Priority of the running callback
    pub priority: i64,
}

/// A callback registered on a hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookCallback {
    /// Priority the callback runs at
    pub priority: i64,
    /// Readable name such as `Class::method` or `closure from file.rs:12`
    pub name: String,
    /// Number of arguments the callback accepts
    pub accepted_args: usize,
}

impl HookCallback {
    /// Describe a callback
    pub fn new(priority: i64, name: impl Into<String>, accepted_args: usize) -> Self {
        Self { priority, name: name.into(), accepted_args }
    }
}

/// Collects fired hooks for one request
#[derive(Debug, Default)]
pub struct HookTracer {
    enabled: bool,
    patterns: Vec<HookPattern>,
    whitelist: bool,
    occurrences: Vec<String>,
    counts: HashMap<String, usize>,
    active: Vec<ActiveHook>,
}

impl HookTracer {
    /// A disabled tracer
    pub fn new() -> Self {
        Self::default()
    }

    /// Start or stop tracing
    ///
    /// A blacklist (the default) also ignores [`DEFAULT_IGNORED_HOOKS`]. On an invalid
    /// pattern the previous configuration stays in place.
    pub fn configure<S: AsRef<str>>(
        &mut self,
        enabled: bool,
        patterns: &[S],
        whitelist: bool,
    ) -> Result<()> {
        let mut raw: Vec<&str> = patterns.iter().map(AsRef::as_ref).collect();
        if !whitelist {
            raw.extend(DEFAULT_IGNORED_HOOKS);
        }
        self.patterns = raw.into_iter().map(HookPattern::parse).collect::<Result<_>>()?;
        self.whitelist = whitelist;
        self.enabled = enabled;
        debug!(enabled, whitelist, patterns = self.patterns.len(), "Configured hook tracing");
        Ok(())
    }

    /// Whether hooks are being recorded
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether a hook passes the black- or whitelist
    pub fn is_traced(&self, hook: &str) -> bool {
        let listed = self.patterns.iter().any(|pattern| pattern.matches(hook));
        listed == self.whitelist
    }

    /// Record a fired hook; returns whether it was counted
    pub fn record(&mut self, hook: &str) -> bool {
        if !self.enabled || !self.is_traced(hook) {
            return false;
        }
        *self.counts.entry(hook.to_string()).or_default() += 1;
        self.occurrences.push(hook.to_string());
        true
    }

    /// A hook starts running
    pub fn enter(&mut self, name: impl Into<String>, priority: i64) {
        self.active.push(ActiveHook { name: name.into(), priority });
    }

    /// The innermost running hook finished
    pub fn leave(&mut self) -> Option<ActiveHook> {
        self.active.pop()
    }

    /// Running hooks, outermost first
    pub fn active(&self) -> &[ActiveHook] {
        &self.active
    }

    /// Recorded hooks in firing order
    pub fn occurrences(&self) -> &[String] {
        &self.occurrences
    }

    /// Recorded hooks with their counts, most frequent first, ties by name
    pub fn counts(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> =
            self.counts.iter().map(|(hook, count)| (hook.clone(), *count)).collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts
    }

    /// Whether anything was recorded since the last clear
    pub fn has_records(&self) -> bool {
        !self.occurrences.is_empty()
    }

    /// Forget recorded hooks; running hooks are kept
    pub fn clear(&mut self) {
        self.occurrences.clear();
        self.counts.clear();
    }

    /// Table of the running hooks, empty when none is running
    pub fn render_active(&self, format: OutputFormat, block_id: &str) -> String {
        if self.active.is_empty() {
            return String::new();
        }
        let last = self.active.len() - 1;
        let mut out = String::new();
        if format == OutputFormat::Html {
            out.push_str(&format!(
                "<span class=\"wdev-trace-toggle\" onclick=\"_debToggle('{block_id}-hooks')\"><b>Hooks</b></span>\
                 <div class=\"{block_id}-hooks\" style=\"display:none\">\
                 <table class=\"wdev-trace\" width=\"100%\" cellspacing=\"0\" cellpadding=\"3\" border=\"1\">\n"
            ));
        }
        for (index, hook) in self.active.iter().enumerate() {
            let current = if index == last { "→ " } else { "" };
            let name = html::escape(&hook.name);
            match format {
                OutputFormat::Text => out.push_str(&format!(
                    "\n  {:>2}. {current}{} \t priority {}",
                    index + 1,
                    hook.name,
                    hook.priority
                )),
                OutputFormat::Html => out.push_str(&format!(
                    "<tr><td class='trc-num' onclick='_debMark(this)'>{}</td><td>{current}{name}</td><td>priority {}</td></tr>\n",
                    index + 1,
                    hook.priority
                )),
            }
        }
        match format {
            OutputFormat::Text => out.push_str("\n-----\n"),
            OutputFormat::Html => out.push_str("</table></div>"),
        }
        out
    }

    /// Fired hooks and their counts, empty when nothing was recorded
    pub fn render_summary(&self, format: OutputFormat, block_id: &str) -> String {
        if !self.has_records() {
            return String::new();
        }
        match format {
            OutputFormat::Text => {
                let mut out = String::from("\nHooks:");
                for (index, hook) in self.occurrences.iter().enumerate() {
                    out.push_str(&format!("\n  {:>3}. {hook}", index + 1));
                }
                out.push_str("\nHook Count:");
                for (hook, count) in self.counts() {
                    out.push_str(&format!("\n  {count:>5}  {hook}"));
                }
                out.push('\n');
                out
            }
            OutputFormat::Html => {
                let items: String = self
                    .occurrences
                    .iter()
                    .map(|hook| format!("<li>{}</li>", html::escape(hook)))
                    .collect();
                let rows: String = self
                    .counts()
                    .iter()
                    .map(|(hook, count)| {
                        format!(
                            "<tr><td><span class=\"dev-item dev-hook-count\">{count}</span></td><td>{}</td></tr>",
                            html::escape(hook)
                        )
                    })
                    .collect();
                format!(
                    "<div class=\"wp-debug-block wdev-hooks\"><span class=\"wp-debug-label\" onclick=\"_debToggle('{block_id}-hook-list')\">Hooks</span>\
                     <div class=\"{block_id}-hook-list\"><ol>{items}</ol></div></div>\n\
                     <div class=\"wp-debug-block wdev-hooks\"><span class=\"wp-debug-label\" onclick=\"_debToggle('{block_id}-hook-count')\">Hook Count</span>\
                     <div class=\"{block_id}-hook-count\"><table>{rows}</table></div></div>"
                )
            }
        }
    }
}

/// Listing of the callbacks registered on a hook, grouped by priority
pub fn render_callbacks(tag: &str, callbacks: &[HookCallback], format: OutputFormat) -> String {
    let mut sorted: Vec<&HookCallback> = callbacks.iter().collect();
    sorted.sort_by_key(|callback| callback.priority);

    let mut out = format!("<pre>&gt;&gt;&gt;&gt;&gt;\t<strong>{}</strong>\n", html::escape(tag));
    let mut previous = None;
    for callback in sorted {
        if previous != Some(callback.priority) {
            out.push_str(&callback.priority.to_string());
            previous = Some(callback.priority);
        }
        out.push('\t');
        out.push_str(&html::escape(&callback.name));
        if callback.accepted_args != 1 {
            out.push_str(&format!(" ({})", callback.accepted_args));
        }
        out.push('\n');
    }
    out.push_str("</pre>");

    match format {
        OutputFormat::Html => out,
        OutputFormat::Text => html::strip_markup(&out),
    }
}
