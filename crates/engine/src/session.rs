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

//! Per-request output session
//!
//! An [`OutputSession`] collects dump blocks and hook statistics for exactly one
//! request and hands them out once on [`OutputSession::flush`]. It owns the flags a
//! caller may override at runtime and talks to the host through the collaborator
//! traits given to [`OutputSessionBuilder`]:
//!
//! - [`CallStackProvider`] for traces,
//! - [`LogSink`] for the persistent debug log,
//! - [`NotificationSink`] for webhook messages,
//! - [`AssetInjector`] for the stylesheet and script of HTML output.
//!
//! Sessions are never shared between requests. Hosts serving concurrent requests
//! create one per request through a [`SessionFactory`].

use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use chrono::Local;
use reqdebug_common::{parse_bool, split_list, Activation, DebugConfig, OutputFormat, SlackConfig};
use tracing::{debug, warn};

use crate::{
    assets::{AssetInjector, AssetKind, InlineAssets, CONSOLE_ASSET, DEBUG_ASSET},
    error::{DebugError, Result},
    hooks::{render_callbacks, HookCallback, HookTracer},
    html,
    marker::{marker, Marker},
    notify::{recipients, MessageField, NotificationSink, SlackMessage, SlackPayload, SlackWebhook},
    render::{RenderOptions, TreeRenderer},
    request::RequestInfo,
    sink::{FileLogSink, LogSink, ResponseSink},
    trace::{CallStackProvider, NoCallStack, RawFrame, TraceFormatter},
    DumpValue,
};

/// Longest label of an HTML dump block
const BLOCK_LABEL_LENGTH: usize = 30;

/// Runtime-overridable settings of a session
#[derive(Debug, Clone, PartialEq)]
pub struct Flags {
    /// Debug output switch
    pub enabled: bool,
    /// Requested output format
    pub format: OutputFormat,
    /// Sort keys of dumped composites
    pub sort_keys: bool,
    /// Keys highlighted as primary keys
    pub mark_fields: Vec<String>,
    /// Collapse threshold
    pub depth: usize,
    /// Append traces to dumps and headers
    pub show_trace: bool,
    /// Append request details to dumps
    pub show_request: bool,
    /// Append the stats line to dumps
    pub show_stats: bool,
    /// Replace redirects by a link page
    pub stop_redirect: bool,
    /// Offer the browser console helper
    pub console: bool,
    /// Directory of the debug log
    pub log_dir: String,
    /// File name of the debug log
    pub log_file: String,
    /// Webhook settings
    pub slack: SlackConfig,
    /// Cached name of the current user
    pub current_user: Option<String>,
}

impl Flags {
    /// Names accepted by [`OutputSession::flag`]
    pub const NAMES: [&'static str; 17] = [
        "enabled",
        "format",
        "sort",
        "mark_fields",
        "depth",
        "show_trace",
        "show_request",
        "show_stats",
        "stop_redirect",
        "console",
        "log_dir",
        "log_file",
        "slack_hook",
        "slack_name",
        "slack_icon",
        "slack_channel",
        "current_user",
    ];

    fn from_config(config: &DebugConfig, enabled: bool) -> Self {
        Self {
            enabled,
            format: config.format,
            sort_keys: config.sort_keys,
            mark_fields: config.mark_fields.clone(),
            depth: config.depth,
            show_trace: config.show_trace,
            show_request: config.show_request,
            show_stats: config.show_stats,
            stop_redirect: config.stop_redirect,
            console: config.console,
            log_dir: config.log_dir.clone(),
            log_file: config.log_file.clone(),
            slack: config.slack.clone(),
            current_user: None,
        }
    }

    /// Current value of a flag as text
    pub fn get(&self, name: &str) -> Result<Option<String>> {
        let value = match name {
            "enabled" => self.enabled.to_string(),
            "format" => self.format.to_string(),
            "sort" | "sort_keys" => self.sort_keys.to_string(),
            "mark_fields" => self.mark_fields.join(","),
            "depth" => self.depth.to_string(),
            "show_trace" => self.show_trace.to_string(),
            "show_request" => self.show_request.to_string(),
            "show_stats" => self.show_stats.to_string(),
            "stop_redirect" => self.stop_redirect.to_string(),
            "console" => self.console.to_string(),
            "log_dir" => self.log_dir.clone(),
            "log_file" => self.log_file.clone(),
            "slack_hook" => self.slack.hook.clone(),
            "slack_name" => self.slack.name.clone(),
            "slack_icon" => self.slack.icon.clone(),
            "slack_channel" => self.slack.channel.clone(),
            "current_user" => return Ok(self.current_user.clone()),
            _ => return Err(DebugError::UnknownFlag(name.to_string())),
        };
        Ok(Some(value))
    }

    /// Parse `value` for the flag `name` and store it
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        let invalid = || DebugError::InvalidFlag { name: name.to_string(), value: value.to_string() };
        let boolean = || parse_bool(value).ok_or_else(invalid);

        match name {
            "enabled" => self.enabled = boolean()?,
            "format" => self.format = value.parse().map_err(|_| invalid())?,
            "sort" | "sort_keys" => self.sort_keys = boolean()?,
            "mark_fields" => self.mark_fields = split_list(value),
            "depth" => self.depth = value.trim().parse().map_err(|_| invalid())?,
            "show_trace" => self.show_trace = boolean()?,
            "show_request" => self.show_request = boolean()?,
            "show_stats" => self.show_stats = boolean()?,
            "stop_redirect" => self.stop_redirect = boolean()?,
            "console" => self.console = boolean()?,
            "log_dir" => self.log_dir = value.to_string(),
            "log_file" => self.log_file = value.to_string(),
            "slack_hook" => self.slack.hook = value.to_string(),
            "slack_name" => self.slack.name = value.to_string(),
            "slack_icon" => self.slack.icon = value.to_string(),
            "slack_channel" => self.slack.channel = value.to_string(),
            "current_user" => {
                self.current_user = (!value.is_empty()).then(|| value.to_string())
            }
            _ => return Err(DebugError::UnknownFlag(name.to_string())),
        }
        Ok(())
    }

    /// Path of the debug log built from `log_dir` and `log_file`
    ///
    /// Separators are normalised. Absolute and drive-prefixed directories are kept,
    /// a directory starting with `.` stays relative and any other is made absolute.
    pub fn log_path(&self) -> PathBuf {
        let defaults = DebugConfig::default();
        let dir = if self.log_dir.is_empty() { defaults.log_dir } else { self.log_dir.clone() };
        let file = if self.log_file.is_empty() { defaults.log_file } else { self.log_file.clone() };

        let dir = dir.trim_end_matches(['/', '\\', ' ']);
        let absolute = Path::new(dir).is_absolute() || has_drive_prefix(dir);
        let mut dir = normalize_separators(dir);
        if !absolute && !dir.starts_with(['.', MAIN_SEPARATOR]) {
            dir.insert(0, MAIN_SEPARATOR);
        }
        let file = normalize_separators(file.trim_matches(['/', ' ']));

        if dir.ends_with(MAIN_SEPARATOR) {
            PathBuf::from(format!("{dir}{file}"))
        } else {
            PathBuf::from(format!("{dir}{MAIN_SEPARATOR}{file}"))
        }
    }
}

/// `C:` style drive prefix
fn has_drive_prefix(path: &str) -> bool {
    let mut chars = path.chars();
    matches!((chars.next(), chars.next()), (Some(drive), Some(':')) if drive.is_ascii_alphabetic())
}

fn normalize_separators(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len());
    for c in path.chars() {
        let c = if c == '/' || c == '\\' { MAIN_SEPARATOR } else { c };
        if c == MAIN_SEPARATOR && normalized.ends_with(MAIN_SEPARATOR) {
            continue;
        }
        normalized.push(c);
    }
    normalized
}

/// Whether a session holds unflushed output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing to flush
    Idle,
    /// Dump blocks or hook records are waiting for [`OutputSession::flush`]
    Accumulating,
}

/// What the host should do with a redirect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    /// Redirect to the location
    Proceed(String),
    /// Answer with this page instead and end the request
    Intercept {
        /// HTTP status of the page
        status: u16,
        /// Page body
        body: String,
    },
}

/// Builds sessions for requests from one resolved configuration
#[derive(Debug, Clone)]
pub struct SessionFactory {
    config: DebugConfig,
}

impl SessionFactory {
    /// Create a factory
    pub fn new(config: DebugConfig) -> Self {
        Self { config }
    }

    /// The configuration sessions start from
    pub fn config(&self) -> &DebugConfig {
        &self.config
    }

    /// A session builder for one request
    pub fn for_request(&self, request: RequestInfo) -> OutputSessionBuilder {
        OutputSession::builder(self.config.clone(), request)
    }
}

/// Assembles an [`OutputSession`]
pub struct OutputSessionBuilder {
    config: DebugConfig,
    request: RequestInfo,
    call_stack: Box<dyn CallStackProvider>,
    log_sink: Box<dyn LogSink>,
    notifier: Option<Box<dyn NotificationSink>>,
    assets: Box<dyn AssetInjector>,
    trace: TraceFormatter,
}

impl OutputSessionBuilder {
    /// Source of call stacks, none by default
    pub fn call_stack(mut self, provider: impl CallStackProvider + 'static) -> Self {
        self.call_stack = Box::new(provider);
        self
    }

    /// Destination of the debug log, the file system by default
    pub fn log_sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.log_sink = Box::new(sink);
        self
    }

    /// Webhook client, Slack by default
    pub fn notifier(mut self, sink: impl NotificationSink + 'static) -> Self {
        self.notifier = Some(Box::new(sink));
        self
    }

    /// Disable notifications
    pub fn without_notifier(mut self) -> Self {
        self.notifier = None;
        self
    }

    /// Asset injection, inline by default
    pub fn assets(mut self, injector: impl AssetInjector + 'static) -> Self {
        self.assets = Box::new(injector);
        self
    }

    /// Trace formatting, hiding this crate's frames by default
    pub fn trace_formatter(mut self, formatter: TraceFormatter) -> Self {
        self.trace = formatter;
        self
    }

    /// Resolve activation for the request and create the session
    pub fn build(self) -> OutputSession {
        let activated = Activation::new(&self.config)
            .resolve(self.request.remote_addr(), self.request.cookie_header());
        let flags = Flags::from_config(&self.config, activated);
        debug!(activated, background = self.request.is_background(), "Created output session");

        OutputSession {
            config: self.config,
            activated,
            flags,
            request: self.request,
            blocks: Vec::new(),
            hooks: HookTracer::new(),
            header_count: 0,
            scripts_done: false,
            console_done: false,
            log_failure_reported: false,
            call_stack: self.call_stack,
            log_sink: self.log_sink,
            notifier: self.notifier,
            assets: self.assets,
            trace: self.trace,
        }
    }
}

/// Debug output of one request
pub struct OutputSession {
    config: DebugConfig,
    activated: bool,
    flags: Flags,
    request: RequestInfo,
    blocks: Vec<String>,
    hooks: HookTracer,
    header_count: u32,
    scripts_done: bool,
    console_done: bool,
    log_failure_reported: bool,
    call_stack: Box<dyn CallStackProvider>,
    log_sink: Box<dyn LogSink>,
    notifier: Option<Box<dyn NotificationSink>>,
    assets: Box<dyn AssetInjector>,
    trace: TraceFormatter,
}

impl std::fmt::Debug for OutputSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputSession")
            .field("flags", &self.flags)
            .field("blocks", &self.blocks.len())
            .field("header_count", &self.header_count)
            .finish_non_exhaustive()
    }
}

impl OutputSession {
    /// Start building a session for `request`
    pub fn builder(config: DebugConfig, request: RequestInfo) -> OutputSessionBuilder {
        OutputSessionBuilder {
            config,
            request,
            call_stack: Box::new(NoCallStack),
            log_sink: Box::new(FileLogSink),
            notifier: Some(Box::new(SlackWebhook::new())),
            assets: Box::new(InlineAssets),
            trace: TraceFormatter::new(),
        }
    }

    /// Current flags
    pub fn flags(&self) -> &Flags {
        &self.flags
    }

    /// The request this session belongs to
    pub fn request(&self) -> &RequestInfo {
        &self.request
    }

    /// Read a flag and, with `value`, replace it; returns the previous value
    pub fn flag(&mut self, name: &str, value: Option<&str>) -> Result<Option<String>> {
        let previous = self.flags.get(name)?;
        if let Some(value) = value {
            self.flags.set(name, value)?;
            debug!(flag = name, value, log_path = %self.log_path().display(), "Changed debug flag");
        }
        Ok(previous)
    }

    /// Restore every flag from the configuration; the header counter keeps counting
    pub fn reset(&mut self) {
        self.flags = Flags::from_config(&self.config, self.activated);
    }

    /// Path of the debug log
    pub fn log_path(&self) -> PathBuf {
        self.flags.log_path()
    }

    /// Whether debug output is produced
    pub fn is_enabled(&self) -> bool {
        match self.config.background_enabled {
            Some(enabled) if self.request.is_background() => enabled,
            _ => self.flags.enabled,
        }
    }

    /// Whether output is plain text; background requests always are
    pub fn is_text(&self) -> bool {
        self.format() == OutputFormat::Text
    }

    /// Effective output format
    pub fn format(&self) -> OutputFormat {
        if self.request.is_background() {
            OutputFormat::Text
        } else {
            self.flags.format
        }
    }

    /// Whether dumps carry a trace
    pub fn show_trace(&self) -> bool {
        self.flags.show_trace
    }

    /// Whether dumps carry the request details
    pub fn show_request(&self) -> bool {
        self.flags.show_request
    }

    /// Whether dumps carry the stats line
    pub fn show_stats(&self) -> bool {
        self.flags.show_stats
    }

    /// Whether redirects are replaced by a link page
    pub fn is_redirect_stopped(&self) -> bool {
        self.flags.stop_redirect
    }

    /// Unflushed state
    pub fn state(&self) -> SessionState {
        if self.blocks.is_empty() && !self.hooks.has_records() {
            SessionState::Idle
        } else {
            SessionState::Accumulating
        }
    }

    /// Run `f` with another requested format, restoring the previous one afterwards
    pub fn with_format<T>(&mut self, format: OutputFormat, f: impl FnOnce(&mut Self) -> T) -> T {
        let previous = std::mem::replace(&mut self.flags.format, format);
        let result = f(self);
        self.flags.format = previous;
        result
    }

    fn render_options(&self) -> RenderOptions {
        RenderOptions {
            format: self.format(),
            sort_keys: self.flags.sort_keys,
            mark_fields: self.flags.mark_fields.clone(),
            depth: self.flags.depth,
        }
    }

    /// Dump rows of one value in the current format
    pub fn render(&self, value: &DumpValue) -> String {
        TreeRenderer::new(&self.render_options()).render(value)
    }

    fn frames(&self) -> Vec<RawFrame> {
        self.call_stack.frames()
    }

    fn block_id() -> String {
        format!("wp-debug-{:08x}", rand::random::<u32>())
    }

    /// Stylesheet and script markup, produced once per session
    fn scripts(&mut self) -> String {
        if self.scripts_done {
            return String::new();
        }
        self.scripts_done = true;
        [AssetKind::Stylesheet, AssetKind::Script]
            .into_iter()
            .filter_map(|kind| self.assets.inject(DEBUG_ASSET, kind))
            .collect()
    }

    /// Markup loading the browser console helper, at most once per session
    ///
    /// Nothing is offered while disabled, with the `console` flag off, to background
    /// requests or to headless browsers.
    pub fn console_script(&mut self) -> Option<String> {
        if self.console_done || !self.is_enabled() || !self.flags.console {
            return None;
        }
        if self.request.is_background()
            || self.request.user_agent().is_some_and(|ua| ua.contains("HeadlessChrome"))
        {
            return None;
        }
        self.console_done = true;
        self.assets.inject(CONSOLE_ASSET, AssetKind::Script)
    }

    /// A rendered dump block of `values`, empty while disabled
    pub fn get_dump(&mut self, values: &[DumpValue]) -> String {
        if !self.is_enabled() {
            return String::new();
        }
        let format = self.format();
        let block_id = Self::block_id();
        let renderer_options = self.render_options();
        let renderer = TreeRenderer::new(&renderer_options);
        let mut parts = Vec::new();

        if format == OutputFormat::Html {
            let label = values
                .first()
                .filter(|value| value.is_scalar() && value.is_truthy())
                .and_then(DumpValue::scalar_text)
                .map(|text| html::strip_markup(&text).chars().take(BLOCK_LABEL_LENGTH).collect())
                .unwrap_or_else(|| "DEBUG".to_string());
            parts.push(format!(
                "{}<div class=\"wp-debug-block\">\
                 <span class=\"wp-debug-label\" onclick=\"_debToggle('{block_id}')\">{}</span>\
                 <div class=\"{block_id}\">\
                 <table cellspacing=\"0\" cellpadding=\"0\" width=\"100%\" border=\"0\" class=\"wp-debug-dump\">",
                self.scripts(),
                html::escape(&label)
            ));
        }
        parts.extend(values.iter().map(|value| renderer.render(value)));
        if format == OutputFormat::Html {
            parts.push("</table>".to_string());
        }

        if self.show_trace() {
            let frames = self.frames();
            parts.push(self.hooks.render_active(format, &block_id));
            parts.push(self.trace.full_trace(&frames, format, &block_id));
        }
        if self.show_request() {
            parts.push(self.request.http_request_block(format, &block_id));
        }
        if self.show_stats() {
            parts.push(self.request.stats_block(format));
        }
        if format == OutputFormat::Html {
            parts.push("</div><div class=\"wp-debug-clear\"></div></div>".to_string());
        }

        // text rows and blocks carry their own line breaks, keep one between parts
        if format == OutputFormat::Text {
            parts.iter_mut().for_each(|part| *part = part.trim_matches('\n').to_string());
        }
        parts.retain(|part| !part.is_empty());
        parts.join("\n")
    }

    /// Store a dump block of `values` for the next flush
    pub fn dump(&mut self, values: &[DumpValue]) {
        let block = self.get_dump(values);
        if !block.is_empty() {
            self.blocks.push(block);
            debug!(blocks = self.blocks.len(), "Stored dump block");
        }
    }

    /// Everything collected since the last flush; the session is idle afterwards
    pub fn flush(&mut self) -> String {
        let mut out = self.blocks.join("\n\n");

        if self.hooks.has_records() {
            let format = self.format();
            if format == OutputFormat::Html {
                out.push_str(&self.scripts());
            }
            out.push_str(&self.hooks.render_summary(format, &Self::block_id()));
        }

        self.blocks.clear();
        self.hooks.clear();
        out
    }

    /// Send `messages` as response headers, or as HTML comments once headers are out
    pub fn header(&mut self, messages: &[DumpValue], response: &mut dyn ResponseSink) {
        if !self.is_enabled() {
            return;
        }
        self.header_count += 1;
        let number = self.header_count;
        let sent = response.headers_sent();

        for (index, message) in messages.iter().enumerate() {
            let text = header_text(message);
            if sent {
                response.write_body(&format!(
                    "<!-- X-Debug[{number}.{index}]: {} -->\n",
                    text.replace("-->", "--/>")
                ));
            } else {
                response.add_header(
                    &format!("X-Debug-{number}.{index}"),
                    &text.replace(['\n', '\r'], " "),
                );
            }
        }

        if self.show_trace() {
            self.header_trace(None, response);
        }
    }

    /// Send the short trace as response headers or HTML comments
    pub fn header_trace(&mut self, group: Option<&str>, response: &mut dyn ResponseSink) {
        if !self.is_enabled() {
            return;
        }
        self.header_count += 1;
        let number = self.header_count;

        let mut lines = self.trace.short_trace(&self.frames());
        if let Some(group) = group.filter(|g| !g.is_empty()) {
            lines.insert(0, format!("Trace {}", capitalize_words(group)));
        }

        if response.headers_sent() {
            response.write_body("\n");
            for (index, line) in lines.iter().enumerate() {
                response.write_body(&format!(
                    "<!-- Debug-Trace-{number}.{index}: {} -->\n",
                    line.replace("-->", "--/>")
                ));
            }
        } else {
            for (index, line) in lines.iter().enumerate() {
                response.add_header(&format!("X-Debug-{number}.{index}-Trace"), line);
            }
        }
    }

    /// Append `values` to the debug log, one timestamped line each
    ///
    /// Logging works while debug output is disabled.
    pub fn log(&mut self, values: &[DumpValue]) {
        let time = Local::now().format("%Y-%m-%d\t%H:%M:%S\t").to_string();
        let dumps: Vec<String> = self.with_format(OutputFormat::Text, |session| {
            values
                .iter()
                .map(|value| value.scalar_text().unwrap_or_else(|| session.render(value)))
                .collect()
        });
        for dump in dumps {
            self.append_log(&format!("{time}{dump}\n"));
        }
    }

    /// Append the plain-text trace to the debug log
    pub fn log_trace(&mut self) {
        let trace = self.trace.full_trace(&self.frames(), OutputFormat::Text, "");
        self.append_log(&trace);
    }

    fn append_log(&mut self, line: &str) {
        let path = self.log_path();
        if let Err(err) = self.log_sink.append(&path, line) {
            if !self.log_failure_reported {
                self.log_failure_reported = true;
                warn!(path = %path.display(), error = %err, "Debug log could not be written");
            }
        }
    }

    /// Decide about a redirect to `location`
    ///
    /// `stop` overrides the `stop_redirect` flag. Redirects that proceed get a header
    /// trace of group `redirect`.
    pub fn redirect(
        &mut self,
        location: &str,
        stop: Option<bool>,
        response: &mut dyn ResponseSink,
    ) -> RedirectOutcome {
        if !self.is_enabled() || location.is_empty() {
            return RedirectOutcome::Proceed(location.to_string());
        }

        if !stop.unwrap_or_else(|| self.is_redirect_stopped()) {
            self.header_trace(Some("redirect"), response);
            return RedirectOutcome::Proceed(location.to_string());
        }

        let link = html::escape(location);
        let mut body = String::from("<!doctype html><html>");
        body.push_str("<center><h3>The website wants to redirect to this URL:</h3></center>");
        body.push_str(&format!("<center><a href=\"{link}\">{link}</a></center><hr>"));
        if self.show_trace() {
            let format = self.format();
            if format == OutputFormat::Html {
                body.push_str(&self.scripts());
            }
            body.push_str(&self.trace.full_trace(&self.frames(), format, &Self::block_id()));
        }
        body.push_str("</html>");
        debug!(location, "Intercepted redirect");

        RedirectOutcome::Intercept { status: 200, body }
    }

    /// Name of the user on whose behalf the request runs, cached in the flags
    pub fn current_user(&mut self) -> String {
        if let Some(user) = &self.flags.current_user {
            return user.clone();
        }
        let user = self.request.current_user();
        self.flags.current_user = Some(user.clone());
        user
    }

    /// Send a webhook message
    ///
    /// With `trace_lines > 0` the footer names the calling location; every further
    /// line adds a frame of the short trace as `Stacktrace` field. Returns `false`
    /// when nothing was sent because no hook is configured or the message is empty.
    pub fn notify(
        &mut self,
        message: impl Into<SlackMessage>,
        trace_lines: usize,
        channels: &[&str],
        is_private: bool,
    ) -> bool {
        let mut message = message.into();
        if self.notifier.is_none() || self.flags.slack.hook.is_empty() || message.is_empty() {
            return false;
        }
        message.prepare();

        if trace_lines > 0 {
            let frames = self.frames();
            let user = self.current_user();
            let who: Vec<&str> =
                [self.request.remote_addr(), Some(user.as_str()), self.request.server_name()]
                    .into_iter()
                    .flatten()
                    .filter(|part| !part.is_empty())
                    .collect();
            let who = who.join(" | ");
            message.footer = Some(match self.trace.caller(&frames) {
                Some(caller) => format!("{}:{} • {who}", caller.file_short, caller.line),
                None => who,
            });

            if trace_lines > 1 {
                let trace: Vec<String> =
                    self.trace.short_trace(&frames).into_iter().take(trace_lines - 1).collect();
                if !trace.is_empty() {
                    message.fields.push(MessageField::long("Stacktrace", trace.join("\n")));
                }
            }
        }

        let username = if self.flags.slack.name.is_empty() {
            None
        } else {
            let user = self.current_user();
            Some(self.flags.slack.name.replace("@USER", &user))
        };
        let icon_emoji =
            (!self.flags.slack.icon.is_empty()).then(|| self.flags.slack.icon.clone());
        let mut payload = SlackPayload {
            attachments: vec![message],
            mrkdwn: true,
            username,
            icon_emoji,
            channel: None,
        };

        let Some(notifier) = &self.notifier else {
            return false;
        };
        for recipient in recipients(channels, &self.flags.slack.channel, is_private) {
            payload.channel = recipient;
            if let Err(err) = notifier.deliver(&self.flags.slack.hook, &payload) {
                warn!(channel = ?payload.channel, error = %err, "Notification delivery failed");
            }
        }
        true
    }

    /// Start or stop hook tracing
    pub fn debug_hooks<S: AsRef<str>>(
        &mut self,
        enabled: bool,
        patterns: &[S],
        whitelist: bool,
    ) -> Result<()> {
        self.hooks.configure(enabled, patterns, whitelist)
    }

    /// Report a fired hook; returns whether it was recorded
    pub fn record_hook(&mut self, name: &str) -> bool {
        self.hooks.record(name)
    }

    /// A hook callback starts running
    pub fn enter_hook(&mut self, name: impl Into<String>, priority: i64) {
        self.hooks.enter(name, priority);
    }

    /// The innermost hook callback finished
    pub fn leave_hook(&mut self) {
        self.hooks.leave();
    }

    /// Store a listing of the callbacks registered on `tag` for the next flush
    pub fn dump_hook(&mut self, tag: &str, callbacks: &[HookCallback]) {
        if !self.is_enabled() {
            return;
        }
        let block = render_callbacks(tag, callbacks, self.format());
        self.blocks.push(block);
    }

    /// A coloured marker for `data`
    pub fn marker(&self, data: Option<&DumpValue>, styles: &[(&str, &str)]) -> Marker {
        marker(data, styles)
    }
}

/// Header form of a message
fn header_text(message: &DumpValue) -> String {
    match message {
        DumpValue::Bool(b) => format!("[bool] {b}"),
        DumpValue::Null => "[null] null".to_string(),
        DumpValue::Str(s) => s.clone(),
        DumpValue::Int(_) | DumpValue::Float(_) => message.scalar_text().unwrap_or_default(),
        _ => message.to_json().to_string(),
    }
}

fn capitalize_words(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut start = true;
    for c in text.chars() {
        if start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        start = c.is_whitespace();
    }
    out
}
