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

//! Call-stack formatting
//!
//! The host hands over a snapshot of its call stack as [`RawFrame`]s, innermost
//! first, through a [`CallStackProvider`]. [`TraceFormatter`] turns the snapshot
//! into two views:
//!
//! - a short trace, one fixed-width line per frame, used for headers and webhook
//!   messages;
//! - a full trace, an HTML table or a plain-text list with argument previews,
//!   without the frames of this crate.
//!
//! Frames without location info borrow the location of the nearest outer frame
//! that has one.

use reqdebug_common::OutputFormat;

use crate::{html, DumpValue};

/// Innermost frames skipped by the short trace when the stack is deep enough
pub const SHORT_TRACE_SKIP: usize = 4;

/// Width of the file column
pub const FILE_COLUMN_WIDTH: usize = 80;

/// Maximal string argument length in the short trace
pub const ARG_PREVIEW_LENGTH: usize = 20;

const CALLER_FILE_WIDTH: usize = 100;

/// One frame of a host call stack
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFrame {
    /// Source file, when known
    pub file: Option<String>,
    /// Source line, when known
    pub line: Option<u32>,
    /// Function name
    pub function: Option<String>,
    /// Class of a method call
    pub class: Option<String>,
    /// Call-type marker between class and function, e.g. `::` or `->`
    pub call_type: Option<String>,
    /// Call arguments
    pub args: Vec<DumpValue>,
}

impl RawFrame {
    /// Frame of a plain function call
    pub fn new(function: impl Into<String>) -> Self {
        Self { function: Some(function.into()), ..Default::default() }
    }

    /// Set the location
    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    /// Make this a method call
    pub fn method(mut self, class: impl Into<String>, call_type: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self.call_type = Some(call_type.into());
        self
    }

    /// Set the arguments
    pub fn args<I, T>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<DumpValue>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// `Class::function`, `Class->function` or `function`
    pub fn qualified_name(&self) -> String {
        [&self.class, &self.call_type, &self.function]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .collect()
    }
}

/// Supplies the call stack at the current execution point
pub trait CallStackProvider {
    /// Frames, innermost first
    fn frames(&self) -> Vec<RawFrame>;
}

impl<F> CallStackProvider for F
where
    F: Fn() -> Vec<RawFrame>,
{
    fn frames(&self) -> Vec<RawFrame> {
        self()
    }
}

/// A provider for hosts without stack introspection
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCallStack;

impl CallStackProvider for NoCallStack {
    fn frames(&self) -> Vec<RawFrame> {
        Vec::new()
    }
}

/// A provider that always returns the same snapshot
#[derive(Debug, Clone, Default)]
pub struct StaticCallStack(pub Vec<RawFrame>);

impl CallStackProvider for StaticCallStack {
    fn frames(&self) -> Vec<RawFrame> {
        self.0.clone()
    }
}

/// A frame with its location resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFrame {
    /// Source file, empty when unknown
    pub file: String,
    /// Source line
    pub line: Option<u32>,
    /// Qualified function name
    pub function_qualified_name: String,
    /// Short argument previews
    pub arguments_preview: Vec<String>,
}

/// Location of the code that called into the debugger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerInfo {
    /// Source file
    pub file: String,
    /// Source file shortened to 100 characters
    pub file_short: String,
    /// Source line
    pub line: u32,
    /// Function that contains the call
    pub function: String,
}

/// Formats call stacks
#[derive(Debug, Clone)]
pub struct TraceFormatter {
    own_source: Option<String>,
    skip: usize,
}

impl Default for TraceFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceFormatter {
    /// A formatter that hides the frames of this crate
    pub fn new() -> Self {
        Self {
            own_source: Some(concat!(env!("CARGO_MANIFEST_DIR"), "/src").to_string()),
            skip: SHORT_TRACE_SKIP,
        }
    }

    /// Replace the path prefix of frames that belong to the debugger itself
    pub fn with_own_source(mut self, prefix: Option<String>) -> Self {
        self.own_source = prefix.filter(|p| !p.is_empty());
        self
    }

    /// Replace the number of innermost frames the short trace skips
    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    fn is_own(&self, file: &str) -> bool {
        self.own_source.as_deref().is_some_and(|own| !file.is_empty() && file.starts_with(own))
    }

    /// Resolve every frame of a snapshot
    pub fn frames(&self, raw: &[RawFrame]) -> Vec<TraceFrame> {
        (0..raw.len())
            .map(|index| {
                let (file, line) = location(raw, index);
                let frame = &raw[index];
                let arguments_preview = if index > 0 {
                    frame.args.iter().map(short_arg).collect()
                } else {
                    Vec::new()
                };
                TraceFrame {
                    file: file.to_string(),
                    line,
                    function_qualified_name: frame.qualified_name(),
                    arguments_preview,
                }
            })
            .collect()
    }

    /// One fixed-width line per frame
    ///
    /// ```text
    /// 01# /srv/app/handler.rs                                                     :   42 App::handle("GET", [Array])
    /// ```
    pub fn short_trace(&self, raw: &[RawFrame]) -> Vec<String> {
        let start = if raw.len() > self.skip { self.skip } else { 0 };
        self.frames(raw)
            .into_iter()
            .skip(start)
            .enumerate()
            .map(|(index, frame)| {
                format!(
                    "{:02}# {}:{:>5} {}({})",
                    index + 1,
                    fit_path(&frame.file, FILE_COLUMN_WIDTH),
                    frame.line.map(|l| l.to_string()).unwrap_or_default(),
                    frame.function_qualified_name,
                    frame.arguments_preview.join(", ")
                )
            })
            .collect()
    }

    /// Full trace as a collapsible HTML table or a plain-text list
    ///
    /// `block_id` names the HTML container; it is not used for plain text.
    pub fn full_trace(&self, raw: &[RawFrame], format: OutputFormat, block_id: &str) -> String {
        let mut out = String::new();
        if format == OutputFormat::Html {
            out.push_str(&format!(
                "<span class=\"wdev-trace-toggle\" onclick=\"_debToggle('{block_id}-trace')\"><b>Back-Trace</b></span>\
                 <div class=\"{block_id}-trace\" style=\"display:none\">\
                 <table class=\"wdev-trace\" width=\"100%\" cellspacing=\"0\" cellpadding=\"3\" border=\"1\">\n"
            ));
        }

        let mut number = 0;
        for (index, frame) in raw.iter().enumerate() {
            let (file, line) = location(raw, index);
            if self.is_own(file) || frame.file.as_deref().is_some_and(|f| self.is_own(f)) {
                continue;
            }
            number += 1;

            let args = if index > 0 { html_args(&frame.args) } else { String::new() };
            let line = line.map(|l| l.to_string()).unwrap_or_default();
            let function = html::escape(&frame.qualified_name());

            match format {
                OutputFormat::Text => out.push_str(&format!(
                    "\n  {number:>2}. \t {}: {line:>5} \t by {}({})",
                    fit_path(file, FILE_COLUMN_WIDTH),
                    frame.qualified_name(),
                    html::strip_markup(&args)
                )),
                OutputFormat::Html => {
                    let (dir, base) = split_path(file);
                    let location = format!(
                        "<td class='trc-loc'{}><span class='trc-line'>:{line}</span>\
                         <span class='trc-dir'>{}</span><span class='trc-file'>{}</span></td>",
                        if number == 1 { " colspan='2'" } else { "" },
                        html::escape(dir),
                        html::escape(base)
                    );
                    let call = if number == 1 {
                        String::new()
                    } else {
                        format!("<td class='trc-arg'>{function}({args})</td>")
                    };
                    out.push_str(&format!(
                        "<tr><td class='trc-num' onclick='_debMark(this)'>{number}</td>{location}{call}</tr>\n"
                    ));
                }
            }
        }

        match format {
            OutputFormat::Text => out.push_str("\n-----\n"),
            OutputFormat::Html => out.push_str("</table></div>"),
        }
        out
    }

    /// The innermost frame outside the debugger that has a location
    pub fn caller(&self, raw: &[RawFrame]) -> Option<CallerInfo> {
        raw.iter().enumerate().find_map(|(index, frame)| {
            let file = frame.file.as_deref().unwrap_or_default();
            if self.is_own(file) {
                return None;
            }
            let line = frame.line?;
            let next = raw.get(index + 1).unwrap_or(frame);
            Some(CallerInfo {
                file: file.to_string(),
                file_short: shorten_path(file, CALLER_FILE_WIDTH),
                line,
                function: next.function.clone().unwrap_or_default(),
            })
        })
    }
}

/// Location of a frame, taken from the nearest frame at or after `index` that has a line
fn location(raw: &[RawFrame], index: usize) -> (&str, Option<u32>) {
    raw[index..]
        .iter()
        .find(|frame| frame.line.is_some())
        .map(|frame| (frame.file.as_deref().unwrap_or_default(), frame.line))
        .unwrap_or(("", None))
}

/// Argument preview of the short trace
fn short_arg(arg: &DumpValue) -> String {
    match arg {
        DumpValue::Bool(b) => b.to_string(),
        DumpValue::Str(s) => {
            let flat: String = s
                .chars()
                .filter(|c| !matches!(c, '\n' | '\r'))
                .map(|c| if c == '\t' { ' ' } else { c })
                .collect();
            if flat.chars().count() > ARG_PREVIEW_LENGTH {
                let head: String = flat.chars().take(ARG_PREVIEW_LENGTH).collect();
                format!("\"{head}...\"")
            } else {
                format!("\"{flat}\"")
            }
        }
        DumpValue::Int(i) => i.to_string(),
        DumpValue::Float(f) => f.to_string(),
        DumpValue::Null => "NULL".to_string(),
        DumpValue::Collection(_) => "[Array]".to_string(),
        DumpValue::Object(object) => format!("[{}]", object.class_name()),
        DumpValue::Callable(name) => format!("[{name}]"),
    }
}

/// Argument previews of the full trace, full length and escaped
fn html_args(args: &[DumpValue]) -> String {
    args.iter()
        .map(|arg| {
            let preview = match arg {
                DumpValue::Bool(b) => b.to_string(),
                DumpValue::Str(s) => format!("&quot;{}&quot;", html::escape(s)),
                DumpValue::Int(i) => i.to_string(),
                DumpValue::Float(f) => f.to_string(),
                DumpValue::Null => "<i>NULL</i>".to_string(),
                DumpValue::Collection(_) => "<i>[Array]</i>".to_string(),
                DumpValue::Object(object) => {
                    format!("<i>[{}]</i>", html::escape(&object.class_name()))
                }
                DumpValue::Callable(name) => format!("<i>[{}]</i>", html::escape(name)),
            };
            format!("<span class=\"trc-param\">{preview}</span>")
        })
        .collect::<Vec<_>>()
        .join("<span class=\"trc-sep\">, </span>")
}

/// Pad a path to `width` characters, or keep its tail behind `...`
pub fn fit_path(path: &str, width: usize) -> String {
    if path.chars().count() > width {
        shorten_path(path, width)
    } else {
        format!("{path:<width$}")
    }
}

fn shorten_path(path: &str, width: usize) -> String {
    let count = path.chars().count();
    if count <= width {
        return path.to_string();
    }
    let tail: String = path.chars().skip(count - (width - 3)).collect();
    format!("...{tail}")
}

fn split_path(path: &str) -> (&str, &str) {
    match path.rfind(['/', '\\']) {
        Some(pos) => path.split_at(pos + 1),
        None => ("", path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ObjectRef;

    fn stack() -> Vec<RawFrame> {
        vec![
            RawFrame::new("dump").at("/lib/reqdebug/session.rs", 10),
            RawFrame::new("debug").at("/app/src/helpers.rs", 20).args(["payload"]),
            RawFrame::new("handle")
                .method("Controller", "->")
                .at("/app/src/controller.rs", 30)
                .args(vec![DumpValue::from(true), DumpValue::Null, DumpValue::list(vec![1])]),
            RawFrame::new("main").at("/app/src/main.rs", 40),
        ]
    }

    #[test]
    fn test_qualified_name() {
        assert_eq!(stack()[2].qualified_name(), "Controller->handle");
        assert_eq!(RawFrame::default().qualified_name(), "");
    }

    #[test]
    fn test_short_trace_line_format() {
        let lines = TraceFormatter::new().short_trace(&stack());
        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[2],
            format!(
                "03# {:<80}:   30 Controller->handle(true, NULL, [Array])",
                "/app/src/controller.rs"
            )
        );
        // the innermost frame never shows arguments
        assert!(lines[0].ends_with(" dump()"));
    }

    #[test]
    fn test_short_trace_skips_wrapper_frames() {
        let mut frames = stack();
        frames.push(RawFrame::new("start").at("/app/src/rt.rs", 1));
        let lines = TraceFormatter::new().short_trace(&frames);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("01# /app/src/rt.rs"));
    }

    #[test]
    fn test_argument_and_path_truncation() {
        let long_path = format!("/{}", "d/".repeat(60));
        let frames = vec![
            RawFrame::new("inner").at("/x.rs", 1),
            RawFrame::new("outer").at(long_path.clone(), 2).args([
                "abcdefghijklmnopqrstuvwxyz",
            ]),
        ];
        let lines = TraceFormatter::new().with_skip(4).short_trace(&frames);
        let expected_path = format!("...{}", &long_path[long_path.len() - 77..]);
        assert!(lines[1].contains(&format!("{expected_path}:    2")));
        assert!(lines[1].ends_with("outer(\"abcdefghijklmnopqrst...\")"));
    }

    #[test]
    fn test_fit_path_width_boundary() {
        let exact = format!("/é{}", "a".repeat(78));
        assert_eq!(exact.chars().count(), 80);
        assert_eq!(fit_path(&exact, 80), exact);

        let short = "/app/x.rs";
        let padded = fit_path(short, 80);
        assert_eq!(padded.chars().count(), 80);
        assert!(padded.starts_with(short));

        let over = format!("/é{}", "b".repeat(79));
        assert_eq!(over.chars().count(), 81);
        let fitted = fit_path(&over, 80);
        assert_eq!(fitted.chars().count(), 80);
        assert!(fitted.starts_with("..."));
        assert_eq!(&fitted[3..], &"b".repeat(77));
    }

    #[test]
    fn test_missing_location_uses_outer_frame() {
        let frames = vec![
            RawFrame::new("reflect"),
            RawFrame::new("call").at("/app/a.rs", 7),
        ];
        let resolved = TraceFormatter::new().frames(&frames);
        assert_eq!(resolved[0].file, "/app/a.rs");
        assert_eq!(resolved[0].line, Some(7));

        let orphan = TraceFormatter::new().frames(&[RawFrame::new("lost")]);
        assert_eq!(orphan[0].file, "");
        assert_eq!(orphan[0].line, None);
    }

    #[test]
    fn test_full_trace_text_excludes_own_frames() {
        let formatter = TraceFormatter::new().with_own_source(Some("/lib/reqdebug".into()));
        let text = formatter.full_trace(&stack(), OutputFormat::Text, "t");
        assert!(!text.contains("session.rs"));
        assert!(text.contains("   1. \t /app/src/helpers.rs"));
        assert!(text.contains("by Controller->handle(true, NULL, [Array])"));
        assert!(text.ends_with("\n-----\n"));
    }

    #[test]
    fn test_full_trace_html_escapes_arguments() {
        let object = ObjectRef::new("Req<T>");
        let frames = vec![
            RawFrame::new("inner").at("/app/a.rs", 1),
            RawFrame::new("outer").at("/app/b.rs", 2).args(vec![
                DumpValue::from("<script>"),
                DumpValue::from(object),
            ]),
        ];
        let html = TraceFormatter::new().full_trace(&frames, OutputFormat::Html, "blk");
        assert!(html.contains("class=\"blk-trace\""));
        assert!(html.contains("&quot;&lt;script&gt;&quot;"));
        assert!(html.contains("[Req&lt;T&gt;]"));
        assert!(html.contains("<span class='trc-dir'>/app/</span><span class='trc-file'>b.rs</span>"));
    }

    #[test]
    fn test_caller_skips_own_frames() {
        let formatter = TraceFormatter::new().with_own_source(Some("/lib/reqdebug".into()));
        let caller = formatter.caller(&stack()).unwrap();
        assert_eq!(caller.file, "/app/src/helpers.rs");
        assert_eq!(caller.line, 20);
        assert_eq!(caller.function, "handle");

        let long = format!("/{}", "x".repeat(150));
        let frames = vec![RawFrame::new("f").at(long.clone(), 3)];
        let caller = TraceFormatter::new().caller(&frames).unwrap();
        assert_eq!(caller.file_short.len(), 100);
        assert!(caller.file_short.starts_with("..."));
        assert!(long.ends_with(&caller.file_short[3..]));
    }
}
