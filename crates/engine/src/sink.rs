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

//! Output sinks
//!
//! The session never performs I/O on its own. Log lines go to a [`LogSink`] and
//! headers or inline comments go to a [`ResponseSink`]; both are supplied by the
//! host.

use std::{
    cell::RefCell,
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    rc::Rc,
};

use tracing::debug;

/// Append-only destination of the debug log
pub trait LogSink {
    /// Append one line to the log at `path`
    fn append(&mut self, path: &Path, line: &str) -> io::Result<()>;
}

/// Appends to a file, creating it and its directory on first write
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLogSink;

impl LogSink for FileLogSink {
    fn append(&mut self, path: &Path, line: &str) -> io::Result<()> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            if !dir.exists() {
                fs::create_dir_all(dir)?;
                debug!(dir = %dir.display(), "Created debug log directory");
            }
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(line.as_bytes())
    }
}

/// Keeps log lines in memory; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct MemoryLogSink {
    lines: Rc<RefCell<Vec<(PathBuf, String)>>>,
}

impl MemoryLogSink {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines appended so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().iter().map(|(_, line)| line.clone()).collect()
    }

    /// Paths and lines appended so far
    pub fn entries(&self) -> Vec<(PathBuf, String)> {
        self.lines.borrow().clone()
    }
}

impl LogSink for MemoryLogSink {
    fn append(&mut self, path: &Path, line: &str) -> io::Result<()> {
        self.lines.borrow_mut().push((path.to_path_buf(), line.to_string()));
        Ok(())
    }
}

/// The HTTP response under construction
pub trait ResponseSink {
    /// Whether the headers already went out
    fn headers_sent(&self) -> bool;
    /// Add a response header
    fn add_header(&mut self, name: &str, value: &str);
    /// Write to the response body
    fn write_body(&mut self, chunk: &str);
}

/// A response held in memory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferedResponse {
    /// Headers in insertion order
    pub headers: Vec<(String, String)>,
    /// Body written so far
    pub body: String,
    /// Whether the headers count as sent
    pub sent: bool,
}

impl BufferedResponse {
    /// A response whose headers are still open
    pub fn new() -> Self {
        Self::default()
    }

    /// A response whose headers are already sent
    pub fn sent() -> Self {
        Self { sent: true, ..Self::default() }
    }

    /// Value of the first header with this name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }
}

impl ResponseSink for BufferedResponse {
    fn headers_sent(&self) -> bool {
        self.sent
    }

    fn add_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn write_body(&mut self, chunk: &str) {
        self.body.push_str(chunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_sink_creates_directory_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("debug.log");
        let mut sink = FileLogSink;

        sink.append(&path, "first\n").unwrap();
        sink.append(&path, "second\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn test_file_sink_reports_errors() {
        let dir = tempfile::tempdir().unwrap();
        // a directory cannot be opened for appending
        assert!(FileLogSink.append(dir.path(), "line\n").is_err());
    }

    #[test]
    fn test_memory_sink_shares_buffer() {
        let sink = MemoryLogSink::new();
        let mut writer = sink.clone();
        writer.append(Path::new("/tmp/x.log"), "hello\n").unwrap();
        assert_eq!(sink.lines(), vec!["hello\n"]);
        assert_eq!(sink.entries()[0].0, PathBuf::from("/tmp/x.log"));
    }
}
