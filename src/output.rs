// Ravello Ansible
// Copyright (C) Riff Labs Limited <team@riff.cc>
// Based on Jetporch by Michael DeHaan <michael@michaeldehaan.net> + contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// long with this program.  If not, see <http://www.gnu.org/licenses/>.

use std::sync::{Arc, Mutex};
use inline_colorization::{color_red, color_yellow, color_cyan, color_reset};

/// Trait for handling log output from inventory and module runs.
///
/// Stdout belongs to the Ansible protocol (inventory or result JSON), so
/// implementations must never print there.
pub trait OutputHandler: Send + Sync {
    fn on_module_start(&self, _module: &str, _state: &str) {}
    fn on_request(&self, _method: &str, _path: &str) {}
    fn on_state_poll(&self, _app: &str, _states: &[String], _elapsed_secs: u64) {}

    fn log(&self, level: LogLevel, message: &str);
    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }
    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }
    fn warning(&self, message: &str) {
        self.log(LogLevel::Warning, message);
    }
    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

/// A no-op output handler for when output is not needed
pub struct NullOutputHandler;

impl OutputHandler for NullOutputHandler {
    fn log(&self, _level: LogLevel, _message: &str) {}
}

/// Writes to stderr, used by the inventory script and tools
pub struct TerminalOutputHandler {
    pub verbosity: u32,
}

impl TerminalOutputHandler {
    pub fn new(verbosity: u32) -> Self {
        Self { verbosity }
    }
}

impl OutputHandler for TerminalOutputHandler {
    fn on_request(&self, method: &str, path: &str) {
        if self.verbosity >= 2 {
            eprintln!("{color_cyan}{} {}{color_reset}", method, path);
        }
    }

    fn on_state_poll(&self, app: &str, states: &[String], elapsed_secs: u64) {
        if self.verbosity >= 1 {
            eprintln!("  → {} VM states [{}] after {}s", app, states.join(", "), elapsed_secs);
        }
    }

    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug if self.verbosity >= 3 => eprintln!("DEBUG: {}", message),
            LogLevel::Info if self.verbosity >= 1 => eprintln!("INFO: {}", message),
            LogLevel::Warning => eprintln!("{color_yellow}WARNING: {}{color_reset}", message),
            LogLevel::Error => eprintln!("{color_red}ERROR: {}{color_reset}", message),
            _ => {}
        }
    }
}

/// Buffers every line so a module can hand its log back to Ansible in the
/// `stdout` field of the result.
pub struct CaptureOutputHandler {
    lines: Mutex<Vec<String>>,
    source: String,
}

impl CaptureOutputHandler {
    pub fn new(source: &str) -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
            source: source.to_string(),
        }
    }

    pub fn contents(&self) -> String {
        match self.lines.lock() {
            Ok(lines) => lines.join("\n"),
            Err(_) => String::new(),
        }
    }

    fn push(&self, level: LogLevel, message: &str) {
        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S,%3f");
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(format!("{} - {} - {} - {}", stamp, self.source, level.as_str(), message));
        }
    }
}

impl OutputHandler for CaptureOutputHandler {
    fn on_module_start(&self, module: &str, state: &str) {
        self.push(LogLevel::Info, &format!("{} state={}", module, state));
    }

    fn on_request(&self, method: &str, path: &str) {
        self.push(LogLevel::Debug, &format!("{} {}", method, path));
    }

    fn on_state_poll(&self, app: &str, states: &[String], elapsed_secs: u64) {
        self.push(LogLevel::Debug, &format!("{} VM states [{}] after {}s", app, states.join(", "), elapsed_secs));
    }

    fn log(&self, level: LogLevel, message: &str) {
        self.push(level, message);
    }
}

/// Thread-safe wrapper for output handlers
pub type OutputHandlerRef = Arc<dyn OutputHandler>;
