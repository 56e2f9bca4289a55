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

use std::fmt;
use std::error::Error as StdError;
use std::io;

/// Failures of the dotted-path accessor. Each variant carries the full path
/// string as the caller wrote it.
#[derive(Debug, Clone, PartialEq)]
pub enum PathError {
    /// The path string could not be parsed (e.g. it was empty)
    Invalid { path: String },

    /// A segment did not resolve inside the document
    NotFound { path: String },

    /// A sequence write more than one slot past the end
    IndexOutOfRange { path: String, index: usize, len: usize },

    /// The walk reached a scalar where a mapping or sequence was needed
    NotAContainer { path: String },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::Invalid { path } => write!(f, "invalid json path string: '{}'", path),
            PathError::NotFound { path } => write!(f, "json path not found: {}", path),
            PathError::IndexOutOfRange { path, index, len } =>
                write!(f, "index {} out of range (length {}) in json path: {}", index, len, path),
            PathError::NotAContainer { path } => write!(f, "json path walks into a scalar: {}", path),
        }
    }
}

impl StdError for PathError {}

/// Main error type for Ravello operations
#[derive(Debug)]
pub enum RavelloError {
    /// Configuration errors
    Config(String),

    /// No usable username/password could be found
    Credentials(String),

    /// Login was rejected
    Auth(String),

    /// The Ravello REST API returned an error or an unexpected payload
    Api(String),

    /// An application template failed validation
    Template(String),

    /// Dotted-path accessor errors
    Path(PathError),

    /// Module argument or state errors
    Module(String),

    /// Inventory construction errors
    Inventory(String),

    /// Polling for a VM state failed or timed out
    Wait(String),

    /// IO errors
    Io(io::Error),

    /// YAML parsing errors
    Yaml(serde_yaml::Error),

    /// JSON parsing errors
    Json(serde_json::Error),

    /// Other errors
    Other(String),
}

impl fmt::Display for RavelloError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RavelloError::Config(msg) => write!(f, "Configuration error: {}", msg),
            RavelloError::Credentials(msg) => write!(f, "Credentials error: {}", msg),
            RavelloError::Auth(msg) => write!(f, "Authentication error: {}", msg),
            RavelloError::Api(msg) => write!(f, "Ravello API error: {}", msg),
            // template messages are already user facing
            RavelloError::Template(msg) => write!(f, "{}", msg),
            RavelloError::Path(err) => write!(f, "error: {}", err),
            RavelloError::Module(msg) => write!(f, "{}", msg),
            RavelloError::Inventory(msg) => write!(f, "Inventory error: {}", msg),
            RavelloError::Wait(msg) => write!(f, "{}", msg),
            RavelloError::Io(err) => write!(f, "IO error: {}", err),
            RavelloError::Yaml(err) => write!(f, "YAML error: {}", err),
            RavelloError::Json(err) => write!(f, "JSON error: {}", err),
            RavelloError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl StdError for RavelloError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            RavelloError::Path(err) => Some(err),
            RavelloError::Io(err) => Some(err),
            RavelloError::Yaml(err) => Some(err),
            RavelloError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PathError> for RavelloError {
    fn from(err: PathError) -> Self {
        RavelloError::Path(err)
    }
}

impl From<io::Error> for RavelloError {
    fn from(err: io::Error) -> Self {
        RavelloError::Io(err)
    }
}

impl From<serde_yaml::Error> for RavelloError {
    fn from(err: serde_yaml::Error) -> Self {
        RavelloError::Yaml(err)
    }
}

impl From<serde_json::Error> for RavelloError {
    fn from(err: serde_json::Error) -> Self {
        RavelloError::Json(err)
    }
}

impl From<String> for RavelloError {
    fn from(err: String) -> Self {
        RavelloError::Other(err)
    }
}

impl From<&str> for RavelloError {
    fn from(err: &str) -> Self {
        RavelloError::Other(err.to_string())
    }
}

/// Result type alias for Ravello operations
pub type Result<T> = std::result::Result<T, RavelloError>;

/// Helper trait to convert String errors to RavelloError
pub trait ErrorContext<T> {
    fn context(self, context: &str) -> Result<T>;
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::result::Result<T, String> {
    fn context(self, context: &str) -> Result<T> {
        self.map_err(|e| RavelloError::Other(format!("{}: {}", context, e)))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| RavelloError::Other(format!("{}: {}", f(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_error_display_carries_path() {
        let err = PathError::NotFound { path: String::from("design.vms.3") };
        assert_eq!(err.to_string(), "json path not found: design.vms.3");
        let wrapped: RavelloError = err.into();
        assert!(wrapped.to_string().contains("design.vms.3"));
        assert!(wrapped.source().is_some());
    }

    #[test]
    fn test_error_context() {
        let failed: std::result::Result<(), String> = Err(String::from("boom"));
        let err = failed.context("reading template").unwrap_err();
        assert_eq!(err.to_string(), "Error: reading template: boom");
    }
}
