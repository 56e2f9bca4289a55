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

use std::path::PathBuf;
use std::time::Duration;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

pub const DEFAULT_API_URL: &str = "https://cloud.ravellosystems.com/api/v1";
pub const ENV_INI_PATH: &str = "RAVELLO_INI_PATH";
pub const ENV_API_URL: &str = "RAVELLO_URL";
pub const ENV_APP_NAME: &str = "RAVELLO_APP";

static ENV_VAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{(\w+)\}|\$(\w+)").expect("env var pattern")
});

/// Settings shared by the inventory script and the modules
#[derive(Clone, Debug)]
pub struct RavelloConfig {
    pub api_url: String,
    pub ini_paths: Vec<PathBuf>,
    pub login_file: PathBuf,
    pub app_name: Option<String>,
    pub wait_timeout: Duration,
    pub poll_interval: Duration,
    pub http_timeout: Duration,
    pub verbosity: u32,
}

impl Default for RavelloConfig {
    fn default() -> Self {
        Self {
            api_url: String::from(DEFAULT_API_URL),
            ini_paths: default_ini_paths(),
            login_file: expand_path("~/.ravello_login"),
            app_name: None,
            wait_timeout: Duration::from_secs(1200),
            poll_interval: Duration::from_secs(10),
            http_timeout: Duration::from_secs(120),
            verbosity: 0,
        }
    }
}

impl RavelloConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults plus whatever the RAVELLO_* environment variables add.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(extra) = std::env::var(ENV_INI_PATH) {
            config.ini_paths.push(expand_path(&extra));
        }
        if let Ok(url) = std::env::var(ENV_API_URL) {
            if !url.is_empty() {
                config.api_url = url;
            }
        }
        if let Ok(app) = std::env::var(ENV_APP_NAME) {
            if !app.is_empty() {
                config.app_name = Some(app);
            }
        }
        config
    }

    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn ini_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.ini_paths.push(path.into());
        self
    }

    pub fn ini_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.ini_paths = paths;
        self
    }

    pub fn login_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.login_file = path.into();
        self
    }

    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    pub fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn verbosity(mut self, verbosity: u32) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn verbose(mut self) -> Self {
        self.verbosity = 1;
        self
    }
}

// ravello.ini next to the executable, then the system-wide one
fn default_ini_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            paths.push(dir.join("ravello.ini"));
        }
    }
    paths.push(PathBuf::from("/etc/ansible/ravello.ini"));
    paths
}

/// Expand `$VAR` / `${VAR}` and a leading `~` the way a shell would.
/// Unset variables are left as written.
pub fn expand_path(raw: &str) -> PathBuf {
    let vars_expanded = ENV_VAR
        .replace_all(raw, |caps: &Captures| {
            let name = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str()).unwrap_or("");
            std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned();
    match expanduser::expanduser(&vars_expanded) {
        Ok(path) => path,
        Err(_) => PathBuf::from(vars_expanded),
    }
}
