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
use std::path::{Path, PathBuf};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::config::RavelloConfig;
use crate::error::{RavelloError, Result};
use crate::util::ini::read_section;
use crate::util::io::read_optional_file;

pub const ENV_USERNAME: &str = "RAVELLO_USERNAME";
pub const ENV_PASSWORD: &str = "RAVELLO_PASSWORD";

#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

// keep the password out of debug logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

/// Where a username/password pair may come from. Each source has to supply
/// both values on its own to be used.
#[derive(Clone, Debug)]
pub enum CredentialSource {
    /// Module arguments
    Params { username: Option<String>, password: Option<String> },
    /// RAVELLO_USERNAME / RAVELLO_PASSWORD
    Environment,
    /// `[ravello]` section of ravello.ini files
    Ini(Vec<PathBuf>),
    /// Username on the first line, base64 password on the second
    LoginFile(PathBuf),
}

impl CredentialSource {
    fn describe(&self) -> String {
        match self {
            CredentialSource::Params { .. } => String::from("module parameters"),
            CredentialSource::Environment => format!("{}/{}", ENV_USERNAME, ENV_PASSWORD),
            CredentialSource::Ini(paths) => {
                let shown: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
                format!("ini files [{}]", shown.join(", "))
            }
            CredentialSource::LoginFile(path) => format!("login file {}", path.display()),
        }
    }

    fn lookup(&self) -> Result<Option<Credentials>> {
        let (username, password) = match self {
            CredentialSource::Params { username, password } => (username.clone(), password.clone()),
            CredentialSource::Environment => (std::env::var(ENV_USERNAME).ok(), std::env::var(ENV_PASSWORD).ok()),
            CredentialSource::Ini(paths) => {
                let section = read_section(paths, "ravello").map_err(RavelloError::Credentials)?;
                (section.get("username").cloned(), section.get("password").cloned())
            }
            CredentialSource::LoginFile(path) => match read_login_file(path)? {
                Some(found) => return Ok(Some(found)),
                None => (None, None),
            },
        };
        Ok(pair(username, password))
    }
}

fn pair(username: Option<String>, password: Option<String>) -> Option<Credentials> {
    match (username, password) {
        (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() =>
            Some(Credentials { username, password }),
        _ => None,
    }
}

pub fn read_login_file(path: &Path) -> Result<Option<Credentials>> {
    let text = match read_optional_file(path).map_err(RavelloError::Credentials)? {
        Some(text) => text,
        None => return Ok(None),
    };
    let mut lines = text.lines().map(str::trim);
    let username = lines.next().unwrap_or_default().to_string();
    let encoded = lines.next().unwrap_or_default();
    let decoded = STANDARD.decode(encoded).map_err(|e| {
        RavelloError::Credentials(format!("{}: password is not valid base64: {}", path.display(), e))
    })?;
    let password = String::from_utf8(decoded).map_err(|_| {
        RavelloError::Credentials(format!("{}: password is not valid UTF-8", path.display()))
    })?;
    Ok(pair(Some(username), Some(password)))
}

/// First source yielding both values wins.
pub fn resolve(sources: &[CredentialSource]) -> Result<Credentials> {
    for source in sources {
        if let Some(found) = source.lookup()? {
            return Ok(found);
        }
    }
    let tried: Vec<String> = sources.iter().map(|s| s.describe()).collect();
    Err(RavelloError::Credentials(format!("no Ravello credentials found (tried {})", tried.join(", "))))
}

/// Module order: arguments, then environment, then the login file.
pub fn module_sources(config: &RavelloConfig, username: Option<String>, password: Option<String>) -> Vec<CredentialSource> {
    vec![
        CredentialSource::Params { username, password },
        CredentialSource::Environment,
        CredentialSource::LoginFile(config.login_file.clone()),
    ]
}

/// Inventory order: ravello.ini files, then the login file.
pub fn inventory_sources(config: &RavelloConfig) -> Vec<CredentialSource> {
    vec![
        CredentialSource::Ini(config.ini_paths.clone()),
        CredentialSource::LoginFile(config.login_file.clone()),
    ]
}
