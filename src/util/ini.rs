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

// minimal reader for ravello.ini: [section] headers, key = value or
// key: value, '#' and ';' comment lines. Keys are case-insensitive.

use std::path::PathBuf;
use indexmap::IndexMap;
use crate::util::io::read_optional_file;

pub type IniSection = IndexMap<String, String>;

pub fn parse_section(text: &str, section: &str) -> IniSection {
    let mut values = IniSection::new();
    let mut in_section = false;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            in_section = line[1..line.len() - 1].trim() == section;
            continue;
        }
        if !in_section {
            continue;
        }
        let split_at = match line.find(|c| c == '=' || c == ':') {
            Some(pos) => pos,
            None => continue,
        };
        let key = line[..split_at].trim().to_lowercase();
        let value = line[split_at + 1..].trim().to_string();
        values.insert(key, value);
    }
    values
}

/// Read `section` from every existing file in order; later files override
/// earlier ones key by key. Missing files are skipped.
pub fn read_section(paths: &[PathBuf], section: &str) -> Result<IniSection, String> {
    let mut merged = IniSection::new();
    for path in paths {
        if let Some(text) = read_optional_file(path)? {
            merged.extend(parse_section(&text, section));
        }
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_section() {
        let text = "
# credentials
[other]
username = wrong

[ravello]
Username = someone@example.com
password: hunter2
; app = ignored
app = demo-app
";
        let section = parse_section(text, "ravello");
        assert_eq!(section.get("username").map(String::as_str), Some("someone@example.com"));
        assert_eq!(section.get("password").map(String::as_str), Some("hunter2"));
        assert_eq!(section.get("app").map(String::as_str), Some("demo-app"));
        assert_eq!(section.len(), 3);
    }

    #[test]
    fn test_later_files_override() {
        let temp_dir = TempDir::new().unwrap();
        let first = temp_dir.path().join("first.ini");
        let second = temp_dir.path().join("second.ini");
        std::fs::write(&first, "[ravello]\nusername = a\npassword = p\n").unwrap();
        std::fs::write(&second, "[ravello]\nusername = b\n").unwrap();

        let paths = vec![first, temp_dir.path().join("missing.ini"), second];
        let section = read_section(&paths, "ravello").unwrap();
        assert_eq!(section.get("username").map(String::as_str), Some("b"));
        assert_eq!(section.get("password").map(String::as_str), Some("p"));
    }
}
