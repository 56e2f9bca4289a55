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

use std::path::Path;
use crate::error::{ErrorContext, RavelloError, Result};
use crate::util::io::read_local_file;

const YAML_ERROR_SHOW_LINES: usize = 3;
const YAML_ERROR_WIDTH: usize = 180;

// ==============================================================================================================
// PUBLIC API
// ==============================================================================================================

/// Parse YAML text into a JSON document. Non-string mapping keys are
/// rendered as strings.
pub fn yaml_str_to_json(text: &str) -> std::result::Result<serde_json::Value, serde_yaml::Error> {
    let parsed: serde_yaml::Value = serde_yaml::from_str(text)?;
    Ok(yaml_to_json(parsed))
}

pub fn yaml_to_json(value: serde_yaml::Value) -> serde_json::Value {
    use serde_json::Value as J;
    use serde_yaml::Value as Y;

    match value {
        Y::Null => J::Null,
        Y::Bool(b) => J::Bool(b),
        Y::Number(n) => {
            if let Some(i) = n.as_i64() {
                J::from(i)
            } else if let Some(u) = n.as_u64() {
                J::from(u)
            } else {
                n.as_f64().map(J::from).unwrap_or(J::Null)
            }
        }
        Y::String(s) => J::String(s),
        Y::Sequence(items) => J::Array(items.into_iter().map(yaml_to_json).collect()),
        Y::Mapping(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                out.insert(yaml_key_string(&k), yaml_to_json(v));
            }
            J::Object(out)
        }
        Y::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_key_string(key: &serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => String::from("null"),
        other => serde_yaml::to_string(other).unwrap_or_default().trim().to_string(),
    }
}

/// Load a YAML file as a JSON document. Parse errors carry the offending
/// lines so the module failure message points at the problem.
pub fn load_yaml_file_as_json(path: &Path) -> Result<serde_json::Value> {
    let text = read_local_file(path).context("Error reading YAML file")?;
    yaml_str_to_json(&text).map_err(|e| RavelloError::Template(describe_yaml_error(&e, path, &text)))
}

/// Render a YAML error with a few lines of context around the location.
pub fn describe_yaml_error(yaml_error: &serde_yaml::Error, path: &Path, text: &str) -> String {
    let mut yaml_error_str = format!("{}", yaml_error);
    if yaml_error_str.len() > YAML_ERROR_WIDTH {
        yaml_error_str.truncate(YAML_ERROR_WIDTH - 3);
        yaml_error_str.push_str("...");
    }

    let mut out = format!("Error reading YAML file: {}, {}", path.display(), yaml_error_str);
    let location = match yaml_error.location() {
        Some(location) => location,
        None => return out,
    };

    let error_line = location.line();
    let show_start = error_line.saturating_sub(YAML_ERROR_SHOW_LINES).max(1);
    let show_stop = error_line + YAML_ERROR_SHOW_LINES;

    for (count, line) in text.lines().enumerate().map(|(i, l)| (i + 1, l)) {
        if count < show_start || count > show_stop {
            continue;
        }
        if count == error_line {
            out.push_str(&format!("\n{:5}:{:<5} >>> {}", count, location.column(), line));
        } else {
            out.push_str(&format!("\n{:5}       | {}", count, line));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_to_json_nested() {
        let doc = yaml_str_to_json("
vms:
  - name: web
    numCpus: 2
    supportsCloudInit: true
    memorySize: {unit: GB, value: 4}
").unwrap();
        assert_eq!(doc, json!({
            "vms": [{"name": "web", "numCpus": 2, "supportsCloudInit": true,
                     "memorySize": {"unit": "GB", "value": 4}}]
        }));
    }

    #[test]
    fn test_yaml_to_json_stringifies_keys() {
        let doc = yaml_str_to_json("1: one\ntrue: yes-ish\n").unwrap();
        assert_eq!(doc["1"], json!("one"));
        assert_eq!(doc["true"], json!("yes-ish"));
    }

    #[test]
    fn test_load_yaml_file_reports_context() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.yml");
        std::fs::write(&path, "vms:\n  - name: web\n    numCpus: [1\n").unwrap();

        let err = load_yaml_file_as_json(&path).unwrap_err();
        assert!(err.to_string().starts_with("Error reading YAML file"));
    }

    #[test]
    fn test_load_yaml_file_missing() {
        let err = load_yaml_file_as_json(Path::new("/non/existent/app.yml")).unwrap_err();
        assert!(err.to_string().contains("unable to open file"));
    }
}
