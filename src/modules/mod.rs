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

//! Ansible binary module protocol shared by the module executables.
//!
//! Ansible hands a binary module one argument: the path of a JSON file with
//! the task arguments. The module prints a single JSON result on stdout.

pub mod app;
pub mod blueprint;
pub mod cloud_template;
pub mod design;
pub mod network;
pub mod wait;

use std::path::Path;
use std::sync::Arc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

use crate::api::RavelloApi;
use crate::config::RavelloConfig;
use crate::error::{RavelloError, Result};
use crate::output::{CaptureOutputHandler, OutputHandlerRef};
use crate::util::io::read_local_file;

const ARGS_WRAPPER: &str = "ANSIBLE_MODULE_ARGS";
const CHECK_MODE: &str = "_ansible_check_mode";

/// Everything a module run needs besides its parameters.
pub struct ModuleContext<'a> {
    pub api: &'a dyn RavelloApi,
    pub config: &'a RavelloConfig,
    pub output: OutputHandlerRef,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// The JSON document a module prints.
#[derive(Serialize, Debug, Default, Clone, PartialEq)]
pub struct ModuleResult {
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub failed: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub skipped: bool,
    pub stdout: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModuleResult {
    pub fn changed() -> Self {
        Self { changed: true, ..Self::default() }
    }

    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn failed(msg: &str) -> Self {
        Self { failed: true, msg: Some(msg.to_string()), ..Self::default() }
    }

    pub fn skipped(msg: &str) -> Self {
        Self { skipped: true, msg: Some(msg.to_string()), ..Self::default() }
    }

    pub fn msg(mut self, msg: impl Into<String>) -> Self {
        self.msg = Some(msg.into());
        self
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| json!({"failed": true, "msg": e.to_string()}))
    }
}

/// Module arguments with Ansible's bookkeeping keys removed.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleArgs {
    pub params: Map<String, Value>,
    pub check_mode: bool,
}

impl ModuleArgs {
    pub fn from_json(doc: Value) -> Result<Self> {
        let doc = match doc {
            Value::Object(mut map) if map.contains_key(ARGS_WRAPPER) => map.remove(ARGS_WRAPPER).unwrap_or(Value::Null),
            other => other,
        };
        let raw = match doc {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => return Err(RavelloError::Module(format!("module arguments must be a mapping, got {}", other))),
        };

        let check_mode = raw.get(CHECK_MODE).map(truthy).unwrap_or(false);
        let params = raw.into_iter().filter(|(k, _)| !k.starts_with("_ansible_")).collect();
        Ok(Self { params, check_mode })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = read_local_file(path).map_err(RavelloError::Module)?;
        let doc: Value = serde_json::from_str(&text)
            .map_err(|e| RavelloError::Module(format!("module arguments in {} are not JSON: {}", path.display(), e)))?;
        Self::from_json(doc)
    }

    /// Deserialize into a parameter struct. Unknown keys are rejected.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.params.clone()))
            .map_err(|e| RavelloError::Module(format!("unsupported parameters: {}", e)))
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.to_lowercase().as_str(), "true" | "yes" | "on" | "1"),
        Value::Number(n) => n.as_i64().map(|i| i != 0).unwrap_or(false),
        _ => false,
    }
}

/// Drive one module run from the command line and return the exit code.
///
/// The captured log of the run is attached to the result as `stdout`, for
/// failures as well as successes.
pub fn main_with<P, F>(module: &str, argv: &[String], run: F) -> i32
where
    P: DeserializeOwned,
    F: FnOnce(P, &OutputHandlerRef) -> Result<ModuleResult>,
{
    let capture = Arc::new(CaptureOutputHandler::new(module));
    let output: OutputHandlerRef = capture.clone();

    let outcome = match argv.get(1) {
        Some(path) => ModuleArgs::from_file(Path::new(path)),
        None => Err(RavelloError::Module(format!("usage: {} <args-file>", module))),
    };

    let mut result = match outcome {
        Ok(args) if args.check_mode => ModuleResult::skipped("check mode is not supported"),
        Ok(args) => match args.parse::<P>() {
            Ok(params) => match run(params, &output) {
                Ok(result) => result,
                Err(e) => {
                    output.error(&e.to_string());
                    ModuleResult::failed(&e.to_string())
                }
            },
            Err(e) => ModuleResult::failed(&e.to_string()),
        },
        Err(e) => ModuleResult::failed(&e.to_string()),
    };

    result.stdout = capture.contents();
    println!("{}", result.to_json());
    if result.failed { 1 } else { 0 }
}

/// Build the config for a module run: environment, then an explicit `url`.
pub fn module_config(url: Option<&str>, wait_timeout: Option<u64>) -> RavelloConfig {
    let mut config = RavelloConfig::from_env();
    if let Some(url) = url {
        if !url.is_empty() {
            config = config.api_url(url);
        }
    }
    if let Some(secs) = wait_timeout {
        config = config.wait_timeout(std::time::Duration::from_secs(secs));
    }
    config
}

// Ansible does not coerce arguments for binary modules, so numbers and
// booleans may arrive as strings.

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Bool(bool),
    Int(i64),
    Text(String),
}

pub fn de_bool<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    match Loose::deserialize(deserializer)? {
        Loose::Bool(b) => Ok(b),
        Loose::Int(i) => Ok(i != 0),
        Loose::Text(s) => match s.to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            other => Err(serde::de::Error::custom(format!("not a boolean: {}", other))),
        },
    }
}

pub fn de_i64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i64, D::Error> {
    match Loose::deserialize(deserializer)? {
        Loose::Int(i) => Ok(i),
        Loose::Text(s) => s.trim().parse::<i64>().map_err(serde::de::Error::custom),
        Loose::Bool(b) => Err(serde::de::Error::custom(format!("not an integer: {}", b))),
    }
}

pub fn de_u64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    let value = de_i64(deserializer)?;
    u64::try_from(value).map_err(serde::de::Error::custom)
}

/// Accept a string or a number, e.g. a blueprint id written unquoted.
pub fn de_opt_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    match Option::<Loose>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Loose::Text(s)) => Ok(Some(s)),
        Some(Loose::Int(i)) => Ok(Some(i.to_string())),
        Some(Loose::Bool(b)) => Ok(Some(b.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Deserialize, Debug)]
    #[serde(deny_unknown_fields)]
    struct Sample {
        name: String,
        #[serde(default, deserialize_with = "de_bool")]
        wait: bool,
        #[serde(default, deserialize_with = "de_i64")]
        ttl: i64,
        #[serde(default, deserialize_with = "de_opt_string")]
        id: Option<String>,
    }

    #[test]
    fn test_strips_ansible_keys_and_wrapper() {
        let args = ModuleArgs::from_json(json!({
            "ANSIBLE_MODULE_ARGS": {"name": "demo", "_ansible_verbosity": 2, "_ansible_check_mode": false}
        })).unwrap();
        assert!(!args.check_mode);
        assert_eq!(Value::Object(args.params), json!({"name": "demo"}));
    }

    #[test]
    fn test_check_mode_detected() {
        let args = ModuleArgs::from_json(json!({"name": "demo", "_ansible_check_mode": true})).unwrap();
        assert!(args.check_mode);
    }

    #[test]
    fn test_loose_parameters() {
        let args = ModuleArgs::from_json(json!({"name": "demo", "wait": "no", "ttl": "30", "id": 2452})).unwrap();
        let sample: Sample = args.parse().unwrap();
        assert_eq!(sample.name, "demo");
        assert!(!sample.wait);
        assert_eq!(sample.ttl, 30);
        assert_eq!(sample.id.as_deref(), Some("2452"));
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let args = ModuleArgs::from_json(json!({"name": "demo", "colour": "blue"})).unwrap();
        let err = args.parse::<Sample>().unwrap_err();
        assert!(err.to_string().contains("colour"));
    }

    #[test]
    fn test_result_json_shape() {
        let result = ModuleResult::changed().msg("done").with("app_id", json!("12"));
        assert_eq!(result.to_json(), json!({"changed": true, "msg": "done", "stdout": "", "app_id": "12"}));

        let failed = ModuleResult::failed("boom");
        assert_eq!(failed.to_json(), json!({"changed": false, "msg": "boom", "failed": true, "stdout": ""}));
    }

    #[test]
    fn test_main_with_runs_module() {
        let temp_dir = TempDir::new().unwrap();
        let args_file = temp_dir.path().join("args");
        std::fs::write(&args_file, r#"{"name": "demo"}"#).unwrap();
        let argv = vec![String::from("module"), args_file.display().to_string()];

        let code = main_with("sample", &argv, |params: Sample, output| {
            output.info(&format!("hello {}", params.name));
            Ok(ModuleResult::changed())
        });
        assert_eq!(code, 0);

        let code = main_with("sample", &argv, |_params: Sample, _output| {
            Err(RavelloError::Module(String::from("nope")))
        });
        assert_eq!(code, 1);
    }

    #[test]
    fn test_main_with_missing_args_file() {
        let argv = vec![String::from("module")];
        let code = main_with("sample", &argv, |_params: Sample, _output| Ok(ModuleResult::changed()));
        assert_eq!(code, 1);
    }
}
