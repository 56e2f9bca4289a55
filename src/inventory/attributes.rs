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

//! Ansible directives embedded in a VM description:
//!
//! ```text
//! #%ansible
//! name: web
//! groups: [webservers]
//! proxy: bastion
//! vars:
//!   http_port: 8080
//! #%end
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{RavelloError, Result};
use crate::util::yaml::yaml_to_json;

static DIRECTIVE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)#%ansible(.*?)(?:#%end|\z)").expect("directive pattern")
});

static TAG_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^tag:([^:]*)").expect("tag pattern")
});

#[derive(Deserialize, Debug, Default)]
struct Directive {
    name: Option<String>,
    #[serde(default)]
    groups: Vec<String>,
    vars: Option<serde_yaml::Value>,
    proxy: Option<String>,
}

/// Parsed directive block with the VM name filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct AnsibleAttributes {
    pub name: String,
    pub groups: Vec<String>,
    pub vars: Map<String, Value>,
    pub proxy: Option<String>,
}

pub fn description_of(vm: &Value) -> &str {
    vm.get("description").and_then(Value::as_str).unwrap_or("")
}

/// The YAML text between `#%ansible` and `#%end`, if the block exists.
pub fn directive_text(description: &str) -> Option<&str> {
    DIRECTIVE_BLOCK
        .captures(description)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

pub fn parse_attributes(vm: &Value) -> Result<AnsibleAttributes> {
    let vm_name = vm.get("name").and_then(Value::as_str).unwrap_or("").to_string();

    let directive = match directive_text(description_of(vm)) {
        Some(text) if !text.trim().is_empty() => {
            let parsed: serde_yaml::Value = serde_yaml::from_str(text).map_err(|e| {
                RavelloError::Inventory(format!("bad #%ansible block for VM {}: {}", vm_name, e))
            })?;
            if parsed.is_null() {
                Directive::default()
            } else {
                serde_yaml::from_value(parsed).map_err(|e| {
                    RavelloError::Inventory(format!("bad #%ansible block for VM {}: {}", vm_name, e))
                })?
            }
        }
        _ => Directive::default(),
    };

    let vars = match directive.vars.map(yaml_to_json) {
        Some(Value::Object(map)) => map,
        Some(Value::Null) | None => Map::new(),
        Some(other) => {
            return Err(RavelloError::Inventory(format!("vars for VM {} must be a mapping, got {}", vm_name, other)));
        }
    };

    Ok(AnsibleAttributes {
        name: directive.name.unwrap_or(vm_name),
        groups: directive.groups,
        vars,
        proxy: directive.proxy,
    })
}

/// Group names from `tag:<group>` description lines.
pub fn description_tags(description: &str) -> Vec<String> {
    description
        .lines()
        .filter_map(|line| TAG_LINE.captures(line))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_block() {
        let vm = json!({
            "name": "0web",
            "description": "web tier\n#%ansible\nname: web\ngroups:\n- webservers\nproxy: bastion\nvars:\n  http_port: 8080\n#%end\n"
        });
        let attrs = parse_attributes(&vm).unwrap();
        assert_eq!(attrs.name, "web");
        assert_eq!(attrs.groups, vec![String::from("webservers")]);
        assert_eq!(attrs.proxy.as_deref(), Some("bastion"));
        assert_eq!(attrs.vars.get("http_port"), Some(&json!(8080)));
    }

    #[test]
    fn test_name_defaults_to_vm_name() {
        let vm = json!({"name": "db", "description": "no directives here"});
        let attrs = parse_attributes(&vm).unwrap();
        assert_eq!(attrs.name, "db");
        assert!(attrs.groups.is_empty());
        assert!(attrs.vars.is_empty());

        let vm = json!({"name": "db"});
        assert_eq!(parse_attributes(&vm).unwrap().name, "db");
    }

    #[test]
    fn test_unterminated_block_reads_to_end() {
        assert_eq!(directive_text("x\n#%ansible\nname: a\n"), Some("\nname: a\n"));
        assert_eq!(directive_text("nothing"), None);
    }

    #[test]
    fn test_bad_yaml_is_an_inventory_error() {
        let vm = json!({"name": "x", "description": "#%ansible\ngroups: [a\n#%end"});
        assert!(matches!(parse_attributes(&vm), Err(RavelloError::Inventory(_))));
    }

    #[test]
    fn test_description_tags() {
        let tags = description_tags("web\ntag:bastion\nnot a tag:x\ntag:web:extra\n");
        assert_eq!(tags, vec![String::from("bastion"), String::from("web")]);
    }
}
