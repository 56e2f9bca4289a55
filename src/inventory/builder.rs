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
use std::str::FromStr;
use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use crate::error::{RavelloError, Result};
use crate::inventory::attributes::{description_of, description_tags, parse_attributes, AnsibleAttributes};

/// How VMs are sorted into groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Grouping {
    /// `#%ansible` directive blocks in VM descriptions
    #[default]
    Attributes,
    /// `tag:<group>` lines in VM descriptions
    Tags,
    /// the application design's tag objects
    DesignTags,
}

impl Grouping {
    /// The application aspect this grouping reads.
    pub fn aspect(&self) -> &'static str {
        match self {
            Grouping::Attributes | Grouping::Tags => "deployment",
            Grouping::DesignTags => "design",
        }
    }
}

impl FromStr for Grouping {
    type Err = RavelloError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "attributes" => Ok(Grouping::Attributes),
            "tags" => Ok(Grouping::Tags),
            "design-tags" => Ok(Grouping::DesignTags),
            other => Err(RavelloError::Config(format!("unknown grouping: {}", other))),
        }
    }
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Grouping::Attributes => "attributes",
            Grouping::Tags => "tags",
            Grouping::DesignTags => "design-tags",
        };
        write!(f, "{}", name)
    }
}

/// Groups plus per-host variables, rendered in Ansible's dynamic inventory
/// format.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    pub groups: IndexMap<String, Vec<String>>,
    pub hostvars: IndexMap<String, Map<String, Value>>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_to_group(&mut self, group: &str, host: &str) {
        self.groups.entry(group.to_string()).or_default().push(host.to_string());
    }

    pub fn host_vars_mut(&mut self, host: &str) -> &mut Map<String, Value> {
        self.hostvars.entry(host.to_string()).or_default()
    }

    pub fn host_vars(&self, host: &str) -> Value {
        match self.hostvars.get(host) {
            Some(vars) => Value::Object(vars.clone()),
            None => json!({}),
        }
    }

    pub fn to_json(&self) -> Value {
        let mut hostvars = Map::new();
        for (host, vars) in &self.hostvars {
            hostvars.insert(host.clone(), Value::Object(vars.clone()));
        }
        let mut out = Map::new();
        out.insert(String::from("_meta"), json!({"hostvars": hostvars}));
        for (group, hosts) in &self.groups {
            out.insert(group.clone(), json!({"hosts": hosts}));
        }
        Value::Object(out)
    }
}

pub fn build(app: &Value, grouping: Grouping) -> Result<Inventory> {
    match grouping {
        Grouping::Attributes => build_by_attributes(app),
        Grouping::Tags => build_by_tags(app),
        Grouping::DesignTags => build_by_design_tags(app),
    }
}

fn vms_of<'a>(app: &'a Value, aspect: &str) -> &'a [Value] {
    app.get(aspect)
        .and_then(|a| a.get("vms"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn first_hostname(vm: &Value) -> Result<String> {
    vm.get("hostnames")
        .and_then(Value::as_array)
        .and_then(|names| names.first())
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            let name = vm.get("name").and_then(Value::as_str).unwrap_or("?");
            RavelloError::Inventory(format!("VM {} has no hostnames", name))
        })
}

fn external_fqdn(vm: &Value) -> Option<String> {
    vm.get("externalFqdn").and_then(Value::as_str).map(str::to_string)
}

/// The ssh arguments that route a host's connections through its proxy.
pub fn proxy_ssh_args(hostname: &str, proxy: &str) -> String {
    format!(
        "-o StrictHostKeyChecking=no -o ProxyCommand=\"ssh -i {{{{ hostvars[\"{host}\"][\"ansible_ssh_private_key_file\"] }}}} -W %h:%p -q {{{{ hostvars[\"{proxy}\"][\"ansible_user\"] }}}}@{proxy}\"",
        host = hostname,
        proxy = proxy
    )
}

/// Group by the `#%ansible` directives of each deployed VM.
///
/// Every host is reached through a proxy: the first host of the group named
/// by `proxy`, or itself. Proxy hosts are additionally listed under their
/// external FQDN in a `<name>_public` group so they can be reached directly.
pub fn build_by_attributes(app: &Value) -> Result<Inventory> {
    let mut inventory = Inventory::new();
    let vms = vms_of(app, "deployment");

    let mut parsed: Vec<(String, AnsibleAttributes, Option<String>)> = Vec::with_capacity(vms.len());
    for vm in vms {
        parsed.push((first_hostname(vm)?, parse_attributes(vm)?, external_fqdn(vm)));
    }

    for (hostname, attrs, fqdn) in &parsed {
        let mut groups = attrs.groups.clone();
        if !groups.contains(&attrs.name) {
            groups.push(attrs.name.clone());
        }
        for group in &groups {
            inventory.add_to_group(group, hostname);
        }
        let vars = inventory.host_vars_mut(hostname);
        if let Some(fqdn) = fqdn {
            vars.insert(String::from("externalFqdn"), json!(fqdn));
        }
        vars.insert(String::from("hostIsProxy"), json!(false));
        vars.insert(String::from("hostnameIsProxy"), json!(false));
    }

    // second pass, once every host's FQDN is known
    for (hostname, attrs, _) in &parsed {
        let proxy_host = match &attrs.proxy {
            Some(group) => inventory
                .groups
                .get(group)
                .and_then(|hosts| hosts.first())
                .cloned()
                .ok_or_else(|| RavelloError::Inventory(format!("proxy group {} of host {} has no hosts", group, hostname)))?,
            None => hostname.clone(),
        };
        let proxy = inventory
            .hostvars
            .get(&proxy_host)
            .and_then(|vars| vars.get("externalFqdn"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| proxy_host.clone());

        inventory.host_vars_mut(&proxy_host).insert(String::from("hostIsProxy"), json!(true));

        let mut host_vars = attrs.vars.clone();
        host_vars.insert(String::from("ansible_ssh_common_args"), json!(proxy_ssh_args(hostname, &proxy)));
        let vars = inventory.host_vars_mut(hostname);
        vars.insert(String::from("proxyFqdn"), json!(proxy));
        for (k, v) in host_vars {
            vars.insert(k, v);
        }
    }

    for (hostname, attrs, _) in &parsed {
        let vars = match inventory.hostvars.get(hostname) {
            Some(vars) => vars,
            None => continue,
        };
        if vars.get("hostIsProxy") != Some(&Value::Bool(true)) {
            continue;
        }
        let fqdn = match vars.get("externalFqdn").and_then(Value::as_str) {
            Some(fqdn) => fqdn.to_string(),
            None => continue,
        };
        let mut public = vars.clone();
        public.insert(String::from("hostnameIsProxy"), json!(true));
        public.remove("ansible_ssh_common_args");
        inventory.hostvars.insert(fqdn.clone(), public);
        inventory.groups.insert(format!("{}_public", attrs.name), vec![fqdn]);
    }

    Ok(inventory)
}

/// Group by `tag:<group>` description lines.
pub fn build_by_tags(app: &Value) -> Result<Inventory> {
    let mut inventory = Inventory::new();
    for vm in vms_of(app, "deployment") {
        let hostname = first_hostname(vm)?;
        let fqdn = external_fqdn(vm);
        for tag in description_tags(description_of(vm)) {
            inventory.add_to_group(&tag, &hostname);
            if let Some(fqdn) = &fqdn {
                let vars = inventory.host_vars_mut(&hostname);
                vars.insert(String::from("externalFqdn"), json!(fqdn));
                if tag == "bastion" {
                    vars.insert(String::from("bastion"), json!(true));
                }
            }
        }
    }
    Ok(inventory)
}

fn as_plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Group by the design's tag objects: a VM joins the group named by a tag's
/// `value` when its first tag reference points at that tag's id.
pub fn build_by_design_tags(app: &Value) -> Result<Inventory> {
    let mut inventory = Inventory::new();
    let tags = app
        .get("design")
        .and_then(|d| d.get("tags"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    let vms = vms_of(app, "design");

    for tag in tags {
        let id = tag.get("id").map(as_plain_string).unwrap_or_default();
        let value = match tag.get("value").and_then(Value::as_str) {
            Some(value) => value,
            None => continue,
        };
        for vm in vms {
            let first_ref = vm
                .get("tagRefs")
                .and_then(Value::as_array)
                .and_then(|refs| refs.first())
                .and_then(|r| r.get("tagIdStr"))
                .map(as_plain_string);
            if first_ref.as_deref() == Some(id.as_str()) {
                inventory.add_to_group(value, &first_hostname(vm)?);
            }
        }
    }
    Ok(inventory)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_ssh_args() {
        assert_eq!(
            proxy_ssh_args("web.local", "bastion.example.com"),
            "-o StrictHostKeyChecking=no -o ProxyCommand=\"ssh -i {{ hostvars[\"web.local\"][\"ansible_ssh_private_key_file\"] }} -W %h:%p -q {{ hostvars[\"bastion.example.com\"][\"ansible_user\"] }}@bastion.example.com\""
        );
    }

    #[test]
    fn test_grouping_names() {
        assert_eq!("design-tags".parse::<Grouping>().unwrap(), Grouping::DesignTags);
        assert_eq!(Grouping::Tags.to_string(), "tags");
        assert!("bogus".parse::<Grouping>().is_err());
        assert_eq!(Grouping::default().aspect(), "deployment");
    }

    #[test]
    fn test_empty_inventory_shape() {
        assert_eq!(Inventory::new().to_json(), json!({"_meta": {"hostvars": {}}}));
    }

    #[test]
    fn test_attributes_with_proxy() {
        let app = json!({
            "deployment": {"vms": [
                {
                    "name": "0bastion",
                    "hostnames": ["bastion.local"],
                    "externalFqdn": "bastion.srv.ravcloud.com",
                    "description": "#%ansible\nname: bastion\nvars:\n  ansible_user: cloud-user\n#%end\n"
                },
                {
                    "name": "1web",
                    "hostnames": ["web.local", "web"],
                    "description": "#%ansible\nname: web\ngroups: [webservers]\nproxy: bastion\n#%end\n"
                }
            ]}
        });

        let inventory = build_by_attributes(&app).unwrap();
        let doc = inventory.to_json();

        assert_eq!(doc["webservers"]["hosts"], json!(["web.local"]));
        assert_eq!(doc["web"]["hosts"], json!(["web.local"]));
        assert_eq!(doc["bastion"]["hosts"], json!(["bastion.local"]));
        assert_eq!(doc["bastion_public"]["hosts"], json!(["bastion.srv.ravcloud.com"]));

        let web = &doc["_meta"]["hostvars"]["web.local"];
        assert_eq!(web["proxyFqdn"], json!("bastion.srv.ravcloud.com"));
        assert_eq!(web["hostIsProxy"], json!(false));
        assert_eq!(web["ansible_ssh_common_args"], json!(proxy_ssh_args("web.local", "bastion.srv.ravcloud.com")));

        let bastion = &doc["_meta"]["hostvars"]["bastion.local"];
        assert_eq!(bastion["hostIsProxy"], json!(true));
        assert_eq!(bastion["hostnameIsProxy"], json!(false));
        assert_eq!(bastion["ansible_user"], json!("cloud-user"));

        let public = &doc["_meta"]["hostvars"]["bastion.srv.ravcloud.com"];
        assert_eq!(public["hostnameIsProxy"], json!(true));
        assert_eq!(public["hostIsProxy"], json!(true));
        assert!(public.get("ansible_ssh_common_args").is_none());
    }

    #[test]
    fn test_attributes_unknown_proxy_group() {
        let app = json!({"deployment": {"vms": [
            {"name": "web", "hostnames": ["web.local"], "description": "#%ansible\nproxy: nowhere\n#%end"}
        ]}});
        assert!(matches!(build_by_attributes(&app), Err(RavelloError::Inventory(_))));
    }

    #[test]
    fn test_attributes_without_vms() {
        assert_eq!(build_by_attributes(&json!({"deployment": {}})).unwrap(), Inventory::new());
    }

    #[test]
    fn test_tags() {
        let app = json!({"deployment": {"vms": [
            {"name": "b", "hostnames": ["b.local"], "externalFqdn": "b.example.com", "description": "tag:bastion\n"},
            {"name": "w", "hostnames": ["w.local"], "description": "tag:web\ntag:app\n"}
        ]}});
        let doc = build_by_tags(&app).unwrap().to_json();
        assert_eq!(doc["bastion"]["hosts"], json!(["b.local"]));
        assert_eq!(doc["web"]["hosts"], json!(["w.local"]));
        assert_eq!(doc["app"]["hosts"], json!(["w.local"]));
        assert_eq!(doc["_meta"]["hostvars"]["b.local"], json!({"externalFqdn": "b.example.com", "bastion": true}));
        assert!(doc["_meta"]["hostvars"].get("w.local").is_none());
    }

    #[test]
    fn test_design_tags() {
        let app = json!({"design": {
            "tags": [{"id": 11, "value": "db"}, {"id": 12, "value": "web"}],
            "vms": [
                {"hostnames": ["db1"], "tagRefs": [{"tagIdStr": "11"}]},
                {"hostnames": ["web1"], "tagRefs": [{"tagIdStr": "12"}, {"tagIdStr": "11"}]},
                {"hostnames": ["plain"]}
            ]
        }});
        let doc = build_by_design_tags(&app).unwrap().to_json();
        assert_eq!(doc["db"]["hosts"], json!(["db1"]));
        assert_eq!(doc["web"]["hosts"], json!(["web1"]));
    }
}
