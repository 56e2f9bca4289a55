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

//! The `ravello_cloud_template` module.
//!
//! Expands short instance definitions into a complete application template
//! for the `design` state of `ravello_app`. Everything but the instance
//! name and the ssh keys has a default.

use std::path::Path;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::config::expand_path;
use crate::error::{RavelloError, Result};
use crate::modules::{de_bool, de_u64, ModuleResult};
use crate::output::OutputHandlerRef;
use crate::util::io::write_local_file;

pub const MODULE_NAME: &str = "ravello_cloud_template";
pub const DEFAULT_BOOT_IMAGE: &str = "rhel-guest-image-7.3-35.x86_64";

fn default_one() -> u64 {
    1
}

fn default_ram() -> u64 {
    2
}

fn default_disk_size() -> u64 {
    40
}

fn default_unit() -> String {
    String::from("GB")
}

fn default_true() -> bool {
    true
}

fn default_controller() -> String {
    String::from("virtio")
}

fn default_device_type() -> String {
    String::from("DISK")
}

fn default_remote_user() -> String {
    String::from("cloud-user")
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Hostnames {
    One(String),
    Many(Vec<String>),
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum PortRange {
    Number(u64),
    Text(String),
}

impl PortRange {
    fn render(&self) -> String {
        match self {
            PortRange::Number(n) => n.to_string(),
            PortRange::Text(s) => s.clone(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Disk {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_disk_size", deserialize_with = "de_u64")]
    pub size: u64,
    #[serde(default = "default_unit")]
    pub mem_unit: String,
    #[serde(default, deserialize_with = "de_bool")]
    pub bootable: bool,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default = "default_device_type")]
    pub device_type: String,
    #[serde(default = "default_controller")]
    pub controller: String,
}

impl Default for Disk {
    fn default() -> Self {
        Self {
            name: None,
            size: default_disk_size(),
            mem_unit: default_unit(),
            bootable: false,
            image: None,
            device_type: default_device_type(),
            controller: default_controller(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Nic {
    pub name: String,
    #[serde(default = "default_controller")]
    pub controller: String,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default = "default_true", deserialize_with = "de_bool")]
    pub public_ip: bool,
    #[serde(default)]
    pub mac: Option<String>,
}

impl Nic {
    fn named(name: &str) -> Self {
        Self { name: name.to_string(), controller: default_controller(), ip: None, public_ip: true, mac: None }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Service {
    pub protocol: String,
    pub port: PortRange,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default = "default_true", deserialize_with = "de_bool")]
    pub external: bool,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Instance {
    pub name: String,
    pub public_key: String,
    #[serde(alias = "private_key_file")]
    pub private_key_path: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_one", deserialize_with = "de_u64")]
    pub cpus: u64,
    #[serde(default = "default_ram", deserialize_with = "de_u64")]
    pub ram: u64,
    #[serde(default = "default_unit")]
    pub mem_unit: String,
    #[serde(default)]
    pub keypair_name: Option<String>,
    #[serde(default)]
    pub keypair_id: Option<u64>,
    #[serde(default)]
    pub hostname: Option<Hostnames>,
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default = "default_remote_user")]
    pub remote_user: String,
    #[serde(default, deserialize_with = "de_bool")]
    pub allow_nested: bool,
    #[serde(default, deserialize_with = "de_bool")]
    pub prefer_physical: bool,
    #[serde(default)]
    pub boot_image: Option<String>,
    #[serde(default)]
    pub disks: Option<Vec<Disk>>,
    #[serde(default)]
    pub nics: Option<Vec<Nic>>,
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub groups: Option<Vec<String>>,
    #[serde(default)]
    pub ansible_vars: Map<String, Value>,
    /// Extra fields copied onto the generated VM definition, replacing any
    /// generated field of the same name.
    #[serde(default)]
    pub template_vars: Map<String, Value>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct CloudTemplateParams {
    pub path: String,
    pub instances: Vec<Instance>,
    #[serde(default)]
    pub subnets: Option<Vec<String>>,
}

fn hard_drive(index: usize, disk: &Disk) -> Value {
    let mut hd = json!({
        "index": index,
        "boot": disk.bootable,
        "controller": disk.controller,
        "name": disk.name.clone().unwrap_or_else(|| format!("vol{}", index)),
        "size": {"unit": disk.mem_unit, "value": disk.size},
        "type": disk.device_type,
    });
    if let Some(image) = disk.image.as_deref().filter(|i| !i.is_empty()) {
        hd["imageName"] = json!(image);
    }
    hd
}

fn network_connection(index: usize, nic: &Nic) -> Value {
    let mut connection = json!({
        "name": nic.name,
        "device": {"index": index, "deviceType": nic.controller},
        "ipConfig": {"hasPublicIp": nic.public_ip},
    });
    connection["ipConfig"]["autoIpConfig"] = match &nic.ip {
        Some(ip) => json!({"reservedIp": ip}),
        None => Value::Null,
    };
    match &nic.mac {
        Some(mac) => {
            connection["device"]["useAutomaticMac"] = json!(false);
            connection["device"]["mac"] = json!(mac);
        }
        None => connection["device"]["useAutomaticMac"] = json!(true),
    }
    connection
}

fn supplied_service(service: &Service) -> Value {
    let mut svc = json!({
        "external": service.external,
        "name": service.name.clone().unwrap_or_else(|| service.protocol.to_lowercase()),
        "portRange": service.port.render(),
        "protocol": service.protocol.to_uppercase(),
    });
    if let Some(device) = &service.device {
        svc["device"] = json!(device);
    }
    svc
}

fn user_data(remote_user: &str, public_key: &str) -> String {
    format!(
        "#cloud-config\nssh_pwauth: False\ndisable_root: False\nusers:\n  - name: {}\n    sudo: ALL=(ALL) NOPASSWD:ALL\n    lock_passwd: False\n    ssh-authorized-keys:\n    - {}\n",
        remote_user, public_key
    )
}

/// The `#%ansible` block read back by the dynamic inventory.
pub fn ansible_directives(instance: &Instance) -> Result<String> {
    let mut vars = instance.ansible_vars.clone();
    vars.insert(String::from("ansible_ssh_private_key_file"), json!(instance.private_key_path));
    vars.insert(String::from("ansible_user"), json!(instance.remote_user));

    let mut block = Map::new();
    block.insert(String::from("name"), json!(instance.name));
    block.insert(String::from("vars"), Value::Object(vars));
    if let Some(groups) = &instance.groups {
        block.insert(String::from("groups"), json!(groups));
    }
    if let Some(proxy) = &instance.proxy {
        block.insert(String::from("proxy"), json!(proxy));
    }
    let body = serde_yaml::to_string(&Value::Object(block))?;
    Ok(format!("#%ansible\n{}#%end\n", body))
}

/// Full VM definition for the instance at `index`.
pub fn vm_definition(index: usize, instance: &Instance) -> Result<Value> {
    let vm_name = format!("{}{}", index, instance.name);

    let mut disks = instance.disks.clone().unwrap_or_else(|| vec![Disk::default()]);
    if disks.is_empty() {
        return Err(RavelloError::Module(format!("{}: there must be at least one disk", instance.name)));
    }
    if !disks.iter().any(|d| d.bootable) {
        let first = &mut disks[0];
        if first.image.as_deref().unwrap_or("").is_empty() {
            first.image = Some(instance.boot_image.clone().unwrap_or_else(|| String::from(DEFAULT_BOOT_IMAGE)));
        }
        first.bootable = true;
    }

    let nics = instance.nics.clone().unwrap_or_else(|| vec![Nic::named("eth0")]);
    for service in instance.services.iter() {
        if let Some(device) = &service.device {
            if !nics.iter().any(|n| &n.name == device) {
                return Err(RavelloError::Module(format!(
                    "No device: {} found for service: {}",
                    device,
                    service.name.as_deref().unwrap_or(&service.protocol)
                )));
            }
        }
    }

    let hostnames = match &instance.hostname {
        Some(Hostnames::One(name)) => vec![name.clone()],
        Some(Hostnames::Many(names)) => names.clone(),
        None => vec![format!("{}.example.com", instance.name), instance.name.clone()],
    };
    let description = instance
        .description
        .clone()
        .unwrap_or_else(|| format!("{}\nnohbac: true\n", vm_name));

    let mut vm = json!({
        "name": vm_name,
        "tag": instance.name,
        "allowNested": instance.allow_nested,
        "preferPhysicalHost": instance.prefer_physical,
        "description": format!("{}\n{}", description, ansible_directives(instance)?),
        "numCpus": instance.cpus,
        "memorySize": {"unit": instance.mem_unit, "value": instance.ram},
        "hostnames": hostnames,
        "supportsCloudInit": true,
        "hardDrives": disks.iter().enumerate().map(|(i, d)| hard_drive(i, d)).collect::<Vec<_>>(),
        "suppliedServices": instance.services.iter().map(supplied_service).collect::<Vec<_>>(),
        "networkConnections": nics.iter().enumerate().map(|(i, n)| network_connection(i, n)).collect::<Vec<_>>(),
        "userData": user_data(&instance.remote_user, &instance.public_key),
    });
    if let Some(id) = instance.keypair_id {
        vm["keypairId"] = json!(id);
    }
    if let Some(name) = &instance.keypair_name {
        vm["keypairName"] = json!(name);
    }
    if let Some(fields) = vm.as_object_mut() {
        for (key, value) in instance.template_vars.iter() {
            fields.insert(key.clone(), value.clone());
        }
    }
    Ok(vm)
}

/// The whole template document.
pub fn gen_template(instances: &[Instance], subnets: Option<&[String]>) -> Result<Value> {
    let vms = instances
        .iter()
        .enumerate()
        .map(|(i, instance)| vm_definition(i, instance))
        .collect::<Result<Vec<_>>>()?;
    let mut template = json!({"vms": vms});
    if let Some(subnets) = subnets.filter(|s| !s.is_empty()) {
        template["network"] = json!({"subnets": subnets});
    }
    Ok(template)
}

pub fn write_template(path: &Path, template: &Value) -> Result<()> {
    let text = serde_yaml::to_string(template)?;
    write_local_file(path, &text).map_err(RavelloError::Module)
}

pub fn execute(params: CloudTemplateParams, output: &OutputHandlerRef) -> Result<ModuleResult> {
    output.on_module_start(MODULE_NAME, "present");
    let template = gen_template(&params.instances, params.subnets.as_deref())?;
    let path = expand_path(&params.path);
    write_template(&path, &template)?;
    output.info(&format!("wrote {} VM definitions to {}", params.instances.len(), path.display()));
    Ok(ModuleResult::changed().msg(format!("Created template: {}", params.path)))
}
