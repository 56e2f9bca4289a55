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

//! Validation of the VMs in an application template. Missing optional
//! fields are filled with their defaults in place, so the validated VM is
//! ready to be sent as part of a new application design.

use serde_json::{json, Value};

use crate::api::{find_disk_image, id_of, lookup_image_id, RavelloApi};
use crate::error::{RavelloError, Result};
use crate::template::{check_for_param, contains, get, get_str, set, ParamCheck};

fn required() -> ParamCheck {
    ParamCheck::required()
}

fn is_positive_integer(v: &Value) -> bool {
    v.as_u64().map(|n| n > 0).unwrap_or(false)
}

fn one_of(options: &[&str]) -> Vec<Value> {
    options.iter().map(|o| json!(o)).collect()
}

fn booleans() -> Vec<Value> {
    vec![json!(true), json!(false)]
}

fn items_mut<'a>(vm: &'a mut Value, key: &str) -> Result<&'a mut Vec<Value>> {
    let not_a_list = || RavelloError::Template(format!("Template Error: {} must be a list.", key));
    if !matches!(vm.get(key), Some(Value::Array(_))) {
        return Err(RavelloError::Template(format!("Template Error: {} must be a list.\nIn json item: {}", key, vm)));
    }
    vm.get_mut(key).and_then(Value::as_array_mut).ok_or_else(not_a_list)
}

/// Check one VM definition and fill its defaults.
pub fn assert_vm_valid(api: &dyn RavelloApi, vm: &mut Value) -> Result<()> {
    check_for_param(vm, "description", &required().default_if_missing(json!("")))?;
    check_for_param(vm, "numCpus", &required())?;
    check_for_param(vm, "memorySize.value", &required())?;
    check_for_param(vm, "memorySize.unit", &required().default_if_missing(json!("GB")))?;
    check_for_param(vm, "supportsCloudInit", &required().fail_msg("Error: Template must support cloudInit"))?;
    check_for_param(vm, "keypairId", &required())?;
    check_for_param(vm, "keypairName", &required())?;
    check_for_param(vm, "userData", &required())?;
    check_for_param(vm, "stopTimeout", &required().default_if_missing(json!(300)))?;
    check_for_param(vm, "bootOrder", &required().default_if_missing(json!(["DISK", "CDROM"])))?;
    check_for_param(vm, "hardDrives", &required())?;
    check_for_param(vm, "networkConnections", &required())?;

    if let Some(tag) = vm.get("tag").and_then(Value::as_str).map(str::to_string) {
        let description = get_str(vm, "description")?.to_string();
        set(vm, "description", json!(format!("{}\ntag:{}\n", description, tag)))?;
    }

    // a library VM image may be named instead of building from scratch
    let base_vm_id = if contains(vm, "baseVmImage") {
        let image_name = get_str(vm, "baseVmImage")?.to_string();
        let image_id = lookup_image_id(api, &image_name)?;
        if let Some(fields) = vm.as_object_mut() {
            fields.remove("baseVmImage");
        }
        image_id
    } else {
        0
    };
    set(vm, "baseVmId", json!(base_vm_id))?;
    set(vm, "os", json!("linux_manuel"))?;

    for hd in items_mut(vm, "hardDrives")?.iter_mut() {
        assert_hd_valid(api, hd)?;
    }
    for nic in items_mut(vm, "networkConnections")?.iter_mut() {
        assert_nic_valid(nic)?;
    }
    if contains(vm, "suppliedServices") {
        for svc in items_mut(vm, "suppliedServices")?.iter_mut() {
            check_for_param(svc, "name", &required())?;
            check_for_param(svc, "portRange", &required())?;
        }
    }
    Ok(())
}

/// Check one hard drive and pin its base disk image.
pub fn assert_hd_valid(api: &dyn RavelloApi, hd: &mut Value) -> Result<()> {
    check_for_param(hd, "index", &required())?;
    check_for_param(hd, "type", &required().one_of(one_of(&["DISK", "CDROM"])).default_if_missing(json!("DISK")))?;
    check_for_param(hd, "controller", &required().one_of(one_of(&["virtio", "ide"])).default_if_missing(json!("virtio")))?;
    check_for_param(hd, "boot", &required().one_of(booleans()).default_if_missing(json!(false)))?;
    let default_name = format!("Disk{}", plain(get(hd, "index")?));
    check_for_param(hd, "name", &required().default_if_missing(json!(default_name)))?;
    check_for_param(hd, "size.unit", &required().one_of(one_of(&["GB", "MB"])).default_if_missing(json!("GB")))?;
    check_for_param(hd, "size.value", &required().predicate(is_positive_integer))?;
    assert_hd_image_exists(api, hd)
}

fn plain(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Size in MB of a `{value, unit}` object. `None` when the size is
/// malformed or too large to express in MB.
pub fn size_in_mb(size: &Value) -> Option<u64> {
    let value = size.get("value").and_then(Value::as_u64)?;
    match size.get("unit").and_then(Value::as_str).unwrap_or("GB") {
        "MB" => Some(value),
        "GB" => value.checked_mul(1024),
        "TB" => value.checked_mul(1024 * 1024),
        _ => None,
    }
}

fn assert_hd_image_exists(api: &dyn RavelloApi, hd: &mut Value) -> Result<()> {
    let (field, reference) = if let Some(id) = hd.get("baseDiskImageId") {
        ("baseDiskImageId", id.clone())
    } else if let Some(name) = hd.get("imageName") {
        ("imageName", name.clone())
    } else {
        return Ok(());
    };

    let image = find_disk_image(api, &reference)?.ok_or_else(|| {
        RavelloError::Template(format!("FATAL ERROR nonexistent {} {} specified!", field, plain(&reference)))
    })?;

    let disk_size = get(hd, "size")?;
    let image_size = image.get("size").cloned().unwrap_or(Value::Null);
    let disk_mb = size_in_mb(disk_size).ok_or_else(|| {
        RavelloError::Template(format!("ERROR HD size {} can not be expressed in MB", disk_size))
    })?;
    if let Some(image_mb) = size_in_mb(&image_size) {
        if disk_mb < image_mb {
            return Err(RavelloError::Template(format!(
                "ERROR HD size value ({}) is smaller than the image ({})",
                plain(get(hd, "size.value")?),
                plain(image_size.get("value").unwrap_or(&Value::Null)),
            )));
        }
    }

    set(hd, "baseDiskImageId", json!(id_of(&image)?))?;
    Ok(())
}

/// Check one network connection.
pub fn assert_nic_valid(nic: &mut Value) -> Result<()> {
    check_for_param(nic, "ipConfig", &required())?;
    check_for_param(nic, "device.index", &required())?;
    let default_name = format!("nic{}", plain(get(nic, "device.index")?));
    check_for_param(nic, "device.name", &required().default_if_missing(json!(default_name)))?;
    check_for_param(nic, "device.deviceType", &required().one_of(one_of(&["virtio", "e1000"])).default_if_missing(json!("virtio")))?;
    check_for_param(nic, "device.useAutomaticMac", &required().one_of(booleans()).default_if_missing(json!(true)))?;

    if get(nic, "device.useAutomaticMac")? == &json!(false) {
        let msg = format!(
            "ERROR useAutomaticMac set to False but no static mac set for NIC index {}",
            plain(get(nic, "device.index")?)
        );
        check_for_param(nic, "device.mac", &required().fail_msg(msg))?;
    }

    let auto_ip = check_for_param(nic, "ipConfig.autoIpConfig", &ParamCheck::optional())?;
    let static_ip = check_for_param(nic, "ipConfig.staticIpConfig", &ParamCheck::optional())?;
    if static_ip {
        check_for_param(nic, "ipConfig.staticIpConfig.ip", &required())?;
        check_for_param(nic, "ipConfig.staticIpConfig.mask", &required())?;
    }
    if auto_ip == static_ip {
        return Err(RavelloError::Template(String::from(
            "Error: exactly one of [autoIpConfig,staticIpConfig] required",
        )));
    }
    Ok(())
}

/// The name a NIC is known by: its own `name`, else its device name.
pub fn nic_name(nic: &Value) -> String {
    nic.get("name")
        .and_then(Value::as_str)
        .or_else(|| get(nic, "device.name").ok().and_then(Value::as_str))
        .unwrap_or("")
        .to_string()
}
