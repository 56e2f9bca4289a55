mod common;

use serde_json::{json, Value};

use common::{FakeRavello, BOOT_IMAGE};
use ravello::api::lookup_blueprint_id;
use ravello::modules::app::set_cost_bucket;
use ravello::modules::design::{assert_hd_valid, assert_vm_valid};

fn vm(extra: Value) -> Value {
    let mut vm = json!({
        "name": "0web",
        "numCpus": 1,
        "memorySize": {"value": 2},
        "supportsCloudInit": true,
        "keypairId": 7,
        "keypairName": "demo-key",
        "userData": "#cloud-config\n",
        "hardDrives": [{"index": 0, "size": {"value": 40}, "imageName": BOOT_IMAGE}],
        "networkConnections": [{"device": {"index": 0}, "ipConfig": {"autoIpConfig": null}}]
    });
    for (key, value) in extra.as_object().unwrap() {
        vm[key] = value.clone();
    }
    vm
}

#[test]
fn test_vm_defaults_build_from_scratch() {
    let api = FakeRavello::new();
    let mut web = vm(json!({}));
    assert_vm_valid(&api, &mut web).unwrap();
    assert_eq!(web["baseVmId"], json!(0));
    assert_eq!(web["os"], json!("linux_manuel"));
    assert_eq!(web["description"], json!(""));
    assert_eq!(web["hardDrives"][0]["baseDiskImageId"], json!(100));
}

#[test]
fn test_vm_base_image_resolved_by_name() {
    let api = FakeRavello::new();
    let mut web = vm(json!({"baseVmImage": "centos 7"}));
    assert_vm_valid(&api, &mut web).unwrap();
    assert_eq!(web["baseVmId"], json!(200));
    assert!(web.get("baseVmImage").is_none());

    let mut missing = vm(json!({"baseVmImage": "windows"}));
    let err = assert_vm_valid(&api, &mut missing).unwrap_err();
    assert_eq!(err.to_string(), "ERROR: Could not find VM image named: windows");
}

#[test]
fn test_hd_size_too_large_is_rejected() {
    let api = FakeRavello::new();
    let mut hd = json!({"index": 0, "size": {"value": 18014398509481985u64, "unit": "GB"}, "imageName": BOOT_IMAGE});
    let err = assert_hd_valid(&api, &mut hd).unwrap_err();
    assert!(err.to_string().starts_with("ERROR HD size"));
    assert!(hd.get("baseDiskImageId").is_none());
}

#[test]
fn test_hd_smaller_than_image_is_rejected() {
    let api = FakeRavello::new();
    let mut hd = json!({"index": 0, "size": {"value": 5, "unit": "GB"}, "imageName": BOOT_IMAGE});
    let err = assert_hd_valid(&api, &mut hd).unwrap_err();
    assert_eq!(err.to_string(), "ERROR HD size value (5) is smaller than the image (10)");
}

#[test]
fn test_blueprint_lookup_is_case_insensitive() {
    let api = FakeRavello::new();
    let id = api.insert_blueprint("Demo-BP", json!({"vms": []}));
    assert_eq!(lookup_blueprint_id(&api, "demo-bp").unwrap(), id);
    let err = lookup_blueprint_id(&api, "other").unwrap_err();
    assert_eq!(err.to_string(), "ERROR: Could not find blueprint: other");
}

#[test]
fn test_cost_bucket_chosen_by_exact_name() {
    let api = FakeRavello::new();
    set_cost_bucket(&api, 42, "application", "Team").unwrap();
    let state = api.state();
    assert_eq!(state.associations[0].0, 2);
    assert_eq!(state.associations[0].1.resource_id, 42);
}
