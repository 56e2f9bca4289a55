mod common;

use std::sync::Arc;
use serde_json::json;

use common::{null_output, FakeRavello};
use ravello::inventory::{inventory_for_app, published_app_names, Grouping};
use ravello::{CaptureOutputHandler, OutputHandlerRef};

fn tagged_app(api: &FakeRavello) {
    api.insert_app(json!({
        "name": "tagged",
        "published": true,
        "deployment": {"vms": [
            {"name": "0gw", "hostnames": ["gw.lab"], "externalFqdn": "gw.srv.ravcloud.com", "description": "gateway\ntag:bastion\ntag:edge\n"},
            {"name": "1db", "hostnames": ["db.lab"], "description": "tag:backend"}
        ]},
        "design": {
            "tags": [{"id": 31, "value": "frontend"}, {"id": "32", "value": "storage"}],
            "vms": [
                {"name": "0gw", "hostnames": ["gw.lab"], "tagRefs": [{"tagIdStr": "31"}]},
                {"name": "1db", "hostnames": ["db.lab"], "tagRefs": [{"tagIdStr": 32}, {"tagIdStr": "31"}]}
            ]
        }
    }));
}

#[test]
fn test_published_app_names() {
    let api = FakeRavello::new();
    api.insert_app(json!({"name": "draft", "published": false}));
    tagged_app(&api);
    assert_eq!(published_app_names(&api).unwrap(), vec![String::from("tagged")]);
}

#[test]
fn test_unpublished_app_gives_empty_inventory() {
    let api = FakeRavello::new();
    api.insert_app(json!({"name": "draft", "published": false}));
    let capture = Arc::new(CaptureOutputHandler::new("ravello_inventory"));
    let output: OutputHandlerRef = capture.clone();

    let inventory = inventory_for_app(&api, "draft", Grouping::Attributes, &output).unwrap();
    assert_eq!(inventory.to_json(), json!({"_meta": {"hostvars": {}}}));
    assert!(capture.contents().contains("no published application named draft"));
}

#[test]
fn test_tag_grouping() {
    let api = FakeRavello::new();
    tagged_app(&api);
    let inventory = inventory_for_app(&api, "tagged", Grouping::Tags, &null_output()).unwrap();

    assert_eq!(inventory.groups["bastion"], vec![String::from("gw.lab")]);
    assert_eq!(inventory.groups["edge"], vec![String::from("gw.lab")]);
    assert_eq!(inventory.groups["backend"], vec![String::from("db.lab")]);
    assert_eq!(inventory.host_vars("gw.lab"), json!({"externalFqdn": "gw.srv.ravcloud.com", "bastion": true}));
    assert_eq!(inventory.host_vars("db.lab"), json!({}));
}

#[test]
fn test_design_tag_grouping_uses_first_reference() {
    let api = FakeRavello::new();
    tagged_app(&api);
    let inventory = inventory_for_app(&api, "tagged", Grouping::DesignTags, &null_output()).unwrap();

    let rendered = inventory.to_json();
    assert_eq!(rendered["frontend"], json!({"hosts": ["gw.lab"]}));
    assert_eq!(rendered["storage"], json!({"hosts": ["db.lab"]}));
}

#[test]
fn test_attribute_grouping_without_directives_uses_vm_name() {
    let api = FakeRavello::new();
    tagged_app(&api);
    let inventory = inventory_for_app(&api, "tagged", Grouping::Attributes, &null_output()).unwrap();

    assert_eq!(inventory.groups["0gw"], vec![String::from("gw.lab")]);
    assert_eq!(inventory.groups["0gw_public"], vec![String::from("gw.srv.ravcloud.com")]);
    assert_eq!(inventory.host_vars("db.lab")["proxyFqdn"], json!("db.lab"));
}
