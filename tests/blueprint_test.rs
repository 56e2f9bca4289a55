mod common;

use serde_json::{json, Value};

use common::{context, fast_config, FakeRavello};
use ravello::modules::blueprint::{run_blueprint, BlueprintParams};

fn params(doc: Value) -> BlueprintParams {
    serde_json::from_value(doc).unwrap()
}

#[test]
fn test_present_creates_then_is_idempotent() {
    let api = FakeRavello::new();
    let config = fast_config();
    let ctx = context(&api, &config);
    api.insert_app(json!({"name": "golden", "design": {"vms": [{"name": "0db"}]}}));

    let created = run_blueprint(&ctx, &params(json!({"name": "golden-bp", "app_name": "golden", "description": "base"}))).unwrap();
    assert!(created.changed);
    assert_eq!(created.msg.as_deref(), Some("Created blueprint golden-bp"));
    let blueprint = api.blueprint_named("golden-bp").unwrap();
    assert_eq!(blueprint["offline"], json!(true));
    assert_eq!(blueprint["design"]["vms"][0]["name"], json!("0db"));
    let blueprint_id = json!(blueprint["id"].as_u64().unwrap().to_string());
    assert_eq!(created.get("blueprint_id"), Some(&blueprint_id));

    let again = run_blueprint(&ctx, &params(json!({"name": "golden-bp", "app_name": "golden"}))).unwrap();
    assert!(!again.changed);
    assert_eq!(again.get("blueprint_id"), Some(&blueprint_id));
    assert_eq!(api.state().blueprints.len(), 1);
}

#[test]
fn test_present_without_app_name_fails() {
    let api = FakeRavello::new();
    let config = fast_config();
    let err = run_blueprint(&context(&api, &config), &params(json!({"name": "orphan-bp"}))).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Blueprint orphan-bp does not exist and no app_name was given to create it from"
    );
}

#[test]
fn test_present_with_unknown_app_fails() {
    let api = FakeRavello::new();
    let config = fast_config();
    let result = run_blueprint(&context(&api, &config), &params(json!({"name": "x-bp", "app_name": "missing"})));
    assert!(result.is_err());
    assert!(api.state().blueprints.is_empty());
}

#[test]
fn test_absent_deletes_once() {
    let api = FakeRavello::new();
    let config = fast_config();
    let ctx = context(&api, &config);
    api.insert_blueprint("old-bp", json!({"vms": []}));

    let deleted = run_blueprint(&ctx, &params(json!({"name": "old-bp", "state": "absent"}))).unwrap();
    assert!(deleted.changed);
    assert!(api.blueprint_named("old-bp").is_none());

    let again = run_blueprint(&ctx, &params(json!({"name": "old-bp", "state": "absent"}))).unwrap();
    assert!(!again.changed);
    assert_eq!(again.msg.as_deref(), Some("Blueprint old-bp does not exist"));
}
