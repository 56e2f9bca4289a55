// Common test utilities

#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use serde_json::{json, Map, Value};

use ravello::api::{BlueprintRequest, ExpirationRequest, PublishRequest, ResourceAssociation};
use ravello::modules::ModuleContext;
use ravello::{NullOutputHandler, OutputHandlerRef, RavelloApi, RavelloConfig, RavelloError, Result};

pub const BOOT_IMAGE: &str = "rhel-guest-image-7.3-35.x86_64";

pub struct FakeState {
    next_id: u64,
    pub apps: Vec<Value>,
    pub blueprints: Vec<Value>,
    pub disk_images: Vec<Value>,
    pub images: Vec<Value>,
    pub cost_buckets: Vec<Value>,
    pub associations: Vec<(u64, ResourceAssociation)>,
    pub publishes: Vec<(u64, PublishRequest)>,
    pub expirations: Vec<(u64, i64)>,
    pub deleted_apps: Vec<u64>,
    pub updates: usize,
    /// State every VM reports after publish or start
    pub start_state: String,
}

/// In-memory Ravello service. Saving a document gives an id to every object
/// inside a list and to every `ipConfig`, the way the real service does.
pub struct FakeRavello {
    state: Mutex<FakeState>,
}

impl FakeRavello {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                next_id: 1000,
                apps: Vec::new(),
                blueprints: Vec::new(),
                disk_images: vec![json!({"id": 100, "name": BOOT_IMAGE, "size": {"value": 10, "unit": "GB"}})],
                images: vec![json!({"id": 200, "name": "CentOS 7"})],
                cost_buckets: vec![json!({"id": 1, "name": "Organization"}), json!({"id": 2, "name": "Team"})],
                associations: Vec::new(),
                publishes: Vec::new(),
                expirations: Vec::new(),
                deleted_apps: Vec::new(),
                updates: 0,
                start_state: String::from("STARTED"),
            }),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Store a raw application document as-is, returning its id.
    pub fn insert_app(&self, mut app: Value) -> u64 {
        let mut state = self.state();
        let id = state.take_id();
        app["id"] = json!(id);
        state.apps.push(app);
        id
    }

    pub fn insert_blueprint(&self, name: &str, design: Value) -> u64 {
        let mut state = self.state();
        let id = state.take_id();
        state.blueprints.push(json!({"id": id, "name": name, "design": design}));
        id
    }

    pub fn app_named(&self, name: &str) -> Option<Value> {
        self.state().apps.iter().find(|a| a["name"] == json!(name)).cloned()
    }

    pub fn blueprint_named(&self, name: &str) -> Option<Value> {
        self.state().blueprints.iter().find(|b| b["name"] == json!(name)).cloned()
    }
}

impl FakeState {
    fn take_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn assign_ids(&mut self, value: &mut Value, in_list: bool) {
        match value {
            Value::Object(map) => {
                if in_list && !map.contains_key("id") {
                    map.insert(String::from("id"), json!(self.take_id()));
                }
                for (key, child) in map.iter_mut() {
                    if key == "ipConfig" {
                        if let Value::Object(config) = child {
                            if !config.contains_key("id") {
                                config.insert(String::from("id"), json!(self.take_id()));
                            }
                        }
                    }
                    self.assign_ids(child, false);
                }
            }
            Value::Array(items) => {
                for item in items.iter_mut() {
                    self.assign_ids(item, true);
                }
            }
            _ => {}
        }
    }

    fn app_index(&self, id: u64) -> Result<usize> {
        self.apps
            .iter()
            .position(|a| a["id"] == json!(id))
            .ok_or_else(|| RavelloError::Api(format!("GET /applications/{} returned 404 Not Found: ", id)))
    }

    fn set_vm_states(&mut self, id: u64, vm_state: &str) -> Result<()> {
        let index = self.app_index(id)?;
        if let Some(Value::Array(vms)) = self.apps[index].pointer_mut("/deployment/vms") {
            for vm in vms.iter_mut() {
                vm["state"] = json!(vm_state);
            }
        }
        Ok(())
    }
}

fn autogenerated_network() -> Value {
    json!({
        "switches": [{"networkSegments": [{"vlanId": 1}]}],
        "subnets": [{"net": "10.0.0.0", "mask": "255.255.255.0", "ipVersion": "IPV4"}],
        "services": {
            "networkInterfaces": [{"ipConfigurations": [{"staticIpConfig": {"ip": "10.0.0.1", "mask": "255.255.255.0"}}]}],
            "dhcpServers": [{"poolStart": "10.0.0.0", "poolEnd": "10.0.0.255", "mask": "255.255.255.0"}]
        }
    })
}

impl RavelloApi for FakeRavello {
    fn get_applications(&self) -> Result<Vec<Value>> {
        Ok(self
            .state()
            .apps
            .iter()
            .map(|a| json!({"id": a["id"], "name": a["name"], "published": a.get("published").cloned().unwrap_or(json!(false))}))
            .collect())
    }

    fn get_application(&self, id: u64, _aspect: Option<&str>) -> Result<Value> {
        let state = self.state();
        let index = state.app_index(id)?;
        Ok(state.apps[index].clone())
    }

    fn create_application(&self, app: &Value) -> Result<Value> {
        let mut state = self.state();
        let mut created = app.clone();
        if let Some(base) = app.get("baseBlueprintId") {
            let blueprint = state
                .blueprints
                .iter()
                .find(|b| &b["id"] == base)
                .cloned()
                .ok_or_else(|| RavelloError::Api(format!("no blueprint {}", base)))?;
            created["design"] = blueprint["design"].clone();
        }
        if created.get("design").is_none() {
            created["design"] = json!({"vms": []});
        }
        if created["design"].get("network").is_none() {
            created["design"]["network"] = autogenerated_network();
        }
        created["published"] = json!(false);
        let id = state.take_id();
        created["id"] = json!(id);
        state.assign_ids(&mut created, false);
        state.apps.push(created.clone());
        Ok(created)
    }

    fn update_application(&self, app: &Value) -> Result<Value> {
        let mut state = self.state();
        let id = app["id"].as_u64().ok_or_else(|| RavelloError::Api(String::from("update without id")))?;
        let index = state.app_index(id)?;
        let mut updated = app.clone();
        state.assign_ids(&mut updated, false);
        state.apps[index] = updated.clone();
        state.updates += 1;
        Ok(updated)
    }

    fn delete_application(&self, id: u64) -> Result<()> {
        let mut state = self.state();
        let index = state.app_index(id)?;
        state.apps.remove(index);
        state.deleted_apps.push(id);
        Ok(())
    }

    fn publish_application(&self, id: u64, request: &PublishRequest) -> Result<()> {
        let mut state = self.state();
        let index = state.app_index(id)?;
        let vm_state = state.start_state.clone();
        let app = &mut state.apps[index];
        let vms: Vec<Value> = app["design"]["vms"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|mut vm| {
                let name = vm["name"].as_str().unwrap_or("vm").to_string();
                vm["state"] = json!(vm_state);
                vm["externalFqdn"] = json!(format!("{}.srv.ravcloud.com", name));
                vm
            })
            .collect();
        app["published"] = json!(true);
        app["deployment"] = json!({"vms": vms});
        state.publishes.push((id, request.clone()));
        Ok(())
    }

    fn start_application(&self, id: u64) -> Result<()> {
        let mut state = self.state();
        let vm_state = state.start_state.clone();
        state.set_vm_states(id, &vm_state)
    }

    fn stop_application(&self, id: u64) -> Result<()> {
        self.state().set_vm_states(id, "STOPPED")
    }

    fn set_application_expiration(&self, id: u64, request: &ExpirationRequest) -> Result<()> {
        let mut state = self.state();
        state.app_index(id)?;
        state.expirations.push((id, request.expiration_from_now_seconds));
        Ok(())
    }

    fn get_blueprints(&self) -> Result<Vec<Value>> {
        Ok(self.state().blueprints.iter().map(|b| json!({"id": b["id"], "name": b["name"]})).collect())
    }

    fn create_blueprint(&self, request: &BlueprintRequest) -> Result<Value> {
        let mut state = self.state();
        let index = state.app_index(request.application_id)?;
        let design = state.apps[index]["design"].clone();
        let id = state.take_id();
        state.blueprints.push(json!({
            "id": id,
            "name": request.blueprint_name,
            "description": request.description,
            "offline": request.offline,
            "design": design,
        }));
        Ok(json!({"_href": format!("/blueprints/{}", id), "name": request.blueprint_name}))
    }

    fn delete_blueprint(&self, id: u64) -> Result<()> {
        let mut state = self.state();
        let before = state.blueprints.len();
        state.blueprints.retain(|b| b["id"] != json!(id));
        if state.blueprints.len() == before {
            return Err(RavelloError::Api(format!("DELETE /blueprints/{} returned 404 Not Found: ", id)));
        }
        Ok(())
    }

    fn get_blueprint_publish_locations(&self, id: u64) -> Result<Value> {
        if !self.state().blueprints.iter().any(|b| b["id"] == json!(id)) {
            return Err(RavelloError::Api(format!("no blueprint {}", id)));
        }
        Ok(json!([{"cloudName": "AMAZON", "regionName": "Oregon"}]))
    }

    fn get_images(&self) -> Result<Vec<Value>> {
        Ok(self.state().images.clone())
    }

    fn get_image(&self, id: u64) -> Result<Value> {
        self.state()
            .images
            .iter()
            .find(|i| i["id"] == json!(id))
            .cloned()
            .ok_or_else(|| RavelloError::Api(format!("no image {}", id)))
    }

    fn get_disk_images(&self) -> Result<Vec<Value>> {
        Ok(self.state().disk_images.clone())
    }

    fn get_cost_buckets(&self, _permissions: Option<&str>) -> Result<Vec<Value>> {
        Ok(self.state().cost_buckets.clone())
    }

    fn associate_resource_to_cost_bucket(&self, bucket_id: u64, resource: &ResourceAssociation) -> Result<()> {
        self.state().associations.push((bucket_id, resource.clone()));
        Ok(())
    }
}

pub fn null_output() -> OutputHandlerRef {
    Arc::new(NullOutputHandler)
}

/// Short polling so wait tests finish quickly.
pub fn fast_config() -> RavelloConfig {
    RavelloConfig::new()
        .poll_interval(Duration::from_millis(1))
        .wait_timeout(Duration::from_millis(40))
}

pub fn context<'a>(api: &'a FakeRavello, config: &'a RavelloConfig) -> ModuleContext<'a> {
    ModuleContext { api, config, output: null_output() }
}

pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
