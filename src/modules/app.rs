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

//! The `ravello_app` module: application and blueprint lifecycle.

use guid_create::GUID;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::api::{
    created_blueprint_id, id_of, lookup_blueprint_id, BlueprintRequest, CostBucket, ExpirationRequest,
    PublishRequest, RavelloApi, RavelloClient, ResourceAssociation,
};
use crate::config::expand_path;
use crate::credentials::{module_sources, resolve};
use crate::error::{RavelloError, Result};
use crate::modules::design::assert_vm_valid;
use crate::modules::network::{
    create_subnet_with_ip_pool, delete_autogenerated_subnet, detect_ips_and_create_compatible_subnets,
    plan_subnets, update_app_with_internal_luids,
};
use crate::modules::wait::{wait_for_state, STATE_STARTED, STATE_STOPPED};
use crate::modules::{de_bool, de_i64, de_opt_string, de_u64, module_config, ModuleContext, ModuleResult};
use crate::output::OutputHandlerRef;
use crate::template::{check_for_param, get, ParamCheck};
use crate::util::yaml::load_yaml_file_as_json;

pub const MODULE_NAME: &str = "ravello_app";
const TEMP_APP_PREFIX: &str = "tmp-app-build-";

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    Design,
    #[default]
    Present,
    Started,
    Stopped,
    Absent,
    List,
    Test,
    Blueprint,
    BlueprintDelete,
    BlueprintLocation,
}

impl AppState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppState::Design => "design",
            AppState::Present => "present",
            AppState::Started => "started",
            AppState::Stopped => "stopped",
            AppState::Absent => "absent",
            AppState::List => "list",
            AppState::Test => "test",
            AppState::Blueprint => "blueprint",
            AppState::BlueprintDelete => "blueprint_delete",
            AppState::BlueprintLocation => "blueprint_location",
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PublishOptimization {
    #[default]
    Cost,
    Performance,
}

fn default_ttl() -> i64 {
    -1
}

fn default_service_name() -> String {
    String::from("ssh")
}

fn default_true() -> bool {
    true
}

fn default_wait_timeout() -> u64 {
    1200
}

fn default_cost_bucket() -> String {
    String::from("Organization")
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct AppParams {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub state: AppState,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default, alias = "name")]
    pub app_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub blueprint_id: Option<String>,
    #[serde(default)]
    pub app_template: Option<String>,
    #[serde(default)]
    pub cloud: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub publish_optimization: PublishOptimization,
    #[serde(default = "default_ttl", deserialize_with = "de_i64")]
    pub application_ttl: i64,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default)]
    pub blueprint_name: Option<String>,
    #[serde(default)]
    pub blueprint_description: Option<String>,
    #[serde(default = "default_true", deserialize_with = "de_bool")]
    pub wait: bool,
    #[serde(default = "default_wait_timeout", deserialize_with = "de_u64")]
    pub wait_timeout: u64,
    #[serde(default = "default_cost_bucket")]
    pub cost_bucket: String,
}

impl AppParams {
    fn app_name(&self) -> Result<&str> {
        match self.app_name.as_deref() {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(RavelloError::Module(format!("Must supply an app_name for state {}", self.state.as_str()))),
        }
    }
}

/// Entry point of the binary module: connect, then run the requested state.
pub fn execute(params: AppParams, output: &OutputHandlerRef) -> Result<ModuleResult> {
    output.on_module_start(MODULE_NAME, params.state.as_str());
    let config = module_config(params.url.as_deref(), Some(params.wait_timeout));

    let credentials = resolve(&module_sources(&config, params.username.clone(), params.password.clone()))
        .map_err(|e| RavelloError::Module(format!("ERROR: Unable to get any Ravello credentials! {}", e)))?;
    let client = RavelloClient::connect(&config, &credentials, output.clone())
        .map_err(|e| RavelloError::Module(format!("ERROR: Failed to authenticate to Ravello: {}", e)))?;

    let ctx = ModuleContext { api: &client, config: &config, output: output.clone() };
    run_app(&ctx, &params)
}

pub fn run_app(ctx: &ModuleContext, params: &AppParams) -> Result<ModuleResult> {
    match params.state {
        AppState::Design => create_blueprint_from_template(ctx, params),
        AppState::Present => create_app_and_publish(ctx, params),
        AppState::Started => action_on_app(ctx, params, AppState::Started),
        AppState::Stopped => action_on_app(ctx, params, AppState::Stopped),
        AppState::Absent => action_on_app(ctx, params, AppState::Absent),
        AppState::List => list_app(ctx, params),
        AppState::Test => Ok(ModuleResult::unchanged().msg("Authentication to Ravello successful")),
        AppState::Blueprint => create_blueprint_from_existing_app(ctx, params),
        AppState::BlueprintDelete | AppState::BlueprintLocation => action_on_blueprint(ctx, params),
    }
}

/// `tmp-app-build-` plus ten lowercase letters.
pub fn temp_app_name() -> String {
    let letters: String = GUID::rand()
        .to_string()
        .chars()
        .filter_map(|c| c.to_digit(16))
        .take(10)
        .map(|d| char::from(b'a' + d as u8))
        .collect();
    format!("{}{}", TEMP_APP_PREFIX, letters)
}

fn name_taken(items: &[Value], name: &str) -> bool {
    items.iter().any(|item| item.get("name").and_then(Value::as_str) == Some(name))
}

fn subnet_list(template: &Value) -> Option<Vec<String>> {
    let subnets = get(template, "network.subnets").ok()?.as_array()?;
    Some(subnets.iter().filter_map(|s| s.as_str().map(str::to_string)).collect())
}

fn create_blueprint_from_template(ctx: &ModuleContext, params: &AppParams) -> Result<ModuleResult> {
    let api = ctx.api;
    let app_name = params.app_name()?;

    if name_taken(&api.get_applications()?, app_name) {
        return Err(RavelloError::Module(format!("ERROR: Application {} already exists!", app_name)));
    }
    let blueprint_name = format!("{}-bp", app_name);
    if name_taken(&api.get_blueprints()?, &blueprint_name) {
        return Err(RavelloError::Module(format!("ERROR: Blueprint {} already exists!", blueprint_name)));
    }
    let template_path = match params.app_template.as_deref() {
        Some(path) if !path.is_empty() => expand_path(path),
        _ => return Err(RavelloError::Module(String::from("Must supply an app_template for design state."))),
    };
    let mut template = load_yaml_file_as_json(&template_path)?;

    let temp_name = temp_app_name();
    if name_taken(&api.get_applications()?, &temp_name) {
        return Err(RavelloError::Module(format!("ERROR: Temporary application build {} already exists!", temp_name)));
    }

    check_for_param(&mut template, "vms", &ParamCheck::required())?;
    let mut vms = Vec::new();
    if let Some(Value::Array(items)) = template.get_mut("vms") {
        for vm in items.iter_mut() {
            assert_vm_valid(api, vm)?;
            vms.push(vm.clone());
        }
    }
    let request = json!({
        "name": temp_name,
        "description": params.description.clone().unwrap_or_default(),
        "design": {"vms": vms},
    });

    ctx.output.info(&format!("creating temporary application {}", temp_name));
    let created = api.create_application(&request)?;
    let app_id = id_of(&created)?;

    delete_autogenerated_subnet(api, app_id)?;
    match subnet_list(&template) {
        Some(subnets) => {
            for net in plan_subnets(&subnets)? {
                ctx.output.debug(&format!("creating subnet {}", net));
                create_subnet_with_ip_pool(api, app_id, &net)?;
            }
        }
        None => {
            let nets = detect_ips_and_create_compatible_subnets(api, app_id, &request)?;
            let shown: Vec<String> = nets.iter().map(|n| n.to_string()).collect();
            ctx.output.debug(&format!("created subnets {}", shown.join(", ")));
        }
    }
    update_app_with_internal_luids(api, app_id, &request)?;

    let created_blueprint = api.create_blueprint(&BlueprintRequest {
        application_id: app_id,
        blueprint_name: blueprint_name.clone(),
        offline: false,
        description: params.description.clone(),
    })?;
    let blueprint_id = created_blueprint_id(&created_blueprint)?;
    api.delete_application(app_id)?;
    ctx.output.info(&format!("created blueprint {} ({})", blueprint_name, blueprint_id));

    Ok(ModuleResult::changed()
        .with("app_name", json!(app_name))
        .with("blueprint_name", json!(blueprint_name))
        .with("blueprint_id", json!(blueprint_id.to_string())))
}

fn blueprint_reference(blueprint_id: &str) -> Value {
    match blueprint_id.parse::<u64>() {
        Ok(id) => json!(id),
        Err(_) => json!(blueprint_id),
    }
}

fn create_app_and_publish(ctx: &ModuleContext, params: &AppParams) -> Result<ModuleResult> {
    let api = ctx.api;
    let blueprint_id = match params.blueprint_id.as_deref() {
        Some(id) if !id.is_empty() => id,
        _ => return Err(RavelloError::Module(String::from("Must supply a blueprint_id"))),
    };
    let publish = match params.publish_optimization {
        PublishOptimization::Performance => {
            let cloud = params.cloud.as_deref().ok_or_else(|| {
                RavelloError::Module(String::from("Must supply a cloud when publish optimization is performance"))
            })?;
            let region = params.region.as_deref().ok_or_else(|| {
                RavelloError::Module(String::from("Must supply a region when publish optimization is performance"))
            })?;
            PublishRequest::performance(cloud, region)
        }
        PublishOptimization::Cost => PublishRequest::default(),
    };
    let app_name = params.app_name()?;

    let created = api.create_application(&json!({
        "name": app_name,
        "description": params.description.clone().unwrap_or_default(),
        "baseBlueprintId": blueprint_reference(blueprint_id),
    }))?;
    let app_id = id_of(&created)?;
    ctx.output.info(&format!("created application {} ({}) from blueprint {}", app_name, app_id, blueprint_id));

    if params.application_ttl != -1 {
        let request = ExpirationRequest { expiration_from_now_seconds: params.application_ttl * 60 };
        api.set_application_expiration(app_id, &request)?;
    }
    api.publish_application(app_id, &publish)?;
    set_cost_bucket(api, app_id, "application", &params.cost_bucket)?;
    let vms = vm_hostnames(api, app_id)?;

    if params.wait {
        wait_for_state(api, app_id, app_name, STATE_STARTED, ctx.config.wait_timeout, ctx.config.poll_interval, &ctx.output)?;
    }

    Ok(ModuleResult::changed()
        .with("app_name", json!(app_name))
        .with("app_id", json!(app_id.to_string()))
        .with("vms", Value::Object(vms)))
}

/// Internal and external names of every deployed VM, keyed by its first
/// hostname.
pub fn vm_hostnames(api: &dyn RavelloApi, app_id: u64) -> Result<Map<String, Value>> {
    let published = api.get_application(app_id, Some("deployment"))?;
    let mut found = Map::new();
    let vms = get(&published, "deployment.vms").ok().and_then(Value::as_array).cloned().unwrap_or_default();
    for vm in vms.iter() {
        let hostnames = vm.get("hostnames").and_then(Value::as_array).cloned().unwrap_or_default();
        let first = match hostnames.first().and_then(Value::as_str) {
            Some(first) => first.to_string(),
            None => {
                return Err(RavelloError::Module(String::from(
                    "Could not obtain vm hostname list from app. VMs must contain at least one internal hostname.",
                )))
            }
        };
        let external = vm.get("externalFqdn").cloned().unwrap_or(Value::Null);
        found.insert(first, json!({"internal": hostnames, "external": external}));
    }
    Ok(found)
}

/// Attach a resource to the named cost bucket among those the user may
/// execute. `Default` takes the first bucket when no bucket has that name.
pub fn set_cost_bucket(api: &dyn RavelloApi, resource_id: u64, resource_type: &str, bucket_name: &str) -> Result<()> {
    let buckets = api
        .get_cost_buckets(Some("execute"))?
        .into_iter()
        .map(serde_json::from_value::<CostBucket>)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let association = ResourceAssociation { resource_id, resource_type: resource_type.to_string() };

    let chosen = buckets
        .iter()
        .find(|bucket| bucket.name == bucket_name)
        .or_else(|| if bucket_name == "Default" { buckets.first() } else { None });

    match chosen {
        Some(bucket) => api.associate_resource_to_cost_bucket(bucket.id, &association),
        None => {
            let available: Vec<&str> = buckets.iter().map(|b| b.name.as_str()).collect();
            Err(RavelloError::Module(format!(
                "Cost Bucket: {} - not found.  Available cost buckets: {}",
                bucket_name,
                available.join(", ")
            )))
        }
    }
}

fn action_on_app(ctx: &ModuleContext, params: &AppParams, action: AppState) -> Result<ModuleResult> {
    let api = ctx.api;
    let app_name = params.app_name()?;
    let app = api.get_application_by_name(app_name)?;
    let app_id = id_of(&app)?;

    let (verb, target) = match action {
        AppState::Started => {
            api.start_application(app_id)?;
            ("Started", Some(STATE_STARTED))
        }
        AppState::Stopped => {
            api.stop_application(app_id)?;
            ("Stopped", Some(STATE_STOPPED))
        }
        _ => {
            api.delete_application(app_id)?;
            ("Deleted", None)
        }
    };

    if let Some(target) = target {
        if params.wait {
            wait_for_state(api, app_id, app_name, target, ctx.config.wait_timeout, ctx.config.poll_interval, &ctx.output)?;
        }
    }

    Ok(ModuleResult::changed()
        .msg(format!("{} application: {}", verb, app_name))
        .with("app_name", json!(app_name)))
}

fn external_port(service: &Value) -> Option<u64> {
    let raw = match service.get("externalPort")? {
        Value::Number(n) => return n.as_u64(),
        Value::String(s) => s.clone(),
        _ => return None,
    };
    raw.split(',').next()?.split('-').next()?.trim().parse::<u64>().ok()
}

/// `{host, port}` of the external service named `service_name` on one VM.
pub fn vm_service_endpoint(vm: &Value, service_name: &str) -> Option<Value> {
    let wanted = service_name.to_lowercase();
    let services = vm.get("suppliedServices").and_then(Value::as_array)?;
    let service = services.iter().find(|svc| {
        svc.get("name").and_then(Value::as_str).map(str::to_lowercase).as_deref() == Some(wanted.as_str())
            && svc.get("external").and_then(Value::as_bool) == Some(true)
    })?;
    let luid = service.get("ipConfigLuid")?;
    let nics = vm.get("networkConnections").and_then(Value::as_array)?;
    let nic = nics.iter().find(|nic| get(nic, "ipConfig.id").ok() == Some(luid))?;
    let host = get(nic, "ipConfig.fqdn").ok().cloned().unwrap_or(Value::Null);
    Some(json!({"host": host, "port": external_port(service)}))
}

fn list_app(ctx: &ModuleContext, params: &AppParams) -> Result<ModuleResult> {
    let app_name = params.app_name()?;
    let app = ctx.api.get_application_by_name(app_name)?;
    let vms = get(&app, "deployment.vms").ok().and_then(Value::as_array).cloned().unwrap_or_default();

    let mut results = Vec::new();
    for vm in vms.iter() {
        if vm.get("state").and_then(Value::as_str) != Some(STATE_STARTED) {
            continue;
        }
        match vm_service_endpoint(vm, &params.service_name) {
            Some(endpoint) => results.push(endpoint),
            None => ctx.output.debug(&format!(
                "skipping {}: no external {} service",
                vm.get("name").and_then(Value::as_str).unwrap_or("?"),
                params.service_name
            )),
        }
    }

    Ok(ModuleResult::changed()
        .with("app_name", json!(app_name))
        .with("results", Value::Array(results)))
}

fn create_blueprint_from_existing_app(ctx: &ModuleContext, params: &AppParams) -> Result<ModuleResult> {
    let app_name = params.app_name()?;
    let blueprint_name = match params.blueprint_name.as_deref() {
        Some(name) if !name.is_empty() => name,
        _ => return Err(RavelloError::Module(String::from("Must supply a blueprint_name for state blueprint"))),
    };
    let app = ctx.api.get_application_by_name(app_name)?;
    let created = ctx.api.create_blueprint(&BlueprintRequest {
        application_id: id_of(&app)?,
        blueprint_name: blueprint_name.to_string(),
        offline: true,
        description: params.blueprint_description.clone(),
    })?;
    let blueprint_id = created_blueprint_id(&created)?;

    Ok(ModuleResult::changed()
        .with("app_name", json!(app_name))
        .with("blueprint_name", json!(blueprint_name))
        .with("blueprint_id", json!(blueprint_id.to_string())))
}

fn resolve_blueprint_id(api: &dyn RavelloApi, params: &AppParams) -> Result<u64> {
    if let Some(id) = params.blueprint_id.as_deref().filter(|id| !id.is_empty()) {
        return id
            .parse::<u64>()
            .map_err(|_| RavelloError::Module(format!("blueprint_id must be numeric, got {}", id)));
    }
    match params.blueprint_name.as_deref() {
        Some(name) if !name.is_empty() => lookup_blueprint_id(api, name),
        _ => Err(RavelloError::Module(String::from("Must supply a blueprint_id or blueprint_name"))),
    }
}

fn action_on_blueprint(ctx: &ModuleContext, params: &AppParams) -> Result<ModuleResult> {
    let blueprint_id = resolve_blueprint_id(ctx.api, params)?;
    let output = match params.state {
        AppState::BlueprintDelete => {
            ctx.api.delete_blueprint(blueprint_id)?;
            Value::Null
        }
        _ => ctx.api.get_blueprint_publish_locations(blueprint_id)?,
    };
    Ok(ModuleResult::changed()
        .with("blueprint_id", json!(blueprint_id.to_string()))
        .with("output", output))
}
