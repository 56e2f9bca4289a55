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

//! The `ravello_blueprint` module: make sure a named blueprint exists or
//! does not.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::{created_blueprint_id, id_of, lookup_app_id, BlueprintRequest, RavelloClient};
use crate::credentials::{module_sources, resolve};
use crate::error::{RavelloError, Result};
use crate::modules::{module_config, ModuleContext, ModuleResult};
use crate::output::OutputHandlerRef;

pub const MODULE_NAME: &str = "ravello_blueprint";

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BlueprintState {
    #[default]
    Present,
    Absent,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct BlueprintParams {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub state: BlueprintState,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

pub fn execute(params: BlueprintParams, output: &OutputHandlerRef) -> Result<ModuleResult> {
    let state = match params.state {
        BlueprintState::Present => "present",
        BlueprintState::Absent => "absent",
    };
    output.on_module_start(MODULE_NAME, state);
    let config = module_config(params.url.as_deref(), None);
    let credentials = resolve(&module_sources(&config, params.username.clone(), params.password.clone()))?;
    let client = RavelloClient::connect(&config, &credentials, output.clone())
        .map_err(|e| RavelloError::Module(format!("ERROR: Failed to authenticate to Ravello: {}", e)))?;

    let ctx = ModuleContext { api: &client, config: &config, output: output.clone() };
    run_blueprint(&ctx, &params)
}

/// Exact-name lookup; blueprint names are what the user typed in.
fn find_blueprint(ctx: &ModuleContext, name: &str) -> Result<Option<Value>> {
    Ok(ctx
        .api
        .get_blueprints()?
        .into_iter()
        .find(|bp| bp.get("name").and_then(Value::as_str) == Some(name)))
}

pub fn run_blueprint(ctx: &ModuleContext, params: &BlueprintParams) -> Result<ModuleResult> {
    let existing = find_blueprint(ctx, &params.name)?;

    match (params.state, existing) {
        (BlueprintState::Present, Some(bp)) => Ok(ModuleResult::unchanged()
            .msg(format!("Blueprint {} already exists", params.name))
            .with("blueprint_id", json!(id_of(&bp)?.to_string()))),
        (BlueprintState::Present, None) => {
            let app_name = params.app_name.as_deref().filter(|n| !n.is_empty()).ok_or_else(|| {
                RavelloError::Module(format!(
                    "Blueprint {} does not exist and no app_name was given to create it from",
                    params.name
                ))
            })?;
            let app_id = lookup_app_id(ctx.api, app_name)?;
            let created = ctx.api.create_blueprint(&BlueprintRequest {
                application_id: app_id,
                blueprint_name: params.name.clone(),
                offline: true,
                description: params.description.clone(),
            })?;
            let blueprint_id = created_blueprint_id(&created)?;
            ctx.output.info(&format!("created blueprint {} ({}) from {}", params.name, blueprint_id, app_name));
            Ok(ModuleResult::changed()
                .msg(format!("Created blueprint {}", params.name))
                .with("blueprint_id", json!(blueprint_id.to_string())))
        }
        (BlueprintState::Absent, Some(bp)) => {
            let blueprint_id = id_of(&bp)?;
            ctx.api.delete_blueprint(blueprint_id)?;
            Ok(ModuleResult::changed()
                .msg(format!("Deleted blueprint {}", params.name))
                .with("blueprint_id", json!(blueprint_id.to_string())))
        }
        (BlueprintState::Absent, None) => {
            Ok(ModuleResult::unchanged().msg(format!("Blueprint {} does not exist", params.name)))
        }
    }
}
