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

pub mod client;
pub mod types;

use serde_json::Value;
use crate::error::{RavelloError, Result};

pub use client::RavelloClient;
pub use types::*;

/// The Ravello REST operations used by the inventory and the modules.
///
/// Everything above this trait is written against it, so tests can swap the
/// HTTP client for an in-memory service.
pub trait RavelloApi: Send + Sync {
    fn get_applications(&self) -> Result<Vec<Value>>;

    /// `aspect` selects a view such as `design` or `deployment`.
    fn get_application(&self, id: u64, aspect: Option<&str>) -> Result<Value>;

    /// Exact, case-sensitive name match, then a full fetch.
    fn get_application_by_name(&self, name: &str) -> Result<Value> {
        let apps = self.get_applications()?;
        let found = apps
            .iter()
            .find(|app| app.get("name").and_then(Value::as_str) == Some(name))
            .ok_or_else(|| RavelloError::Api(format!("application not found: {}", name)))?;
        self.get_application(id_of(found)?, None)
    }

    fn create_application(&self, app: &Value) -> Result<Value>;

    /// PUT the whole document back; the id is taken from the document.
    fn update_application(&self, app: &Value) -> Result<Value>;

    fn delete_application(&self, id: u64) -> Result<()>;
    fn publish_application(&self, id: u64, request: &PublishRequest) -> Result<()>;
    fn start_application(&self, id: u64) -> Result<()>;
    fn stop_application(&self, id: u64) -> Result<()>;
    fn set_application_expiration(&self, id: u64, request: &ExpirationRequest) -> Result<()>;

    fn get_blueprints(&self) -> Result<Vec<Value>>;
    fn create_blueprint(&self, request: &BlueprintRequest) -> Result<Value>;
    fn delete_blueprint(&self, id: u64) -> Result<()>;
    fn get_blueprint_publish_locations(&self, id: u64) -> Result<Value>;

    fn get_images(&self) -> Result<Vec<Value>>;
    fn get_image(&self, id: u64) -> Result<Value>;
    fn get_disk_images(&self) -> Result<Vec<Value>>;

    fn get_cost_buckets(&self, permissions: Option<&str>) -> Result<Vec<Value>>;
    fn associate_resource_to_cost_bucket(&self, bucket_id: u64, resource: &ResourceAssociation) -> Result<()>;
}

/// The numeric `id` of an API object.
pub fn id_of(item: &Value) -> Result<u64> {
    match item.get("id") {
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| RavelloError::Api(format!("non-integer id: {}", n))),
        Some(Value::String(s)) => s.parse::<u64>().map_err(|_| RavelloError::Api(format!("non-integer id: {}", s))),
        _ => Err(RavelloError::Api(format!("object has no id: {}", item))),
    }
}

fn name_of(item: &Value) -> &str {
    item.get("name").and_then(Value::as_str).unwrap_or("")
}

fn lookup_by_name(items: &[Value], name: &str, kind: &str) -> Result<u64> {
    let wanted = name.to_lowercase();
    match items.iter().find(|item| name_of(item).to_lowercase() == wanted) {
        Some(item) => id_of(item),
        None => Err(RavelloError::Module(format!("ERROR: Could not find {}: {}", kind, name))),
    }
}

/// Case-insensitive application lookup.
pub fn lookup_app_id(api: &dyn RavelloApi, name: &str) -> Result<u64> {
    lookup_by_name(&api.get_applications()?, name, "app")
}

pub fn lookup_blueprint_id(api: &dyn RavelloApi, name: &str) -> Result<u64> {
    let wanted = name.to_lowercase();
    for blueprint in api.get_blueprints()? {
        let summary: BlueprintSummary = serde_json::from_value(blueprint)?;
        if summary.name.to_lowercase() == wanted {
            return Ok(summary.id);
        }
    }
    Err(RavelloError::Module(format!("ERROR: Could not find blueprint: {}", name)))
}

pub fn lookup_image_id(api: &dyn RavelloApi, name: &str) -> Result<u64> {
    lookup_by_name(&api.get_images()?, name, "VM image named")
}

/// Find a disk image by numeric id, or by name when the argument is not a
/// number.
pub fn find_disk_image(api: &dyn RavelloApi, name_or_id: &Value) -> Result<Option<Value>> {
    let images = api.get_disk_images()?;
    let wanted_id = match name_or_id {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse::<u64>().ok(),
        _ => None,
    };
    let found = match wanted_id {
        Some(id) => images.into_iter().find(|image| id_of(image).ok() == Some(id)),
        None => {
            let wanted = name_or_id.as_str().unwrap_or_default();
            images.into_iter().find(|image| name_of(image) == wanted)
        }
    };
    Ok(found)
}

/// `/blueprints/123` → 123
pub fn blueprint_id_from_href(href: &str) -> Result<u64> {
    href.split('/')
        .nth(2)
        .and_then(|id| id.parse::<u64>().ok())
        .ok_or_else(|| RavelloError::Api(format!("unexpected blueprint href: {}", href)))
}

/// The id of a blueprint returned by `create_blueprint`, preferring `_href`.
pub fn created_blueprint_id(created: &Value) -> Result<u64> {
    match created.get("_href").and_then(Value::as_str) {
        Some(href) => blueprint_id_from_href(href),
        None => id_of(created),
    }
}
