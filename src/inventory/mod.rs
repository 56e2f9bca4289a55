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

pub mod attributes;
pub mod builder;

use serde_json::Value;
use crate::api::{id_of, ApplicationSummary, RavelloApi};
use crate::error::Result;
use crate::output::OutputHandlerRef;

pub use builder::{build, Grouping, Inventory};

/// Names of published applications.
pub fn published_app_names(api: &dyn RavelloApi) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for app in api.get_applications()? {
        let summary: ApplicationSummary = serde_json::from_value(app)?;
        if summary.published {
            names.push(summary.name);
        }
    }
    Ok(names)
}

/// Inventory of the published application named `app_name`. An unknown or
/// unpublished application gives the empty inventory.
pub fn inventory_for_app(api: &dyn RavelloApi, app_name: &str, grouping: Grouping, output: &OutputHandlerRef) -> Result<Inventory> {
    let apps = api.get_applications()?;
    let found = apps.iter().find(|app| {
        app.get("published").and_then(Value::as_bool).unwrap_or(false)
            && app.get("name").and_then(Value::as_str) == Some(app_name)
    });

    let app_id = match found {
        Some(app) => id_of(app)?,
        None => {
            output.info(&format!("no published application named {}", app_name));
            return Ok(Inventory::new());
        }
    };

    let app = api.get_application(app_id, Some(grouping.aspect()))?;
    output.debug(&format!("building {} inventory for {} ({})", grouping, app_name, app_id));
    build(&app, grouping)
}
