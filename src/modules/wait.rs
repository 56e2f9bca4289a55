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

use std::thread;
use std::time::{Duration, Instant};
use serde_json::Value;

use crate::api::RavelloApi;
use crate::error::{RavelloError, Result};
use crate::output::OutputHandlerRef;

pub const STATE_STARTED: &str = "STARTED";
pub const STATE_STOPPED: &str = "STOPPED";
pub const STATE_ERROR: &str = "ERROR";

/// Distinct VM states of a deployed application, in first-seen order.
pub fn vm_states(app: &Value) -> Vec<String> {
    let mut states: Vec<String> = Vec::new();
    let vms = app
        .get("deployment")
        .and_then(|d| d.get("vms"))
        .and_then(Value::as_array);
    for vm in vms.into_iter().flatten() {
        if let Some(state) = vm.get("state").and_then(Value::as_str) {
            if !states.iter().any(|s| s == state) {
                states.push(state.to_string());
            }
        }
    }
    states
}

/// Poll the application until every VM reports `target`.
///
/// Any VM in ERROR ends the wait with a failure, as does running past
/// `timeout`.
pub fn wait_for_state(
    api: &dyn RavelloApi,
    app_id: u64,
    app_name: &str,
    target: &str,
    timeout: Duration,
    interval: Duration,
    output: &OutputHandlerRef,
) -> Result<()> {
    let start = Instant::now();

    loop {
        let app = api.get_application(app_id, Some("deployment"))?;
        let states = vm_states(&app);
        output.on_state_poll(app_name, &states, start.elapsed().as_secs());

        if states.iter().any(|s| s == STATE_ERROR) {
            return Err(RavelloError::Wait(String::from("Vm got ERROR state")));
        }
        if states.len() == 1 && states[0] == target {
            output.info(&format!("{} reached {} after {}s", app_name, target, start.elapsed().as_secs()));
            return Ok(());
        }
        if start.elapsed() + interval > timeout {
            return Err(RavelloError::Wait(String::from("Timed out waiting for async operation to complete.")));
        }
        thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_vm_states_are_distinct() {
        let app = json!({"deployment": {"vms": [
            {"state": "STARTING"}, {"state": "STARTED"}, {"state": "STARTING"}, {"name": "no state"}
        ]}});
        assert_eq!(vm_states(&app), vec![String::from("STARTING"), String::from("STARTED")]);
        assert!(vm_states(&json!({})).is_empty());
    }
}
