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

use std::sync::Arc;
use clap::Parser;

use ravello::credentials::{inventory_sources, resolve};
use ravello::inventory::{inventory_for_app, published_app_names};
use ravello::util::ini::read_section;
use ravello::util::io::quit;
use ravello::{Grouping, Inventory, OutputHandlerRef, RavelloClient, RavelloConfig, RavelloError, Result, TerminalOutputHandler};

/// Produce an Ansible inventory from a published Ravello application
#[derive(Parser, Debug)]
#[command(name = "ravello_inventory", version, about)]
struct Args {
    /// Groups and hosts of the application APP (default: RAVELLO_APP or `app` in ravello.ini)
    #[arg(long, num_args = 0..=1, value_name = "APP")]
    list: Option<Option<String>>,

    /// Variables of a single host
    #[arg(long, value_name = "HOST")]
    host: Option<String>,

    /// Names of all published applications
    #[arg(long)]
    apps: bool,

    /// attributes, tags or design-tags
    #[arg(long, default_value = "attributes")]
    grouping: String,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    if let Err(e) = liftoff() {
        quit(&e.to_string());
    }
}

fn liftoff() -> Result<()> {
    let args = Args::parse();
    let config = RavelloConfig::from_env().verbosity(u32::from(args.verbose));
    let grouping: Grouping = args.grouping.parse()?;
    let output: OutputHandlerRef = Arc::new(TerminalOutputHandler::new(config.verbosity));

    let credentials = resolve(&inventory_sources(&config)).map_err(|e| {
        RavelloError::Credentials(format!("Could not get Ravello credentials from INI file or .ravello_login: {}", e))
    })?;
    let client = RavelloClient::connect(&config, &credentials, output.clone())?;

    if args.apps {
        for name in published_app_names(&client)? {
            println!("{}", serde_json::to_string(&name)?);
        }
        return Ok(());
    }

    let requested = args.list.clone().flatten();
    let inventory = match app_name(&config, requested)? {
        Some(app_name) => inventory_for_app(&client, &app_name, grouping, &output)?,
        None => {
            output.warning("no application given; use --list APP, RAVELLO_APP or `app` in ravello.ini");
            Inventory::new()
        }
    };

    let doc = match &args.host {
        Some(host) => inventory.host_vars(host),
        None => inventory.to_json(),
    };
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

// --list APP, then RAVELLO_APP, then `app` in the [ravello] section
fn app_name(config: &RavelloConfig, requested: Option<String>) -> Result<Option<String>> {
    if let Some(name) = requested.filter(|n| !n.is_empty()) {
        return Ok(Some(name));
    }
    if let Some(name) = config.app_name.clone() {
        return Ok(Some(name));
    }
    let section = read_section(&config.ini_paths, "ravello").map_err(RavelloError::Config)?;
    Ok(section.get("app").cloned().filter(|n| !n.is_empty()))
}
