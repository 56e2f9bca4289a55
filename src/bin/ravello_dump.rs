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

use ravello::credentials::{resolve, CredentialSource};
use ravello::util::io::quit;
use ravello::{OutputHandlerRef, RavelloApi, RavelloClient, RavelloConfig, Result, TerminalOutputHandler};

/// Print the JSON of one Ravello application
#[derive(Parser, Debug)]
#[command(name = "ravello_dump", version, about)]
struct Args {
    app_id: u64,

    /// design or deployment
    #[arg(long)]
    aspect: Option<String>,

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
    let output: OutputHandlerRef = Arc::new(TerminalOutputHandler::new(config.verbosity));

    let credentials = resolve(&[CredentialSource::LoginFile(config.login_file.clone())])?;
    let client = RavelloClient::connect(&config, &credentials, output)?;
    let app = client.get_application(args.app_id, args.aspect.as_deref())?;
    println!("{}", serde_json::to_string_pretty(&app)?);
    Ok(())
}
