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

use std::process;
use ravello::modules::blueprint::{execute, BlueprintParams, MODULE_NAME};
use ravello::modules::main_with;

fn main() {
    let argv: Vec<String> = std::env::args().collect();
    process::exit(main_with::<BlueprintParams, _>(MODULE_NAME, &argv, execute));
}
