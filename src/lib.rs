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

pub mod api;
pub mod config;
pub mod credentials;
pub mod error;
pub mod inventory;
pub mod modules;
pub mod output;
pub mod template;
pub mod util;

// Re-export commonly used types for library users
pub use api::{RavelloApi, RavelloClient};
pub use config::RavelloConfig;
pub use credentials::Credentials;
pub use error::{RavelloError, PathError, Result};
pub use output::{OutputHandler, OutputHandlerRef, TerminalOutputHandler, NullOutputHandler, CaptureOutputHandler, LogLevel};
pub use inventory::{Grouping, Inventory};
pub use modules::{ModuleArgs, ModuleResult};
pub use template::{check_for_param, ParamCheck, Path};
