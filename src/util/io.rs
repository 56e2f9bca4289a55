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

use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::process;

// open a file per the normal rust way, but map any errors to strings
pub fn file_open(path: &Path) -> Result<fs::File, String> {
    fs::File::open(path).map_err(
        |_x| format!("unable to open file: {}", path.display())
    )
}

pub fn read_local_file(path: &Path) -> Result<String, String> {
    let mut file = file_open(path)?;
    let mut buffer = String::new();
    match file.read_to_string(&mut buffer) {
        Ok(_) => Ok(buffer),
        Err(x) => Err(format!("unable to read file: {}, {:?}", path.display(), x)),
    }
}

// None when the file does not exist, an error for anything else
pub fn read_optional_file(path: &Path) -> Result<Option<String>, String> {
    if !path.is_file() {
        return Ok(None);
    }
    read_local_file(path).map(Some)
}

pub fn write_local_file(path: &Path, contents: &str) -> Result<(), String> {
    let mut file = fs::File::create(path).map_err(
        |x| format!("unable to create file: {}, {:?}", path.display(), x)
    )?;
    file.write_all(contents.as_bytes()).map_err(
        |x| format!("unable to write file: {}, {:?}", path.display(), x)
    )
}

pub fn quit(s: &String) {
    // quit with a message - don't use this except from a binary's main
    println!("{}", s);
    process::exit(0x01)
}
