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

// read and write nested values of an application document by dotted path

use serde_json::{Map, Value};
use crate::error::PathError;
use crate::template::path::{IntoPath, Path, Segment};

fn not_found(path: &Path) -> PathError {
    PathError::NotFound { path: path.to_string() }
}

fn empty_container_for(segment: &Segment) -> Value {
    match segment {
        Segment::Index(_) => Value::Array(Vec::new()),
        Segment::Key(_) => Value::Object(Map::new()),
    }
}

fn step<'a>(current: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match (current, segment) {
        (Value::Object(map), segment) => map.get(&segment.as_key()),
        (Value::Array(items), Segment::Index(i)) => items.get(*i),
        _ => None,
    }
}

fn step_mut<'a>(current: &'a mut Value, segment: &Segment) -> Option<&'a mut Value> {
    match (current, segment) {
        (Value::Object(map), segment) => map.get_mut(&segment.as_key()),
        (Value::Array(items), Segment::Index(i)) => items.get_mut(*i),
        _ => None,
    }
}

/// Look up the value at `path`. Every segment must resolve.
pub fn get<P: IntoPath>(doc: &Value, path: P) -> Result<&Value, PathError> {
    let path = path.into_path()?;
    let mut current = doc;
    for segment in path.segments() {
        current = step(current, segment).ok_or_else(|| not_found(&path))?;
    }
    Ok(current)
}

pub fn get_mut<P: IntoPath>(doc: &mut Value, path: P) -> Result<&mut Value, PathError> {
    let path = path.into_path()?;
    let mut current = doc;
    for segment in path.segments() {
        current = match step_mut(current, segment) {
            Some(next) => next,
            None => return Err(not_found(&path)),
        };
    }
    Ok(current)
}

// Walk `path` without writing and fail the way `set` would. Past the first
// missing or null value every container is new, so only index 0 fits.
fn check_writable(doc: &Value, path: &Path) -> Result<(), PathError> {
    let mut current = Some(doc);
    for segment in path.segments() {
        current = match current {
            None | Some(Value::Null) => {
                if let Segment::Index(index) = segment {
                    if *index > 0 {
                        return Err(PathError::IndexOutOfRange { path: path.to_string(), index: *index, len: 0 });
                    }
                }
                None
            }
            Some(Value::Object(map)) => map.get(&segment.as_key()),
            Some(Value::Array(items)) => match segment {
                Segment::Index(index) if *index <= items.len() => items.get(*index),
                Segment::Index(index) => {
                    return Err(PathError::IndexOutOfRange { path: path.to_string(), index: *index, len: items.len() })
                }
                Segment::Key(_) => return Err(not_found(path)),
            },
            Some(_) => return Err(PathError::NotAContainer { path: path.to_string() }),
        };
    }
    Ok(())
}

/// Write `value` at `path`, creating missing containers on the way.
///
/// A missing or null intermediate becomes an array when the segment applied
/// to it is an index, and an object otherwise. Writing to a sequence at its
/// length appends; any further out is an error. The document is untouched
/// when the write fails.
pub fn set<P: IntoPath>(doc: &mut Value, path: P, value: Value) -> Result<(), PathError> {
    let path = path.into_path()?;
    check_writable(doc, &path)?;
    let segments = path.segments();
    let last = segments.len() - 1;
    let mut current = doc;

    for (position, segment) in segments.iter().enumerate() {
        if current.is_null() {
            *current = empty_container_for(segment);
        }

        current = match current {
            Value::Object(map) => {
                if position == last {
                    map.insert(segment.as_key(), value);
                    return Ok(());
                }
                map.entry(segment.as_key()).or_insert(Value::Null)
            }
            Value::Array(items) => {
                let index = match segment {
                    Segment::Index(i) => *i,
                    Segment::Key(_) => return Err(not_found(&path)),
                };
                let len = items.len();
                if index > len {
                    return Err(PathError::IndexOutOfRange { path: path.to_string(), index, len });
                }
                if position == last {
                    if index == len {
                        items.push(value);
                    } else {
                        items[index] = value;
                    }
                    return Ok(());
                }
                if index == len {
                    items.push(Value::Null);
                }
                &mut items[index]
            }
            _ => return Err(PathError::NotAContainer { path: path.to_string() }),
        };
    }

    Ok(())
}

/// True when `path` fully resolves. A key holding null counts as present.
pub fn contains<P: IntoPath>(doc: &Value, path: P) -> bool {
    get(doc, path).is_ok()
}

/// Push `value` onto the sequence at `path`.
pub fn append<P: IntoPath>(doc: &mut Value, path: P, value: Value) -> Result<(), PathError> {
    let path = path.into_path()?;
    match get_mut(doc, &path)? {
        Value::Array(items) => {
            items.push(value);
            Ok(())
        }
        _ => Err(PathError::NotAContainer { path: path.to_string() }),
    }
}

/// The path one past the end of the sequence at `path`, i.e. where the next
/// appended item will live.
pub fn next_item_path<P: IntoPath>(doc: &Value, path: P) -> Result<Path, PathError> {
    let path = path.into_path()?;
    match get(doc, &path)? {
        Value::Array(items) => Ok(path.child_index(items.len())),
        _ => Err(PathError::NotAContainer { path: path.to_string() }),
    }
}

pub fn get_str<P: IntoPath>(doc: &Value, path: P) -> Result<&str, PathError> {
    let path = path.into_path()?;
    get(doc, &path)?.as_str().ok_or_else(|| not_found(&path))
}
