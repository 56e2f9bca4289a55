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

use serde_json::Value;
use crate::error::{RavelloError, Result};
use crate::template::access::{contains, get, set};
use crate::template::path::IntoPath;

/// How a present value is judged.
#[derive(Clone, Debug)]
pub enum Validator {
    /// The value must equal one of these
    OneOf(Vec<Value>),
    Predicate(fn(&Value) -> bool),
}

impl Validator {
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Validator::OneOf(options) => options.iter().any(|option| option == value),
            Validator::Predicate(f) => f(value),
        }
    }
}

/// Options for `check_for_param`. Starts out required with no default and
/// no validation.
#[derive(Clone, Debug)]
pub struct ParamCheck {
    pub required: bool,
    pub default_if_missing: Option<Value>,
    pub valid: Option<Validator>,
    pub fail_msg: Option<String>,
}

impl Default for ParamCheck {
    fn default() -> Self {
        Self {
            required: true,
            default_if_missing: None,
            valid: None,
            fail_msg: None,
        }
    }
}

impl ParamCheck {
    pub fn required() -> Self {
        Self::default()
    }

    pub fn optional() -> Self {
        Self { required: false, ..Self::default() }
    }

    pub fn default_if_missing(mut self, value: Value) -> Self {
        self.default_if_missing = Some(value);
        self
    }

    pub fn one_of(mut self, options: Vec<Value>) -> Self {
        self.valid = Some(Validator::OneOf(options));
        self
    }

    pub fn predicate(mut self, f: fn(&Value) -> bool) -> Self {
        self.valid = Some(Validator::Predicate(f));
        self
    }

    pub fn fail_msg(mut self, msg: impl Into<String>) -> Self {
        self.fail_msg = Some(msg.into());
        self
    }
}

fn failure(doc: &Value, path: &str, check: &ParamCheck) -> RavelloError {
    let msg = match &check.fail_msg {
        Some(msg) => msg.clone(),
        None => {
            let dumped = serde_json::to_string(doc).unwrap_or_default();
            format!("Template Error: {} - Missing or invalid.\nIn json item: {}", path, dumped)
        }
    };
    RavelloError::Template(msg)
}

/// Validate one field of a template document.
///
/// A missing path with a default gets the default written in place (parent
/// containers included) and is then validated like any other value. Without
/// a default, a missing required path is an error and a missing optional
/// one yields `Ok(false)`. A present value failing validation is an error
/// when required and `Ok(false)` otherwise.
pub fn check_for_param<P: IntoPath>(doc: &mut Value, path: P, check: &ParamCheck) -> Result<bool> {
    let path = path.into_path()?;
    let rendered = path.to_string();

    if !contains(doc, &path) {
        match &check.default_if_missing {
            Some(default) => set(doc, &path, default.clone())?,
            None if check.required => return Err(failure(doc, &rendered, check)),
            None => return Ok(false),
        }
    }

    let validator = match &check.valid {
        Some(validator) => validator,
        None => return Ok(true),
    };

    if validator.accepts(get(doc, &path)?) {
        Ok(true)
    } else if check.required {
        Err(failure(doc, &rendered, check))
    } else {
        Ok(false)
    }
}
