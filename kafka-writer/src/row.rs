// Copyright 2025 The Drasi Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Row abstraction consumed by the writer.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

/// A single row of tabular data, queryable by column name.
pub trait Row {
    /// Value stored in `column`, or `None` if the row has no such cell.
    fn value(&self, column: &str) -> Option<&Value>;
}

impl Row for Map<String, Value> {
    fn value(&self, column: &str) -> Option<&Value> {
        self.get(column)
    }
}

impl<S: std::hash::BuildHasher> Row for HashMap<String, Value, S> {
    fn value(&self, column: &str) -> Option<&Value> {
        self.get(column)
    }
}

impl Row for BTreeMap<String, Value> {
    fn value(&self, column: &str) -> Option<&Value> {
        self.get(column)
    }
}

impl<R: Row + ?Sized> Row for &R {
    fn value(&self, column: &str) -> Option<&Value> {
        (**self).value(column)
    }
}

/// String form of a cell value. Missing cells and JSON `null` become `""`.
///
/// Strings are used as-is, other scalars use their display form and
/// arrays/objects are written as compact JSON.
pub fn value_to_string(value: Option<&Value>) -> Cow<'_, str> {
    match value {
        None | Some(Value::Null) => Cow::Borrowed(""),
        Some(Value::String(s)) => Cow::Borrowed(s.as_str()),
        Some(other) => Cow::Owned(other.to_string()),
    }
}
