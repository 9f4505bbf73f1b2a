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

//! Message template rendering.

use crate::config::Binding;
use crate::row::{value_to_string, Row};

/// Render `template` against `row`.
///
/// Every binding is applied in order as a plain search/replace of all
/// occurrences of its name, each pass working on the output of the previous
/// one. Later passes can therefore rewrite text produced by earlier ones.
///
/// `None` and `Some("")` are returned unchanged.
pub fn render<R: Row + ?Sized>(
    template: Option<&str>,
    bindings: &[Binding],
    row: &R,
) -> Option<String> {
    let template = template?;
    if template.is_empty() {
        return Some(String::new());
    }

    let mut rendered = template.to_string();
    for binding in bindings {
        let replacement = value_to_string(row.value(&binding.column));
        rendered = rendered.replace(binding.name.as_str(), &replacement);
    }
    Some(rendered)
}
