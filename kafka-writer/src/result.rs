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

use std::fmt;

use serde::Serialize;

/// Work reported by a writer at the end of a run.
///
/// `written` counts messages handed to the client, not broker-confirmed
/// deliveries. The writer never updates records and does not track failed
/// sends, so the other two counts stay at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteDataResult {
    pub written: u64,
    pub updated: u64,
    pub errors: u64,
}

impl WriteDataResult {
    pub fn written(written: u64) -> Self {
        Self {
            written,
            ..Self::default()
        }
    }
}

impl fmt::Display for WriteDataResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} written, {} updated, {} errors",
            self.written, self.updated, self.errors
        )
    }
}
