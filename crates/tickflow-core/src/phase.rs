// Copyright 2025 DataStax Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except
// in compliance with the License. You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under the License
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express
// or implied. See the License for the specific language governing permissions and limitations under
// the License.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Execution wave of a workflow.
///
/// Phases are totally ordered: steps in a later phase are not dispatched
/// until every step in all earlier phases reached a terminal status. A step
/// belongs to exactly one phase, assigned when it is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Init,
    Main,
    Defer,
}

impl Phase {
    /// All phases in execution order.
    pub const ALL: [Phase; 3] = [Phase::Init, Phase::Main, Phase::Defer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Main => "main",
            Phase::Defer => "defer",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order() {
        assert!(Phase::Init < Phase::Main);
        assert!(Phase::Main < Phase::Defer);
        assert_eq!(Phase::ALL, [Phase::Init, Phase::Main, Phase::Defer]);
    }

    #[test]
    fn test_phase_serialization() {
        assert_eq!(serde_json::to_string(&Phase::Init).unwrap(), "\"init\"");
        let phase: Phase = serde_json::from_str("\"defer\"").unwrap();
        assert_eq!(phase, Phase::Defer);
    }
}
