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
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::StepError;

/// Status of an individual step within a workflow.
///
/// A step starts `Pending`, becomes `Running` once dispatched, and ends in
/// exactly one of the four terminal statuses. A terminal status is never
/// overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepStatus {
    /// Step has not been dispatched yet
    Pending,
    /// Step is currently executing
    Running,
    /// Step finished without an error
    Succeeded,
    /// Step finished with an error
    Failed,
    /// Step was canceled, directly or through an upstream outcome
    Canceled,
    /// Step was skipped without failing
    Skipped,
    /// Reserved marker used by the preflight cycle sweep; cleared before
    /// any step runs and never observed during execution
    Scanned,
}

impl StepStatus {
    /// True for the four terminal statuses.
    pub fn is_terminated(&self) -> bool {
        matches!(
            self,
            StepStatus::Succeeded | StepStatus::Failed | StepStatus::Canceled | StepStatus::Skipped
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Succeeded => "succeeded",
            StepStatus::Failed => "failed",
            StepStatus::Canceled => "canceled",
            StepStatus::Skipped => "skipped",
            StepStatus::Scanned => "scanned",
        }
    }
}

impl Default for StepStatus {
    fn default() -> Self {
        StepStatus::Pending
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A step's status paired with the terminal error reported to downstreams.
#[derive(Debug, Clone, Default)]
pub struct StatusError {
    pub status: StepStatus,
    pub error: Option<Arc<StepError>>,
}

impl StatusError {
    /// True iff the step succeeded and recorded no error. The aggregate
    /// workflow outcome is clean iff every entry is nil.
    pub fn is_nil(&self) -> bool {
        self.status == StepStatus::Succeeded && self.error.is_none()
    }
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            Some(error) => write!(f, "{}: {}", self.status, error),
            None => write!(f, "{}", self.status),
        }
    }
}
