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

use indexmap::IndexMap;
use thiserror::Error;
use tickflow_core::{StatusError, StepRef, StepStatus};

/// Errors surfaced by [`Workflow::execute`](crate::Workflow::execute).
///
/// Configuration errors (`CycleDependency`, `UnexpectedInitStatus`) are
/// reported before any step runs and leave the workflow reusable;
/// `StepsFailed` carries the aggregate outcome of a completed run.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// `execute` was called while another call is still driving the
    /// workflow.
    #[error("workflow is already running")]
    AlreadyRunning,
    /// The workflow completed a run; it is single-shot.
    #[error("workflow has already run")]
    HasRun,
    /// Upstream relations contain at least one cycle.
    #[error("cycle dependency: {0}")]
    CycleDependency(CycleSteps),
    /// Preflight found steps whose status was not `Pending`.
    #[error("unexpected step initial status: {0}")]
    UnexpectedInitStatus(InitStatuses),
    /// At least one step terminated with a non-nil outcome.
    #[error("workflow finished with failed steps: {0}")]
    StepsFailed(StepOutcomes),
}

pub type Result<T, E = error_stack::Report<WorkflowError>> = std::result::Result<T, E>;

/// Steps trapped in a cycle, each with the upstream edges that kept it
/// unmarked during the preflight sweep.
#[derive(Debug, Default)]
pub struct CycleSteps(pub IndexMap<StepRef, Vec<StepRef>>);

impl CycleSteps {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, step: &StepRef) -> Option<&Vec<StepRef>> {
        self.0.get(step)
    }
}

impl fmt::Display for CycleSteps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (step, upstreams) in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            first = false;
            write!(f, "{step} <- [")?;
            for (index, upstream) in upstreams.iter().enumerate() {
                if index > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{upstream}")?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

/// Steps that were not `Pending` when `execute` started.
#[derive(Debug, Default)]
pub struct InitStatuses(pub IndexMap<StepRef, StepStatus>);

impl InitStatuses {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for InitStatuses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (step, status) in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            first = false;
            write!(f, "{step}: {status}")?;
        }
        Ok(())
    }
}

/// Terminal outcome of every root step, keyed by step.
#[derive(Debug, Default)]
pub struct StepOutcomes(pub IndexMap<StepRef, StatusError>);

impl StepOutcomes {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, step: &StepRef) -> Option<&StatusError> {
        self.0.get(step)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StepRef, &StatusError)> {
        self.0.iter()
    }

    /// True iff every step succeeded with no error; the run reports clean
    /// exactly in this case.
    pub fn is_all_nil(&self) -> bool {
        self.0.values().all(StatusError::is_nil)
    }

    /// True iff every non-nil entry is a cancellation. Used to classify a
    /// nested workflow whose inner steps were all canceled.
    pub fn all_canceled(&self) -> bool {
        self.0
            .values()
            .all(|status| status.is_nil() || status.status == StepStatus::Canceled)
    }
}

impl fmt::Display for StepOutcomes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (step, status) in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            first = false;
            write!(f, "{step}: {status}")?;
        }
        Ok(())
    }
}
