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

use tickflow_core::{StepRef, StepStatus};

use crate::error::{CycleSteps, InitStatuses, WorkflowError};
use crate::workflow::Workflow;

impl Workflow {
    /// Validate initial statuses and reject cyclic upstream relations
    /// before any step runs.
    ///
    /// Cycle detection is a mark-and-sweep over the `Scanned` marker: a
    /// step is marked once every upstream is marked, to fixpoint. Steps
    /// left unmarked sit in a cycle. All marks are reset to `Pending`
    /// before returning, so a rejected workflow stays reusable.
    pub(crate) fn preflight(&self) -> Result<(), WorkflowError> {
        let mut unexpected = InitStatuses::default();
        for (step, state) in &self.states {
            let status = state.status();
            if status != StepStatus::Pending {
                unexpected.0.insert(step.clone(), status);
            }
        }
        if !unexpected.is_empty() {
            return Err(WorkflowError::UnexpectedInitStatus(unexpected));
        }

        loop {
            let mut progressed = false;
            for (step, state) in &self.states {
                if state.status() == StepStatus::Scanned {
                    continue;
                }
                let upstreams = self.upstream_of(step);
                if upstreams
                    .values()
                    .all(|status| status.status == StepStatus::Scanned)
                {
                    state.set_status(StepStatus::Scanned);
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }

        let mut cycles = CycleSteps::default();
        for (step, state) in &self.states {
            if state.status() == StepStatus::Scanned {
                continue;
            }
            let offenders: Vec<StepRef> = self
                .upstream_of(step)
                .iter()
                .filter(|(_, status)| status.status != StepStatus::Scanned)
                .map(|(upstream, _)| upstream.clone())
                .collect();
            if !offenders.is_empty() {
                cycles.0.insert(step.clone(), offenders);
            }
        }

        for state in self.states.values() {
            state.set_status(StepStatus::Pending);
        }

        if !cycles.is_empty() {
            tracing::debug!(steps = cycles.len(), "preflight rejected cyclic dependencies");
            return Err(WorkflowError::CycleDependency(cycles));
        }
        Ok(())
    }
}
