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

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::{BoxError, InputFn, StatusError, StepConfig, StepRef, StepStatus};

/// Mutable record the engine keeps per root step.
///
/// Configuration mutates during the declarative build phase only. During
/// execution the runner writes the status/error pair and the scheduler
/// reads it, each under the lock, which gives the release/acquire ordering
/// the tick loop relies on.
#[derive(Default)]
pub struct State {
    status: Mutex<StatusError>,
    config: Mutex<StepConfig>,
}

impl State {
    pub fn status(&self) -> StepStatus {
        self.lock_status().status
    }

    pub fn status_error(&self) -> StatusError {
        self.lock_status().clone()
    }

    /// Transition the status without touching the recorded error.
    pub fn set_status(&self, status: StepStatus) {
        let mut guard = self.lock_status();
        debug_assert!(
            !guard.status.is_terminated(),
            "terminal status must not be overwritten"
        );
        guard.status = status;
    }

    /// Record the terminal outcome of a run in one critical section.
    pub fn finish(&self, status: StepStatus, error: Option<crate::StepError>) {
        let mut guard = self.lock_status();
        debug_assert!(
            !guard.status.is_terminated(),
            "terminal status must not be overwritten"
        );
        guard.status = status;
        guard.error = error.map(std::sync::Arc::new);
    }

    pub fn add_upstream(&self, upstream: StepRef) {
        self.lock_config().upstreams.insert(upstream);
    }

    pub fn upstreams(&self) -> Vec<StepRef> {
        self.lock_config().upstreams.iter().cloned().collect()
    }

    pub fn merge_config(&self, config: StepConfig) {
        self.lock_config().merge(config);
    }

    /// Snapshot of the merged config. Cheap: shared closures are
    /// reference-counted.
    pub fn config(&self) -> StepConfig {
        self.lock_config().clone()
    }

    /// Run the registered input callbacks in registration order. The first
    /// failure aborts the remaining callbacks.
    pub async fn gather_inputs(&self, token: CancellationToken) -> Result<(), BoxError> {
        let inputs: Vec<InputFn> = self.lock_config().inputs.clone();
        for input in inputs {
            (input.as_ref())(token.clone()).await?;
        }
        Ok(())
    }

    fn lock_status(&self) -> MutexGuard<'_, StatusError> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_config(&self) -> MutexGuard<'_, StepConfig> {
        self.config.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
