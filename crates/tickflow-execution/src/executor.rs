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

use std::sync::atomic::Ordering;
use std::sync::Arc;

use error_stack::Report;
use indexmap::IndexSet;
use tickflow_core::{default_condition, Phase, StepRef, StepStatus};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, StepOutcomes, WorkflowError};
use crate::step_runner::{self, PanicPayload, RunnerShared};
use crate::workflow::Workflow;

// Run gate: a workflow is single-shot.
pub(crate) const GATE_IDLE: u8 = 0;
pub(crate) const GATE_RUNNING: u8 = 1;
pub(crate) const GATE_DONE: u8 = 2;

impl Workflow {
    /// Execute the workflow until every phase is terminated.
    ///
    /// Blocks the caller until quiescence: even when `token` is canceled,
    /// in-flight steps are awaited, never abandoned. Returns `Ok(())` iff
    /// every step succeeded with no error; otherwise the aggregate
    /// per-step outcome is returned as [`WorkflowError::StepsFailed`].
    ///
    /// Concurrent calls return [`WorkflowError::AlreadyRunning`]; calls
    /// after a completed run return [`WorkflowError::HasRun`]. Preflight
    /// failures (cycles, bad initial status) leave the workflow reusable.
    pub async fn execute(&self, token: CancellationToken) -> Result<()> {
        match self.run_gate.compare_exchange(
            GATE_IDLE,
            GATE_RUNNING,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {}
            Err(GATE_RUNNING) => return Err(Report::new(WorkflowError::AlreadyRunning)),
            Err(_) => return Err(Report::new(WorkflowError::HasRun)),
        }
        if self.is_empty() {
            self.run_gate.store(GATE_IDLE, Ordering::Release);
            return Ok(());
        }
        if let Err(error) = self.preflight() {
            self.run_gate.store(GATE_IDLE, Ordering::Release);
            return Err(Report::new(error));
        }

        let (outcomes, panic) = self.drive(token).await;
        self.run_gate.store(GATE_DONE, Ordering::Release);
        if let Some(payload) = panic {
            std::panic::resume_unwind(payload);
        }
        if outcomes.is_all_nil() {
            Ok(())
        } else {
            Err(Report::new(WorkflowError::StepsFailed(outcomes)))
        }
    }

    /// The tick loop: consume one termination signal per iteration and
    /// start everything that became eligible, until all phases terminated.
    async fn drive(&self, token: CancellationToken) -> (StepOutcomes, Option<PanicPayload>) {
        // every runner posts exactly one signal, plus the priming tick, so
        // posting never blocks
        let capacity = self.states.len() + 1;
        let (signal_tx, mut signal_rx) = mpsc::channel::<()>(capacity);
        let lease = self
            .options
            .max_concurrency
            .map(|limit| Arc::new(Semaphore::new(limit)));
        let shared = Arc::new(RunnerShared {
            notify: self.options.notify.clone(),
            dont_panic: self.options.dont_panic,
            is_canceled: self.options.is_canceled.clone(),
        });
        let mut runners: JoinSet<()> = JoinSet::new();

        tracing::debug!(steps = self.states.len(), "starting workflow execution");
        let _ = signal_tx.try_send(());
        while signal_rx.recv().await.is_some() {
            if self
                .tick(&token, &signal_tx, &lease, &shared, &mut runners)
                .await
            {
                break;
            }
        }

        // no leaks: every launched runner is awaited before reporting
        let mut panic: Option<PanicPayload> = None;
        while let Some(joined) = runners.join_next().await {
            if let Err(error) = joined {
                if error.is_panic() && panic.is_none() {
                    panic = Some(error.into_panic());
                }
            }
        }

        let mut outcomes = StepOutcomes::default();
        for (step, state) in &self.states {
            outcomes.0.insert(step.clone(), state.status_error());
        }
        (outcomes, panic)
    }

    /// One scheduling pass. Returns true once every phase is terminated.
    async fn tick(
        &self,
        token: &CancellationToken,
        signal_tx: &mpsc::Sender<()>,
        lease: &Option<Arc<Semaphore>>,
        shared: &Arc<RunnerShared>,
        runners: &mut JoinSet<()>,
    ) -> bool {
        let mut active: Option<&IndexSet<StepRef>> = None;
        for phase in Phase::ALL {
            if !self.is_phase_terminated(phase) {
                active = self.phases.get(&phase);
                break;
            }
        }
        let Some(bucket) = active else {
            return true;
        };

        for step in bucket {
            let Some(state) = self.state_of(step) else {
                continue;
            };
            if state.status() != StepStatus::Pending {
                continue;
            }
            let upstreams = self.upstream_of(step);
            if upstreams
                .values()
                .any(|status| !status.status.is_terminated())
            {
                continue;
            }

            let config = state.config();
            let gate = match &config.condition {
                Some(condition) => (condition.as_ref())(token, &upstreams),
                None => default_condition(token, &upstreams),
            };
            if let Some(next) = gate {
                debug_assert!(
                    next.is_terminated(),
                    "conditions must return terminal statuses"
                );
                if next.is_terminated() {
                    tracing::debug!(step = %step, status = %next, "condition short-circuited step");
                    state.finish(next, None);
                    let _ = signal_tx.try_send(());
                    continue;
                }
            }

            // backpressure: block here until a lease frees up
            let permit = match lease {
                Some(semaphore) => semaphore.clone().acquire_owned().await.ok(),
                None => None,
            };
            state.set_status(StepStatus::Running);
            tracing::debug!(step = %step, "starting step");
            runners.spawn(step_runner::launch(
                step.clone(),
                state,
                token.child_token(),
                shared.clone(),
                signal_tx.clone(),
                permit,
            ));
        }
        false
    }
}
