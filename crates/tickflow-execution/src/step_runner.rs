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

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt as _;
use tickflow_core::{Notify, State, StepConfig, StepError, StepRef, StepStatus};
use tokio::sync::{mpsc, OwnedSemaphorePermit};
use tokio_util::sync::CancellationToken;

use crate::workflow::CancelPredicate;

/// Workflow-wide settings every runner shares.
pub(crate) struct RunnerShared {
    pub(crate) notify: Vec<Arc<dyn Notify>>,
    pub(crate) dont_panic: bool,
    pub(crate) is_canceled: Option<CancelPredicate>,
}

pub(crate) type PanicPayload = Box<dyn std::any::Any + Send + 'static>;

/// Drive one step to a terminal status.
///
/// Always records the outcome, releases the lease and posts exactly one
/// termination signal, even when the step panics. Without `dont_panic` the
/// captured panic payload is re-raised once bookkeeping is done, so the
/// unwinding escapes through the runner task instead of corrupting the
/// scheduler.
pub(crate) async fn launch(
    step: StepRef,
    state: Arc<State>,
    token: CancellationToken,
    shared: Arc<RunnerShared>,
    signal: mpsc::Sender<()>,
    permit: Option<OwnedSemaphorePermit>,
) {
    let config = state.config();
    let (result, panic) = run_with_deadline(&step, &state, &config, token, &shared).await;

    let status = classify(&result, &shared);
    tracing::debug!(step = %step, status = %status, "step terminated");
    state.finish(status, result.err());
    drop(permit);
    let _ = signal.try_send(());

    if let Some(payload) = panic {
        if !shared.dont_panic {
            std::panic::resume_unwind(payload);
        }
    }
}

fn classify(result: &Result<(), StepError>, shared: &RunnerShared) -> StepStatus {
    match result {
        Ok(()) => StepStatus::Succeeded,
        Err(error) => {
            let canceled = match &shared.is_canceled {
                Some(predicate) => (predicate.as_ref())(error),
                None => error.is_canceled(),
            };
            if canceled {
                StepStatus::Canceled
            } else if error.is_skip() {
                StepStatus::Skipped
            } else {
                StepStatus::Failed
            }
        }
    }
}

/// Apply the configured timeout around the whole retry loop.
///
/// The deadline cancels the step's token; the in-flight attempt is still
/// awaited, so a step that ignores its token simply runs to completion.
async fn run_with_deadline(
    step: &StepRef,
    state: &Arc<State>,
    config: &StepConfig,
    token: CancellationToken,
    shared: &Arc<RunnerShared>,
) -> (Result<(), StepError>, Option<PanicPayload>) {
    match config.timeout {
        None => run_attempts(step, state, config, &token, shared).await,
        Some(timeout) => {
            let deadline_token = token.child_token();
            let attempts = run_attempts(step, state, config, &deadline_token, shared);
            tokio::pin!(attempts);
            tokio::select! {
                outcome = &mut attempts => outcome,
                _ = tokio::time::sleep(timeout) => {
                    tracing::debug!(step = %step, ?timeout, "step deadline elapsed");
                    deadline_token.cancel();
                    attempts.await
                }
            }
        }
    }
}

/// Drive attempts through the configured retry policy.
async fn run_attempts(
    step: &StepRef,
    state: &Arc<State>,
    config: &StepConfig,
    token: &CancellationToken,
    shared: &Arc<RunnerShared>,
) -> (Result<(), StepError>, Option<PanicPayload>) {
    let mut attempt: usize = 0;
    loop {
        attempt += 1;
        let (result, panic) = attempt_once(step, state, token, shared).await;

        let retry_delay = match (&result, &config.retry) {
            (Err(error), Some(policy))
                if panic.is_none()
                    && attempt < policy.max_attempts.max(1)
                    && policy.wants_retry(error)
                    && !token.is_cancelled() =>
            {
                Some(policy.backoff.delay(attempt))
            }
            _ => None,
        };
        let Some(delay) = retry_delay else {
            return (result, panic);
        };

        tracing::debug!(step = %step, attempt, ?delay, "retrying step");
        if !delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = token.cancelled() => return (result, panic),
            }
        }
    }
}

/// One attempt: notifier wrap, input callbacks, step body. Panics anywhere
/// inside are captured so bookkeeping cannot be skipped.
async fn attempt_once(
    step: &StepRef,
    state: &Arc<State>,
    token: &CancellationToken,
    shared: &Arc<RunnerShared>,
) -> (Result<(), StepError>, Option<PanicPayload>) {
    let attempt = async {
        let mut step_token = token.clone();
        for notify in &shared.notify {
            step_token = notify.before_step(step_token, step);
        }
        let result = match state.gather_inputs(step_token.clone()).await {
            Err(input_error) => Err(StepError::Input(input_error)),
            Ok(()) => step.run(step_token).await,
        };
        for notify in &shared.notify {
            notify.after_step(step, result.as_ref().err());
        }
        result
    };
    match AssertUnwindSafe(attempt).catch_unwind().await {
        Ok(result) => (result, None),
        Err(payload) => {
            let message = panic_message(&payload);
            (Err(StepError::Panic(message)), Some(payload))
        }
    }
}

fn panic_message(payload: &PanicPayload) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
