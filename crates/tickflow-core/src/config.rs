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

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use indexmap::{IndexMap, IndexSet};
use tokio_util::sync::CancellationToken;

use crate::{BoxError, StatusError, StepError, StepRef, StepStatus};

/// Upstream statuses a condition decides over, keyed by root step.
pub type UpstreamStatuses = IndexMap<StepRef, StatusError>;

/// Gating decision evaluated once a step's upstreams are all terminal.
///
/// `None` permits the step to run. `Some` of a terminal status
/// short-circuits the step to that status without running it. Returning a
/// non-terminal status violates the contract and is treated as a permit.
pub type Condition =
    Arc<dyn Fn(&CancellationToken, &UpstreamStatuses) -> Option<StepStatus> + Send + Sync>;

/// Thunk pulling upstream outputs into a step's input, run just before the
/// step body in registration order.
pub type InputFn =
    Arc<dyn Fn(CancellationToken) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// Predicate deciding whether a failed attempt should be retried.
pub type RetryPredicate = Arc<dyn Fn(&StepError) -> bool + Send + Sync>;

/// Backoff schedule between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Retry immediately.
    None,
    /// Constant delay between attempts.
    Fixed(Duration),
    /// Delay doubling per attempt, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// Delay before the attempt following the given 1-based attempt.
    pub fn delay(&self, attempt: usize) -> Duration {
        match *self {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { initial, max } => {
                let exponent = attempt.saturating_sub(1).min(32) as u32;
                initial
                    .saturating_mul(2u32.saturating_pow(exponent))
                    .min(max)
            }
        }
    }
}

/// Retry policy applied to a step's attempts.
///
/// The step's timeout, when configured, bounds the whole retry loop: once
/// the deadline cancels the step's token, no further attempts start.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero behaves like one.
    pub max_attempts: usize,
    pub backoff: Backoff,
    /// Defaults to retrying everything except skip and cancellation.
    pub should_retry: Option<RetryPredicate>,
}

impl RetryPolicy {
    /// Retry up to `max_attempts` total attempts with no backoff.
    pub fn attempts(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::None,
            should_retry: None,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_predicate(
        mut self,
        predicate: impl Fn(&StepError) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.should_retry = Some(Arc::new(predicate));
        self
    }

    /// Whether the policy wants another attempt after `error`.
    pub fn wants_retry(&self, error: &StepError) -> bool {
        match &self.should_retry {
            Some(predicate) => (predicate.as_ref())(error),
            None => !error.is_skip() && !error.is_canceled(),
        }
    }
}

/// Per-step configuration.
///
/// Configs merge when the same step is added again or a composite absorbs a
/// previously-registered root: upstreams union, later scalar settings win
/// when present, input callbacks append in order.
#[derive(Clone, Default)]
pub struct StepConfig {
    pub upstreams: IndexSet<StepRef>,
    pub timeout: Option<Duration>,
    pub retry: Option<RetryPolicy>,
    pub condition: Option<Condition>,
    pub inputs: Vec<InputFn>,
}

impl StepConfig {
    pub fn merge(&mut self, other: StepConfig) {
        self.upstreams.extend(other.upstreams);
        if other.timeout.is_some() {
            self.timeout = other.timeout;
        }
        if other.retry.is_some() {
            self.retry = other.retry;
        }
        if other.condition.is_some() {
            self.condition = other.condition;
        }
        self.inputs.extend(other.inputs);
    }
}

/// Default gate: run iff every upstream succeeded.
///
/// Cancellation of the workflow token cancels the step; a failed or
/// canceled upstream cancels it; a skipped upstream skips it.
pub fn default_condition(
    token: &CancellationToken,
    upstreams: &UpstreamStatuses,
) -> Option<StepStatus> {
    if token.is_cancelled() {
        return Some(StepStatus::Canceled);
    }
    let mut skipped = false;
    for status in upstreams.values() {
        match status.status {
            StepStatus::Failed | StepStatus::Canceled => return Some(StepStatus::Canceled),
            StepStatus::Skipped => skipped = true,
            _ => {}
        }
    }
    if skipped {
        Some(StepStatus::Skipped)
    } else {
        None
    }
}

/// Run regardless of upstream outcomes. Still honors cancellation.
pub fn always_condition(
    token: &CancellationToken,
    _upstreams: &UpstreamStatuses,
) -> Option<StepStatus> {
    if token.is_cancelled() {
        Some(StepStatus::Canceled)
    } else {
        None
    }
}

/// Run iff at least one upstream succeeded; skip otherwise. Steps without
/// upstreams run.
pub fn any_succeeded_condition(
    token: &CancellationToken,
    upstreams: &UpstreamStatuses,
) -> Option<StepStatus> {
    if token.is_cancelled() {
        return Some(StepStatus::Canceled);
    }
    if upstreams.is_empty()
        || upstreams
            .values()
            .any(|status| status.status == StepStatus::Succeeded)
    {
        None
    } else {
        Some(StepStatus::Skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statuses(entries: Vec<StepStatus>) -> UpstreamStatuses {
        use crate::Step;
        use std::borrow::Cow;

        struct Marker;
        impl Step for Marker {
            async fn run(&self, _token: CancellationToken) -> Result<(), StepError> {
                Ok(())
            }
            fn name(&self) -> Cow<'static, str> {
                Cow::Borrowed("marker")
            }
        }

        entries
            .into_iter()
            .map(|status| {
                (
                    StepRef::new(Marker),
                    StatusError {
                        status,
                        error: None,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_default_condition() {
        let token = CancellationToken::new();
        assert_eq!(default_condition(&token, &statuses(vec![])), None);
        assert_eq!(
            default_condition(&token, &statuses(vec![StepStatus::Succeeded])),
            None
        );
        assert_eq!(
            default_condition(&token, &statuses(vec![StepStatus::Failed])),
            Some(StepStatus::Canceled)
        );
        assert_eq!(
            default_condition(&token, &statuses(vec![StepStatus::Canceled])),
            Some(StepStatus::Canceled)
        );
        assert_eq!(
            default_condition(
                &token,
                &statuses(vec![StepStatus::Succeeded, StepStatus::Skipped])
            ),
            Some(StepStatus::Skipped)
        );

        token.cancel();
        assert_eq!(
            default_condition(&token, &statuses(vec![])),
            Some(StepStatus::Canceled)
        );
    }

    #[test]
    fn test_always_condition() {
        let token = CancellationToken::new();
        assert_eq!(
            always_condition(&token, &statuses(vec![StepStatus::Failed])),
            None
        );
        token.cancel();
        assert_eq!(
            always_condition(&token, &statuses(vec![])),
            Some(StepStatus::Canceled)
        );
    }

    #[test]
    fn test_any_succeeded_condition() {
        let token = CancellationToken::new();
        assert_eq!(
            any_succeeded_condition(
                &token,
                &statuses(vec![StepStatus::Failed, StepStatus::Succeeded])
            ),
            None
        );
        assert_eq!(
            any_succeeded_condition(&token, &statuses(vec![StepStatus::Failed])),
            Some(StepStatus::Skipped)
        );
    }

    #[test]
    fn test_backoff_delay() {
        assert_eq!(Backoff::None.delay(1), Duration::ZERO);
        assert_eq!(
            Backoff::Fixed(Duration::from_millis(10)).delay(3),
            Duration::from_millis(10)
        );

        let exponential = Backoff::Exponential {
            initial: Duration::from_millis(10),
            max: Duration::from_millis(35),
        };
        assert_eq!(exponential.delay(1), Duration::from_millis(10));
        assert_eq!(exponential.delay(2), Duration::from_millis(20));
        assert_eq!(exponential.delay(3), Duration::from_millis(35));
    }

    #[test]
    fn test_retry_predicate_default() {
        let policy = RetryPolicy::attempts(3);
        assert!(policy.wants_retry(&StepError::other("boom")));
        assert!(!policy.wants_retry(&StepError::skip()));
        assert!(!policy.wants_retry(&StepError::Canceled));

        let picky = RetryPolicy::attempts(3).with_predicate(|error| error.is_canceled());
        assert!(picky.wants_retry(&StepError::Canceled));
        assert!(!picky.wants_retry(&StepError::other("boom")));
    }

    #[test]
    fn test_config_merge() {
        let mut base = StepConfig {
            timeout: Some(Duration::from_secs(1)),
            ..StepConfig::default()
        };
        let incoming = StepConfig {
            retry: Some(RetryPolicy::attempts(2)),
            ..StepConfig::default()
        };
        base.merge(incoming);
        assert_eq!(base.timeout, Some(Duration::from_secs(1)));
        assert_eq!(base.retry.as_ref().map(|r| r.max_attempts), Some(2));
    }
}
