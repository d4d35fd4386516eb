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

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt as _;
use indexmap::IndexMap;
use tickflow_core::{
    BoxError, Condition, InputFn, RetryPolicy, StepConfig, StepRef, StepStatus, UpstreamStatuses,
};
use tokio_util::sync::CancellationToken;

/// Source of `{step -> config}` pairs consumed by
/// [`Workflow::add`](crate::Workflow::add) and friends.
pub trait StepAdder {
    fn entries(self) -> IndexMap<StepRef, StepConfig>;
}

/// Builder produced by [`step`], [`steps`] and [`pipe`]. Every setting
/// applies to each step in the group.
#[derive(Default)]
pub struct Steps {
    entries: IndexMap<StepRef, StepConfig>,
}

/// Configure a single step.
pub fn step(step: &StepRef) -> Steps {
    steps([step.clone()])
}

/// Configure a group of steps sharing the same settings.
pub fn steps(group: impl IntoIterator<Item = StepRef>) -> Steps {
    let mut entries = IndexMap::new();
    for step in group {
        entries.insert(step, StepConfig::default());
    }
    Steps { entries }
}

/// Chain steps so that each one depends on the previous one.
pub fn pipe(chain: impl IntoIterator<Item = StepRef>) -> Steps {
    let mut entries = IndexMap::new();
    let mut previous: Option<StepRef> = None;
    for step in chain {
        let mut config = StepConfig::default();
        if let Some(previous) = previous.take() {
            config.upstreams.insert(previous);
        }
        entries.insert(step.clone(), config);
        previous = Some(step);
    }
    Steps { entries }
}

impl Steps {
    /// Declare upstreams for every step in this group.
    pub fn depends_on(mut self, upstreams: impl IntoIterator<Item = StepRef>) -> Self {
        let upstreams: Vec<StepRef> = upstreams.into_iter().collect();
        for config in self.entries.values_mut() {
            config.upstreams.extend(upstreams.iter().cloned());
        }
        self
    }

    /// Cancel each step's token once it has been running this long.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        for config in self.entries.values_mut() {
            config.timeout = Some(timeout);
        }
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        for config in self.entries.values_mut() {
            config.retry = Some(policy.clone());
        }
        self
    }

    /// Gate the group on a custom condition instead of the default
    /// "run iff every upstream succeeded".
    pub fn condition(
        mut self,
        condition: impl Fn(&CancellationToken, &UpstreamStatuses) -> Option<StepStatus>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        let condition: Condition = Arc::new(condition);
        for config in self.entries.values_mut() {
            config.condition = Some(condition.clone());
        }
        self
    }

    /// Register an input callback run just before each step in the group.
    pub fn input<F, Fut>(mut self, input: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let input = Arc::new(input);
        let input: InputFn = Arc::new(move |token| (*input)(token).boxed());
        for config in self.entries.values_mut() {
            config.inputs.push(input.clone());
        }
        self
    }
}

impl StepAdder for Steps {
    fn entries(self) -> IndexMap<StepRef, StepConfig> {
        self.entries
    }
}
