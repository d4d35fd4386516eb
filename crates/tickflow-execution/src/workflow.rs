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

use std::borrow::Cow;
use std::sync::atomic::AtomicU8;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use tickflow_core::{
    FlowStates, Notify, Phase, State, StatusError, Step, StepConfig, StepError, StepRef,
    UpstreamStatuses,
};
use tokio_util::sync::CancellationToken;

use crate::adder::StepAdder;
use crate::error::WorkflowError;
use crate::executor::GATE_IDLE;
use crate::tree::StepTree;

/// Workflow-wide predicate classifying a terminal step error as a
/// cancellation.
pub(crate) type CancelPredicate = Arc<dyn Fn(&StepError) -> bool + Send + Sync>;

#[derive(Default)]
pub(crate) struct WorkflowOptions {
    pub(crate) notify: Vec<Arc<dyn Notify>>,
    pub(crate) dont_panic: bool,
    pub(crate) max_concurrency: Option<usize>,
    pub(crate) is_canceled: Option<CancelPredicate>,
}

/// A collection of steps connected into a DAG by upstream edges, executed
/// phase by phase.
///
/// Steps are added declaratively through [`add`](Workflow::add),
/// [`init`](Workflow::init) and [`deferred`](Workflow::deferred); calling
/// [`execute`](Workflow::execute) runs every step in topological order,
/// each on its own task, and blocks until all of them terminated. A
/// workflow is single-shot: a completed run cannot be repeated.
///
/// A `Workflow` is itself a [`Step`], so it can be added into another
/// workflow; upstream declarations may target steps nested inside it and
/// are routed to the lowest workflow that sees both endpoints.
pub struct Workflow {
    pub(crate) tree: StepTree,
    pub(crate) states: IndexMap<StepRef, Arc<State>>,
    pub(crate) phases: IndexMap<Phase, IndexSet<StepRef>>,
    pub(crate) options: WorkflowOptions,
    pub(crate) run_gate: AtomicU8,
    name: String,
}

impl Default for Workflow {
    fn default() -> Self {
        Self::new()
    }
}

impl Workflow {
    pub fn new() -> Self {
        Self::named("workflow")
    }

    /// A workflow reporting `name` when nested as a step.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            tree: StepTree::default(),
            states: IndexMap::new(),
            phases: IndexMap::new(),
            options: WorkflowOptions::default(),
            run_gate: AtomicU8::new(GATE_IDLE),
            name: name.into(),
        }
    }

    /// Add steps in phase `Main`.
    pub fn add(&mut self, adder: impl StepAdder) -> &mut Self {
        self.phase_add(Phase::Main, adder)
    }

    /// Add steps in phase `Init`.
    pub fn init(&mut self, adder: impl StepAdder) -> &mut Self {
        self.phase_add(Phase::Init, adder)
    }

    /// Add steps in phase `Defer`.
    pub fn deferred(&mut self, adder: impl StepAdder) -> &mut Self {
        self.phase_add(Phase::Defer, adder)
    }

    /// Add steps into a specific phase.
    pub fn phase_add(&mut self, phase: Phase, adder: impl StepAdder) -> &mut Self {
        for (step, config) in adder.entries() {
            self.add_step(phase, step, Some(config));
        }
        self
    }

    /// Bound the number of concurrently running steps.
    pub fn max_concurrency(&mut self, limit: usize) -> &mut Self {
        self.options.max_concurrency = Some(limit);
        self
    }

    /// Register before/after step hooks.
    pub fn notify(&mut self, notify: impl Notify + 'static) -> &mut Self {
        self.options.notify.push(Arc::new(notify));
        self
    }

    /// Convert panics in steps and input callbacks into step failures
    /// instead of unwinding out of the workflow.
    pub fn dont_panic(&mut self) -> &mut Self {
        self.options.dont_panic = true;
        self
    }

    /// Override how terminal step errors are classified as cancellations.
    pub fn cancel_predicate(
        &mut self,
        predicate: impl Fn(&StepError) -> bool + Send + Sync + 'static,
    ) -> &mut Self {
        self.options.is_canceled = Some(Arc::new(predicate));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// All root steps known to the workflow.
    pub fn steps(&self) -> Vec<StepRef> {
        self.states.keys().cloned().collect()
    }

    /// The outermost enclosing step of `step`.
    pub fn root_of(&self, step: &StepRef) -> Option<StepRef> {
        self.tree.root_of(step)
    }

    /// The authoritative state for `step`.
    ///
    /// Roots resolve to their direct entry. For a descendant, the nearest
    /// ancestor exposing the workflow capability owns the richer state;
    /// otherwise the outermost root's state stands in.
    pub fn state_of(&self, step: &StepRef) -> Option<Arc<State>> {
        let parent = self.tree.parent_of(step)?;
        if &parent == step {
            return self.states.get(step).cloned();
        }
        let mut ancestor = parent;
        loop {
            if let Some(flow) = ancestor.as_flow() {
                return flow.state_of(step);
            }
            if self.tree.is_root(&ancestor) {
                break;
            }
            ancestor = self.tree.parent_of(&ancestor)?;
        }
        self.states.get(&ancestor).cloned()
    }

    /// The phase `step`'s root was added into.
    pub fn phase_of(&self, step: &StepRef) -> Option<Phase> {
        let root = self.root_of(step)?;
        Phase::ALL.into_iter().find(|phase| {
            self.phases
                .get(phase)
                .is_some_and(|bucket| bucket.contains(&root))
        })
    }

    /// Upstreams of `step` with their current status, keyed by root.
    pub fn upstream_of(&self, step: &StepRef) -> UpstreamStatuses {
        let mut result = UpstreamStatuses::new();
        let Some(root) = self.root_of(step) else {
            return result;
        };
        let Some(state) = self.state_of(&root) else {
            return result;
        };
        for upstream in state.upstreams() {
            let Some(up_root) = self.root_of(&upstream) else {
                continue;
            };
            let status = self
                .state_of(&up_root)
                .map(|state| state.status_error())
                .unwrap_or_default();
            result.insert(up_root, status);
        }
        result
    }

    /// Steps that declared `step` (or its root) as an upstream, with their
    /// current status.
    pub fn downstream_of(&self, step: &StepRef) -> IndexMap<StepRef, StatusError> {
        let mut result = IndexMap::new();
        let Some(target) = self.root_of(step) else {
            return result;
        };
        for phase in Phase::ALL {
            let Some(bucket) = self.phases.get(&phase) else {
                continue;
            };
            for down in bucket {
                let Some(state) = self.state_of(down) else {
                    continue;
                };
                let depends = state
                    .upstreams()
                    .iter()
                    .any(|upstream| self.root_of(upstream).as_ref() == Some(&target));
                if depends {
                    result.insert(down.clone(), state.status_error());
                }
            }
        }
        result
    }

    /// True once every phase is terminated.
    pub fn is_terminated(&self) -> bool {
        Phase::ALL
            .into_iter()
            .all(|phase| self.is_phase_terminated(phase))
    }

    pub fn is_phase_terminated(&self, phase: Phase) -> bool {
        self.phases.get(&phase).map_or(true, |bucket| {
            bucket.iter().all(|step| {
                self.state_of(step)
                    .is_some_and(|state| state.status().is_terminated())
            })
        })
    }

    fn add_step(&mut self, phase: Phase, step: StepRef, config: Option<StepConfig>) {
        if self.state_of(&step).is_none() {
            // a brand-new step becomes a root
            self.states.insert(step.clone(), Arc::new(State::default()));
            self.phases
                .entry(phase)
                .or_insert_with(IndexSet::new)
                .insert(step.clone());
            // registering the step walks its descendants; previously known
            // roots among them are demoted and their bookkeeping migrates
            // onto the new root
            for old in self.tree.insert(step.clone()) {
                if let Some(old_state) = self.states.shift_remove(&old) {
                    if let Some(new_state) = self.states.get(&step) {
                        new_state.merge_config(old_state.config());
                    }
                }
                for bucket in self.phases.values_mut() {
                    bucket.shift_remove(&old);
                }
            }
        }
        if let Some(mut config) = config {
            let upstreams = std::mem::take(&mut config.upstreams);
            for upstream in upstreams {
                self.set_upstream(phase, &step, &upstream);
            }
            if let Some(state) = self.state_of(&step) {
                state.merge_config(config);
            }
        }
    }

    /// Record "`step` depends on `up`" at the lowest workflow that knows
    /// both endpoints, auto-registering `up` in `step`'s phase when absent.
    fn set_upstream(&mut self, phase: Phase, step: &StepRef, up: &StepRef) {
        self.add_step(phase, up.clone(), None);
        let mut ancestor = match self.tree.parent_of(step) {
            Some(parent) => parent,
            None => return,
        };
        loop {
            if let Some(flow) = ancestor.as_flow() {
                if flow.state_of(up).is_some() {
                    if let Some(root) = flow.root_of(step) {
                        if let Some(state) = flow.state_of(&root) {
                            state.add_upstream(up.clone());
                            return;
                        }
                    }
                }
            }
            if self.tree.is_root(&ancestor) {
                break;
            }
            match self.tree.parent_of(&ancestor) {
                Some(parent) => ancestor = parent,
                None => return,
            }
        }
        if let Some(state) = self.state_of(&ancestor) {
            state.add_upstream(up.clone());
        }
    }
}

impl FlowStates for Workflow {
    fn state_of(&self, step: &StepRef) -> Option<Arc<State>> {
        Workflow::state_of(self, step)
    }

    fn root_of(&self, step: &StepRef) -> Option<StepRef> {
        Workflow::root_of(self, step)
    }
}

impl Step for Workflow {
    async fn run(&self, token: CancellationToken) -> Result<(), StepError> {
        match self.execute(token).await {
            Ok(()) => Ok(()),
            Err(report) => match report.current_context() {
                WorkflowError::StepsFailed(outcomes) if outcomes.all_canceled() => {
                    Err(StepError::Canceled)
                }
                _ => Err(StepError::other(report.to_string())),
            },
        }
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Owned(self.name.clone())
    }

    fn substeps(&self) -> Vec<StepRef> {
        self.steps()
    }

    fn as_flow(&self) -> Option<&dyn FlowStates> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_impl_all!(Workflow: Send, Sync);
}
