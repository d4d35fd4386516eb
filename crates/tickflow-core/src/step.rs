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
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{State, StepError};

/// A unit of schedulable work.
///
/// Primitive steps implement [`run`](Step::run) only. A composite step also
/// exposes the steps it manages through [`substeps`](Step::substeps), so the
/// engine can demote previously-registered roots when the composite is
/// added. A nested workflow additionally answers the
/// [`as_flow`](Step::as_flow) capability probe, which routes state queries
/// and upstream wiring into it.
#[trait_variant::make(Send)]
#[dynosaur::dynosaur(DynStep = dyn Step)]
pub trait Step: Send + Sync {
    /// Execute the step.
    ///
    /// The token is canceled when the workflow is canceled or the step's
    /// configured timeout elapses; a step that observes it should return
    /// [`StepError::Canceled`].
    async fn run(&self, token: CancellationToken) -> Result<(), StepError>;

    /// Diagnostic label used in error reports and logs.
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("step")
    }

    /// Descendant steps managed by this one. Non-empty for composites.
    fn substeps(&self) -> Vec<StepRef> {
        Vec::new()
    }

    /// Capability probe for nested workflows.
    fn as_flow(&self) -> Option<&dyn FlowStates> {
        None
    }
}

/// State queries a nested workflow answers for its own descendants.
///
/// The engine probes this capability when resolving `state_of` across
/// workflow boundaries and when placing an upstream edge at the lowest
/// workflow that sees both endpoints.
pub trait FlowStates: Send + Sync {
    /// The state this workflow owns for `step`, if it manages it.
    fn state_of(&self, step: &StepRef) -> Option<Arc<State>>;

    /// The root under this workflow that contains `step`.
    fn root_of(&self, step: &StepRef) -> Option<StepRef>;
}

/// Shared handle to a step.
///
/// Identity is pointer identity: two handles are equal iff they share the
/// same underlying allocation. Cloning preserves identity, which is what
/// lets one step instance be referenced from configs, the step tree and
/// phase buckets interchangeably.
#[derive(Clone)]
pub struct StepRef(Arc<DynStep<'static>>);

impl StepRef {
    /// Wrap a concrete step.
    pub fn new(step: impl Step + 'static) -> Self {
        Self(Arc::from(DynStep::boxed(step)))
    }

    pub fn name(&self) -> Cow<'static, str> {
        self.0.name()
    }

    /// Execute the underlying step.
    pub async fn run(&self, token: CancellationToken) -> Result<(), StepError> {
        self.0.run(token).await
    }

    pub fn substeps(&self) -> Vec<StepRef> {
        self.0.substeps()
    }

    pub fn as_flow(&self) -> Option<&dyn FlowStates> {
        self.0.as_flow()
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl PartialEq for StepRef {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for StepRef {}

impl Hash for StepRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for StepRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepRef")
            .field("name", &self.name())
            .field("addr", &(self.addr() as *const ()))
            .finish()
    }
}

impl fmt::Display for StepRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
