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

//! Data model for the tickflow DAG workflow engine.
//!
//! This crate defines what a step *is*; the scheduling engine lives in
//! `tickflow-execution`. The pieces here:
//!
//! - [`Step`] / [`StepRef`]: the unit of work and its identity-keyed handle
//! - [`StepStatus`] / [`StatusError`]: the per-step state machine vocabulary
//! - [`Phase`]: the ordered Init/Main/Defer execution waves
//! - [`State`] / [`StepConfig`]: the mutable per-root record and its
//!   mergeable configuration (upstreams, timeout, retry, condition, inputs)
//! - [`Notify`]: before/after step hooks
//! - [`StepError`]: the step-level error sentinels

mod config;
mod error;
mod notify;
mod phase;
mod state;
mod status;
mod step;

pub use config::{
    always_condition, any_succeeded_condition, default_condition, Backoff, Condition, InputFn,
    RetryPolicy, RetryPredicate, StepConfig, UpstreamStatuses,
};
pub use error::{BoxError, StepError};
pub use notify::Notify;
pub use phase::Phase;
pub use state::State;
pub use status::{StatusError, StepStatus};
pub use step::{DynStep, FlowStates, Step, StepRef};
