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

//! The tickflow scheduling engine.
//!
//! A [`Workflow`] holds steps connected by upstream edges into a DAG,
//! partitioned into the ordered `Init`/`Main`/`Defer` phases. Executing it
//! validates the graph (initial statuses, cycle rejection), then runs a
//! tick loop: every time a step terminates, each step whose upstreams are
//! all terminal is gated through its condition and either short-circuited
//! or dispatched onto its own task, bounded by the optional concurrency
//! lease. Steps nested inside composite steps are re-rooted so only the
//! outermost enclosing step is scheduled, and a workflow is itself a step,
//! so workflows compose.
//!
//! ```ignore
//! let mut workflow = Workflow::new();
//! workflow
//!     .add(step(&fetch))
//!     .add(step(&transform).depends_on([fetch.clone()]))
//!     .max_concurrency(4);
//! workflow.execute(CancellationToken::new()).await?;
//! ```

mod adder;
mod error;
mod executor;
mod preflight;
mod step_runner;
mod tree;
mod workflow;

pub use adder::{pipe, step, steps, StepAdder, Steps};
pub use error::{CycleSteps, InitStatuses, Result, StepOutcomes, WorkflowError};
pub use tree::StepTree;
pub use workflow::Workflow;
