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

use tokio_util::sync::CancellationToken;

use crate::{StepError, StepRef};

/// Hooks fired around every step attempt.
///
/// `before_step` runs before the input callbacks and may replace the token
/// handed to the step, e.g. with a child carrying extra cancellation
/// causes. `after_step` observes the attempt's outcome. When a retry policy
/// is configured the hooks fire once per attempt; an attempt that panics
/// skips its `after_step`.
pub trait Notify: Send + Sync {
    fn before_step(&self, token: CancellationToken, _step: &StepRef) -> CancellationToken {
        token
    }

    fn after_step(&self, _step: &StepRef, _error: Option<&StepError>) {}
}
