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

use thiserror::Error;

/// Boxed error carried by step failures and input callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error returned from a step attempt.
///
/// `Skip` and `Canceled` are sentinels the runner classifies into the
/// `Skipped` and `Canceled` statuses; `Input` and `Panic` are produced by
/// the engine itself; everything else classifies as `Failed`.
#[derive(Error, Debug)]
pub enum StepError {
    /// The step asked to be skipped without failing.
    #[error("step skipped: {}", .0.as_deref().unwrap_or("unconditional"))]
    Skip(Option<String>),
    /// The step observed its cancellation token.
    #[error("step canceled")]
    Canceled,
    /// An input callback failed before the step body ran.
    #[error("input callback failed: {0}")]
    Input(#[source] BoxError),
    /// A panic recovered from the step body or an input callback.
    #[error("step panicked: {0}")]
    Panic(String),
    /// Arbitrary step failure.
    #[error("{0}")]
    Other(#[source] BoxError),
}

impl StepError {
    /// The skip sentinel without a reason.
    pub fn skip() -> Self {
        StepError::Skip(None)
    }

    /// The skip sentinel carrying a reason.
    pub fn skip_because(reason: impl Into<String>) -> Self {
        StepError::Skip(Some(reason.into()))
    }

    /// Wrap an arbitrary error as a step failure.
    pub fn other(error: impl Into<BoxError>) -> Self {
        StepError::Other(error.into())
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, StepError::Skip(_))
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, StepError::Canceled)
    }
}

impl From<BoxError> for StepError {
    fn from(error: BoxError) -> Self {
        StepError::Other(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_display() {
        assert_eq!(StepError::skip().to_string(), "step skipped: unconditional");
        assert_eq!(
            StepError::skip_because("nothing to do").to_string(),
            "step skipped: nothing to do"
        );
        assert_eq!(StepError::Canceled.to_string(), "step canceled");
        assert_eq!(
            StepError::Panic("boom".to_string()).to_string(),
            "step panicked: boom"
        );
    }

    #[test]
    fn test_classification_helpers() {
        assert!(StepError::skip().is_skip());
        assert!(StepError::Canceled.is_canceled());
        assert!(!StepError::other("boom").is_skip());
        assert!(!StepError::other("boom").is_canceled());
    }
}
