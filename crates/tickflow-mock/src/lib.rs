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

//! Test steps for exercising the tickflow engine.
//!
//! [`FnStep`] wraps a closure as a named step; [`GroupStep`] is a
//! composite that exposes its children and runs them sequentially. Both
//! return [`StepRef`] handles directly, since tests refer to steps by
//! identity.

use std::borrow::Cow;
use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt as _;
use tickflow_core::{Step, StepError, StepRef};
use tokio_util::sync::CancellationToken;

type StepFuture = BoxFuture<'static, Result<(), StepError>>;

/// A step backed by a closure.
pub struct FnStep {
    name: Cow<'static, str>,
    body: Box<dyn Fn(CancellationToken) -> StepFuture + Send + Sync>,
}

impl FnStep {
    pub fn new<F, Fut>(name: impl Into<Cow<'static, str>>, body: F) -> StepRef
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), StepError>> + Send + 'static,
    {
        StepRef::new(Self {
            name: name.into(),
            body: Box::new(move |token| body(token).boxed()),
        })
    }

    /// A step that immediately succeeds.
    pub fn noop(name: impl Into<Cow<'static, str>>) -> StepRef {
        Self::new(name, |_token| async { Ok(()) })
    }

    /// A step that immediately fails with the given message.
    pub fn failing(name: impl Into<Cow<'static, str>>, message: &'static str) -> StepRef {
        Self::new(name, move |_token| async move {
            Err(StepError::other(message))
        })
    }
}

impl Step for FnStep {
    async fn run(&self, token: CancellationToken) -> Result<(), StepError> {
        (self.body)(token).await
    }

    fn name(&self) -> Cow<'static, str> {
        self.name.clone()
    }
}

/// A composite exposing its children, running them in order when executed
/// as a root.
pub struct GroupStep {
    name: Cow<'static, str>,
    children: Vec<StepRef>,
}

impl GroupStep {
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        children: impl IntoIterator<Item = StepRef>,
    ) -> StepRef {
        StepRef::new(Self {
            name: name.into(),
            children: children.into_iter().collect(),
        })
    }
}

impl Step for GroupStep {
    async fn run(&self, token: CancellationToken) -> Result<(), StepError> {
        for child in &self.children {
            child.run(token.clone()).await?;
        }
        Ok(())
    }

    fn name(&self) -> Cow<'static, str> {
        self.name.clone()
    }

    fn substeps(&self) -> Vec<StepRef> {
        self.children.clone()
    }
}
