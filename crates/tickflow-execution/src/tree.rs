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

use indexmap::{IndexMap, IndexSet};
use tickflow_core::StepRef;

/// Parent links for every step known to a workflow.
///
/// A root maps to itself. Only roots are scheduled; descendants are managed
/// by whichever composite owns them. Because a composite can be added after
/// some of its internal steps were added individually, [`insert`] demotes
/// such steps and reports them so the workflow can migrate their
/// bookkeeping onto the new root.
///
/// [`insert`]: StepTree::insert
#[derive(Default)]
pub struct StepTree {
    parents: IndexMap<StepRef, StepRef>,
}

impl StepTree {
    pub fn contains(&self, step: &StepRef) -> bool {
        self.parents.contains_key(step)
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// The immediate container of `step`; `step` itself when it is a root.
    pub fn parent_of(&self, step: &StepRef) -> Option<StepRef> {
        self.parents.get(step).cloned()
    }

    pub fn is_root(&self, step: &StepRef) -> bool {
        self.parents.get(step) == Some(step)
    }

    /// Climb to the outermost enclosing step.
    pub fn root_of(&self, step: &StepRef) -> Option<StepRef> {
        let mut current = step.clone();
        loop {
            let parent = self.parents.get(&current)?.clone();
            if parent == current {
                return Some(current);
            }
            current = parent;
        }
    }

    /// Register `step` as a new root together with every descendant it
    /// exposes, demoting descendants that were previously roots.
    ///
    /// Returns the demoted roots; the caller migrates their config, state
    /// and phase membership onto `step`. Inserting an already-known step is
    /// a no-op.
    pub fn insert(&mut self, step: StepRef) -> IndexSet<StepRef> {
        let mut demoted = IndexSet::new();
        if self.parents.contains_key(&step) {
            return demoted;
        }
        self.parents.insert(step.clone(), step.clone());
        self.attach(step, &mut demoted);
        demoted
    }

    fn attach(&mut self, parent: StepRef, demoted: &mut IndexSet<StepRef>) {
        for child in parent.substeps() {
            match self.parents.get(&child) {
                Some(existing) if existing == &child => {
                    // a known root becomes a descendant; its own subtree
                    // stays linked beneath it
                    demoted.insert(child.clone());
                    self.parents.insert(child.clone(), parent.clone());
                }
                Some(_) => {}
                None => {
                    self.parents.insert(child.clone(), parent.clone());
                    self.attach(child, demoted);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use tickflow_core::{Step, StepError};
    use tokio_util::sync::CancellationToken;

    struct Leaf(&'static str);

    impl Step for Leaf {
        async fn run(&self, _token: CancellationToken) -> Result<(), StepError> {
            Ok(())
        }
        fn name(&self) -> Cow<'static, str> {
            Cow::Borrowed(self.0)
        }
    }

    struct Composite {
        name: &'static str,
        children: Vec<StepRef>,
    }

    impl Step for Composite {
        async fn run(&self, _token: CancellationToken) -> Result<(), StepError> {
            Ok(())
        }
        fn name(&self) -> Cow<'static, str> {
            Cow::Borrowed(self.name)
        }
        fn substeps(&self) -> Vec<StepRef> {
            self.children.clone()
        }
    }

    #[test]
    fn test_single_step_is_its_own_root() {
        let mut tree = StepTree::default();
        let a = StepRef::new(Leaf("a"));

        assert!(tree.insert(a.clone()).is_empty());
        assert!(tree.is_root(&a));
        assert_eq!(tree.root_of(&a), Some(a.clone()));
    }

    #[test]
    fn test_composite_registers_descendants() {
        let mut tree = StepTree::default();
        let a = StepRef::new(Leaf("a"));
        let b = StepRef::new(Leaf("b"));
        let group = StepRef::new(Composite {
            name: "group",
            children: vec![a.clone(), b.clone()],
        });

        assert!(tree.insert(group.clone()).is_empty());
        assert!(tree.is_root(&group));
        assert!(!tree.is_root(&a));
        assert_eq!(tree.root_of(&a), Some(group.clone()));
        assert_eq!(tree.root_of(&b), Some(group.clone()));
    }

    #[test]
    fn test_late_composite_demotes_existing_root() {
        let mut tree = StepTree::default();
        let a = StepRef::new(Leaf("a"));
        assert!(tree.insert(a.clone()).is_empty());

        let group = StepRef::new(Composite {
            name: "group",
            children: vec![a.clone()],
        });
        let demoted = tree.insert(group.clone());
        assert_eq!(demoted.len(), 1);
        assert!(demoted.contains(&a));
        assert_eq!(tree.root_of(&a), Some(group.clone()));
    }

    #[test]
    fn test_root_of_is_idempotent() {
        let mut tree = StepTree::default();
        let a = StepRef::new(Leaf("a"));
        let group = StepRef::new(Composite {
            name: "group",
            children: vec![a.clone()],
        });
        tree.insert(group.clone());

        let root = tree.root_of(&a).unwrap();
        assert_eq!(tree.root_of(&root), Some(root.clone()));
    }

    #[test]
    fn test_nested_composites() {
        let mut tree = StepTree::default();
        let a = StepRef::new(Leaf("a"));
        let inner = StepRef::new(Composite {
            name: "inner",
            children: vec![a.clone()],
        });
        let outer = StepRef::new(Composite {
            name: "outer",
            children: vec![inner.clone()],
        });

        tree.insert(outer.clone());
        assert_eq!(tree.parent_of(&a), Some(inner.clone()));
        assert_eq!(tree.parent_of(&inner), Some(outer.clone()));
        assert_eq!(tree.root_of(&a), Some(outer));
    }
}
