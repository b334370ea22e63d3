/*
 * Copyright Cedar Contributors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Where the engine finds policies: the top-level policies considered for a
//! request, and the targets of policy references.

use crate::ast::{PolicyReference, PolicyTree, Request};
use crate::evaluator;
use arc_swap::ArcSwap;
use std::sync::Arc;
use tracing::debug;

/// A store of policies consulted during evaluation.
///
/// Sources are shared between concurrently evaluated requests. A source
/// that can change should hand out a [`PolicySource::pinned`] view so that
/// one evaluation never mixes two generations of policies.
pub trait PolicySource: Send + Sync {
    /// The node a reference points to, or `None` if no node with that id
    /// satisfies its version constraints
    fn find_policy(&self, reference: &PolicyReference) -> evaluator::Result<Option<PolicyTree>>;

    /// The top-level policies that may apply to `request`, in the order the
    /// root combining algorithm sees them
    fn find_applicable(&self, request: &Request) -> evaluator::Result<Vec<PolicyTree>>;

    /// A view of the source that stays unchanged while one request is
    /// evaluated. Immutable sources return `None` and are used directly.
    fn pinned(&self) -> Option<Arc<dyn PolicySource>> {
        None
    }
}

/// One generation of a [`PolicyStore`]
#[derive(Debug, Clone, Default)]
pub struct PolicySnapshot {
    roots: Vec<PolicyTree>,
    library: Vec<PolicyTree>,
}

impl PolicySnapshot {
    /// A snapshot in which `roots` are considered for every request, and
    /// both `roots` and `library` can be referenced
    pub fn new(roots: Vec<PolicyTree>, library: Vec<PolicyTree>) -> Self {
        Self { roots, library }
    }

    /// The top-level policies
    pub fn roots(&self) -> &[PolicyTree] {
        &self.roots
    }

    /// Policies that are only reachable through references
    pub fn library(&self) -> &[PolicyTree] {
        &self.library
    }
}

impl PolicySource for PolicySnapshot {
    fn find_policy(&self, reference: &PolicyReference) -> evaluator::Result<Option<PolicyTree>> {
        // the latest version satisfying the constraints wins
        let found = self
            .roots
            .iter()
            .chain(&self.library)
            .filter(|tree| reference.accepts(tree))
            .max_by(|a, b| a.version().cmp(&b.version()))
            .cloned();
        debug!(
            reference = %reference,
            version = ?found.as_ref().and_then(PolicyTree::version),
            "resolved policy reference"
        );
        Ok(found)
    }

    fn find_applicable(&self, _request: &Request) -> evaluator::Result<Vec<PolicyTree>> {
        Ok(self.roots.clone())
    }
}

/// An in-memory [`PolicySource`] whose contents can be swapped atomically.
/// Evaluations already running keep the snapshot they started with.
#[derive(Debug)]
pub struct PolicyStore {
    current: ArcSwap<PolicySnapshot>,
}

impl PolicyStore {
    /// A store holding `roots`, each of which can also be referenced
    pub fn new(roots: Vec<PolicyTree>) -> Self {
        Self::with_library(roots, Vec::new())
    }

    /// A store with top-level policies and a library of policies reachable
    /// only through references
    pub fn with_library(roots: Vec<PolicyTree>, library: Vec<PolicyTree>) -> Self {
        Self {
            current: ArcSwap::from_pointee(PolicySnapshot::new(roots, library)),
        }
    }

    /// Replace the contents of the store
    pub fn replace(&self, roots: Vec<PolicyTree>, library: Vec<PolicyTree>) {
        debug!(roots = roots.len(), library = library.len(), "replacing policies");
        self.current
            .store(Arc::new(PolicySnapshot::new(roots, library)));
    }

    /// The current snapshot
    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        self.current.load_full()
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl PolicySource for PolicyStore {
    fn find_policy(&self, reference: &PolicyReference) -> evaluator::Result<Option<PolicyTree>> {
        self.current.load().find_policy(reference)
    }

    fn find_applicable(&self, request: &Request) -> evaluator::Result<Vec<PolicyTree>> {
        self.current.load().find_applicable(request)
    }

    fn pinned(&self) -> Option<Arc<dyn PolicySource>> {
        let snapshot: Arc<dyn PolicySource> = self.snapshot();
        Some(snapshot)
    }
}
