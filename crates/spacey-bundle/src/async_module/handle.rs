// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Export handle published by an asynchronous module

use super::queue::DependencyQueue;
use crate::error::{BundleError, Result};
use crate::module_system::ModuleId;
use crate::runtime::{Promise, Scheduler};
use crate::value::Value;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Lifecycle of an async module body
///
/// There is no separate created state: a handle exists only once its body
/// has started, so every handle begins in `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncModuleStatus {
    /// Body is executing
    Running,
    /// Body is suspended on unresolved dependencies
    AwaitingDependencies,
    /// Body completed
    Resolved,
    /// Body failed
    Rejected,
}

impl AsyncModuleStatus {
    /// Whether the status is terminal
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Resolved | Self::Rejected)
    }
}

struct HandleState {
    exports: Value,
    error: Option<BundleError>,
    status: AsyncModuleStatus,
    dep_queues: Vec<DependencyQueue>,
}

struct HandleInner {
    module_id: ModuleId,
    promise: Promise,
    queue: Option<DependencyQueue>,
    state: Mutex<HandleState>,
}

/// Promise-like settlement plus a live exports snapshot
///
/// The snapshot is the module's exports object, mutated in place while the
/// body runs. Consumers that grab it early see the final values once the
/// body completes.
#[derive(Clone)]
pub struct AsyncExports {
    inner: Arc<HandleInner>,
}

impl AsyncExports {
    pub(crate) fn new(
        module_id: ModuleId,
        scheduler: &Scheduler,
        exports: Value,
        queue: Option<DependencyQueue>,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                module_id,
                promise: Promise::new(scheduler),
                queue,
                state: Mutex::new(HandleState {
                    exports,
                    error: None,
                    status: AsyncModuleStatus::Running,
                    dep_queues: Vec::new(),
                }),
            }),
        }
    }

    /// Id of the owning module
    pub fn module_id(&self) -> &str {
        &self.inner.module_id
    }

    /// Promise settled with the snapshot (or the body's error)
    pub fn promise(&self) -> &Promise {
        &self.inner.promise
    }

    /// The module's own queue, absent for bodies that never suspend
    pub fn queue(&self) -> Option<&DependencyQueue> {
        self.inner.queue.as_ref()
    }

    /// Live exports snapshot
    pub fn exports(&self) -> Value {
        self.inner.state.lock().exports.clone()
    }

    /// Replace the snapshot wholesale
    pub fn set_exports(&self, exports: Value) {
        self.inner.state.lock().exports = exports;
    }

    /// Stored failure of the body
    pub fn error(&self) -> Option<BundleError> {
        self.inner.state.lock().error.clone()
    }

    /// Current lifecycle status
    pub fn status(&self) -> AsyncModuleStatus {
        self.inner.state.lock().status
    }

    /// Snapshot, or the stored failure
    pub fn result(&self) -> Result<Value> {
        let state = self.inner.state.lock();
        match &state.error {
            Some(err) => Err(err.clone()),
            None => Ok(state.exports.clone()),
        }
    }

    pub(crate) fn set_awaiting(&self, awaiting: bool) {
        let mut state = self.inner.state.lock();
        if state.status.is_settled() {
            return;
        }
        state.status = if awaiting {
            AsyncModuleStatus::AwaitingDependencies
        } else {
            AsyncModuleStatus::Running
        };
    }

    /// Record completion of the body
    ///
    /// Settles the promise, then resolves the module's queue so every
    /// dependent waiting on it is released. Only the first call has an
    /// effect; returns whether this call settled the handle.
    pub fn settle(&self, result: Result<()>) -> bool {
        let exports = {
            let mut state = self.inner.state.lock();
            if state.status.is_settled() {
                tracing::debug!(module = %self.inner.module_id, "async module already settled");
                return false;
            }
            match &result {
                Ok(()) => state.status = AsyncModuleStatus::Resolved,
                Err(err) => {
                    state.status = AsyncModuleStatus::Rejected;
                    state.error = Some(err.clone());
                }
            }
            state.exports.clone()
        };

        match result {
            Ok(()) => {
                tracing::debug!(module = %self.inner.module_id, "async module resolved");
                self.inner.promise.resolve(exports);
            }
            Err(err) => {
                tracing::debug!(module = %self.inner.module_id, error = %err, "async module rejected");
                self.inner.promise.reject(err);
            }
        }

        if let Some(queue) = &self.inner.queue {
            queue.resolve();
        }
        true
    }

    /// Remember a queue this module registered against
    ///
    /// Returns false for the module's own queue and for queues already seen.
    pub(crate) fn register_queue(&self, queue: &DependencyQueue) -> bool {
        if self.inner.queue.as_ref().is_some_and(|own| own.ptr_eq(queue)) {
            return false;
        }
        let mut state = self.inner.state.lock();
        if state.dep_queues.iter().any(|q| q.ptr_eq(queue)) {
            return false;
        }
        state.dep_queues.push(queue.clone());
        true
    }

    /// Visit the module's own queue, then every queue it depends on
    ///
    /// Waiting on a module means waiting on what it waits on too; that is how
    /// a cycle collapses onto queues that already exist instead of new ones.
    /// Visiting counts as handling the promise.
    pub fn for_each_queue<F>(&self, mut f: F)
    where
        F: FnMut(&DependencyQueue),
    {
        let dep_queues = self.inner.state.lock().dep_queues.clone();
        if let Some(queue) = &self.inner.queue {
            f(queue);
        }
        for queue in &dep_queues {
            f(queue);
        }
        self.inner.promise.mark_handled();
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &AsyncExports) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for AsyncExports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncExports")
            .field("module", &self.inner.module_id)
            .field("status", &self.status())
            .finish()
    }
}
