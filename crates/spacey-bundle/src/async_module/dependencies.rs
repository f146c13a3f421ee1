// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Normalized dependency lists handed back to async module bodies

use super::handle::AsyncExports;
use super::queue::DependencyQueue;
use crate::error::Result;
use crate::runtime::Scheduler;
use crate::value::Value;
use parking_lot::Mutex;
use std::sync::Arc;

struct PendingDependency {
    queue: DependencyQueue,
    outcome: Mutex<Option<Result<Value>>>,
}

#[derive(Clone)]
enum Dependency {
    Ready(Value),
    Module(AsyncExports),
    Pending(Arc<PendingDependency>),
}

impl Dependency {
    fn wrap(dep: Value) -> Self {
        match dep {
            Value::AsyncModule(handle) => Self::Module(handle),
            Value::Promise(promise) => {
                let pending = Arc::new(PendingDependency {
                    queue: DependencyQueue::unresolved(),
                    outcome: Mutex::new(None),
                });
                let slot = Arc::clone(&pending);
                promise.then(move |outcome| {
                    *slot.outcome.lock() = Some(outcome);
                    slot.queue.resolve();
                    Ok(Value::Undefined)
                });
                Self::Pending(pending)
            }
            value => Self::Ready(value),
        }
    }

    fn value(&self) -> Result<Value> {
        match self {
            Self::Ready(value) => Ok(value.clone()),
            Self::Module(handle) => handle.result(),
            Self::Pending(pending) => match &*pending.outcome.lock() {
                Some(outcome) => outcome.clone(),
                None => Ok(Value::Undefined),
            },
        }
    }

    fn for_each_queue<F>(&self, mut f: F)
    where
        F: FnMut(&DependencyQueue),
    {
        match self {
            Self::Ready(_) => {}
            Self::Module(handle) => handle.for_each_queue(f),
            Self::Pending(pending) => f(&pending.queue),
        }
    }
}

/// Materialized dependency values
///
/// A failed dependency only raises when its own index is read.
#[derive(Clone)]
pub struct DependencyValues {
    deps: Arc<[Dependency]>,
}

impl DependencyValues {
    /// Value of dependency `index`, or its stored failure
    ///
    /// Reading past the end yields `undefined`.
    pub fn get(&self, index: usize) -> Result<Value> {
        match self.deps.get(index) {
            Some(dep) => dep.value(),
            None => Ok(Value::Undefined),
        }
    }

    /// Every value, failing on the first failed dependency
    pub fn all(&self) -> Result<Vec<Value>> {
        self.deps.iter().map(Dependency::value).collect()
    }

    /// Number of dependencies
    pub fn len(&self) -> usize {
        self.deps.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }
}

type ReadyCallback = Box<dyn FnOnce(DependencyValues) + Send>;

struct WaitState {
    ready: bool,
    callbacks: Vec<ReadyCallback>,
}

struct WaitInner {
    values: DependencyValues,
    scheduler: Scheduler,
    state: Mutex<WaitState>,
}

/// Suspended dependency list, completed by its fan-in continuation
#[derive(Clone)]
pub struct DependencyWait {
    inner: Arc<WaitInner>,
}

impl DependencyWait {
    pub(crate) fn new(values: DependencyValues, scheduler: &Scheduler) -> Self {
        Self {
            inner: Arc::new(WaitInner {
                values,
                scheduler: scheduler.clone(),
                state: Mutex::new(WaitState {
                    ready: false,
                    callbacks: Vec::new(),
                }),
            }),
        }
    }

    /// Whether every awaited queue has resolved
    pub fn is_ready(&self) -> bool {
        self.inner.state.lock().ready
    }

    pub(crate) fn complete(&self) {
        let callbacks = {
            let mut state = self.inner.state.lock();
            state.ready = true;
            std::mem::take(&mut state.callbacks)
        };
        for callback in callbacks {
            let values = self.inner.values.clone();
            self.inner.scheduler.queue_job(move || callback(values));
        }
    }

    /// Run `callback` as a job once the wait completes
    pub fn on_ready<F>(&self, callback: F)
    where
        F: FnOnce(DependencyValues) + Send + 'static,
    {
        let mut state = self.inner.state.lock();
        if state.ready {
            drop(state);
            let values = self.inner.values.clone();
            self.inner.scheduler.queue_job(move || callback(values));
        } else {
            state.callbacks.push(Box::new(callback));
        }
    }
}

/// Outcome of declaring a module's dependencies
pub enum Dependencies {
    /// Nothing to wait for; values are usable now
    Ready(DependencyValues),
    /// At least one dependency queue is unresolved
    Pending(DependencyWait),
}

impl Dependencies {
    /// Whether the body has to suspend
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Continue with the values
    ///
    /// Ready lists call `f` synchronously; pending lists run it as a job
    /// after the last awaited queue resolves.
    pub fn then<F>(self, f: F)
    where
        F: FnOnce(DependencyValues) + Send + 'static,
    {
        match self {
            Self::Ready(values) => f(values),
            Self::Pending(wait) => wait.on_ready(f),
        }
    }
}

impl DependencyValues {
    /// Wrap raw dependency values
    ///
    /// Async module handles keep their own queues. A promise gets a private
    /// queue that resolves when it settles. Anything else is ready as is.
    pub(crate) fn normalize(deps: Vec<Value>) -> Self {
        let deps: Vec<Dependency> = deps.into_iter().map(Dependency::wrap).collect();
        Self { deps: deps.into() }
    }

    /// Visit every queue backing the list
    pub(crate) fn for_each_queue<F>(&self, mut f: F)
    where
        F: FnMut(&DependencyQueue),
    {
        for dep in self.deps.iter() {
            dep.for_each_queue(&mut f);
        }
    }
}
