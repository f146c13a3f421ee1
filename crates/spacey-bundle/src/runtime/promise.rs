// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Single-threaded promise
//!
//! Implements the subset of the Promise API module bodies need:
//! - resolve / reject (settling at most once)
//! - adoption of another promise or async module handle
//! - then / catch, with reactions queued as scheduler jobs
//! - unhandled rejection tracking

use super::Scheduler;
use crate::error::{BundleError, Result};
use crate::value::Value;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique ID generator for promises
static PROMISE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

type Reaction = Box<dyn FnOnce(Result<Value>) + Send>;

/// Promise state
#[derive(Debug, Clone)]
pub enum PromiseState {
    /// Neither fulfilled nor rejected
    Pending,
    /// Completed with a value
    Fulfilled(Value),
    /// Failed with an error
    Rejected(BundleError),
}

struct PromiseData {
    state: PromiseState,
    reactions: Vec<Reaction>,
    handled: bool,
}

struct PromiseInner {
    id: u64,
    scheduler: Scheduler,
    data: Mutex<PromiseData>,
}

/// Shared handle to a promise
#[derive(Clone)]
pub struct Promise {
    inner: Arc<PromiseInner>,
}

impl Promise {
    /// Create a pending promise bound to `scheduler`
    pub fn new(scheduler: &Scheduler) -> Self {
        Self {
            inner: Arc::new(PromiseInner {
                id: PROMISE_ID_COUNTER.fetch_add(1, Ordering::SeqCst),
                scheduler: scheduler.clone(),
                data: Mutex::new(PromiseData {
                    state: PromiseState::Pending,
                    reactions: Vec::new(),
                    handled: false,
                }),
            }),
        }
    }

    /// Create a promise fulfilled with `value`
    pub fn resolved(scheduler: &Scheduler, value: impl Into<Value>) -> Self {
        let promise = Self::new(scheduler);
        promise.resolve(value.into());
        promise
    }

    /// Create a promise rejected with `reason`
    pub fn rejected(scheduler: &Scheduler, reason: BundleError) -> Self {
        let promise = Self::new(scheduler);
        promise.reject(reason);
        promise
    }

    /// Unique ID
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Scheduler reactions are queued on
    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Promise) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Snapshot of the current state
    pub fn state(&self) -> PromiseState {
        self.inner.data.lock().state.clone()
    }

    /// Check if promise is pending
    pub fn is_pending(&self) -> bool {
        matches!(self.inner.data.lock().state, PromiseState::Pending)
    }

    /// Check if promise is fulfilled
    pub fn is_fulfilled(&self) -> bool {
        matches!(self.inner.data.lock().state, PromiseState::Fulfilled(_))
    }

    /// Check if promise is rejected
    pub fn is_rejected(&self) -> bool {
        matches!(self.inner.data.lock().state, PromiseState::Rejected(_))
    }

    /// Check if promise is settled (fulfilled or rejected)
    pub fn is_settled(&self) -> bool {
        !self.is_pending()
    }

    /// Fulfillment value, if fulfilled
    pub fn value(&self) -> Option<Value> {
        match &self.inner.data.lock().state {
            PromiseState::Fulfilled(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Rejection reason, if rejected
    pub fn reason(&self) -> Option<BundleError> {
        match &self.inner.data.lock().state {
            PromiseState::Rejected(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    /// Whether a handler has been attached
    pub fn is_handled(&self) -> bool {
        self.inner.data.lock().handled
    }

    /// Mark the promise as handled without attaching a reaction
    pub fn mark_handled(&self) {
        self.inner.data.lock().handled = true;
    }

    /// Resolve the promise
    ///
    /// Another promise (or an async module handle) is adopted: this promise
    /// settles the same way once that one does.
    pub fn resolve(&self, value: Value) {
        match value {
            Value::Promise(other) if other.ptr_eq(self) => {
                self.reject(BundleError::type_error("Chaining cycle detected for promise"));
            }
            Value::Promise(other) => self.adopt(&other),
            Value::AsyncModule(handle) => self.adopt(handle.promise()),
            value => {
                self.settle(Ok(value));
            }
        }
    }

    /// Reject the promise
    pub fn reject(&self, reason: BundleError) {
        self.settle(Err(reason));
    }

    fn adopt(&self, other: &Promise) {
        let this = self.clone();
        other.subscribe(Box::new(move |outcome| {
            this.settle(outcome);
        }));
    }

    fn settle(&self, outcome: Result<Value>) -> bool {
        let (reactions, handled) = {
            let mut data = self.inner.data.lock();
            if !matches!(data.state, PromiseState::Pending) {
                return false;
            }
            data.state = match &outcome {
                Ok(value) => PromiseState::Fulfilled(value.clone()),
                Err(reason) => PromiseState::Rejected(reason.clone()),
            };
            (std::mem::take(&mut data.reactions), data.handled)
        };

        tracing::trace!(
            promise = self.inner.id,
            fulfilled = outcome.is_ok(),
            reactions = reactions.len(),
            "promise settled"
        );

        if outcome.is_err() && !handled {
            self.inner.scheduler.track_rejection(self.clone());
        }
        for reaction in reactions {
            let outcome = outcome.clone();
            self.inner.scheduler.queue_job(move || reaction(outcome));
        }
        true
    }

    fn subscribe(&self, reaction: Reaction) {
        let settled = {
            let mut data = self.inner.data.lock();
            data.handled = true;
            match &data.state {
                PromiseState::Pending => {
                    data.reactions.push(reaction);
                    return;
                }
                PromiseState::Fulfilled(value) => Ok(value.clone()),
                PromiseState::Rejected(reason) => Err(reason.clone()),
            }
        };
        self.inner.scheduler.queue_job(move || reaction(settled));
    }

    /// Attach a reaction receiving the outcome
    ///
    /// The reaction runs as a scheduler job once the promise settles. Its
    /// return value settles the returned promise.
    pub fn then<F>(&self, on_settled: F) -> Promise
    where
        F: FnOnce(Result<Value>) -> Result<Value> + Send + 'static,
    {
        let derived = Promise::new(&self.inner.scheduler);
        let target = derived.clone();
        self.subscribe(Box::new(move |outcome| match on_settled(outcome) {
            Ok(value) => target.resolve(value),
            Err(reason) => target.reject(reason),
        }));
        derived
    }

    /// Attach a rejection handler
    pub fn catch<F>(&self, on_rejected: F) -> Promise
    where
        F: FnOnce(BundleError) -> Result<Value> + Send + 'static,
    {
        self.then(move |outcome| match outcome {
            Ok(value) => Ok(value),
            Err(reason) => on_rejected(reason),
        })
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promise_creation() {
        let scheduler = Scheduler::new();
        let p = Promise::new(&scheduler);
        assert!(p.is_pending());
        assert!(!p.is_settled());
        assert!(!p.is_handled());
    }

    #[test]
    fn test_promise_settles_once() {
        let scheduler = Scheduler::new();
        let p = Promise::new(&scheduler);
        p.resolve(Value::from(1));
        p.resolve(Value::from(2));
        p.reject(BundleError::generic("late"));

        assert!(p.is_fulfilled());
        assert_eq!(p.value(), Some(Value::Number(1.0)));
    }

    #[test]
    fn test_then_runs_as_job() {
        let scheduler = Scheduler::new();
        let p = Promise::resolved(&scheduler, 20);
        let derived = p.then(|outcome| match outcome {
            Ok(Value::Number(n)) => Ok(Value::Number(n + 1.0)),
            other => other,
        });

        assert!(derived.is_pending());
        scheduler.run_until_idle();
        assert_eq!(derived.value(), Some(Value::Number(21.0)));
    }

    #[test]
    fn test_catch_recovers() {
        let scheduler = Scheduler::new();
        let p = Promise::rejected(&scheduler, BundleError::generic("boom"));
        let recovered = p.catch(|err| Ok(Value::from(err.to_string())));
        scheduler.run_until_idle();

        assert_eq!(recovered.value(), Some(Value::from("boom")));
        assert!(scheduler.check_unhandled_rejections().is_empty());
    }

    #[test]
    fn test_unhandled_rejection_reported_once() {
        let scheduler = Scheduler::new();
        let _p = Promise::rejected(&scheduler, BundleError::generic("lost"));

        let unhandled = scheduler.check_unhandled_rejections();
        assert_eq!(unhandled.len(), 1);
        assert_eq!(unhandled[0].to_string(), "lost");
        assert!(scheduler.check_unhandled_rejections().is_empty());
    }

    #[test]
    fn test_adopts_other_promise() {
        let scheduler = Scheduler::new();
        let inner = Promise::new(&scheduler);
        let outer = Promise::new(&scheduler);
        outer.resolve(Value::Promise(inner.clone()));

        assert!(outer.is_pending());
        inner.resolve(Value::from("done"));
        scheduler.run_until_idle();
        assert_eq!(outer.value(), Some(Value::from("done")));
    }

    #[test]
    fn test_self_resolution_rejects() {
        let scheduler = Scheduler::new();
        let p = Promise::new(&scheduler);
        p.mark_handled();
        p.resolve(Value::Promise(p.clone()));

        assert!(matches!(p.reason(), Some(BundleError::TypeError(_))));
    }
}
