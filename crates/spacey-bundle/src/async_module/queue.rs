// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Settlement queues and fan-in continuations

use crate::runtime::Job;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Where a queue is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueStatus {
    /// Owner's body is still in its synchronous part; waiters skip it
    Unknown,
    /// Owner is waiting on something; waiters register
    Unresolved,
    /// Owner settled
    Resolved,
}

struct ContinuationState {
    pending: usize,
    action: Option<Job>,
}

/// Action gated on a count of unresolved queues
///
/// The action runs once, when the last queue it was registered against
/// resolves.
pub struct Continuation {
    state: Mutex<ContinuationState>,
}

impl Continuation {
    /// Create a continuation with nothing pending
    pub fn new<F>(action: F) -> Arc<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        Arc::new(Self {
            state: Mutex::new(ContinuationState {
                pending: 0,
                action: Some(Box::new(action)),
            }),
        })
    }

    /// Number of queues still outstanding
    pub fn pending(&self) -> usize {
        self.state.lock().pending
    }

    fn add_pending(&self) {
        self.state.lock().pending += 1;
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.pending = state.pending.saturating_sub(1);
    }

    fn fire_if_ready(&self) {
        let action = {
            let mut state = self.state.lock();
            if state.pending > 0 {
                return;
            }
            state.action.take()
        };
        if let Some(action) = action {
            action();
        }
    }
}

struct QueueState {
    status: QueueStatus,
    continuations: Vec<Arc<Continuation>>,
}

/// Settlement queue owned by one async module (or one pending value)
#[derive(Clone)]
pub struct DependencyQueue {
    inner: Arc<Mutex<QueueState>>,
}

impl DependencyQueue {
    /// Queue for a body whose synchronous part has not finished
    pub fn new() -> Self {
        Self::with_status(QueueStatus::Unknown)
    }

    /// Queue already waiting on something
    pub fn unresolved() -> Self {
        Self::with_status(QueueStatus::Unresolved)
    }

    fn with_status(status: QueueStatus) -> Self {
        Self {
            inner: Arc::new(Mutex::new(QueueState {
                status,
                continuations: Vec::new(),
            })),
        }
    }

    /// Current status
    pub fn status(&self) -> QueueStatus {
        self.inner.lock().status
    }

    /// Whether the owner has settled
    pub fn is_resolved(&self) -> bool {
        self.status() == QueueStatus::Resolved
    }

    /// Number of registered continuations
    pub fn len(&self) -> usize {
        self.inner.lock().continuations.len()
    }

    /// Whether no continuation is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &DependencyQueue) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Register `continuation` if this queue is unresolved
    ///
    /// Returns true if the continuation now waits on this queue.
    pub fn register(&self, continuation: &Arc<Continuation>) -> bool {
        let mut state = self.inner.lock();
        if state.status != QueueStatus::Unresolved {
            return false;
        }
        continuation.add_pending();
        state.continuations.push(Arc::clone(continuation));
        true
    }

    /// Leave the synchronous phase
    pub fn finish_sync_phase(&self) {
        let mut state = self.inner.lock();
        if state.status == QueueStatus::Unknown {
            state.status = QueueStatus::Unresolved;
        }
    }

    /// Mark resolved and release every waiting continuation
    ///
    /// All counts are decremented before any action runs, so an action
    /// registered here and on other already-resolved queues sees its final
    /// count. Resolving twice is a no-op.
    pub fn resolve(&self) {
        let continuations = {
            let mut state = self.inner.lock();
            if state.status == QueueStatus::Resolved {
                return;
            }
            state.status = QueueStatus::Resolved;
            std::mem::take(&mut state.continuations)
        };

        tracing::trace!(waiters = continuations.len(), "dependency queue resolved");
        for continuation in &continuations {
            continuation.release();
        }
        for continuation in &continuations {
            continuation.fire_if_ready();
        }
    }
}

impl Default for DependencyQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DependencyQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("DependencyQueue")
            .field("status", &state.status)
            .field("waiters", &state.continuations.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting() -> (Arc<AtomicUsize>, Arc<Continuation>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let continuation = Continuation::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (fired, continuation)
    }

    #[test]
    fn test_unknown_queue_rejects_registration() {
        let queue = DependencyQueue::new();
        let (_, continuation) = counting();
        assert!(!queue.register(&continuation));
        assert_eq!(continuation.pending(), 0);

        queue.finish_sync_phase();
        assert_eq!(queue.status(), QueueStatus::Unresolved);
        assert!(queue.register(&continuation));
        assert_eq!(continuation.pending(), 1);
    }

    #[test]
    fn test_fires_after_last_queue() {
        let q1 = DependencyQueue::unresolved();
        let q2 = DependencyQueue::unresolved();
        let (fired, continuation) = counting();
        q1.register(&continuation);
        q2.register(&continuation);

        q2.resolve();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        q1.resolve();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let queue = DependencyQueue::unresolved();
        let (fired, continuation) = counting();
        queue.register(&continuation);

        queue.resolve();
        queue.resolve();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(queue.is_resolved());
        assert!(!queue.register(&continuation));
    }

    #[test]
    fn test_continuations_fire_in_registration_order() {
        let queue = DependencyQueue::unresolved();
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let log = Arc::clone(&log);
            queue.register(&Continuation::new(move || log.lock().push(i)));
        }

        queue.resolve();
        assert_eq!(*log.lock(), vec![0, 1, 2]);
    }
}
