// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Job queue driving promise reactions and dependency continuations
//!
//! Everything runs on the thread that calls [`Scheduler::run_until_idle`].
//! Jobs queued while the queue drains run in the same drain, after every job
//! queued before them.

use super::Promise;
use crate::error::BundleError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A unit of deferred work
pub type Job = Box<dyn FnOnce() + Send>;

struct SchedulerInner {
    jobs: Mutex<VecDeque<Job>>,
    draining: AtomicBool,
    rejections: Mutex<Vec<Promise>>,
}

/// FIFO job queue (the trampoline every continuation bounces through)
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    /// Create an empty scheduler
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                jobs: Mutex::new(VecDeque::new()),
                draining: AtomicBool::new(false),
                rejections: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Queue a job to run on the next drain
    pub fn queue_job<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.jobs.lock().push_back(Box::new(job));
    }

    /// Number of queued jobs
    pub fn pending_jobs(&self) -> usize {
        self.inner.jobs.lock().len()
    }

    /// Whether any job is waiting to run
    pub fn has_pending_work(&self) -> bool {
        !self.inner.jobs.lock().is_empty()
    }

    /// Run jobs until the queue is empty
    ///
    /// Returns the number of jobs executed. A nested call from inside a job
    /// returns 0 immediately; the outer drain picks up whatever was queued.
    /// A panicking job ends the drain; the jobs behind it stay queued.
    pub fn run_until_idle(&self) -> usize {
        if self.inner.draining.swap(true, Ordering::AcqRel) {
            return 0;
        }
        let _guard = DrainGuard(&self.inner.draining);

        let mut executed = 0;
        loop {
            let job = self.inner.jobs.lock().pop_front();
            match job {
                Some(job) => {
                    job();
                    executed += 1;
                }
                None => break,
            }
        }

        tracing::trace!(executed, "scheduler idle");
        executed
    }

    pub(crate) fn track_rejection(&self, promise: Promise) {
        self.inner.rejections.lock().push(promise);
    }

    /// Report rejected promises nobody attached a handler to
    ///
    /// Each tracked rejection is reported at most once. Rejections that gained
    /// a handler since they were tracked are dropped silently.
    pub fn check_unhandled_rejections(&self) -> Vec<BundleError> {
        let tracked = std::mem::take(&mut *self.inner.rejections.lock());
        let mut unhandled = Vec::new();
        for promise in tracked {
            if promise.is_handled() {
                continue;
            }
            if let Some(reason) = promise.reason() {
                tracing::warn!(promise = promise.id(), "Unhandled promise rejection: {}", reason);
                unhandled.push(reason);
            }
        }
        unhandled
    }
}

/// Clears the draining flag however the drain ends
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending_jobs", &self.pending_jobs())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_jobs_run_in_fifo_order() {
        let scheduler = Scheduler::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let log = Arc::clone(&log);
            scheduler.queue_job(move || log.lock().push(i));
        }

        assert_eq!(scheduler.pending_jobs(), 3);
        assert_eq!(scheduler.run_until_idle(), 3);
        assert_eq!(*log.lock(), vec![0, 1, 2]);
        assert!(!scheduler.has_pending_work());
    }

    #[test]
    fn test_jobs_queued_while_draining_run_in_same_drain() {
        let scheduler = Scheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let inner_scheduler = scheduler.clone();
        let inner_count = Arc::clone(&count);
        scheduler.queue_job(move || {
            inner_count.fetch_add(1, Ordering::SeqCst);
            let c = Arc::clone(&inner_count);
            inner_scheduler.queue_job(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        });

        assert_eq!(scheduler.run_until_idle(), 2);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_nested_drain_is_noop() {
        let scheduler = Scheduler::new();
        let nested = Arc::new(AtomicUsize::new(usize::MAX));
        let s = scheduler.clone();
        let n = Arc::clone(&nested);
        scheduler.queue_job(move || {
            s.queue_job(|| {});
            n.store(s.run_until_idle(), Ordering::SeqCst);
        });

        assert_eq!(scheduler.run_until_idle(), 2);
        assert_eq!(nested.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_drain_recovers_after_panicking_job() {
        let scheduler = Scheduler::new();
        let ran = Arc::new(AtomicUsize::new(0));
        scheduler.queue_job(|| panic!("job failed"));
        let r = Arc::clone(&ran);
        scheduler.queue_job(move || {
            r.fetch_add(1, Ordering::SeqCst);
        });

        let drained = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            scheduler.run_until_idle()
        }));
        assert!(drained.is_err());
        assert_eq!(scheduler.pending_jobs(), 1);

        assert_eq!(scheduler.run_until_idle(), 1);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
