// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Asynchronous module bodies and their dependency fan-in
//!
//! A body that may suspend gets a queue of its own. Any module depending on
//! it registers a continuation on that queue, and on every queue the body is
//! itself waiting on. Each continuation counts the unresolved queues it sits
//! on and fires once the count drops to zero.
//!
//! Cycles terminate because a queue is `Unknown` while its owner's
//! synchronous part runs. A module re-entered during that window is skipped
//! at registration time, and the importer reads the owner's exports snapshot
//! directly; the snapshot is filled in place later.
//!
//! ```text
//!   A starts ── imports B ── B starts ── imports A (Unknown, skipped)
//!                             B waits on timer, B: Unresolved
//!   A waits on B (and on B's timer), A: Unresolved
//!   timer resolves ─▶ B completes ─▶ B's queue resolves ─▶ A completes
//! ```

mod dependencies;
mod handle;
mod queue;

pub use dependencies::{Dependencies, DependencyValues, DependencyWait};
pub use handle::{AsyncExports, AsyncModuleStatus};
pub use queue::{Continuation, DependencyQueue, QueueStatus};

use crate::error::Result;
use crate::module_system::Module;
use crate::runtime::Scheduler;
use crate::value::Value;

/// What an async module body gets to talk to the resolver
#[derive(Clone)]
pub struct AsyncModuleContext {
    module: Module,
    handle: AsyncExports,
    scheduler: Scheduler,
}

impl AsyncModuleContext {
    /// Declare the values this body needs
    ///
    /// Returns [`Dependencies::Ready`] when nothing has to be waited for.
    /// Otherwise a single continuation is registered on every distinct
    /// unresolved queue behind `deps`, and the returned wait completes when
    /// the last of them resolves.
    pub fn handle_dependencies(&self, deps: Vec<Value>) -> Dependencies {
        let values = DependencyValues::normalize(deps);
        let wait = DependencyWait::new(values.clone(), &self.scheduler);

        let continuation = {
            let wait = wait.clone();
            let handle = self.handle.clone();
            Continuation::new(move || {
                handle.set_awaiting(false);
                wait.complete();
            })
        };

        values.for_each_queue(|queue| {
            if self.handle.register_queue(queue) {
                queue.register(&continuation);
            }
        });

        let pending = continuation.pending();
        tracing::trace!(module = %self.module.id(), deps = values.len(), pending, "registered dependencies");
        if pending == 0 {
            return Dependencies::Ready(values);
        }

        self.handle.set_awaiting(true);
        Dependencies::Pending(wait)
    }

    /// Report completion of the body
    pub fn async_result(&self, result: Result<()>) {
        self.handle.settle(result);
    }

    /// The module being instantiated
    pub fn module(&self) -> &Module {
        &self.module
    }

    /// The module's export handle
    pub fn handle(&self) -> &AsyncExports {
        &self.handle
    }

    /// Current exports snapshot
    pub fn exports(&self) -> Value {
        self.handle.exports()
    }

    /// Scheduler continuations run on
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }
}

/// Run `body` as an asynchronous module body
///
/// The module's exports become an [`AsyncExports`] handle wrapping its
/// current exports object. `has_await` decides whether the module gets a
/// queue; bodies that never suspend skip the mechanism entirely. An error
/// returned from the synchronous part of `body` settles the module as
/// failed.
pub fn async_module<F>(module: &Module, scheduler: &Scheduler, has_await: bool, body: F) -> AsyncExports
where
    F: FnOnce(&AsyncModuleContext) -> Result<()>,
{
    let queue = has_await.then(DependencyQueue::new);
    let handle = AsyncExports::new(
        module.id().to_string(),
        scheduler,
        module.exports(),
        queue.clone(),
    );
    module.attach_async(handle.clone());
    tracing::debug!(module = %module.id(), has_await, "running async module body");

    let ctx = AsyncModuleContext {
        module: module.clone(),
        handle: handle.clone(),
        scheduler: scheduler.clone(),
    };
    if let Err(err) = body(&ctx) {
        ctx.async_result(Err(err));
    }
    if let Some(queue) = &queue {
        queue.finish_sync_phase();
    }
    handle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BundleError;
    use crate::interop::{ExportBinding, publish_as_esm};
    use crate::runtime::Promise;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_fast_path_runs_synchronously() {
        let scheduler = Scheduler::new();
        let module = Module::new("m");
        let seen = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&seen);

        let handle = async_module(&module, &scheduler, true, move |ctx| {
            let deps = ctx.handle_dependencies(vec![Value::from(1), Value::from("two")]);
            assert!(!deps.is_pending());
            let ctx = ctx.clone();
            deps.then(move |values| {
                *slot.lock() = Some(values.all());
                ctx.async_result(Ok(()));
            });
            Ok(())
        });

        assert_eq!(scheduler.pending_jobs(), 0);
        let values = seen.lock().take().unwrap().unwrap();
        assert_eq!(values, vec![Value::Number(1.0), Value::from("two")]);
        assert_eq!(handle.status(), AsyncModuleStatus::Resolved);
    }

    #[test]
    fn test_waits_for_promise() {
        let scheduler = Scheduler::new();
        let module = Module::new("m");
        let timer = Promise::new(&scheduler);
        let dep = timer.clone();

        let handle = async_module(&module, &scheduler, true, move |ctx| {
            let deps = ctx.handle_dependencies(vec![Value::Promise(dep)]);
            assert!(deps.is_pending());
            let ctx = ctx.clone();
            deps.then(move |values| {
                let result = values.get(0).map(|v| {
                    ctx.exports().as_object().unwrap().set("got", v);
                });
                ctx.async_result(result);
            });
            Ok(())
        });

        assert_eq!(handle.status(), AsyncModuleStatus::AwaitingDependencies);
        assert_eq!(handle.queue().unwrap().status(), QueueStatus::Unresolved);

        timer.resolve(Value::from("tick"));
        scheduler.run_until_idle();

        assert_eq!(handle.status(), AsyncModuleStatus::Resolved);
        assert_eq!(handle.exports().get("got"), Value::from("tick"));
        assert!(handle.queue().unwrap().is_resolved());
    }

    #[test]
    fn test_sync_error_rejects_module() {
        let scheduler = Scheduler::new();
        let module = Module::new("m");
        let handle = async_module(&module, &scheduler, true, |_| {
            Err(BundleError::thrown("boom"))
        });
        handle.promise().mark_handled();

        assert_eq!(handle.status(), AsyncModuleStatus::Rejected);
        assert!(handle.queue().unwrap().is_resolved());
        assert_eq!(handle.result().unwrap_err().to_string(), "Uncaught boom");
    }

    #[test]
    fn test_failed_dependency_raises_only_on_read() {
        let scheduler = Scheduler::new();
        let good = Promise::new(&scheduler);
        let bad = Promise::new(&scheduler);
        let reads = Arc::new(Mutex::new(Vec::new()));

        let (g, b, log) = (good.clone(), bad.clone(), Arc::clone(&reads));
        let module = Module::new("consumer");
        let handle = async_module(&module, &scheduler, true, move |ctx| {
            let ctx = ctx.clone();
            ctx.handle_dependencies(vec![Value::Promise(g), Value::Promise(b)])
                .then(move |values| {
                    log.lock().push(values.get(0));
                    log.lock().push(values.get(1));
                    ctx.async_result(Ok(()));
                });
            Ok(())
        });

        good.resolve(Value::from("ok"));
        bad.reject(BundleError::generic("bad dep"));
        scheduler.run_until_idle();

        let reads = reads.lock();
        assert_eq!(reads[0].as_ref().unwrap(), &Value::from("ok"));
        assert_eq!(reads[1].as_ref().unwrap_err().to_string(), "bad dep");
        assert_eq!(handle.status(), AsyncModuleStatus::Resolved);
        assert!(scheduler.check_unhandled_rejections().is_empty());
    }

    #[test]
    fn test_continuation_fires_once_across_queues() {
        let scheduler = Scheduler::new();
        let first = Promise::new(&scheduler);
        let second = Promise::new(&scheduler);
        let fired = Arc::new(AtomicUsize::new(0));

        let (a, b, count) = (first.clone(), second.clone(), Arc::clone(&fired));
        let module = Module::new("m");
        async_module(&module, &scheduler, true, move |ctx| {
            ctx.handle_dependencies(vec![Value::Promise(a), Value::Promise(b)])
                .then(move |_| {
                    count.fetch_add(1, Ordering::SeqCst);
                });
            Ok(())
        });

        second.resolve(Value::Undefined);
        scheduler.run_until_idle();
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        first.resolve(Value::Undefined);
        scheduler.run_until_idle();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dependent_reuses_module_queue() {
        let scheduler = Scheduler::new();
        let timer = Promise::new(&scheduler);
        let dep_timer = timer.clone();
        let dep_module = Module::new("dep");
        let dep = async_module(&dep_module, &scheduler, true, move |ctx| {
            let ctx = ctx.clone();
            ctx.handle_dependencies(vec![Value::Promise(dep_timer)])
                .then(move |_| ctx.async_result(Ok(())));
            Ok(())
        });

        let consumer_module = Module::new("consumer");
        let dep_value = Value::AsyncModule(dep.clone());
        let consumer = async_module(&consumer_module, &scheduler, true, move |ctx| {
            let ctx = ctx.clone();
            ctx.handle_dependencies(vec![dep_value])
                .then(move |_| ctx.async_result(Ok(())));
            Ok(())
        });

        // one continuation on the dependency's own queue
        assert_eq!(dep.queue().unwrap().len(), 1);
        assert_eq!(consumer.status(), AsyncModuleStatus::AwaitingDependencies);

        timer.resolve(Value::Undefined);
        scheduler.run_until_idle();
        assert_eq!(dep.status(), AsyncModuleStatus::Resolved);
        assert_eq!(consumer.status(), AsyncModuleStatus::Resolved);
    }

    #[test]
    fn test_cycle_settles_both_modules() {
        let scheduler = Scheduler::new();
        let timer = Promise::new(&scheduler);
        let a = Module::new("a");
        let b = Module::new("b");
        let b_handle = Arc::new(Mutex::new(None));

        let (sched, b_mod, b_slot, b_timer) =
            (scheduler.clone(), b.clone(), Arc::clone(&b_handle), timer.clone());
        let a_handle = async_module(&a, &scheduler, true, move |a_ctx| {
            publish_as_esm(a_ctx.module(), [("name", ExportBinding::getter(|| Value::from("a")))])?;

            // b starts while a is still in its synchronous part
            let a_value = Value::AsyncModule(a_ctx.handle().clone());
            let b_exports = async_module(&b_mod, &sched, true, move |b_ctx| {
                let peer = Arc::new(Mutex::new(Value::Undefined));
                let read = Arc::clone(&peer);
                publish_as_esm(
                    b_ctx.module(),
                    [("peer", ExportBinding::getter(move || read.lock().get("name")))],
                )?;
                let b_ctx = b_ctx.clone();
                b_ctx
                    .clone()
                    .handle_dependencies(vec![a_value, Value::Promise(b_timer)])
                    .then(move |values| {
                        let result = values.get(0).map(|a_ns| *peer.lock() = a_ns);
                        b_ctx.async_result(result);
                    });
                Ok(())
            });
            *b_slot.lock() = Some(b_exports.clone());

            let a_ctx = a_ctx.clone();
            a_ctx
                .clone()
                .handle_dependencies(vec![Value::AsyncModule(b_exports)])
                .then(move |values| {
                    let result = values.get(0).map(|_| ());
                    a_ctx.async_result(result);
                });
            Ok(())
        });

        let b_handle = b_handle.lock().clone().unwrap();
        assert_eq!(b_handle.status(), AsyncModuleStatus::AwaitingDependencies);
        assert_eq!(a_handle.status(), AsyncModuleStatus::AwaitingDependencies);

        timer.resolve(Value::Undefined);
        scheduler.run_until_idle();

        assert_eq!(a_handle.status(), AsyncModuleStatus::Resolved);
        assert_eq!(b_handle.status(), AsyncModuleStatus::Resolved);
        assert_eq!(b_handle.exports().get("peer"), Value::from("a"));
    }
}
