//! Inter-thread task queue (`SPEC_FULL.md` §5, §5.1).
//!
//! Three cooperating roles -- MainThread (owns the scene), RenderThread
//! (owns render proxies and RHI objects) and WorkerPool (short tasks with
//! no scene/RHI access) -- hand work to each other through a per-role
//! channel. `Task::Current` executes inline. Each role drains its receiver
//! once per tick before doing its own per-frame work, which is what
//! preserves the change journal's insertion-order guarantee (§5): nothing
//! reorders journal entries relative to the ticks that produced them.

use std::fmt;

/// Which role a posted task should run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskTarget {
    /// Run inline, on whichever role posts it.
    Current,
    Main,
    Render,
    Worker,
}

/// A unit of work posted to a role's queue.
///
/// Deliberately `Box<dyn FnOnce(&mut TaskCtx) + Send>` rather than a
/// generic closure type so heterogeneous tasks can share one channel per
/// role, matching the original's type-erased task queue.
pub struct Task {
    pub target: TaskTarget,
    body: Box<dyn FnOnce(&mut TaskCtx) + Send>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("target", &self.target).finish()
    }
}

impl Task {
    pub fn new(target: TaskTarget, body: impl FnOnce(&mut TaskCtx) + Send + 'static) -> Self {
        Self {
            target,
            body: Box::new(body),
        }
    }

    pub fn run(self, ctx: &mut TaskCtx) {
        (self.body)(ctx);
    }
}

/// What a running task is allowed to touch. `role` tells a task which
/// queue it is currently draining from, so it can assert it never reaches
/// for scene/RHI state from a Worker context (`SPEC_FULL.md` §5: "Workers
/// must never touch the scene or the RHI directly").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskCtx {
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Main,
    Render,
    Worker,
}

/// One role's inbound queue.
pub struct TaskQueue {
    sender: flume::Sender<Task>,
    receiver: flume::Receiver<Task>,
    role: Role,
}

impl TaskQueue {
    #[must_use]
    pub fn new(role: Role) -> Self {
        let (sender, receiver) = flume::unbounded();
        Self {
            sender,
            receiver,
            role,
        }
    }

    #[must_use]
    pub fn sender(&self) -> flume::Sender<Task> {
        self.sender.clone()
    }

    /// Posts a task, or runs it inline if targeted at `Current`.
    pub fn post(&self, task: Task) {
        match task.target {
            TaskTarget::Current => {
                let mut ctx = TaskCtx { role: self.role };
                task.run(&mut ctx);
            }
            _ => {
                let _ = self.sender.send(task);
            }
        }
    }

    /// Drains every task currently queued for this role, in FIFO order.
    /// Called once per tick before the role's own per-frame work runs.
    pub fn drain(&self) {
        let mut ctx = TaskCtx { role: self.role };
        while let Ok(task) = self.receiver.try_recv() {
            task.run(&mut ctx);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn drain_runs_in_fifo_order() {
        let queue = TaskQueue::new(Role::Render);
        let order = Arc::new(parking_lot_mock::Mutex::new(Vec::new()));
        for i in 0..5 {
            let order = order.clone();
            queue.post(Task::new(TaskTarget::Render, move |_ctx| {
                order.lock().push(i);
            }));
        }
        queue.drain();
        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn current_target_runs_inline_without_drain() {
        let queue = TaskQueue::new(Role::Main);
        let counter = Arc::new(AtomicU32::new(0));
        let counter2 = counter.clone();
        queue.post(Task::new(TaskTarget::Current, move |_ctx| {
            counter2.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(queue.is_empty());
    }

    // Minimal in-crate mutex shim so this test module doesn't need to pull
    // in `parking_lot` as a dependency just for one test.
    mod parking_lot_mock {
        use std::cell::UnsafeCell;
        pub struct Mutex<T>(UnsafeCell<T>);
        unsafe impl<T: Send> Sync for Mutex<T> {}
        pub struct Guard<'a, T>(&'a mut T);
        impl<T> Mutex<T> {
            pub fn new(v: T) -> Self {
                Self(UnsafeCell::new(v))
            }
            #[allow(clippy::mut_from_ref)]
            pub fn lock(&self) -> Guard<'_, T> {
                Guard(unsafe { &mut *self.0.get() })
            }
        }
        impl<'a, T> std::ops::Deref for Guard<'a, T> {
            type Target = T;
            fn deref(&self) -> &T {
                self.0
            }
        }
        impl<'a, T> std::ops::DerefMut for Guard<'a, T> {
            fn deref_mut(&mut self) -> &mut T {
                self.0
            }
        }
    }
}
