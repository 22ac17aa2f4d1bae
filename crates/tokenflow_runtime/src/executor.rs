//! Single-threaded flow executor
//!
//! Flows are ordinary futures that await manager completions. The
//! [`Choreographer`] polls them once per frame, after the manager has
//! advanced simulated time, and keeps polling until every task is waiting on
//! something the next frame will deliver.

use futures::task::{waker, ArcWake};
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

/// Upper bound on polling passes per `run_until_stalled`, guarding against a
/// task that wakes itself forever
const MAX_PASSES: usize = 1024;

/// Local task pool for token flows
///
/// Cloning yields another handle onto the same pool, so flows can spawn
/// further flows. Unlike `futures::executor::LocalPool`, the pool can count
/// and drop unfinished flows (see [`pending`](Self::pending) and
/// [`clear`](Self::clear)).
#[derive(Clone, Default)]
pub struct Choreographer {
    inner: Rc<RefCell<ChoreographerInner>>,
}

#[derive(Default)]
struct ChoreographerInner {
    /// Tasks not yet finished, in spawn order
    tasks: Vec<Task>,
    spawned: u64,
}

struct Task {
    future: Pin<Box<dyn Future<Output = ()> + 'static>>,
    flag: Arc<WakeFlag>,
}

/// Set by the waker, cleared when the task is polled
struct WakeFlag(AtomicBool);

impl ArcWake for WakeFlag {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.0.store(true, Ordering::Release);
    }
}

impl Choreographer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a fire-and-forget flow. It is first polled by the next
    /// [`run_until_stalled`](Self::run_until_stalled).
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + 'static,
    {
        let task = Task {
            future: Box::pin(future),
            flag: Arc::new(WakeFlag(AtomicBool::new(true))),
        };
        let mut inner = self.inner.borrow_mut();
        inner.spawned += 1;
        inner.tasks.push(task);
    }

    /// Spawn a flow and return a handle to its result
    pub fn spawn_with_handle<F, T>(&self, future: F) -> FlowHandle<T>
    where
        F: Future<Output = T> + 'static,
        T: 'static,
    {
        let result = Rc::new(RefCell::new(None));
        let result_clone = result.clone();

        self.spawn(async move {
            let value = future.await;
            *result_clone.borrow_mut() = Some(value);
        });

        FlowHandle { result }
    }

    /// Poll woken tasks until none are woken.
    ///
    /// Returns the number of tasks that finished.
    pub fn run_until_stalled(&self) -> usize {
        let mut finished = 0;

        for _ in 0..MAX_PASSES {
            let woken: Vec<Task> = {
                let mut inner = self.inner.borrow_mut();
                let (woken, waiting): (Vec<Task>, Vec<Task>) = std::mem::take(&mut inner.tasks)
                    .into_iter()
                    .partition(|task| task.flag.0.swap(false, Ordering::AcqRel));
                inner.tasks = waiting;
                woken
            };

            if woken.is_empty() {
                return finished;
            }

            for mut task in woken {
                let task_waker = waker(task.flag.clone());
                let mut cx = Context::from_waker(&task_waker);
                match task.future.as_mut().poll(&mut cx) {
                    Poll::Ready(()) => finished += 1,
                    Poll::Pending => self.inner.borrow_mut().tasks.push(task),
                }
            }
        }

        tracing::warn!("Choreographer: still busy after {MAX_PASSES} passes, yielding to the next frame");
        finished
    }

    /// Number of unfinished tasks
    pub fn pending(&self) -> usize {
        self.inner.borrow().tasks.len()
    }

    pub fn has_pending(&self) -> bool {
        self.pending() > 0
    }

    /// Total tasks ever spawned
    pub fn spawned(&self) -> u64 {
        self.inner.borrow().spawned
    }

    /// Drop every unfinished task
    pub fn clear(&self) {
        let tasks = std::mem::take(&mut self.inner.borrow_mut().tasks);
        // Dropping a task may drop handles that touch the pool again.
        drop(tasks);
    }
}

/// Handle for reading a spawned flow's result
pub struct FlowHandle<T> {
    result: Rc<RefCell<Option<T>>>,
}

impl<T> FlowHandle<T> {
    /// Take the result if the flow has finished
    pub fn try_get(&self) -> Option<T> {
        self.result.borrow_mut().take()
    }

    /// Check if the result is ready
    pub fn is_ready(&self) -> bool {
        self.result.borrow().is_some()
    }
}
