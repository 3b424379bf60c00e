//! Worker threads plus an explicitly pumped main-thread queue.
//!
//! # Explanation
//!
//! Work that may run anywhere goes to a [`bevy_tasks::TaskPool`]. Work that
//! must run on the thread owning the renderer, such as creating GPU
//! resources for a loaded raster tile, is queued with
//! [`AsyncSystem::run_in_main_thread`] and only runs when that thread calls
//! [`AsyncSystem::dispatch_main_thread_tasks`], usually once per frame.
//!
//! Futures that several consumers wait on are made shareable with
//! [`AsyncSystem::share`], yielding a [`SharedFuture`].

use async_channel::{Receiver, Sender};
use bevy_log::trace;
use bevy_tasks::{TaskPool, TaskPoolBuilder};
use futures::{
    FutureExt,
    channel::oneshot,
    future::{self, BoxFuture, Shared},
    task::{ArcWake, waker},
};
use std::{
    future::Future,
    pin::pin,
    sync::Arc,
    task::{Context, Poll},
    thread::{self, Thread},
    time::Duration,
};
use thiserror::Error;

/// A future any number of consumers can clone and await.
pub type SharedFuture<T> = Shared<BoxFuture<'static, T>>;

type MainThreadTask = Box<dyn FnOnce() + Send>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncError {
    #[error("the main thread task was dropped before it ran")]
    MainThreadTaskDropped,
}

struct AsyncSystemInner {
    task_pool: TaskPool,
    main_thread_sender: Sender<MainThreadTask>,
    main_thread_receiver: Receiver<MainThreadTask>,
}

/// Cheap to clone, every clone schedules onto the same threads.
#[derive(Clone)]
pub struct AsyncSystem {
    inner: Arc<AsyncSystemInner>,
}

impl Default for AsyncSystem {
    fn default() -> Self {
        let threads = thread::available_parallelism().map_or(2, |threads| threads.get());
        Self::new(threads.saturating_sub(1).max(1))
    }
}

impl AsyncSystem {
    pub fn new(worker_threads: usize) -> Self {
        let task_pool = TaskPoolBuilder::new()
            .num_threads(worker_threads.max(1))
            .thread_name("Tessera Worker".to_string())
            .build();
        let (main_thread_sender, main_thread_receiver) = async_channel::unbounded();

        Self {
            inner: Arc::new(AsyncSystemInner {
                task_pool,
                main_thread_sender,
                main_thread_receiver,
            }),
        }
    }

    pub fn task_pool(&self) -> &TaskPool {
        &self.inner.task_pool
    }

    /// Runs `future` on the worker threads. Dropping the returned future
    /// cancels the work.
    pub fn spawn<T: Send + 'static>(
        &self,
        future: impl Future<Output = T> + Send + 'static,
    ) -> BoxFuture<'static, T> {
        self.inner.task_pool.spawn(future).boxed()
    }

    /// Runs `future` on the worker threads to completion, nobody waits for it.
    pub fn spawn_detached(&self, future: impl Future<Output = ()> + Send + 'static) {
        self.inner.task_pool.spawn(future).detach();
    }

    pub fn run_in_worker_thread<T: Send + 'static>(
        &self,
        function: impl FnOnce() -> T + Send + 'static,
    ) -> BoxFuture<'static, T> {
        self.spawn(async move { function() })
    }

    /// Queues `function` for the next [`Self::dispatch_main_thread_tasks`].
    pub fn run_in_main_thread<T: Send + 'static>(
        &self,
        function: impl FnOnce() -> T + Send + 'static,
    ) -> BoxFuture<'static, Result<T, AsyncError>> {
        let (sender, receiver) = oneshot::channel();
        let task: MainThreadTask = Box::new(move || {
            // The receiver may have been dropped, the result is then unused.
            let _ = sender.send(function());
        });

        // The receiver lives as long as the sender, so this cannot fail.
        if self.inner.main_thread_sender.try_send(task).is_err() {
            return future::ready(Err(AsyncError::MainThreadTaskDropped)).boxed();
        }

        receiver
            .map(|result| result.map_err(|_| AsyncError::MainThreadTaskDropped))
            .boxed()
    }

    /// Runs every queued main thread task, including tasks queued by the
    /// tasks themselves. Returns how many ran.
    pub fn dispatch_main_thread_tasks(&self) -> usize {
        let mut count = 0;
        while self.dispatch_one_main_thread_task() {
            count += 1;
        }
        if count > 0 {
            trace!("Dispatched {count} main thread tasks");
        }
        count
    }

    pub fn dispatch_one_main_thread_task(&self) -> bool {
        match self.inner.main_thread_receiver.try_recv() {
            Ok(task) => {
                task();
                true
            }
            Err(_) => false,
        }
    }

    pub fn has_main_thread_tasks(&self) -> bool {
        !self.inner.main_thread_receiver.is_empty()
    }

    /// Waits for `future` on the calling thread, which acts as the main
    /// thread while waiting.
    pub fn wait_in_main_thread<T>(&self, future: impl Future<Output = T>) -> T {
        struct ThreadWaker(Thread);

        impl ArcWake for ThreadWaker {
            fn wake_by_ref(arc_self: &Arc<Self>) {
                arc_self.0.unpark();
            }
        }

        let waker = waker(Arc::new(ThreadWaker(thread::current())));
        let mut context = Context::from_waker(&waker);
        let mut future = pin!(future);

        loop {
            if let Poll::Ready(value) = future.as_mut().poll(&mut context) {
                return value;
            }
            // Main thread tasks are queued without waking this thread.
            if self.dispatch_main_thread_tasks() == 0 {
                thread::park_timeout(Duration::from_millis(1));
            }
        }
    }

    pub fn create_resolved_future<T: Send + 'static>(value: T) -> BoxFuture<'static, T> {
        future::ready(value).boxed()
    }

    /// Resolves once every future has, keeping their order.
    pub fn all<T: Send + 'static>(
        futures: impl IntoIterator<Item = BoxFuture<'static, T>>,
    ) -> BoxFuture<'static, Vec<T>> {
        future::join_all(futures).boxed()
    }

    pub fn share<T: Clone + Send + Sync + 'static>(future: BoxFuture<'static, T>) -> SharedFuture<T> {
        future.shared()
    }
}
