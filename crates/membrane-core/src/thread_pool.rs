//! Fixed-size worker pool with batch barriers.
//!
//! Workers block on a condition variable until tasks arrive. A batch
//! submitted with [`ThreadPool::enqueue_batch_and_wait`] returns only after
//! every task in it has finished, which gives the mesh its pass-level
//! barrier: writes made by one partition's task are visible to every other
//! partition once the batch returns, never during it.
//!
//! A task that panics is logged and counted as finished; the worker keeps
//! running and the batch still completes.
//!
//! One batch may be in flight at a time. Submitting a second batch while
//! the first is still running is a programming error and is asserted in
//! debug builds.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

/// Unit of work run by a worker.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

struct State {
    queue: VecDeque<Task>,
    batch_in_flight: bool,
    stop: bool,
}

struct Shared {
    state: Mutex<State>,
    task_ready: Condvar,
    task_done: Condvar,
}

/// Worker pool.
///
/// Dropping the pool lets queued tasks finish, then joins every worker.
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Spawn `threads` workers (at least one is requested).
    ///
    /// If the OS refuses to spawn a worker the pool continues with fewer;
    /// a pool with no workers runs batches on the calling thread.
    pub fn new(threads: usize) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                batch_in_flight: false,
                stop: false,
            }),
            task_ready: Condvar::new(),
            task_done: Condvar::new(),
        });

        let mut workers = Vec::with_capacity(threads.max(1));
        for id in 0..threads.max(1) {
            let shared = Arc::clone(&shared);
            match std::thread::Builder::new()
                .name(format!("membrane-worker-{}", id))
                .spawn(move || worker_loop(&shared))
            {
                Ok(handle) => workers.push(handle),
                Err(e) => tracing::error!(worker = id, error = %e, "failed to spawn worker"),
            }
        }

        tracing::debug!(threads = workers.len(), "thread pool started");
        Self { shared, workers }
    }

    /// Number of live workers.
    pub fn num_threads(&self) -> usize {
        self.workers.len()
    }

    /// Queue one task and return immediately.
    pub fn enqueue(&self, task: Task) {
        if self.workers.is_empty() {
            task();
            return;
        }
        self.shared.state.lock().queue.push_back(task);
        self.shared.task_ready.notify_one();
    }

    /// Run every task in `tasks` and block until all have completed.
    pub fn enqueue_batch_and_wait(&self, tasks: Vec<Task>) {
        let total = tasks.len();
        if total == 0 {
            return;
        }
        if self.workers.is_empty() {
            for task in tasks {
                task();
            }
            return;
        }

        let done = Arc::new(AtomicUsize::new(0));
        {
            let mut state = self.shared.state.lock();
            debug_assert!(
                !state.batch_in_flight,
                "batch submitted while another batch is running"
            );
            state.batch_in_flight = true;
            for task in tasks {
                let done = CountOnDrop(Arc::clone(&done));
                state.queue.push_back(Box::new(move || {
                    let _done = done;
                    task();
                }));
            }
        }
        self.shared.task_ready.notify_all();

        let mut state = self.shared.state.lock();
        while done.load(Ordering::Acquire) < total {
            self.shared.task_done.wait(&mut state);
        }
        state.batch_in_flight = false;
    }
}

/// Marks a batch task finished when dropped, including during unwinding.
struct CountOnDrop(Arc<AtomicUsize>);

impl Drop for CountOnDrop {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let task = {
            let mut state = shared.state.lock();
            loop {
                if let Some(task) = state.queue.pop_front() {
                    break Some(task);
                }
                if state.stop {
                    break None;
                }
                shared.task_ready.wait(&mut state);
            }
        };

        let Some(task) = task else {
            return;
        };
        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            tracing::error!("pool task panicked");
        }

        // Taking the lock orders this wakeup after the waiter's counter check.
        let _guard = shared.state.lock();
        shared.task_done.notify_all();
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::new(4)
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shared.state.lock().stop = true;
        self.shared.task_ready.notify_all();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::error!("worker panicked");
            }
        }
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("threads", &self.workers.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn test_batch_waits_for_all_tasks() {
        let pool = ThreadPool::new(4);
        assert_eq!(pool.num_threads(), 4);

        let counter = Arc::new(AtomicUsize::new(0));
        let tasks: Vec<Task> = (0..64)
            .map(|_| {
                let counter = Arc::clone(&counter);
                Box::new(move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                }) as Task
            })
            .collect();
        pool.enqueue_batch_and_wait(tasks);
        assert_eq!(counter.load(Ordering::Relaxed), 64);
    }

    #[test]
    fn test_repeated_batches() {
        let pool = ThreadPool::new(3);
        let data = Arc::new(Mutex::new(vec![0u32; 3]));
        for _ in 0..500 {
            let tasks: Vec<Task> = (0..3)
                .map(|i| {
                    let data = Arc::clone(&data);
                    Box::new(move || data.lock()[i] += 1) as Task
                })
                .collect();
            pool.enqueue_batch_and_wait(tasks);
        }
        assert_eq!(*data.lock(), vec![500, 500, 500]);
    }

    #[test]
    fn test_empty_batch_returns() {
        let pool = ThreadPool::new(2);
        pool.enqueue_batch_and_wait(Vec::new());
    }

    #[test]
    fn test_drop_drains_queue() {
        let flag = Arc::new(AtomicBool::new(false));
        {
            let pool = ThreadPool::new(1);
            let flag = Arc::clone(&flag);
            pool.enqueue(Box::new(move || flag.store(true, Ordering::Release)));
        }
        assert!(flag.load(Ordering::Acquire), "queued task should run before shutdown");
    }

    #[test]
    fn test_panicking_task_does_not_stall_batch() {
        let pool = ThreadPool::new(2);
        let counter = Arc::new(AtomicUsize::new(0));
        let mut tasks: Vec<Task> = (0..8)
            .map(|_| {
                let counter = Arc::clone(&counter);
                Box::new(move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                }) as Task
            })
            .collect();
        tasks.insert(3, Box::new(|| panic!("task failure")));

        pool.enqueue_batch_and_wait(tasks);
        assert_eq!(counter.load(Ordering::Relaxed), 8);

        // workers survive and serve the next batch
        let again = Arc::clone(&counter);
        pool.enqueue_batch_and_wait(vec![Box::new(move || {
            again.fetch_add(1, Ordering::Relaxed);
        })]);
        assert_eq!(counter.load(Ordering::Relaxed), 9);
        assert_eq!(pool.num_threads(), 2);
    }

    #[test]
    fn test_zero_threads_requests_one() {
        let pool = ThreadPool::new(0);
        assert_eq!(pool.num_threads(), 1);
    }
}
