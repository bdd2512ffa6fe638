//! Background thread pool for blocking remote calls.
//!
//! Uses work-stealing deques:
//! - Jobs go to a global injector
//! - Idle workers steal from the injector, then from each other
//!
//! Workers never touch editor state. A job answers through its `Responder`
//! and the owning thread picks the result up on its next pump.

use anyhow::{Context, Result};
use crossbeam::deque::{Injector, Stealer, Worker};
use log::trace;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Idle back-off between queue scans
const IDLE_SLEEP: Duration = Duration::from_millis(1);

/// Grace period for joining threads on drop
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Work-stealing pool.
///
/// # Example
/// ```ignore
/// let workers = Workers::new(4)?;
/// workers.execute(move || reply.settle(source.get_files()));
/// ```
pub struct Workers {
    injector: Arc<Injector<Job>>,
    handles: Vec<thread::JoinHandle<()>>,
    in_flight: Arc<AtomicUsize>,
    shutdown: Arc<AtomicBool>,
}

impl std::fmt::Debug for Workers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workers")
            .field("threads", &self.handles.len())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl Workers {
    /// Spawn `num_threads` workers (at least one).
    pub fn new(num_threads: usize) -> Result<Self> {
        let num_threads = num_threads.max(1);
        let injector: Arc<Injector<Job>> = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));
        let in_flight = Arc::new(AtomicUsize::new(0));

        let locals: Vec<Worker<Job>> = (0..num_threads).map(|_| Worker::new_fifo()).collect();
        let stealers: Vec<Stealer<Job>> = locals.iter().map(Worker::stealer).collect();

        let mut handles = Vec::with_capacity(num_threads);
        for (worker_id, local) in locals.into_iter().enumerate() {
            let injector = Arc::clone(&injector);
            let shutdown = Arc::clone(&shutdown);
            let in_flight = Arc::clone(&in_flight);
            let stealers = stealers.clone();

            let handle = thread::Builder::new()
                .name(format!("quill-worker-{}", worker_id))
                .spawn(move || {
                    trace!("Worker {} started", worker_id);
                    loop {
                        let job = local
                            .pop()
                            .or_else(|| injector.steal_batch_and_pop(&local).success())
                            .or_else(|| stealers.iter().find_map(|s| s.steal().success()));

                        match job {
                            Some(job) => {
                                job();
                                in_flight.fetch_sub(1, Ordering::Relaxed);
                            }
                            None if shutdown.load(Ordering::Relaxed) => break,
                            None => thread::sleep(IDLE_SLEEP),
                        }
                    }
                    trace!("Worker {} stopped", worker_id);
                })
                .with_context(|| format!("Failed to spawn worker thread {}", worker_id))?;
            handles.push(handle);
        }

        trace!("Workers initialized: {} threads", num_threads);
        Ok(Self {
            injector,
            handles,
            in_flight,
            shutdown,
        })
    }

    /// Pool sized from settings; `0` means "3/4 of the cores".
    pub fn from_override(override_count: u32) -> Result<Self> {
        let count = match override_count {
            0 => num_cpus::get() * 3 / 4,
            n => n as usize,
        };
        Self::new(count)
    }

    /// Run closure on a worker thread.
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        self.injector.push(Box::new(f));
    }

    /// Jobs queued or running
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn threads(&self) -> usize {
        self.handles.len()
    }
}

impl Drop for Workers {
    fn drop(&mut self) {
        let num_threads = self.handles.len();
        trace!("Workers shutting down ({} threads)...", num_threads);
        self.shutdown.store(true, Ordering::SeqCst);

        let deadline = Instant::now() + SHUTDOWN_GRACE;
        for handle in std::mem::take(&mut self.handles) {
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    trace!("Shutdown timeout reached, detaching remaining workers");
                    return;
                }
                thread::sleep(IDLE_SLEEP);
            }
            let _ = handle.join();
        }
        trace!("All {} workers stopped", num_threads);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_execute_runs_all_jobs() {
        let workers = Workers::new(2).unwrap();
        let (tx, rx) = unbounded();
        for i in 0..16 {
            let tx = tx.clone();
            workers.execute(move || tx.send(i).unwrap());
        }

        let mut got: Vec<i32> = (0..16).map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap()).collect();
        got.sort_unstable();
        assert_eq!(got, (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn test_zero_threads_clamped() {
        let workers = Workers::new(0).unwrap();
        assert_eq!(workers.threads(), 1);
    }
}
