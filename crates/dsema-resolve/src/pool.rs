//! Fixed-size worker pool used for UFCS candidate scanning.

use crossbeam::channel::{unbounded, Sender};
use std::fmt;
use std::thread;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed set of named threads draining one shared job queue.
///
/// Workers exit once the pool is dropped and the queue is empty. Dropping
/// the pool does not wait for them.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    size: usize,
}

impl WorkerPool {
    /// Starts `size` workers (at least one).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (sender, receiver) = unbounded::<Job>();
        let mut started = 0;
        for id in 0..size {
            let receiver = receiver.clone();
            let spawned = thread::Builder::new().name(format!("dsema-ufcs-{id}")).spawn(move || {
                log::trace!("UFCS worker {id} started");
                while let Ok(job) = receiver.recv() {
                    job();
                }
                log::trace!("UFCS worker {id} exiting");
            });
            match spawned {
                Ok(_) => started += 1,
                Err(err) => log::warn!("could not start UFCS worker {id}: {err}"),
            }
        }
        log::debug!("worker pool started with {started} of {size} threads");
        Self { sender: (started > 0).then_some(sender), size: started }
    }

    /// Queues `job`. Runs it on the calling thread when no worker is
    /// available.
    pub fn execute(&self, job: impl FnOnce() + Send + 'static) {
        let job: Job = Box::new(job);
        let rejected = match &self.sender {
            Some(sender) => match sender.send(job) {
                Ok(()) => return,
                Err(err) => err.into_inner(),
            },
            None => job,
        };
        rejected();
    }

    /// Number of running workers.
    pub fn size(&self) -> usize {
        self.size
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool").field("size", &self.size).finish()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel ends each worker's receive loop.
        self.sender.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::bounded;
    use std::time::Duration;

    #[test]
    fn jobs_run_on_named_workers() {
        let pool = WorkerPool::new(2);
        let (tx, rx) = bounded(1);
        pool.execute(move || {
            let name = thread::current().name().map(str::to_string);
            tx.send(name).ok();
        });
        let name = rx.recv_timeout(Duration::from_secs(5)).ok().flatten();
        assert!(name.is_some_and(|n| n.starts_with("dsema-ufcs-")));
    }

    #[test]
    fn size_is_at_least_one() {
        assert_eq!(WorkerPool::new(0).size(), 1);
    }
}
