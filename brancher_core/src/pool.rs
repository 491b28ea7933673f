use crate::backend::{BackendError, SymbolicBackend};
use crate::cancel::CancellationToken;
use crate::task::ExplorationTask;
use crate::worker::{ExploreError, ExploreStatus, Explorer};
use crossbeam_channel::{Receiver, RecvTimeoutError, at, never, select};
use log::{debug, error, info, warn};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Totals for one [`WorkerPool::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolReport {
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub results_emitted: usize,
    pub budget_expired: bool,
}

#[derive(Debug, Default)]
struct Counters {
    completed: AtomicUsize,
    failed: AtomicUsize,
    cancelled: AtomicUsize,
    results_emitted: AtomicUsize,
    budget_expired: AtomicBool,
}

impl Counters {
    fn report(&self) -> PoolReport {
        PoolReport {
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            cancelled: self.cancelled.load(Ordering::SeqCst),
            results_emitted: self.results_emitted.load(Ordering::SeqCst),
            budget_expired: self.budget_expired.load(Ordering::SeqCst),
        }
    }
}

/// A fixed number of workers draining a task queue under a global time budget.
///
/// When the budget expires the pool stops dequeuing and raises the run's
/// cancellation token; in-flight tasks stop at their next depth checkpoint.
/// Every run gets its own budget, so a pool can be run again after an expiry.
#[derive(Debug)]
pub struct WorkerPool {
    threads: usize,
    budget: Duration,
}

impl WorkerPool {
    pub fn new(threads: usize, budget: Duration) -> Self {
        Self {
            threads: threads.max(1),
            budget,
        }
    }

    /// Runs until the task queue is disconnected and drained or the budget expires.
    pub fn run<B: SymbolicBackend>(
        &self,
        explorer: &Explorer<B>,
        tasks: Receiver<ExplorationTask>,
    ) -> PoolReport {
        self.run_until(explorer, tasks, &CancellationToken::new())
    }

    /// Like [`WorkerPool::run`], also stopping once `cancel` is raised. Budget
    /// expiry raises `cancel` as well.
    pub fn run_until<B: SymbolicBackend>(
        &self,
        explorer: &Explorer<B>,
        tasks: Receiver<ExplorationTask>,
        cancel: &CancellationToken,
    ) -> PoolReport {
        let counters = Counters::default();
        let deadline = Instant::now().checked_add(self.budget);
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(0);
        info!(
            "Starting {} exploration worker(s) with a time budget of {:?}",
            self.threads, self.budget
        );

        thread::scope(|scope| {
            let counters = &counters;
            let tasks = &tasks;

            let timer = match deadline {
                Some(deadline) => at(deadline),
                None => never(),
            };
            let watchdog = scope.spawn(move || {
                select! {
                    recv(done_rx) -> _ => {},
                    recv(timer) -> _ => self.expire(cancel, counters),
                }
            });

            let workers: Vec<_> = (0..self.threads)
                .map(|id| {
                    scope.spawn(move || self.work(id, explorer, tasks, deadline, cancel, counters))
                })
                .collect();
            for worker in workers {
                if worker.join().is_err() {
                    error!("Exploration worker terminated abnormally");
                }
            }
            drop(done_tx);
            if watchdog.join().is_err() {
                error!("Budget watchdog terminated abnormally");
            }
        });

        let report = counters.report();
        info!(
            "Exploration finished: {} completed, {} failed, {} cancelled, {} result(s)",
            report.completed, report.failed, report.cancelled, report.results_emitted
        );
        report
    }

    fn expire(&self, cancel: &CancellationToken, counters: &Counters) {
        if !counters.budget_expired.swap(true, Ordering::SeqCst) {
            warn!(
                "Global time budget of {:?} expired, stopping workers",
                self.budget
            );
        }
        cancel.cancel();
    }

    fn work<B: SymbolicBackend>(
        &self,
        id: usize,
        explorer: &Explorer<B>,
        tasks: &Receiver<ExplorationTask>,
        deadline: Option<Instant>,
        cancel: &CancellationToken,
        counters: &Counters,
    ) {
        debug!("Worker {} started", id);
        while !cancel.is_cancelled() {
            let received = match deadline {
                Some(deadline) => tasks.recv_deadline(deadline),
                None => tasks.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            let task = match received {
                Ok(task) => Arc::new(task),
                Err(RecvTimeoutError::Timeout) => {
                    self.expire(cancel, counters);
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            };
            if cancel.is_cancelled() {
                debug!(
                    "Worker {} dropping test case {} after cancellation",
                    id, task.test_case
                );
                counters.cancelled.fetch_add(1, Ordering::SeqCst);
                break;
            }

            let start_depth = task.start_depth;
            let explored = catch_unwind(AssertUnwindSafe(|| {
                explorer.explore(Arc::clone(&task), start_depth, cancel)
            }))
            .unwrap_or_else(|payload| Err(BackendError::Panicked(panic_message(payload)).into()));

            match explored {
                Ok(outcome) => {
                    counters
                        .results_emitted
                        .fetch_add(outcome.emitted, Ordering::SeqCst);
                    let counter = match outcome.status {
                        ExploreStatus::Completed => &counters.completed,
                        ExploreStatus::Cancelled => &counters.cancelled,
                    };
                    counter.fetch_add(1, Ordering::SeqCst);
                }
                Err(ExploreError::ResultQueueClosed) => {
                    error!(
                        "Result queue closed while exploring test case {}, worker {} stopping",
                        task.test_case, id
                    );
                    counters.failed.fetch_add(1, Ordering::SeqCst);
                    break;
                }
                Err(e) => {
                    error!(
                        "Unexpected error raised while exploring test case {}: {}",
                        task.test_case, e
                    );
                    counters.failed.fetch_add(1, Ordering::SeqCst);
                }
            }
        }
        debug!("Worker {} stopped", id);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic type".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ExplorationResult;
    use crate::testing::{MockBackend, MockState, task};
    use crossbeam_channel::{Sender, bounded, unbounded};
    use test_log::test;

    fn feed(names: &[&str]) -> Receiver<ExplorationTask> {
        let (tx, rx): (Sender<ExplorationTask>, _) = unbounded();
        for name in names {
            tx.send((*task(name, 0)).clone()).unwrap();
        }
        rx
    }

    #[test]
    fn drains_every_task_across_workers() {
        let backend = MockBackend::new(3);
        let (results_tx, results_rx) = unbounded::<ExplorationResult<MockState>>();
        let explorer = Explorer::new(backend.clone(), 10, results_tx);
        let pool = WorkerPool::new(3, Duration::from_secs(60));

        let report = pool.run(&explorer, feed(&["T0", "T1", "T2", "T3", "T4", "T5"]));

        assert_eq!(report.completed, 6);
        assert_eq!(report.failed, 0);
        assert_eq!(report.results_emitted, 18);
        assert!(!report.budget_expired);
        assert_eq!(results_rx.try_iter().count(), 18);
        assert_eq!(backend.opened(), 6);
        assert_eq!(backend.released(), 6);
    }

    #[test]
    fn backend_fault_does_not_stop_the_worker() {
        let backend = MockBackend::new(3).with_fault("Broken");
        let (results_tx, results_rx) = unbounded();
        let explorer = Explorer::new(backend.clone(), 10, results_tx);
        let pool = WorkerPool::new(1, Duration::from_secs(60));

        let report = pool.run(&explorer, feed(&["Broken", "T1"]));

        assert_eq!(report.failed, 1);
        assert_eq!(report.completed, 1);
        assert_eq!(results_rx.try_iter().count(), 3);
        assert_eq!(backend.rerun_depths("T1"), vec![0, 1, 2]);
    }

    #[test]
    fn backend_panic_is_contained_to_its_task() {
        let backend = MockBackend::new(2).with_panic("Boom");
        let (results_tx, results_rx) = unbounded();
        let explorer = Explorer::new(backend.clone(), 10, results_tx);
        let pool = WorkerPool::new(1, Duration::from_secs(60));

        let report = pool.run(&explorer, feed(&["Boom", "T1"]));

        assert_eq!(report.failed, 1);
        assert_eq!(report.completed, 1);
        assert_eq!(results_rx.try_iter().count(), 2);
        assert_eq!(backend.released(), 2);
    }

    #[test]
    fn budget_expiry_cancels_in_flight_tasks() {
        let backend = MockBackend::new(50).with_rerun_delay(Duration::from_millis(20));
        let (results_tx, results_rx) = unbounded();
        let explorer = Explorer::new(backend.clone(), 100, results_tx);
        let pool = WorkerPool::new(1, Duration::from_millis(150));

        let started = Instant::now();
        let report = pool.run(&explorer, feed(&["T0", "T1", "T2"]));

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(report.budget_expired);
        assert_eq!(report.cancelled, 1);
        assert_eq!(report.completed, 0);
        assert_eq!(backend.opened(), 1);
        assert!(backend.rerun_depths("T0").len() < 50);
        assert_eq!(results_rx.try_iter().count(), report.results_emitted);
    }

    #[test]
    fn bounded_result_queue_applies_backpressure_without_losing_results() {
        let backend = MockBackend::new(4);
        let (results_tx, results_rx) = bounded::<ExplorationResult<MockState>>(1);
        let explorer = Explorer::new(backend, 10, results_tx);
        let pool = WorkerPool::new(2, Duration::from_secs(60));

        let consumer = thread::spawn(move || results_rx.iter().count());
        let report = pool.run(&explorer, feed(&["T0", "T1", "T2"]));
        drop(explorer);

        assert_eq!(consumer.join().unwrap(), 12);
        assert_eq!(report.results_emitted, 12);
    }

    #[test]
    fn external_cancellation_stops_dequeuing() {
        let backend = MockBackend::new(3);
        let (results_tx, _results_rx) = unbounded();
        let explorer = Explorer::new(backend.clone(), 10, results_tx);
        let pool = WorkerPool::new(2, Duration::from_secs(60));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = pool.run_until(&explorer, feed(&["T0", "T1"]), &cancel);

        assert_eq!(report, PoolReport::default());
        assert_eq!(backend.opened(), 0);
    }

    #[test]
    fn task_dequeued_after_cancellation_is_counted() {
        let backend = MockBackend::new(3);
        let (results_tx, _results_rx) = unbounded();
        let explorer = Explorer::new(backend.clone(), 10, results_tx);
        let pool = WorkerPool::new(1, Duration::from_secs(60));
        let cancel = CancellationToken::new();
        let (tx, rx) = unbounded();

        let late = {
            let cancel = cancel.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                cancel.cancel();
                tx.send((*task("T0", 0)).clone()).unwrap();
            })
        };
        let report = pool.run_until(&explorer, rx, &cancel);
        late.join().unwrap();

        assert_eq!(report.cancelled, 1);
        assert_eq!(report.completed, 0);
        assert_eq!(backend.opened(), 0);
    }

    #[test]
    fn pool_runs_again_after_its_budget_expired() {
        let backend = MockBackend::new(3);
        let (results_tx, _results_rx) = unbounded();
        let explorer = Explorer::new(backend.clone(), 2, results_tx);
        let pool = WorkerPool::new(1, Duration::from_millis(100));
        let (_idle_tx, idle_rx) = unbounded::<ExplorationTask>();

        let first = pool.run(&explorer, idle_rx);
        assert!(first.budget_expired);

        let second = pool.run(&explorer, feed(&["T0"]));
        assert!(!second.budget_expired);
        assert_eq!(second.completed, 1);
        assert_eq!(backend.rerun_depths("T0"), vec![0, 1]);
    }
}
