//! Job Scheduler
//!
//! Component updates do not run when their state changes. The render
//! effect's scheduler queues a [`Job`] instead, and the queue is drained
//! later by [`flush_jobs`], so any number of synchronous writes cost one
//! re-render per component.
//!
//! # Algorithm
//!
//! 1. `queue_job` appends a job unless a job with the same ID is already
//!    pending. The first job queued while no flush is pending schedules one
//!    by calling the flush hook (the host's "run soon" primitive).
//!
//! 2. `flush_jobs` takes a snapshot of the pending list and clears it, then
//!    runs the snapshot in order. Jobs queued while the batch runs form the
//!    next batch of the same flush.
//!
//! 3. Batches repeat until the queue is empty. A flush that keeps producing
//!    batches past `scheduler.max_flush_batches` is treated as a recursive
//!    update and abandoned.
//!
//! A job that panics unwinds out of `flush_jobs`; the rest of its batch is
//! skipped. Jobs queued after that batch was taken stay pending.
//!
//! The queue is thread-local, like the rest of the runtime's ambient state.

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::config::{self, diagnostic};
use crate::error::{Error, Result};

/// Unique identifier for a job. Queueing is deduplicated by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(u64);

impl JobId {
    /// Generate a new unique job ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

/// A unit of deferred work. Cloning keeps the ID.
#[derive(Clone)]
pub struct Job {
    id: JobId,
    run: Arc<dyn Fn() + Send + Sync>,
}

impl Job {
    /// Wrap `f` in a job with a fresh ID.
    pub fn new(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            id: JobId::new(),
            run: Arc::new(f),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// Run the job now.
    pub fn run(&self) {
        (self.run)()
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("id", &self.id).finish()
    }
}

/// Called when a flush needs to be scheduled.
pub type FlushHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct SchedulerState {
    queue: Vec<Job>,
    flush_pending: bool,
    flushing: bool,
    hook: Option<FlushHook>,
}

thread_local! {
    static STATE: RefCell<SchedulerState> = RefCell::new(SchedulerState::default());
}

/// Clears the flushing flag even when a job panics, and schedules a new
/// flush for any jobs a panicking batch left behind.
struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        let hook = STATE.with(|state| {
            let mut state = state.borrow_mut();
            state.flushing = false;
            if state.queue.is_empty() || state.flush_pending {
                return None;
            }
            state.flush_pending = true;
            state.hook.clone()
        });
        if let Some(hook) = hook {
            hook();
        }
    }
}

/// Add a job to the pending queue unless it is already there.
pub fn queue_job(job: Job) {
    let hook = STATE.with(|state| {
        let mut state = state.borrow_mut();
        if state.queue.iter().any(|queued| queued.id == job.id) {
            return None;
        }
        state.queue.push(job);
        if state.flushing || state.flush_pending {
            return None;
        }
        state.flush_pending = true;
        state.hook.clone()
    });

    if let Some(hook) = hook {
        hook();
    }
}

/// Remove a job from the pending queue.
pub fn invalidate_job(job: &Job) {
    STATE.with(|state| state.borrow_mut().queue.retain(|queued| queued.id != job.id));
}

/// Whether any job is waiting to run.
pub fn has_pending_jobs() -> bool {
    STATE.with(|state| !state.borrow().queue.is_empty())
}

/// Whether a flush has been scheduled and has not started yet.
pub fn is_flush_pending() -> bool {
    STATE.with(|state| state.borrow().flush_pending)
}

/// Install (or clear) the callback used to schedule a flush.
pub fn set_flush_hook(hook: Option<FlushHook>) {
    STATE.with(|state| state.borrow_mut().hook = hook);
}

/// Run every pending job, including jobs queued while flushing.
///
/// Returns the number of jobs run. Calling it from inside a job does
/// nothing and returns `Ok(0)`.
pub fn flush_jobs() -> Result<usize> {
    let started = STATE.with(|state| {
        let mut state = state.borrow_mut();
        if state.flushing {
            return false;
        }
        state.flushing = true;
        state.flush_pending = false;
        true
    });
    if !started {
        return Ok(0);
    }
    let _guard = FlushGuard;

    let limit = config::current().scheduler.max_flush_batches;
    let mut ran = 0;
    let mut batches = 0;
    loop {
        let batch = STATE.with(|state| std::mem::take(&mut state.borrow_mut().queue));
        if batch.is_empty() {
            return Ok(ran);
        }
        if batches == limit {
            diagnostic!(limit, "maximum recursive updates exceeded, dropping {} jobs", batch.len());
            return Err(Error::FlushLimitExceeded { limit });
        }

        batches += 1;
        debug!(batch = batches, jobs = batch.len(), "flushing jobs");
        for job in batch {
            job.run();
            ran += 1;
        }
    }
}

/// Yield to the async executor once, then flush.
///
/// The queue is per thread, so await this on the thread that queued the
/// work (a current-thread runtime or a `LocalSet`).
pub async fn next_tick() -> Result<usize> {
    tokio::task::yield_now().await;
    flush_jobs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RuntimeConfig, SchedulerConfig};
    use parking_lot::Mutex;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::AtomicUsize;

    fn logging_job(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Job {
        let log = log.clone();
        Job::new(move || log.lock().push(name))
    }

    #[test]
    fn duplicate_jobs_run_once_in_queue_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = logging_job(&log, "a");
        let b = logging_job(&log, "b");

        queue_job(a.clone());
        queue_job(b);
        queue_job(a);

        assert_eq!(flush_jobs().unwrap(), 2);
        assert_eq!(*log.lock(), vec!["a", "b"]);
        assert!(!has_pending_jobs());
    }

    #[test]
    fn jobs_queued_during_flush_run_in_a_later_batch() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let late = logging_job(&log, "late");
        let log_clone = log.clone();
        let first = Job::new(move || {
            log_clone.lock().push("first");
            queue_job(late.clone());
        });

        queue_job(first);
        assert_eq!(flush_jobs().unwrap(), 2);
        assert_eq!(*log.lock(), vec!["first", "late"]);
    }

    #[test]
    fn flush_hook_fires_once_per_pending_flush() {
        let scheduled = Arc::new(AtomicUsize::new(0));
        let scheduled_clone = scheduled.clone();
        set_flush_hook(Some(Arc::new(move || {
            scheduled_clone.fetch_add(1, Ordering::SeqCst);
        })));

        queue_job(Job::new(|| {}));
        queue_job(Job::new(|| {}));
        assert!(is_flush_pending());
        assert_eq!(scheduled.load(Ordering::SeqCst), 1);

        flush_jobs().unwrap();
        assert!(!is_flush_pending());
        queue_job(Job::new(|| {}));
        assert_eq!(scheduled.load(Ordering::SeqCst), 2);

        set_flush_hook(None);
        flush_jobs().unwrap();
    }

    #[test]
    fn nested_flush_is_a_no_op() {
        let inner = Arc::new(Mutex::new(None));
        let inner_clone = inner.clone();
        queue_job(Job::new(move || {
            *inner_clone.lock() = Some(flush_jobs().unwrap());
        }));
        flush_jobs().unwrap();
        assert_eq!(*inner.lock(), Some(0));
    }

    #[test]
    fn invalidated_jobs_do_not_run() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let job = logging_job(&log, "x");
        queue_job(job.clone());
        invalidate_job(&job);
        assert_eq!(flush_jobs().unwrap(), 0);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn self_requeueing_job_hits_the_batch_limit() {
        RuntimeConfig {
            scheduler: SchedulerConfig {
                max_flush_batches: 5,
            },
            ..Default::default()
        }
        .install();

        let slot: Arc<Mutex<Option<Job>>> = Arc::new(Mutex::new(None));
        let slot_clone = slot.clone();
        let job = Job::new(move || {
            if let Some(me) = slot_clone.lock().clone() {
                queue_job(me);
            }
        });
        *slot.lock() = Some(job.clone());

        queue_job(job);
        assert!(matches!(
            flush_jobs(),
            Err(Error::FlushLimitExceeded { limit: 5 })
        ));
        assert!(!has_pending_jobs());

        *slot.lock() = None;
        RuntimeConfig::default().install();
    }

    #[test]
    fn panicking_job_skips_the_rest_of_its_batch() {
        let log = Arc::new(Mutex::new(Vec::new()));
        queue_job(Job::new(|| panic!("render failed")));
        queue_job(logging_job(&log, "skipped"));

        let result = panic::catch_unwind(AssertUnwindSafe(flush_jobs));
        assert!(result.is_err());
        assert!(log.lock().is_empty());

        queue_job(logging_job(&log, "later"));
        assert_eq!(flush_jobs().unwrap(), 1);
        assert_eq!(*log.lock(), vec!["later"]);
    }

    #[test]
    fn jobs_left_by_a_panicking_batch_schedule_a_new_flush() {
        let scheduled = Arc::new(AtomicUsize::new(0));
        let scheduled_clone = scheduled.clone();
        set_flush_hook(Some(Arc::new(move || {
            scheduled_clone.fetch_add(1, Ordering::SeqCst);
        })));

        let log = Arc::new(Mutex::new(Vec::new()));
        let follow_up = logging_job(&log, "follow-up");
        queue_job(Job::new(move || {
            queue_job(follow_up.clone());
            panic!("render failed");
        }));
        assert_eq!(scheduled.load(Ordering::SeqCst), 1);

        let result = panic::catch_unwind(AssertUnwindSafe(flush_jobs));
        assert!(result.is_err());
        assert!(has_pending_jobs());
        assert!(is_flush_pending());
        assert_eq!(scheduled.load(Ordering::SeqCst), 2);

        assert_eq!(flush_jobs().unwrap(), 1);
        assert_eq!(*log.lock(), vec!["follow-up"]);
        set_flush_hook(None);
    }

    #[tokio::test]
    async fn next_tick_flushes_pending_jobs() {
        let log = Arc::new(Mutex::new(Vec::new()));
        queue_job(logging_job(&log, "tick"));
        assert_eq!(next_tick().await.unwrap(), 1);
        assert_eq!(*log.lock(), vec!["tick"]);
    }
}
