//! Event-loop job queue for the remote context
//!
//! Boa hands promise reactions and other deferred work to a `JobExecutor`.
//! The remote context runs one event-loop turn per delivered message: the
//! host delivers the message, then drains this queue until it is empty so that
//! every promise chain started by the turn (script loading, async
//! definitions, response posting) settles before outbound messages are
//! flushed.
//!
//! # Job Types
//!
//! - **PromiseJob**: microtasks, drained completely on every pass
//! - **GenericJob**: macrotasks, one per pass
//!
//! Native async jobs are not produced by the host bindings and are dropped
//! with a warning.

use boa_engine::{
    context::Context,
    job::{GenericJob, Job, JobExecutor, PromiseJob},
    JsResult,
};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Single-threaded job queue owned by one remote context.
pub struct EventLoopJobs {
    /// Queue for promise microtasks (then/catch handlers)
    promise_jobs: RefCell<VecDeque<PromiseJob>>,
    /// Queue for general-purpose jobs
    generic_jobs: RefCell<VecDeque<GenericJob>>,
}

impl EventLoopJobs {
    pub fn new() -> Self {
        Self {
            promise_jobs: RefCell::default(),
            generic_jobs: RefCell::default(),
        }
    }

    /// Returns true if either queue holds work.
    pub fn has_pending_jobs(&self) -> bool {
        !self.promise_jobs.borrow().is_empty() || !self.generic_jobs.borrow().is_empty()
    }

    /// Runs every queued microtask, then at most one macrotask.
    ///
    /// Job failures are logged and do not stop the pass; a failing job has
    /// already rejected its promise on the JavaScript side.
    fn drain_once(&self, context: &mut Context) {
        let jobs = std::mem::take(&mut *self.promise_jobs.borrow_mut());
        for job in jobs {
            if let Err(e) = job.call(context) {
                tracing::error!("Uncaught error in promise job: {e}");
            }
        }

        let generic = self.generic_jobs.borrow_mut().pop_front();
        if let Some(generic) = generic {
            if let Err(err) = generic.call(context) {
                tracing::error!("Uncaught error in generic job: {err}");
            }
        }
    }
}

impl Default for EventLoopJobs {
    fn default() -> Self {
        Self::new()
    }
}

impl JobExecutor for EventLoopJobs {
    fn enqueue_job(self: Rc<Self>, job: Job, _context: &mut Context) {
        match job {
            Job::PromiseJob(job) => self.promise_jobs.borrow_mut().push_back(job),
            Job::GenericJob(g) => self.generic_jobs.borrow_mut().push_back(g),
            _ => {
                tracing::warn!("Unsupported job type enqueued in remote context, ignoring");
            }
        }
    }

    /// Drains both queues until the turn has no remaining work.
    fn run_jobs(self: Rc<Self>, context: &mut Context) -> JsResult<()> {
        while self.has_pending_jobs() {
            self.drain_once(context);
        }
        context.clear_kept_objects();
        Ok(())
    }

    async fn run_jobs_async(self: Rc<Self>, context: &RefCell<&mut Context>) -> JsResult<()>
    where
        Self: Sized,
    {
        self.run_jobs(&mut context.borrow_mut())
    }
}
