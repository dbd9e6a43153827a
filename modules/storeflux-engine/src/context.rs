//! Execution contexts a completion can be resumed on.
//!
//! The caller of `dispatch` passes the context it wants to observe results on
//! alongside the action, instead of the engine assuming a global main thread.

use std::any::Any;
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error};

pub type Job = Box<dyn FnOnce() + Send>;

/// Somewhere a job can be scheduled to run.
pub trait ExecutionContext: Send + Sync + 'static {
    fn execute(&self, job: Job);

    /// Short name for logs.
    fn label(&self) -> &str;
}

/// Runs the job immediately on whatever thread completes the action.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineContext;

impl ExecutionContext for InlineContext {
    fn execute(&self, job: Job) {
        job();
    }

    fn label(&self) -> &str {
        "inline"
    }
}

/// Runs the job as a task on a tokio runtime.
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    handle: Handle,
}

impl RuntimeContext {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Context for the runtime the caller is running on.
    ///
    /// Panics outside a tokio runtime, like [`Handle::current`].
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl ExecutionContext for RuntimeContext {
    fn execute(&self, job: Job) {
        self.handle.spawn(async move { job() });
    }

    fn label(&self) -> &str {
        "runtime"
    }
}

/// A dedicated thread that runs jobs one at a time in submission order.
///
/// This is the "foreground" every completion is expected to land on in an
/// application with a UI-style main loop. A panicking job is logged and does
/// not stop later jobs. The thread exits once the last handle to the context
/// is dropped and its queue is drained.
pub struct ForegroundContext {
    name: String,
    thread_id: ThreadId,
    jobs: mpsc::UnboundedSender<Job>,
}

impl ForegroundContext {
    pub fn spawn(name: impl Into<String>) -> io::Result<Arc<Self>> {
        let name = name.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        let thread_name = name.clone();
        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            while let Some(job) = rx.blocking_recv() {
                if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
                    error!(
                        context = thread_name.as_str(),
                        panic = panic_message(payload.as_ref()),
                        "Foreground job panicked"
                    );
                }
            }
        })?;

        debug!(context = name.as_str(), "Foreground context started");
        Ok(Arc::new(Self {
            thread_id: handle.thread().id(),
            name,
            jobs: tx,
        }))
    }

    /// Whether the calling thread is this context's thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }
}

impl ExecutionContext for ForegroundContext {
    /// Runs the job on the calling thread if the foreground thread is gone,
    /// so a completion is never silently lost.
    fn execute(&self, job: Job) {
        if let Err(mpsc::error::SendError(job)) = self.jobs.send(job) {
            error!(
                context = self.name.as_str(),
                "Foreground context is closed; running job on the calling thread"
            );
            job();
        }
    }

    fn label(&self) -> &str {
        &self.name
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "<non-string panic>"
    }
}

impl std::fmt::Debug for ForegroundContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForegroundContext")
            .field("name", &self.name)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Arc<C> blanket: lets callers keep a typed handle for `is_current` checks
// ---------------------------------------------------------------------------

impl<C: ExecutionContext + ?Sized> ExecutionContext for Arc<C> {
    fn execute(&self, job: Job) {
        (**self).execute(job)
    }

    fn label(&self) -> &str {
        (**self).label()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    #[test]
    fn foreground_jobs_run_on_its_thread_in_order() {
        let context = ForegroundContext::spawn("test-foreground").unwrap();
        let (tx, rx) = std_mpsc::channel();

        for i in 0..5 {
            let tx = tx.clone();
            let foreground = context.clone();
            context.execute(Box::new(move || {
                tx.send((i, foreground.is_current())).unwrap();
            }));
        }

        let seen: Vec<(i32, bool)> = (0..5).map(|_| rx.recv().unwrap()).collect();
        assert_eq!(seen.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
        assert!(seen.iter().all(|(_, on_foreground)| *on_foreground));
        assert!(!context.is_current());
    }

    #[test]
    fn panicking_job_does_not_stop_later_jobs() {
        let context = ForegroundContext::spawn("test-foreground").unwrap();
        let (tx, rx) = std_mpsc::channel();

        context.execute(Box::new(|| panic!("callback blew up")));
        let after = context.clone();
        context.execute(Box::new(move || tx.send(after.is_current()).unwrap()));

        let ran_on_foreground = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(ran_on_foreground);
    }

    #[test]
    fn panic_message_reads_str_and_string_payloads() {
        let from_str: Box<dyn Any + Send> = Box::new("static");
        let from_string: Box<dyn Any + Send> = Box::new("owned".to_string());
        let other: Box<dyn Any + Send> = Box::new(7_u8);

        assert_eq!(panic_message(from_str.as_ref()), "static");
        assert_eq!(panic_message(from_string.as_ref()), "owned");
        assert_eq!(panic_message(other.as_ref()), "<non-string panic>");
    }

    #[test]
    fn inline_context_runs_immediately() {
        let (tx, rx) = std_mpsc::channel();
        InlineContext.execute(Box::new(move || tx.send(thread::current().id()).unwrap()));
        assert_eq!(rx.try_recv().unwrap(), thread::current().id());
    }
}
