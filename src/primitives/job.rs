/// Asynchronous job handle for primitive and gradient runs.
///
/// A `Job` owns a worker thread computing one result. Callers poll
/// `status()` or block on `result()`.
use crate::{Error, Result};
use std::any::Any;
use std::fmt;
use std::thread::{self, JoinHandle};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Done,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Running => write!(f, "RUNNING"),
            JobStatus::Done => write!(f, "DONE"),
        }
    }
}

pub struct Job<T> {
    id: Uuid,
    handle: JoinHandle<Result<T>>,
}

impl<T: Send + 'static> Job<T> {
    /// Spawn `work` on a worker thread.
    pub fn submit<F>(work: F) -> Self
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let id = Uuid::new_v4();
        debug!(job_id = %id, "job submitted");
        Self { id, handle: thread::spawn(work) }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> JobStatus {
        if self.handle.is_finished() {
            JobStatus::Done
        } else {
            JobStatus::Running
        }
    }

    /// Block until the worker finishes and return its result.
    pub fn result(self) -> Result<T> {
        let id = self.id;
        let outcome = self
            .handle
            .join()
            .map_err(|payload| Error::Job(format!("job {id} panicked: {}", panic_message(payload.as_ref()))))?;
        debug!(job_id = %id, ok = outcome.is_ok(), "job finished");
        outcome
    }
}

impl<T> fmt::Debug for Job<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("id", &self.id).finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
