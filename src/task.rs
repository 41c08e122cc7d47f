//! One-shot concurrent task.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;

use crate::error::SortError;

/// Handle to a unit of work running concurrently on a thread pool.
/// The result is retrieved exactly once by [`Task::wait`].
pub struct Task<T> {
    receiver: mpsc::Receiver<thread::Result<Result<T, SortError>>>,
}

impl<T: Send + 'static> Task<T> {
    /// Starts `f` on the global thread pool and returns immediately.
    pub fn spawn<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<T, SortError> + Send + 'static,
    {
        let (sender, receiver) = mpsc::sync_channel(1);
        rayon::spawn(move || Self::complete(sender, f));

        return Task { receiver };
    }

    /// Starts `f` on the provided thread pool and returns immediately.
    pub fn spawn_in<F>(thread_pool: &rayon::ThreadPool, f: F) -> Self
    where
        F: FnOnce() -> Result<T, SortError> + Send + 'static,
    {
        let (sender, receiver) = mpsc::sync_channel(1);
        thread_pool.spawn(move || Self::complete(sender, f));

        return Task { receiver };
    }

    fn complete<F>(sender: mpsc::SyncSender<thread::Result<Result<T, SortError>>>, f: F)
    where
        F: FnOnce() -> Result<T, SortError>,
    {
        let result = panic::catch_unwind(AssertUnwindSafe(f));
        // the receiver is gone only if the handle was dropped without waiting
        let _ = sender.send(result);
    }

    /// Blocks until the task is completed and returns its result.
    pub fn wait(self) -> Result<T, SortError> {
        match self.receiver.recv() {
            Ok(Ok(result)) => result,
            Ok(Err(payload)) => Err(SortError::TaskPanicked(panic_message(payload.as_ref()))),
            Err(mpsc::RecvError) => Err(SortError::TaskPanicked("task dropped its result".to_string())),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
