// offload.rs

//! Blocking calls on a dedicated thread.
//!
//! The thread owns the resource (an HTTP client, say) and runs the jobs sent
//! to it in order. Callers await the reply, so the single-threaded runtime
//! keeps polling the other tasks while a request is in flight.

use std::thread;

use log::*;
use tokio::sync::{mpsc, oneshot};

use crate::WorkerStopped;

type Job<T> = Box<dyn FnOnce(&mut T) + Send>;

pub struct Offload<T> {
    jobs: mpsc::UnboundedSender<Job<T>>,
}

impl<T: 'static> Offload<T> {
    /// Start the worker. `init` builds the resource on the worker thread, so
    /// `T` itself need not be `Send`.
    pub fn spawn<F>(name: &str, stack_size: usize, init: F) -> anyhow::Result<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job<T>>();
        let thread_name = name.to_string();
        thread::Builder::new()
            .name(name.to_string())
            .stack_size(stack_size)
            .spawn(move || {
                let mut resource = init();
                while let Some(job) = rx.blocking_recv() {
                    job(&mut resource);
                }
                debug!("{thread_name} worker stopped");
            })?;
        Ok(Self { jobs: tx })
    }

    /// Run `f` on the worker and await its result.
    pub async fn run<R, F>(&self, f: F) -> Result<R, WorkerStopped>
    where
        F: FnOnce(&mut T) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply, result) = oneshot::channel();
        self.jobs
            .send(Box::new(move |resource: &mut T| {
                let _ = reply.send(f(resource));
            }))
            .map_err(|_| WorkerStopped)?;
        result.await.map_err(|_| WorkerStopped)
    }
}


// EOF
