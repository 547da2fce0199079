/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 19/10/26
******************************************************************************/

//! Shared dispatch workers.
//!
//! A dispatcher is a single sequential execution context that runs drain
//! jobs for any number of [`ConcurrentOrderQueue`]s. Jobs run one at a time
//! in submission order, so every queue sharing a dispatcher is serialized
//! behind the slowest consumer call. This module provides implementations
//! for both a dedicated OS thread (`ThreadDispatcher`) and a Tokio runtime
//! (`TokioDispatcher`).
//!
//! [`ConcurrentOrderQueue`]: crate::broker::concurrent::ConcurrentOrderQueue

use crate::broker::error::BrokerError;
use crate::broker::queue::lock;
use crossbeam::channel::{self, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};
use tokio::runtime::RuntimeFlavor;
use tracing::{error, info, trace, warn};

/// A unit of work run by a dispatcher
pub type DispatchJob = Box<dyn FnOnce() + Send + 'static>;

/// Trait for the shared worker that runs queue drains off the caller's thread.
pub trait DispatchExecutor: Send + Sync {
    /// Queue a job behind all previously submitted ones.
    ///
    /// Returns immediately; fails with [`BrokerError::DispatcherStopped`]
    /// after [`shutdown`](DispatchExecutor::shutdown).
    fn submit(&self, job: DispatchJob) -> Result<(), BrokerError>;

    /// Block until every submitted job has run, including jobs submitted by
    /// jobs while waiting. Returns immediately when called from the worker
    /// itself or after shutdown.
    ///
    /// Fails with [`BrokerError::Configuration`] when the calling thread
    /// must not block.
    fn wait_idle(&self) -> Result<(), BrokerError>;

    /// Stop accepting jobs. Jobs already queued still run. Idempotent.
    fn shutdown(&self);

    /// Whether jobs are still accepted.
    fn is_running(&self) -> bool;

    /// Number of submitted jobs that have not finished.
    fn pending_jobs(&self) -> usize;
}

enum Message<A> {
    Run(DispatchJob),
    Barrier(A),
}

fn run_job(job: DispatchJob, pending: &AtomicUsize) {
    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
        error!("dispatch job panicked");
    }
    pending.fetch_sub(1, Ordering::SeqCst);
}

/// Dispatcher backed by one named OS thread fed through a crossbeam channel.
pub struct ThreadDispatcher {
    name: String,
    sender: Mutex<Option<Sender<Message<Sender<()>>>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
    pending: Arc<AtomicUsize>,
}

impl ThreadDispatcher {
    /// Spawn the worker thread.
    pub fn new(name: &str) -> Result<Self, BrokerError> {
        let (sender, receiver) = channel::unbounded::<Message<Sender<()>>>();
        let pending = Arc::new(AtomicUsize::new(0));
        let worker_pending = Arc::clone(&pending);
        let thread_name = name.to_string();

        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                info!(worker = %thread_name, "dispatcher started");
                for message in receiver.iter() {
                    match message {
                        Message::Run(job) => run_job(job, &worker_pending),
                        Message::Barrier(ack) => {
                            let _ = ack.send(());
                        }
                    }
                }
                info!(worker = %thread_name, "dispatcher stopped");
            })
            .map_err(|e| {
                BrokerError::Configuration(format!("unable to spawn dispatcher {name}: {e}"))
            })?;

        Ok(Self {
            name: name.to_string(),
            worker_id: handle.thread().id(),
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
            pending,
        })
    }

    /// Name of the worker thread
    pub fn name(&self) -> &str {
        &self.name
    }

    fn on_worker(&self) -> bool {
        thread::current().id() == self.worker_id
    }
}

impl DispatchExecutor for ThreadDispatcher {
    fn submit(&self, job: DispatchJob) -> Result<(), BrokerError> {
        let sender = lock(&self.sender);
        let Some(sender) = sender.as_ref() else {
            return Err(BrokerError::DispatcherStopped);
        };
        self.pending.fetch_add(1, Ordering::SeqCst);
        if sender.send(Message::Run(job)).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(BrokerError::DispatcherStopped);
        }
        trace!(worker = %self.name, "job submitted");
        Ok(())
    }

    fn wait_idle(&self) -> Result<(), BrokerError> {
        if self.on_worker() {
            warn!(worker = %self.name, "wait_idle called from the dispatcher itself");
            return Ok(());
        }
        while self.pending.load(Ordering::SeqCst) > 0 {
            let (ack, done) = channel::bounded(1);
            {
                let sender = lock(&self.sender);
                let Some(sender) = sender.as_ref() else {
                    return Ok(());
                };
                if sender.send(Message::Barrier(ack)).is_err() {
                    return Ok(());
                }
            }
            if done.recv().is_err() {
                return Ok(());
            }
        }
        Ok(())
    }

    fn shutdown(&self) {
        // Dropping the sender ends the worker loop once the channel is empty
        if lock(&self.sender).take().is_none() {
            return;
        }
        info!(worker = %self.name, "dispatcher shutting down");
        let handle = lock(&self.handle).take();
        if let Some(handle) = handle {
            if self.on_worker() {
                return;
            }
            if handle.join().is_err() {
                error!(worker = %self.name, "dispatcher thread panicked");
            }
        }
    }

    fn is_running(&self) -> bool {
        lock(&self.sender).is_some()
    }

    fn pending_jobs(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

impl Drop for ThreadDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Dispatcher backed by a single task on a Tokio runtime.
///
/// The task receives jobs in order and runs each one on the runtime's
/// blocking pool, awaiting it before taking the next, so consumers may block
/// on exchange I/O without stalling the runtime's async workers.
///
/// [`wait_idle`](DispatchExecutor::wait_idle) blocks the current thread.
/// On a multi-thread runtime it moves the calling worker out of the
/// scheduler first; on a current-thread runtime it fails instead.
pub struct TokioDispatcher {
    sender: Mutex<Option<tokio::sync::mpsc::UnboundedSender<Message<tokio::sync::oneshot::Sender<()>>>>>,
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
    pending: Arc<AtomicUsize>,
}

impl TokioDispatcher {
    /// Start the dispatch task on the given runtime.
    pub fn new(runtime: tokio::runtime::Handle) -> Self {
        let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel::<
            Message<tokio::sync::oneshot::Sender<()>>,
        >();
        let pending = Arc::new(AtomicUsize::new(0));
        let worker_pending = Arc::clone(&pending);

        let task = runtime.spawn(async move {
            info!("dispatcher started (Tokio)");
            while let Some(message) = receiver.recv().await {
                match message {
                    Message::Run(job) => {
                        let job_pending = Arc::clone(&worker_pending);
                        let result =
                            tokio::task::spawn_blocking(move || run_job(job, &job_pending)).await;
                        if let Err(e) = result {
                            error!(error = %e, "dispatch job could not complete");
                            worker_pending.fetch_sub(1, Ordering::SeqCst);
                        }
                    }
                    Message::Barrier(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
            info!("dispatcher stopped (Tokio)");
        });

        Self {
            sender: Mutex::new(Some(sender)),
            task: Mutex::new(Some(task)),
            pending,
        }
    }

    /// Send barriers until no job is outstanding. Must run where blocking
    /// is allowed.
    fn await_barriers(&self) {
        while self.pending.load(Ordering::SeqCst) > 0 {
            let (ack, done) = tokio::sync::oneshot::channel();
            {
                let sender = lock(&self.sender);
                let Some(sender) = sender.as_ref() else {
                    return;
                };
                if sender.send(Message::Barrier(ack)).is_err() {
                    return;
                }
            }
            if done.blocking_recv().is_err() {
                return;
            }
        }
    }

    /// Start the dispatch task on the runtime of the current context.
    pub fn current() -> Result<Self, BrokerError> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| BrokerError::Configuration(format!("no Tokio runtime available: {e}")))?;
        Ok(Self::new(handle))
    }
}

impl DispatchExecutor for TokioDispatcher {
    fn submit(&self, job: DispatchJob) -> Result<(), BrokerError> {
        let sender = lock(&self.sender);
        let Some(sender) = sender.as_ref() else {
            return Err(BrokerError::DispatcherStopped);
        };
        self.pending.fetch_add(1, Ordering::SeqCst);
        if sender.send(Message::Run(job)).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(BrokerError::DispatcherStopped);
        }
        Ok(())
    }

    fn wait_idle(&self) -> Result<(), BrokerError> {
        match tokio::runtime::Handle::try_current() {
            Err(_) => {
                self.await_barriers();
                Ok(())
            }
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::CurrentThread => {
                Err(BrokerError::Configuration(
                    "wait_idle would block the current-thread runtime".to_string(),
                ))
            }
            Ok(_) => {
                tokio::task::block_in_place(|| self.await_barriers());
                Ok(())
            }
        }
    }

    fn shutdown(&self) {
        if lock(&self.sender).take().is_none() {
            return;
        }
        info!("dispatcher shutting down (Tokio)");
        // The task exits on its own once the queued jobs have run
        drop(lock(&self.task).take());
    }

    fn is_running(&self) -> bool {
        lock(&self.sender).is_some()
    }

    fn pending_jobs(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

impl Drop for TokioDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
