//! # Schedulers
//!
//! A scheduler is the concurrency backend behind the runtime. It supplies the
//! actor's inbox and the worker that drains it:
//!
//! - [`Scheduler::new_inbox`] creates the FIFO queue (blocking pop, non-blocking
//!   push, length check),
//! - [`Scheduler::new_future`] creates the reply-to slots handed to callers,
//! - [`Scheduler::spawn`] starts a worker running the message loop.
//!
//! [`ThreadScheduler`] is the reference backend: one named OS thread per actor.
//! [`TokioScheduler`] runs the same loop on a tokio runtime's blocking pool, for
//! applications that already own a runtime. Both keep the ordering and blocking
//! contracts identical from the caller's point of view.

use crate::error::{ActorError, Result};
use crate::future::Future;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// Work handed to a scheduler: the actor's whole message loop.
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// Sending half of an inbox. Cheap to clone.
#[derive(Debug)]
pub struct Mailbox<M> {
    sender: mpsc::UnboundedSender<M>,
}

impl<M> Clone for Mailbox<M> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<M> Mailbox<M> {
    /// Non-blocking push. Hands the message back if the inbox is closed.
    pub fn push(&self, message: M) -> std::result::Result<(), M> {
        self.sender.send(message).map_err(|e| e.0)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Receiving half of an actor's inbox, owned by its worker.
#[derive(Debug)]
pub struct Inbox<M> {
    receiver: mpsc::UnboundedReceiver<M>,
}

impl<M> Inbox<M> {
    /// Blocks the worker until the next message arrives. `None` once the inbox
    /// is closed and empty.
    ///
    /// Must not be called from inside an async task.
    pub fn pop(&mut self) -> Option<M> {
        self.receiver.blocking_recv()
    }

    pub fn try_pop(&mut self) -> Option<M> {
        self.receiver.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Refuses further pushes; queued messages stay poppable.
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

/// Creates an unbounded FIFO inbox.
pub fn inbox<M>() -> (Mailbox<M>, Inbox<M>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Mailbox { sender }, Inbox { receiver })
}

/// Concurrency backend plug-point.
///
/// An actor's refs keep a clone of the scheduler that started it, to create
/// reply-to futures for `ask`, `stop` and proxy calls.
pub trait Scheduler: Clone + Send + Sync + 'static {
    /// Creates the inbox of a new actor.
    fn new_inbox<M: Send + 'static>(&self) -> (Mailbox<M>, Inbox<M>) {
        inbox()
    }

    /// Creates a pending future for a reply.
    fn new_future<T: Clone + Send + 'static>(&self) -> Future<T> {
        Future::new()
    }

    /// Starts a worker running `work`. `name` is the actor's class name.
    fn spawn(&self, name: &str, work: Work) -> Result<()>;
}

/// One dedicated OS thread per actor.
#[derive(Debug, Clone)]
pub struct ThreadScheduler {
    name_prefix: String,
    stack_size: Option<usize>,
}

impl Default for ThreadScheduler {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ThreadScheduler {
    pub fn builder() -> ThreadSchedulerBuilder {
        ThreadSchedulerBuilder {
            name_prefix: "actor".to_string(),
            stack_size: None,
        }
    }
}

/// Builder for [`ThreadScheduler`].
#[derive(Debug, Clone)]
pub struct ThreadSchedulerBuilder {
    name_prefix: String,
    stack_size: Option<usize>,
}

impl ThreadSchedulerBuilder {
    /// Worker threads are named `<prefix>-<ActorClass>`.
    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    pub fn build(self) -> ThreadScheduler {
        ThreadScheduler {
            name_prefix: self.name_prefix,
            stack_size: self.stack_size,
        }
    }
}

impl Scheduler for ThreadScheduler {
    fn spawn(&self, name: &str, work: Work) -> Result<()> {
        let mut builder = std::thread::Builder::new().name(format!("{}-{}", self.name_prefix, name));
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }
        builder
            .spawn(work)
            .map(|_| ())
            .map_err(|e| ActorError::Spawn(e.to_string()))
    }
}

/// Runs workers on a tokio runtime's blocking thread pool.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Uses the runtime the caller is running on.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| ActorError::Spawn(e.to_string()))
    }
}

impl Scheduler for TokioScheduler {
    fn spawn(&self, _name: &str, work: Work) -> Result<()> {
        drop(self.handle.spawn_blocking(work));
        Ok(())
    }
}
