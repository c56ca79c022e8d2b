//! # Actor Trait
//!
//! The [`Actor`] trait is the contract every actor implements. The runtime
//! owns the message loop; the actor only supplies behaviour through hooks that
//! all run on its own worker, one at a time:
//!
//! - [`Actor::on_start`] before the first message,
//! - [`Actor::on_receive`] for each user message,
//! - [`Actor::on_stop`] after the stop request is handled,
//! - [`Actor::on_failure`] when an error escapes with nobody waiting for it.
//!
//! Every hook receives a [`Context`] holding the actor's own [`ActorRef`] and the
//! [`Registry`] it is registered in. Dependencies are injected at start time
//! through [`Actor::start_with`], not looked up from ambient globals.
//!
//! ```rust
//! use actor_runtime::{Actor, Context, Registry, ThreadScheduler};
//! use std::convert::Infallible;
//!
//! #[derive(Default)]
//! struct Counter { count: u64 }
//!
//! impl Actor for Counter {
//!     type Message = u64;
//!     type Reply = u64;
//!     type Error = Infallible;
//!
//!     fn on_receive(&mut self, by: u64, _ctx: &Context<Self>) -> Result<u64, Infallible> {
//!         self.count += by;
//!         Ok(self.count)
//!     }
//! }
//!
//! let registry = Registry::new();
//! let counter = Counter::default()
//!     .start_with(&registry, &ThreadScheduler::default())
//!     .unwrap();
//! counter.tell(1).unwrap();
//! assert_eq!(counter.ask(2, None).unwrap(), 3);
//! assert!(counter.stop(None).unwrap());
//! ```

use crate::actor_ref::ActorRef;
use crate::attributes::Traversable;
use crate::error::{ActorError, Result};
use crate::proxy::Proxy;
use crate::registry::Registry;
use crate::runtime;
use crate::scheduler::{Scheduler, ThreadScheduler};
use tracing::warn;

/// A sequential unit of state and behaviour.
///
/// # Concurrency
/// An actor instance is moved onto its worker by `start` and is never touched by
/// any other thread afterwards, so its fields need no locking.
///
/// # Deadlocks
/// A blocking `ask` from actor A to actor B while B blocks on an `ask` back into
/// A deadlocks both. Use futures or a self-proxy to schedule follow-up work.
pub trait Actor: Send + Sized + 'static {
    /// Payload of user messages, handled by [`on_receive`](Self::on_receive).
    type Message: Send + 'static;

    /// Answer to an `ask`. `Default` is what unhandled messages reply with.
    type Reply: Clone + Default + Send + 'static;

    /// The error type of this actor's hooks.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Runs once on the worker before the first message. A failure here skips
    /// the message loop and `on_stop`, and goes to `on_failure`.
    fn on_start(&mut self, _ctx: &Context<Self>) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Runs once on the worker after the stop request is handled. The actor is
    /// already unregistered and refuses new messages. Errors are logged.
    fn on_stop(&mut self, _ctx: &Context<Self>) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Runs when processing fails and nobody is waiting for the outcome. The
    /// actor stops afterwards; errors raised here are logged.
    fn on_failure(&mut self, _error: &ActorError, _ctx: &Context<Self>) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Handles one user message.
    fn on_receive(
        &mut self,
        _message: Self::Message,
        ctx: &Context<Self>,
    ) -> Result<Self::Reply, Self::Error> {
        warn!(actor = %ctx.actor_ref(), "Unexpected message received");
        Ok(Self::Reply::default())
    }

    /// Classifies errors that must stop every actor in the registry, not just
    /// this one.
    fn is_fatal(&self, _error: &Self::Error) -> bool {
        false
    }

    /// Exposes this actor to proxies. Return `Some(self)` from actors that
    /// implement [`Traversable`].
    fn attributes(&mut self) -> Option<&mut dyn Traversable> {
        None
    }

    /// Starts the actor on its own thread and registers it in the process-wide
    /// registry.
    fn start(self) -> Result<ActorRef<Self>> {
        self.start_with(Registry::global(), &ThreadScheduler::default())
    }

    /// Starts the actor with an explicit registry and backend.
    ///
    /// The returned ref is registered before the worker starts, so `on_start`
    /// can already find itself in the registry. `on_start` may still be
    /// running when this returns.
    fn start_with<S: Scheduler>(self, registry: &Registry, scheduler: &S) -> Result<ActorRef<Self>> {
        runtime::start(self, registry, scheduler)
    }
}

/// What an actor's hooks can see of the runtime.
pub struct Context<A: Actor> {
    actor_ref: ActorRef<A>,
    registry: Registry,
}

impl<A: Actor> Context<A> {
    pub(crate) fn new(actor_ref: ActorRef<A>, registry: Registry) -> Self {
        Self {
            actor_ref,
            registry,
        }
    }

    /// The actor's own ref.
    pub fn actor_ref(&self) -> &ActorRef<A> {
        &self.actor_ref
    }

    pub fn urn(&self) -> &str {
        self.actor_ref.urn()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// A proxy to this very actor. Calls made through it are appended to the
    /// inbox being drained; do not block on their futures from inside a hook.
    pub fn proxy(&self) -> Result<Proxy<A>> {
        self.actor_ref.proxy()
    }

    /// Asks the actor to stop once the messages already queued are handled.
    pub fn stop_self(&self) {
        drop(self.actor_ref.stop_future());
    }
}
