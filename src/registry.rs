//! # Actor Registry
//!
//! The registry is the directory of live actors. An actor is registered before
//! its worker starts and unregistered as the first step of its termination, so
//! the registry holds exactly the refs of actors that have not stopped yet.
//!
//! Registries are handles: clones share the same table. [`Registry::global`] is
//! the process-wide instance used by [`Actor::start`](crate::Actor::start);
//! tests and embedders create isolated ones with [`Registry::new`] and pass them
//! to [`Actor::start_with`](crate::Actor::start_with).
//!
//! Entries are kept in registration order, which is what lets
//! [`Registry::stop_all`] tear actors down last-in, first-out.

use crate::actor::Actor;
use crate::actor_ref::{ActorRef, AnyActorRef};
use crate::error::Result;
use crate::future::Future;
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info, warn};

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// Thread-safe table of live actors.
#[derive(Clone, Default)]
pub struct Registry {
    refs: Arc<Mutex<Vec<AnyActorRef>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry, created on first use.
    pub fn global() -> &'static Registry {
        GLOBAL.get_or_init(Registry::new)
    }

    /// Adds `actor_ref`. Registering the same actor twice is a no-op.
    pub fn register<A: Actor>(&self, actor_ref: &ActorRef<A>) {
        let mut refs = self.refs.lock();
        if refs.iter().any(|r| r.urn() == actor_ref.urn()) {
            return;
        }
        refs.push(actor_ref.erase());
        debug!(actor = %actor_ref, "Registered");
    }

    /// Removes `actor_ref`. Returns whether it was present.
    pub fn unregister<A: Actor>(&self, actor_ref: &ActorRef<A>) -> bool {
        let mut refs = self.refs.lock();
        let before = refs.len();
        refs.retain(|r| r.urn() != actor_ref.urn());
        let removed = refs.len() != before;
        if removed {
            debug!(actor = %actor_ref, "Unregistered");
        } else {
            warn!(actor = %actor_ref, "Unregister of an actor that is not registered");
        }
        removed
    }

    /// Snapshot of every registered ref, in registration order.
    pub fn get_all(&self) -> Vec<AnyActorRef> {
        self.refs.lock().clone()
    }

    /// Refs of every registered actor of type `A`.
    pub fn get_by_class<A: Actor>(&self) -> Vec<ActorRef<A>> {
        self.refs.lock().iter().filter_map(AnyActorRef::downcast::<A>).collect()
    }

    /// Refs whose class name, or fully qualified type name, equals `name`.
    pub fn get_by_class_name(&self, name: &str) -> Vec<AnyActorRef> {
        self.refs
            .lock()
            .iter()
            .filter(|r| r.class_name() == name || r.type_name() == name)
            .cloned()
            .collect()
    }

    pub fn get_by_urn(&self, urn: &str) -> Option<AnyActorRef> {
        self.refs.lock().iter().find(|r| r.urn() == urn).cloned()
    }

    pub fn len(&self) -> usize {
        self.refs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.lock().is_empty()
    }

    /// Tells `message` to every live actor whose message type is `M`.
    ///
    /// Actors that die meanwhile are skipped. Returns how many actors the
    /// message was delivered to.
    pub fn broadcast<M: Clone + Send + 'static>(&self, message: M) -> usize {
        self.get_all()
            .iter()
            .filter(|r| matches!(r.offer(Box::new(message.clone())), Ok(true)))
            .count()
    }

    /// Tells `message` to every live actor of type `A`.
    pub fn broadcast_to<A: Actor>(&self, message: A::Message) -> usize
    where
        A::Message: Clone,
    {
        self.get_by_class::<A>()
            .iter()
            .filter(|r| r.tell(message.clone()).is_ok())
            .count()
    }

    /// Stops every registered actor, most recently registered first, waiting
    /// for each one before asking the next.
    pub fn stop_all(&self, timeout: Option<Duration>) -> Vec<Result<bool>> {
        let refs = self.get_all();
        info!(count = refs.len(), "Stopping all actors");
        refs.iter().rev().map(|r| r.stop(timeout)).collect()
    }

    /// Sends a stop request to every registered actor, most recently registered
    /// first, without waiting.
    pub fn stop_all_futures(&self) -> Vec<Future<bool>> {
        let refs = self.get_all();
        debug!(count = refs.len(), "Requesting stop of all actors");
        refs.iter().rev().map(AnyActorRef::stop_future).collect()
    }

    /// Stops everything and empties the table.
    pub fn clear(&self) {
        for result in self.stop_all(None) {
            if let Err(error) = result {
                warn!(%error, "Actor failed to stop cleanly");
            }
        }
        self.refs.lock().clear();
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("actors", &self.len()).finish()
    }
}
