//! # Proxies
//!
//! A [`Proxy`] lets callers use an actor's exposed attributes as if the actor
//! were a local object, while every access is turned into a message:
//!
//! | Access                         | Message        | Result                      |
//! |--------------------------------|----------------|-----------------------------|
//! | [`Proxy::get`]                 | proxy-get      | `Future<Value>`             |
//! | [`Proxy::set`]                 | proxy-set      | blocks, errors surface here |
//! | [`Proxy::call`] / [`CallableProxy::call`] | proxy-call | `Future<Value>`      |
//! | [`CallableProxy::defer`]       | proxy-call     | nothing (fire and forget)   |
//! | [`Proxy::nested`]              | none           | `Proxy` with a longer path  |
//!
//! Reads return futures so callers decide when to wait; writes block so an
//! invalid assignment is reported at the assignment.
//!
//! Each proxy keeps its own snapshot of the capability table for its attribute
//! path. The actor republishes its table after every message, and a proxy that
//! misses a name refreshes its snapshot once before giving up, so attributes
//! added at runtime become reachable.
//!
//! A proxy obtained inside the actor's own hooks (see
//! [`Context::proxy`](crate::Context::proxy)) is the way to schedule follow-up
//! work on the same actor: the call lands at the back of the inbox currently
//! being drained. Blocking on its future from inside a hook deadlocks.

use crate::actor::Actor;
use crate::actor_ref::ActorRef;
use crate::attributes::{Args, Attribute, Capabilities};
use crate::error::{ActorError, Result};
use crate::future::Future;
use crate::message::AttrPath;
use arc_swap::ArcSwap;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Client-side view of an actor, or of a traversable object inside it.
pub struct Proxy<A: Actor> {
    actor_ref: ActorRef<A>,
    path: AttrPath,
    cache: ArcSwap<Capabilities>,
}

/// One classified attribute of a proxy.
pub enum Member<A: Actor> {
    Method(CallableProxy<A>),
    Nested(Proxy<A>),
    /// A pending read of a plain attribute.
    Value(Future<Value>),
}

impl<A: Actor> Proxy<A> {
    pub(crate) fn new(actor_ref: ActorRef<A>) -> Result<Self> {
        Self::at(actor_ref, AttrPath::new())
    }

    fn at(actor_ref: ActorRef<A>, path: AttrPath) -> Result<Self> {
        if !actor_ref.is_alive() {
            return Err(actor_ref.dead());
        }
        let capabilities = actor_ref
            .capabilities()
            .at_path(&path)
            .cloned()
            .unwrap_or_default();
        Ok(Self {
            actor_ref,
            path,
            cache: ArcSwap::from_pointee(capabilities),
        })
    }

    pub fn actor_ref(&self) -> &ActorRef<A> {
        &self.actor_ref
    }

    /// Attribute path from the actor to the object this proxy wraps.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Names of the exposed attributes, freshly read from the actor's table.
    pub fn attribute_names(&self) -> Vec<String> {
        self.refresh();
        self.cache.load().names().map(str::to_string).collect()
    }

    /// Looks up and classifies `name`.
    pub fn member(&self, name: &str) -> Result<Member<A>> {
        Ok(match self.lookup(name)? {
            Attribute::Callable => Member::Method(CallableProxy {
                actor_ref: self.actor_ref.clone(),
                path: self.child_path(name),
            }),
            Attribute::Traversable(_) => Member::Nested(Proxy::at(
                self.actor_ref.clone(),
                self.child_path(name),
            )?),
            Attribute::Plain => Member::Value(self.actor_ref.get_attr(self.child_path(name))),
        })
    }

    /// Reads a plain attribute. The future resolves once the actor handled
    /// the read.
    pub fn get(&self, name: &str) -> Result<Future<Value>> {
        match self.lookup(name)? {
            Attribute::Plain => Ok(self.actor_ref.get_attr(self.child_path(name))),
            Attribute::Callable => Err(ActorError::invalid(format!(
                "{name:?} is a method of {self}, use call()"
            ))),
            Attribute::Traversable(_) => Err(ActorError::invalid(format!(
                "{name:?} is a nested object of {self}, use nested()"
            ))),
        }
    }

    /// Assigns a plain attribute and waits until the actor applied it.
    ///
    /// Only names the actor lists as plain data can be assigned.
    pub fn set<V: Serialize>(&self, name: &str, value: V) -> Result<()> {
        self.set_timeout(name, value, None)
    }

    /// Like [`set`](Self::set) with a bound on the wait.
    pub fn set_timeout<V: Serialize>(
        &self,
        name: &str,
        value: V,
        timeout: Option<Duration>,
    ) -> Result<()> {
        match self.lookup(name)? {
            Attribute::Plain => {}
            Attribute::Callable => {
                return Err(ActorError::invalid(format!(
                    "{name:?} is a method of {self} and cannot be assigned"
                )))
            }
            Attribute::Traversable(_) => {
                return Err(ActorError::invalid(format!(
                    "{name:?} is a nested object of {self} and cannot be assigned"
                )))
            }
        }
        let value = serde_json::to_value(value)?;
        self.actor_ref
            .set_attr(self.child_path(name), value)
            .get(timeout)
    }

    /// Calls a method. Never blocks; wait on the returned future if needed.
    pub fn call(&self, name: &str, args: Args) -> Result<Future<Value>> {
        Ok(self.method(name)?.call(args))
    }

    pub fn method(&self, name: &str) -> Result<CallableProxy<A>> {
        match self.lookup(name)? {
            Attribute::Callable => Ok(CallableProxy {
                actor_ref: self.actor_ref.clone(),
                path: self.child_path(name),
            }),
            _ => Err(ActorError::NotCallable {
                target: self.to_string(),
                name: name.to_string(),
            }),
        }
    }

    /// Proxy for the traversable object `name`.
    pub fn nested(&self, name: &str) -> Result<Proxy<A>> {
        match self.lookup(name)? {
            Attribute::Traversable(_) => Proxy::at(self.actor_ref.clone(), self.child_path(name)),
            _ => Err(ActorError::NotTraversable {
                target: self.to_string(),
                name: name.to_string(),
            }),
        }
    }

    fn lookup(&self, name: &str) -> Result<Attribute> {
        if let Some(attribute) = self.cache.load().get(name) {
            return Ok(attribute.clone());
        }
        trace!(proxy = %self, name, "Attribute miss, refreshing");
        self.refresh();
        self.cache
            .load()
            .get(name)
            .cloned()
            .ok_or_else(|| self.missing(name))
    }

    fn refresh(&self) {
        if let Some(capabilities) = self.actor_ref.capabilities().at_path(&self.path) {
            self.cache.store(Arc::new(capabilities.clone()));
        }
    }

    fn missing(&self, name: &str) -> ActorError {
        ActorError::AttributeNotFound {
            target: self.to_string(),
            name: name.to_string(),
        }
    }

    fn child_path(&self, name: &str) -> AttrPath {
        let mut path = self.path.clone();
        path.push(name.to_string());
        path
    }
}

impl<A: Actor> Clone for Proxy<A> {
    fn clone(&self) -> Self {
        Self {
            actor_ref: self.actor_ref.clone(),
            path: self.path.clone(),
            cache: ArcSwap::new(self.cache.load_full()),
        }
    }
}

impl<A: Actor> PartialEq for Proxy<A> {
    fn eq(&self, other: &Self) -> bool {
        self.actor_ref == other.actor_ref && self.path == other.path
    }
}

impl<A: Actor> fmt::Display for Proxy<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Proxy for {}, path={:?}", self.actor_ref, self.path)
    }
}

impl<A: Actor> fmt::Debug for Proxy<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("actor_ref", &self.actor_ref)
            .field("path", &self.path)
            .finish()
    }
}

/// A method of a proxied object.
pub struct CallableProxy<A: Actor> {
    actor_ref: ActorRef<A>,
    path: AttrPath,
}

impl<A: Actor> CallableProxy<A> {
    /// Sends the call and returns the future of its result.
    pub fn call(&self, args: Args) -> Future<Value> {
        self.actor_ref.call(self.path.clone(), args)
    }

    /// Sends the call without a reply-to. A failure inside the method is an
    /// unhandled failure of the actor.
    pub fn defer(&self, args: Args) -> Result<()> {
        self.actor_ref.call_deferred(self.path.clone(), args)
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }
}

impl<A: Actor> Clone for CallableProxy<A> {
    fn clone(&self) -> Self {
        Self {
            actor_ref: self.actor_ref.clone(),
            path: self.path.clone(),
        }
    }
}

impl<A: Actor> fmt::Debug for CallableProxy<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallableProxy")
            .field("actor_ref", &self.actor_ref)
            .field("path", &self.path)
            .finish()
    }
}
