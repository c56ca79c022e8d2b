//! # Actor References
//!
//! An [`ActorRef`] is the only way to reach a running actor. It holds the
//! actor's URN, the sending half of its inbox and the shared stopped flag,
//! never the actor itself: the instance belongs to its worker.
//!
//! Refs are cheap to clone, can be shared across threads, and compare equal when
//! they point at the same actor. Once the actor stops, every ref to it is dead
//! for good.
//!
//! [`AnyActorRef`] is the type-erased form kept by the [`Registry`](crate::Registry).

use crate::actor::Actor;
use crate::attributes::{Args, Capabilities};
use crate::error::{ActorError, Result};
use crate::future::Future;
use crate::message::{AttrPath, Envelope};
use crate::proxy::Proxy;
use crate::scheduler::{Mailbox, Scheduler};
use arc_swap::ArcSwap;
use serde_json::Value;
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

struct RefShared<A: Actor> {
    urn: String,
    class_name: &'static str,
    mailbox: Mailbox<Envelope<A>>,
    stopped: AtomicBool,
    capabilities: ArcSwap<Capabilities>,
    slots: ReplySlots<A>,
}

type Factory<T> = Box<dyn Fn() -> Future<T> + Send + Sync>;

/// Creates reply-to futures through the scheduler that started the actor.
pub(crate) struct ReplySlots<A: Actor> {
    reply: Factory<A::Reply>,
    ack: Factory<()>,
    value: Factory<Value>,
}

impl<A: Actor> ReplySlots<A> {
    pub(crate) fn from_scheduler<S: Scheduler>(scheduler: &S) -> Self {
        let reply = scheduler.clone();
        let ack = scheduler.clone();
        let value = scheduler.clone();
        Self {
            reply: Box::new(move || reply.new_future()),
            ack: Box::new(move || ack.new_future()),
            value: Box::new(move || value.new_future()),
        }
    }
}

/// Shareable handle to a running actor.
pub struct ActorRef<A: Actor> {
    shared: Arc<RefShared<A>>,
}

impl<A: Actor> Clone for ActorRef<A> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Short type name of `A`, without module path or generic arguments.
pub(crate) fn class_name_of<A>() -> &'static str {
    let full = std::any::type_name::<A>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or("Unknown")
}

impl<A: Actor> ActorRef<A> {
    pub(crate) fn new(
        mailbox: Mailbox<Envelope<A>>,
        capabilities: Capabilities,
        slots: ReplySlots<A>,
    ) -> Self {
        Self {
            shared: Arc::new(RefShared {
                urn: format!("urn:uuid:{}", Uuid::new_v4()),
                class_name: class_name_of::<A>(),
                mailbox,
                stopped: AtomicBool::new(false),
                capabilities: ArcSwap::from_pointee(capabilities),
                slots,
            }),
        }
    }

    /// Process-unique identifier of the actor, `urn:uuid:<v4>`.
    pub fn urn(&self) -> &str {
        &self.shared.urn
    }

    pub fn class_name(&self) -> &'static str {
        self.shared.class_name
    }

    /// Best-effort liveness: the actor may stop right after this returns `true`.
    pub fn is_alive(&self) -> bool {
        !self.shared.stopped.load(Ordering::Acquire)
    }

    /// Sends a message without waiting for the outcome.
    ///
    /// Fails with [`ActorError::ActorDead`] if the actor has stopped.
    pub fn tell(&self, message: A::Message) -> Result<()> {
        self.send(Envelope::User {
            message,
            reply_to: None,
        })
    }

    /// Sends a message and blocks until the reply arrives or `timeout` elapses.
    ///
    /// A timeout does not retract the message; the actor still handles it.
    pub fn ask(&self, message: A::Message, timeout: Option<Duration>) -> Result<A::Reply> {
        self.ask_future(message).get(timeout)
    }

    /// Sends a message and returns the future of its reply.
    ///
    /// A dead actor yields a future already failed with
    /// [`ActorError::ActorDead`] rather than an immediate error.
    pub fn ask_future(&self, message: A::Message) -> Future<A::Reply> {
        let reply = (self.shared.slots.reply)();
        self.deliver(
            Envelope::User {
                message,
                reply_to: Some(reply.clone()),
            },
            &reply,
        );
        reply
    }

    /// Asks the actor to stop and waits for it.
    ///
    /// Returns `true` once the actor stopped, `false` if it was already dead.
    pub fn stop(&self, timeout: Option<Duration>) -> Result<bool> {
        self.stop_future().get(timeout)
    }

    /// Non-blocking form of [`stop`](Self::stop).
    pub fn stop_future(&self) -> Future<bool> {
        let ack = (self.shared.slots.ack)();
        self.deliver(
            Envelope::Stop {
                reply_to: Some(ack.clone()),
            },
            &ack,
        );
        ack.then(|outcome| match outcome {
            Ok(()) => Ok(true),
            Err(ActorError::ActorDead { .. }) => Ok(false),
            Err(error) => Err(error),
        })
    }

    /// Builds a proxy over the actor's exposed attributes.
    pub fn proxy(&self) -> Result<Proxy<A>> {
        Proxy::new(self.clone())
    }

    /// Type-erased copy of this ref.
    pub fn erase(&self) -> AnyActorRef {
        AnyActorRef {
            inner: Arc::new(self.clone()),
        }
    }

    pub(crate) fn dead(&self) -> ActorError {
        ActorError::ActorDead {
            actor: self.to_string(),
        }
    }

    pub(crate) fn mark_stopped(&self) {
        self.shared.stopped.store(true, Ordering::Release);
    }

    pub(crate) fn capabilities(&self) -> Arc<Capabilities> {
        self.shared.capabilities.load_full()
    }

    pub(crate) fn publish(&self, capabilities: Capabilities) {
        if **self.shared.capabilities.load() != capabilities {
            self.shared.capabilities.store(Arc::new(capabilities));
        }
    }

    pub(crate) fn call(&self, path: AttrPath, args: Args) -> Future<Value> {
        let reply = (self.shared.slots.value)();
        self.deliver(
            Envelope::ProxyCall {
                path,
                args,
                reply_to: Some(reply.clone()),
            },
            &reply,
        );
        reply
    }

    pub(crate) fn call_deferred(&self, path: AttrPath, args: Args) -> Result<()> {
        self.send(Envelope::ProxyCall {
            path,
            args,
            reply_to: None,
        })
    }

    pub(crate) fn get_attr(&self, path: AttrPath) -> Future<Value> {
        let reply = (self.shared.slots.value)();
        self.deliver(
            Envelope::ProxyGet {
                path,
                reply_to: Some(reply.clone()),
            },
            &reply,
        );
        reply
    }

    pub(crate) fn set_attr(&self, path: AttrPath, value: Value) -> Future<()> {
        let reply = (self.shared.slots.ack)();
        self.deliver(
            Envelope::ProxySet {
                path,
                value,
                reply_to: Some(reply.clone()),
            },
            &reply,
        );
        reply
    }

    fn send(&self, envelope: Envelope<A>) -> Result<()> {
        if !self.is_alive() {
            return Err(self.dead());
        }
        self.shared.mailbox.push(envelope).map_err(|_| self.dead())
    }

    // Failing to enqueue fails the reply-to instead of the caller.
    fn deliver<T: Clone + Send + 'static>(&self, envelope: Envelope<A>, reply: &Future<T>) {
        if let Err(error) = self.send(envelope) {
            let _ = reply.fail(error);
        }
    }
}

impl<A: Actor> PartialEq for ActorRef<A> {
    fn eq(&self, other: &Self) -> bool {
        self.shared.urn == other.shared.urn
    }
}

impl<A: Actor> Eq for ActorRef<A> {}

impl<A: Actor> Hash for ActorRef<A> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.shared.urn.hash(state);
    }
}

impl<A: Actor> fmt::Display for ActorRef<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.shared.class_name, self.shared.urn)
    }
}

impl<A: Actor> fmt::Debug for ActorRef<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRef")
            .field("class", &self.shared.class_name)
            .field("urn", &self.shared.urn)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Operations the registry needs from a ref whose actor type it does not know.
trait ErasedRef: Send + Sync {
    fn urn(&self) -> &str;
    fn class_name(&self) -> &'static str;
    fn type_name(&self) -> &'static str;
    fn actor_type(&self) -> TypeId;
    fn is_alive(&self) -> bool;
    fn stop_future(&self) -> Future<bool>;
    /// `Ok(false)` when the message is not of the actor's message type.
    fn tell_any(&self, message: Box<dyn Any + Send>) -> Result<bool>;
    fn as_any(&self) -> &dyn Any;
    fn describe(&self) -> String;
}

impl<A: Actor> ErasedRef for ActorRef<A> {
    fn urn(&self) -> &str {
        ActorRef::urn(self)
    }

    fn class_name(&self) -> &'static str {
        ActorRef::class_name(self)
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<A>()
    }

    fn actor_type(&self) -> TypeId {
        TypeId::of::<A>()
    }

    fn is_alive(&self) -> bool {
        ActorRef::is_alive(self)
    }

    fn stop_future(&self) -> Future<bool> {
        ActorRef::stop_future(self)
    }

    fn tell_any(&self, message: Box<dyn Any + Send>) -> Result<bool> {
        match message.downcast::<A::Message>() {
            Ok(message) => self.tell(*message).map(|()| true),
            Err(_) => Ok(false),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

/// Type-erased [`ActorRef`].
#[derive(Clone)]
pub struct AnyActorRef {
    inner: Arc<dyn ErasedRef>,
}

impl AnyActorRef {
    pub fn urn(&self) -> &str {
        self.inner.urn()
    }

    pub fn class_name(&self) -> &'static str {
        self.inner.class_name()
    }

    /// Fully qualified type name of the actor.
    pub fn type_name(&self) -> &'static str {
        self.inner.type_name()
    }

    pub fn is_alive(&self) -> bool {
        self.inner.is_alive()
    }

    pub fn is<A: Actor>(&self) -> bool {
        self.inner.actor_type() == TypeId::of::<A>()
    }

    /// Recovers the typed ref if the actor is an `A`.
    pub fn downcast<A: Actor>(&self) -> Option<ActorRef<A>> {
        self.inner.as_any().downcast_ref::<ActorRef<A>>().cloned()
    }

    /// Sends `message` if it is of the actor's message type.
    pub fn tell<M: Send + 'static>(&self, message: M) -> Result<()> {
        if self.inner.tell_any(Box::new(message))? {
            Ok(())
        } else {
            Err(ActorError::invalid(format!(
                "{} does not accept {}",
                self.inner.describe(),
                std::any::type_name::<M>()
            )))
        }
    }

    pub(crate) fn offer(&self, message: Box<dyn Any + Send>) -> Result<bool> {
        self.inner.tell_any(message)
    }

    pub fn stop(&self, timeout: Option<Duration>) -> Result<bool> {
        self.inner.stop_future().get(timeout)
    }

    pub fn stop_future(&self) -> Future<bool> {
        self.inner.stop_future()
    }
}

impl<A: Actor> From<ActorRef<A>> for AnyActorRef {
    fn from(actor_ref: ActorRef<A>) -> Self {
        AnyActorRef {
            inner: Arc::new(actor_ref),
        }
    }
}

impl PartialEq for AnyActorRef {
    fn eq(&self, other: &Self) -> bool {
        self.urn() == other.urn()
    }
}

impl Eq for AnyActorRef {}

impl fmt::Display for AnyActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.describe())
    }
}

impl fmt::Debug for AnyActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyActorRef")
            .field("class", &self.class_name())
            .field("urn", &self.urn())
            .field("alive", &self.is_alive())
            .finish()
    }
}
