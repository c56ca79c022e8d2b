//! # Message Loop
//!
//! This module holds the worker side of an actor: the loop that owns the actor
//! instance and drains its inbox one envelope at a time.
//!
//! ## Lifecycle
//!
//! 1. **Start**: the ref is registered, then the scheduler spawns the worker.
//! 2. **Setup**: `on_start` runs. A failure skips the loop.
//! 3. **Running**: envelopes are popped and dispatched until a stop request is
//!    handled or a failure stops the actor. After each message, before its
//!    reply is released, the actor's capability table is republished for
//!    proxies.
//! 4. **Teardown**: the inbox is closed and drained. Pending stop requests are
//!    acknowledged, every other reply-to fails with `ActorDead`.
//!
//! ## Outcomes
//!
//! - Success: the reply-to, if any, receives the value.
//! - Error with a reply-to: the caller gets the error, the actor keeps running.
//! - Error without a reply-to: `on_failure` runs and the actor stops.
//! - Fatal error or panic: the actor stops and every actor in the registry is
//!   asked to stop.

use crate::actor::{Actor, Context};
use crate::actor_ref::{ActorRef, ReplySlots};
use crate::attributes::{resolve, Args, Traversable};
use crate::error::{ActorError, Result};
use crate::future::{panic_message, Future};
use crate::message::Envelope;
use crate::registry::Registry;
use crate::scheduler::{Inbox, Scheduler};
use serde_json::Value;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info, info_span};

pub(crate) fn start<A: Actor, S: Scheduler>(
    mut actor: A,
    registry: &Registry,
    scheduler: &S,
) -> Result<ActorRef<A>> {
    let (mailbox, inbox) = scheduler.new_inbox::<Envelope<A>>();
    let capabilities = actor
        .attributes()
        .map(|attributes| attributes.capabilities())
        .unwrap_or_default();
    let actor_ref = ActorRef::new(mailbox, capabilities, ReplySlots::from_scheduler(scheduler));
    registry.register(&actor_ref);

    let cell = Cell {
        actor,
        inbox,
        ctx: Context::new(actor_ref.clone(), registry.clone()),
    };
    if let Err(error) = scheduler.spawn(actor_ref.class_name(), Box::new(move || cell.run())) {
        error!(actor = %actor_ref, %error, "Failed to start actor");
        registry.unregister(&actor_ref);
        actor_ref.mark_stopped();
        return Err(error);
    }
    Ok(actor_ref)
}

enum Flow {
    Continue,
    Stop,
}

/// The actor instance together with everything its worker owns.
struct Cell<A: Actor> {
    actor: A,
    inbox: Inbox<Envelope<A>>,
    ctx: Context<A>,
}

impl<A: Actor> Cell<A> {
    fn run(mut self) {
        let span = info_span!(
            "actor",
            actor = self.ctx.actor_ref().class_name(),
            urn = %self.ctx.urn()
        );
        let _entered = span.enter();
        info!("Actor started");

        if self.setup() {
            self.running();
        }
        self.teardown();
    }

    fn setup(&mut self) -> bool {
        let outcome = catch_unwind(AssertUnwindSafe(|| self.actor.on_start(&self.ctx)));
        match self.settle(outcome) {
            Ok(()) => {
                self.publish();
                true
            }
            Err(error) if error.is_fatal() => {
                self.fatal(error, false);
                false
            }
            Err(error) => {
                self.fail(error);
                false
            }
        }
    }

    fn running(&mut self) {
        while self.ctx.actor_ref().is_alive() {
            let Some(envelope) = self.inbox.pop() else {
                break;
            };
            debug!(?envelope, "Processing message");
            if let Flow::Stop = self.handle(envelope) {
                break;
            }
        }
    }

    fn handle(&mut self, envelope: Envelope<A>) -> Flow {
        match envelope {
            Envelope::Stop { reply_to } => {
                self.stop();
                if let Some(reply_to) = reply_to {
                    let _ = reply_to.set(());
                }
                Flow::Stop
            }
            Envelope::User { message, reply_to } => {
                let outcome =
                    catch_unwind(AssertUnwindSafe(|| self.actor.on_receive(message, &self.ctx)));
                let outcome = self.settle(outcome);
                self.reply(outcome, reply_to)
            }
            Envelope::ProxyCall {
                path,
                args,
                reply_to,
            } => {
                let class = self.ctx.actor_ref().class_name();
                let outcome =
                    catch_unwind(AssertUnwindSafe(|| call(&mut self.actor, class, &path, args)));
                let outcome = self.settle_proxy(outcome);
                self.reply(outcome, reply_to)
            }
            Envelope::ProxyGet { path, reply_to } => {
                let class = self.ctx.actor_ref().class_name();
                let outcome =
                    catch_unwind(AssertUnwindSafe(|| get_attr(&mut self.actor, class, &path)));
                let outcome = self.settle_proxy(outcome);
                self.reply(outcome, reply_to)
            }
            Envelope::ProxySet {
                path,
                value,
                reply_to,
            } => {
                let class = self.ctx.actor_ref().class_name();
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    set_attr(&mut self.actor, class, &path, value)
                }));
                let outcome = self.settle_proxy(outcome);
                self.reply(outcome, reply_to)
            }
        }
    }

    fn reply<T: Clone + Send + 'static>(
        &mut self,
        outcome: Result<T>,
        reply_to: Option<Future<T>>,
    ) -> Flow {
        // Publish first so a caller woken by the reply sees attributes the
        // message added.
        self.publish();
        match (outcome, reply_to) {
            (Ok(value), Some(reply_to)) => {
                let _ = reply_to.set(value);
                Flow::Continue
            }
            (Ok(_), None) => Flow::Continue,
            (Err(error), reply_to) if error.is_fatal() => {
                self.fatal(error.clone(), true);
                if let Some(reply_to) = reply_to {
                    let _ = reply_to.fail(error);
                }
                Flow::Stop
            }
            (Err(error), Some(reply_to)) => {
                debug!(%error, "Returning failure to caller");
                let _ = reply_to.fail(error);
                Flow::Continue
            }
            (Err(error), None) => {
                self.fail(error);
                Flow::Stop
            }
        }
    }

    /// Turns a hook outcome into a runtime result.
    fn settle<T>(
        &self,
        outcome: std::thread::Result<std::result::Result<T, A::Error>>,
    ) -> Result<T> {
        let actor = self.ctx.actor_ref().to_string();
        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) if self.actor.is_fatal(&error) => Err(ActorError::Fatal {
                actor,
                source: Arc::new(error),
            }),
            Ok(Err(error)) => Err(ActorError::Handler {
                actor,
                source: Arc::new(error),
            }),
            Err(panic) => Err(panicked(actor, panic)),
        }
    }

    fn settle_proxy<T>(&self, outcome: std::thread::Result<Result<T>>) -> Result<T> {
        let actor = self.ctx.actor_ref().to_string();
        match outcome {
            Ok(result) => result.map_err(|error| error.within(&actor)),
            Err(panic) => Err(panicked(actor, panic)),
        }
    }

    /// Unregisters the actor and refuses further messages.
    fn terminate(&self) {
        self.ctx.registry().unregister(self.ctx.actor_ref());
        self.ctx.actor_ref().mark_stopped();
    }

    fn stop(&mut self) {
        self.terminate();
        let outcome = catch_unwind(AssertUnwindSafe(|| self.actor.on_stop(&self.ctx)));
        if let Err(error) = self.settle(outcome) {
            error!(%error, "Unhandled failure in on_stop");
        }
        info!("Actor stopped");
    }

    fn fail(&mut self, failure: ActorError) {
        error!(error = %failure, "Unhandled failure, stopping actor");
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.actor.on_failure(&failure, &self.ctx)
        }));
        if let Err(error) = self.settle(outcome) {
            error!(%error, "Unhandled failure in on_failure");
        }
        self.terminate();
    }

    fn fatal(&mut self, failure: ActorError, run_on_stop: bool) {
        error!(error = %failure, "Fatal failure, stopping all actors");
        if run_on_stop {
            self.stop();
        } else {
            self.terminate();
        }
        // Waiting here could deadlock on actors that are asking this one.
        drop(self.ctx.registry().stop_all_futures());
    }

    fn teardown(&mut self) {
        self.inbox.close();
        let mut drained = 0usize;
        while let Some(envelope) = self.inbox.pop() {
            drained += 1;
            self.reject(envelope);
        }
        debug!(drained, "Inbox drained");
    }

    fn reject(&self, envelope: Envelope<A>) {
        let dead = || self.ctx.actor_ref().dead();
        match envelope {
            Envelope::Stop { reply_to } => {
                if let Some(reply_to) = reply_to {
                    let _ = reply_to.set(());
                }
            }
            Envelope::User { reply_to, .. } => fail_reply(reply_to, dead()),
            Envelope::ProxyCall { reply_to, .. } | Envelope::ProxyGet { reply_to, .. } => {
                fail_reply(reply_to, dead())
            }
            Envelope::ProxySet { reply_to, .. } => fail_reply(reply_to, dead()),
        }
    }

    fn publish(&mut self) {
        if let Some(attributes) = self.actor.attributes() {
            let capabilities = attributes.capabilities();
            self.ctx.actor_ref().publish(capabilities);
        }
    }
}

fn fail_reply<T: Clone + Send + 'static>(reply_to: Option<Future<T>>, error: ActorError) {
    if let Some(reply_to) = reply_to {
        let _ = reply_to.fail(error);
    }
}

fn panicked(actor: String, panic: Box<dyn Any + Send>) -> ActorError {
    ActorError::Panicked {
        actor,
        message: panic_message(panic.as_ref()),
    }
}

fn target<'a, A: Actor>(
    actor: &'a mut A,
    class: &str,
    parents: &[String],
    name: &str,
) -> Result<&'a mut dyn Traversable> {
    let root = actor
        .attributes()
        .ok_or_else(|| ActorError::AttributeNotFound {
            target: class.to_string(),
            name: name.to_string(),
        })?;
    resolve(root, parents)
}

fn split(path: &[String]) -> Result<(&String, &[String])> {
    path.split_last()
        .ok_or_else(|| ActorError::invalid("empty attribute path"))
}

fn call<A: Actor>(actor: &mut A, class: &str, path: &[String], args: Args) -> Result<Value> {
    let (name, parents) = split(path)?;
    target(actor, class, parents, name)?.call(name, args)
}

fn get_attr<A: Actor>(actor: &mut A, class: &str, path: &[String]) -> Result<Value> {
    let (name, parents) = split(path)?;
    target(actor, class, parents, name)?.get_attr(name)
}

fn set_attr<A: Actor>(actor: &mut A, class: &str, path: &[String], value: Value) -> Result<()> {
    let (name, parents) = split(path)?;
    target(actor, class, parents, name)?.set_attr(name, value)
}
