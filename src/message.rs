//! # Envelopes
//!
//! Everything placed on an inbox is an [`Envelope`]. User messages travel in
//! the [`Envelope::User`] variant; the other variants are control messages the
//! runtime handles itself. Because the discriminant is the enum tag, a user
//! payload can never be mistaken for a control message.
//!
//! Each variant carries an optional reply-to [`Future`]. `None` means the sender
//! used `tell` and nobody is waiting for the outcome.

use crate::actor::Actor;
use crate::attributes::Args;
use crate::future::Future;
use serde_json::Value;
use std::fmt;

/// Location of an attribute inside an actor: traversable names followed by the
/// attribute itself.
pub type AttrPath = Vec<String>;

pub(crate) enum Envelope<A: Actor> {
    User {
        message: A::Message,
        reply_to: Option<Future<A::Reply>>,
    },
    Stop {
        reply_to: Option<Future<()>>,
    },
    ProxyCall {
        path: AttrPath,
        args: Args,
        reply_to: Option<Future<Value>>,
    },
    ProxyGet {
        path: AttrPath,
        reply_to: Option<Future<Value>>,
    },
    ProxySet {
        path: AttrPath,
        value: Value,
        reply_to: Option<Future<()>>,
    },
}

impl<A: Actor> Envelope<A> {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Envelope::User { .. } => "user",
            Envelope::Stop { .. } => "stop",
            Envelope::ProxyCall { .. } => "proxy-call",
            Envelope::ProxyGet { .. } => "proxy-get",
            Envelope::ProxySet { .. } => "proxy-set",
        }
    }

    pub(crate) fn has_reply(&self) -> bool {
        match self {
            Envelope::User { reply_to, .. } => reply_to.is_some(),
            Envelope::Stop { reply_to } | Envelope::ProxySet { reply_to, .. } => reply_to.is_some(),
            Envelope::ProxyCall { reply_to, .. } | Envelope::ProxyGet { reply_to, .. } => {
                reply_to.is_some()
            }
        }
    }
}

impl<A: Actor> fmt::Debug for Envelope<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Envelope");
        out.field("kind", &self.kind());
        match self {
            Envelope::ProxyCall { path, args, .. } => {
                out.field("path", path).field("args", args);
            }
            Envelope::ProxyGet { path, .. } => {
                out.field("path", path);
            }
            Envelope::ProxySet { path, value, .. } => {
                out.field("path", path).field("value", value);
            }
            Envelope::User { .. } | Envelope::Stop { .. } => {}
        }
        out.field("reply", &self.has_reply()).finish()
    }
}
