#![doc(html_logo_url = "https://www.rust-lang.org/logos/rust-logo-128x128.png")]
#![doc(html_favicon_url = "https://www.rust-lang.org/favicon.ico")]
//! # Actor Runtime
//!
//! A thread-per-actor runtime: define isolated units of state and behaviour,
//! start them on their own workers, and talk to them only through messages.
//!
//! ## Core Concepts
//!
//! - **[`Actor`]**: your state plus the hooks that process messages, one at a
//!   time, on the actor's own worker. No locks are needed for actor state.
//! - **[`ActorRef`]**: a cheap, shareable handle offering `tell`, `ask` and
//!   `stop`. It stays valid after the actor stops but every send then fails
//!   with [`ActorError::ActorDead`].
//! - **[`Future`]**: write-once, read-many result slot bridging the worker and
//!   the caller, with `map` / `filter` / `reduce` / `join` combinators and async
//!   [`Future::wait`].
//! - **[`Proxy`]**: turns attribute reads, writes and method calls into messages,
//!   driven by a per-actor capability table ([`Capabilities`], [`Traversable`]).
//! - **[`Registry`]**: directory of live actors, with lookup by URN or class,
//!   broadcast, and last-in-first-out [`Registry::stop_all`].
//! - **[`Scheduler`]**: the backend plug-point. [`ThreadScheduler`] runs one OS
//!   thread per actor; [`TokioScheduler`] uses a tokio runtime's blocking pool.
//!
//! ## Quick Start
//!
//! ```rust
//! use actor_runtime::{Actor, Context, Registry, ThreadScheduler};
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("negative deposit")]
//! struct NegativeDeposit;
//!
//! struct Account { balance: i64 }
//!
//! impl Actor for Account {
//!     type Message = i64;
//!     type Reply = i64;
//!     type Error = NegativeDeposit;
//!
//!     fn on_receive(&mut self, amount: i64, _ctx: &Context<Self>) -> Result<i64, NegativeDeposit> {
//!         if amount < 0 {
//!             return Err(NegativeDeposit);
//!         }
//!         self.balance += amount;
//!         Ok(self.balance)
//!     }
//! }
//!
//! let registry = Registry::new();
//! let account = Account { balance: 0 }
//!     .start_with(&registry, &ThreadScheduler::default())
//!     .unwrap();
//!
//! assert_eq!(account.ask(10, None).unwrap(), 10);
//! // With a reply-to, the error goes back to the caller and the actor lives on.
//! assert!(account.ask(-1, None).is_err());
//! assert_eq!(account.ask(5, None).unwrap(), 15);
//!
//! registry.stop_all(None);
//! assert!(!account.is_alive());
//! ```
//!
//! ## Failure Semantics
//!
//! - An error with someone waiting on it is returned through that caller's
//!   future.
//! - An error nobody waits for (a failed `tell`) runs [`Actor::on_failure`] and
//!   stops the actor. Other actors are unaffected.
//! - A panic, or an error [`Actor::is_fatal`] accepts, stops the actor and asks
//!   every actor in its registry to stop.
//!
//! There is no supervision or restart: a stopped actor is gone, and starting a
//! new one gives it a new URN.
//!
//! ## Observability
//!
//! See the [`tracing`](mod@self::tracing) module for the logged events and
//! [`setup_tracing`] for a ready-made subscriber.

pub mod actor;
pub mod actor_ref;
pub mod attributes;
pub mod error;
pub mod future;
pub mod message;
pub mod proxy;
pub mod registry;
pub mod scheduler;
pub mod tracing;

mod runtime;

// Re-export core types for convenience
pub use actor::{Actor, Context};
pub use actor_ref::{ActorRef, AnyActorRef};
pub use attributes::{Args, Attribute, Capabilities, Traversable};
pub use error::{ActorError, Result};
pub use future::{get_all, Future};
pub use message::AttrPath;
pub use proxy::{CallableProxy, Member, Proxy};
pub use registry::Registry;
pub use scheduler::{Inbox, Mailbox, Scheduler, ThreadScheduler, ThreadSchedulerBuilder, TokioScheduler};
pub use self::tracing::{setup_tracing, try_setup_tracing};
