//! # Futures
//!
//! A [`Future`] is a write-once, read-many slot that carries the outcome of a
//! request from the actor's worker back to whoever is waiting for it.
//!
//! The outcome is stored as a `Result<T, ActorError>`; [`Future::get`] performs
//! the unwrap at the boundary, so an error raised inside the actor is returned
//! to the caller with its original source attached.
//!
//! Blocking readers park on a condition variable, async readers wait on a tokio
//! [`Notify`]. Completion callbacks ([`Future::on_complete`]) power every
//! combinator, so a derived future is fulfilled by whichever thread fulfils its
//! source and never needs a helper thread.
//!
//! ```rust
//! use actor_runtime::Future;
//!
//! let f = Future::new();
//! let g = f.map(|v: i32| v + 10);
//! f.set(30).unwrap();
//! assert_eq!(g.get(None).unwrap(), 40);
//! ```

use crate::error::{ActorError, Result};
use parking_lot::{Condvar, Mutex};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::error;

type Callback<T> = Box<dyn FnOnce(Result<T>) + Send>;

struct State<T> {
    outcome: Option<Result<T>>,
    callbacks: Vec<Callback<T>>,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    ready: Condvar,
    notify: Notify,
}

/// Single-assignment container for an eventual value or error.
pub struct Future<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ready = self.shared.state.lock().outcome.is_some();
        f.debug_struct("Future").field("ready", &ready).finish()
    }
}

impl<T: Clone + Send + 'static> Default for Future<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Future<T> {
    /// Creates a pending future.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    outcome: None,
                    callbacks: Vec::new(),
                }),
                ready: Condvar::new(),
                notify: Notify::new(),
            }),
        }
    }

    /// Creates a future that is already fulfilled with `value`.
    pub fn ready(value: T) -> Self {
        let future = Self::new();
        future.shared.state.lock().outcome = Some(Ok(value));
        future
    }

    /// Creates a future that is already fulfilled with `error`.
    pub fn failed(error: ActorError) -> Self {
        let future = Self::new();
        future.shared.state.lock().outcome = Some(Err(error));
        future
    }

    /// Fulfils the future with a value.
    ///
    /// Fails with [`ActorError::AlreadyFulfilled`] if an outcome is already stored.
    pub fn set(&self, value: T) -> Result<()> {
        self.complete(Ok(value))
    }

    /// Fulfils the future with an error; readers get it back from [`get`](Self::get).
    pub fn fail(&self, error: ActorError) -> Result<()> {
        self.complete(Err(error))
    }

    /// Stores `outcome`, wakes every reader and runs the registered callbacks.
    pub fn complete(&self, outcome: Result<T>) -> Result<()> {
        let callbacks = {
            let mut state = self.shared.state.lock();
            if state.outcome.is_some() {
                return Err(ActorError::AlreadyFulfilled);
            }
            state.outcome = Some(outcome.clone());
            std::mem::take(&mut state.callbacks)
        };
        self.shared.ready.notify_all();
        self.shared.notify.notify_waiters();
        for callback in callbacks {
            let outcome = outcome.clone();
            // Callbacks run on the fulfilling thread, usually an actor's worker.
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(outcome))) {
                error!(
                    message = %panic_message(panic.as_ref()),
                    "Completion callback panicked"
                );
            }
        }
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.shared.state.lock().outcome.is_some()
    }

    /// Blocks until the future is fulfilled and returns its outcome.
    ///
    /// With `Some(timeout)` the wait is bounded and fails with
    /// [`ActorError::Timeout`]. Reads after fulfilment return immediately with
    /// the same outcome.
    pub fn get(&self, timeout: Option<Duration>) -> Result<T> {
        // A deadline past what `Instant` can represent is no deadline at all.
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut state = self.shared.state.lock();
        loop {
            if let Some(outcome) = &state.outcome {
                return outcome.clone();
            }
            match (deadline, timeout) {
                (Some(deadline), Some(timeout)) => {
                    if self.shared.ready.wait_until(&mut state, deadline).timed_out() {
                        return match &state.outcome {
                            Some(outcome) => outcome.clone(),
                            None => Err(ActorError::Timeout(timeout)),
                        };
                    }
                }
                _ => self.shared.ready.wait(&mut state),
            }
        }
    }

    /// Waits for the outcome from async code without blocking a runtime thread.
    pub async fn wait(&self) -> Result<T> {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(outcome) = &self.shared.state.lock().outcome {
                return outcome.clone();
            }
            notified.await;
        }
    }

    /// Runs `callback` with the outcome once it is known.
    ///
    /// The callback runs on the thread that fulfils the future, or right away
    /// on the calling thread if the future is already fulfilled. A panic in a
    /// callback run at fulfilment is logged and does not reach the fulfiller.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(Result<T>) + Send + 'static,
    {
        let outcome = {
            let mut state = self.shared.state.lock();
            match &state.outcome {
                Some(outcome) => outcome.clone(),
                None => {
                    state.callbacks.push(Box::new(callback));
                    return;
                }
            }
        };
        callback(outcome);
    }

    /// Builds a new future from the outcome of this one. `self` is not modified.
    ///
    /// `f` runs on the thread that fulfils `self`. For a reply-to future that is
    /// the replying actor's worker, so a slow `f` holds up that actor and a
    /// blocking `ask` back into it from `f` deadlocks.
    ///
    /// A panic inside `f` fails the derived future instead of unwinding into
    /// the thread that fulfilled `self`.
    pub fn then<U, F>(&self, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(Result<T>) -> Result<U> + Send + 'static,
    {
        let derived = Future::new();
        let target = derived.clone();
        self.on_complete(move |outcome| {
            let result = catch_unwind(AssertUnwindSafe(|| f(outcome))).unwrap_or_else(|panic| {
                Err(ActorError::Panicked {
                    actor: "future callback".to_string(),
                    message: panic_message(panic.as_ref()),
                })
            });
            let _ = target.complete(result);
        });
        derived
    }

    /// Applies `f` to the eventual value. Runs where [`then`](Self::then) runs.
    pub fn map<U, F>(&self, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.then(move |outcome| outcome.map(f))
    }

    /// Future of `[self, others...]` in order. The first error in that order
    /// fails the joined future.
    pub fn join<I>(&self, others: I) -> Future<Vec<T>>
    where
        I: IntoIterator<Item = Future<T>>,
    {
        let futures: Vec<Future<T>> = std::iter::once(self.clone()).chain(others).collect();
        let joined = Future::new();
        let slots: Arc<Mutex<Vec<Option<Result<T>>>>> =
            Arc::new(Mutex::new(vec![None; futures.len()]));

        for (index, future) in futures.iter().enumerate() {
            let slots = Arc::clone(&slots);
            let joined = joined.clone();
            future.on_complete(move |outcome| {
                let settled = {
                    let mut slots = slots.lock();
                    slots[index] = Some(outcome);
                    settle(&slots)
                };
                if let Some(result) = settled {
                    let _ = joined.complete(result);
                }
            });
        }
        joined
    }
}

// Walks the slots in order; stops at the first pending one.
fn settle<T: Clone>(slots: &[Option<Result<T>>]) -> Option<Result<Vec<T>>> {
    let mut values = Vec::with_capacity(slots.len());
    for slot in slots {
        match slot {
            None => return None,
            Some(Err(error)) => return Some(Err(error.clone())),
            Some(Ok(value)) => values.push(value.clone()),
        }
    }
    Some(Ok(values))
}

impl<T: Clone + Send + 'static> Future<Vec<T>> {
    /// Applies `f` to every element of the eventual list.
    pub fn map_each<U, F>(&self, mut f: F) -> Future<Vec<U>>
    where
        U: Clone + Send + 'static,
        F: FnMut(T) -> U + Send + 'static,
    {
        self.map(move |items| items.into_iter().map(&mut f).collect())
    }

    /// Keeps the elements for which `predicate` holds.
    pub fn filter<F>(&self, mut predicate: F) -> Future<Vec<T>>
    where
        F: FnMut(&T) -> bool + Send + 'static,
    {
        self.map(move |items| items.into_iter().filter(|item| predicate(item)).collect())
    }

    /// Left fold without an initial value. An empty list fails with
    /// [`ActorError::InvalidValue`].
    pub fn reduce<F>(&self, f: F) -> Future<T>
    where
        F: FnMut(T, T) -> T + Send + 'static,
    {
        self.then(move |outcome| {
            outcome?
                .into_iter()
                .reduce(f)
                .ok_or_else(|| ActorError::invalid("reduce of empty sequence with no initial value"))
        })
    }

    /// Left fold starting from `initial`.
    pub fn fold<U, F>(&self, initial: U, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnMut(U, T) -> U + Send + 'static,
    {
        self.map(move |items| items.into_iter().fold(initial, f))
    }
}

impl Future<Value> {
    /// Decodes the eventual value into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, timeout: Option<Duration>) -> Result<T> {
        let value = self.get(timeout)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Applies `f` to each element if the value is an array, otherwise once to
    /// the value itself. Strings are never treated as sequences.
    pub fn map_each<F>(&self, mut f: F) -> Future<Value>
    where
        F: FnMut(Value) -> Value + Send + 'static,
    {
        self.map(move |value| match value {
            Value::Array(items) => Value::Array(items.into_iter().map(&mut f).collect()),
            other => f(other),
        })
    }

    /// Keeps the array elements for which `predicate` holds. A non-array value
    /// fails at `get` time.
    pub fn filter<F>(&self, mut predicate: F) -> Future<Value>
    where
        F: FnMut(&Value) -> bool + Send + 'static,
    {
        self.then(move |outcome| {
            let items = expect_array(outcome?, "filter")?;
            Ok(Value::Array(
                items.into_iter().filter(|item| predicate(item)).collect(),
            ))
        })
    }

    /// Left fold over an array value, optionally seeded with `initial`.
    pub fn reduce<F>(&self, f: F, initial: Option<Value>) -> Future<Value>
    where
        F: FnMut(Value, Value) -> Value + Send + 'static,
    {
        self.then(move |outcome| {
            let items = expect_array(outcome?, "reduce")?;
            match initial {
                Some(initial) => Ok(items.into_iter().fold(initial, f)),
                None => items.into_iter().reduce(f).ok_or_else(|| {
                    ActorError::invalid("reduce of empty sequence with no initial value")
                }),
            }
        })
    }
}

fn expect_array(value: Value, operation: &str) -> Result<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(ActorError::invalid(format!(
            "{operation} needs an array, got {other}"
        ))),
    }
}

/// Resolves every future in order, giving each the same `timeout` budget.
/// The first error or timeout encountered is returned.
pub fn get_all<T: Clone + Send + 'static>(
    futures: &[Future<T>],
    timeout: Option<Duration>,
) -> Result<Vec<T>> {
    futures.iter().map(|future| future.get(timeout)).collect()
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread;

    #[test]
    fn set_twice_fails_and_value_is_kept() {
        let f = Future::new();
        f.set(1).unwrap();
        assert!(matches!(f.set(2), Err(ActorError::AlreadyFulfilled)));
        assert_eq!(f.get(None).unwrap(), 1);
        assert_eq!(f.get(Some(Duration::ZERO)).unwrap(), 1);
    }

    #[test]
    fn get_times_out_when_pending() {
        let f: Future<u8> = Future::new();
        let err = f.get(Some(Duration::from_millis(20))).unwrap_err();
        assert!(err.is_timeout());
        // Still usable after a timeout.
        f.set(3).unwrap();
        assert_eq!(f.get(None).unwrap(), 3);
    }

    #[test]
    fn error_outcome_is_returned_on_every_read() {
        let f: Future<u8> = Future::new();
        f.fail(ActorError::invalid("boom")).unwrap();
        for _ in 0..2 {
            assert!(matches!(f.get(None), Err(ActorError::InvalidValue(m)) if m == "boom"));
        }
    }

    #[test]
    fn get_wakes_up_when_set_from_another_thread() {
        let f = Future::new();
        let producer = f.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            producer.set("done".to_string()).unwrap();
        });
        assert_eq!(f.get(Some(Duration::from_secs(5))).unwrap(), "done");
        handle.join().unwrap();
    }

    #[test]
    fn unrepresentable_timeout_waits_without_deadline() {
        let ready = Future::ready(1u32);
        assert_eq!(ready.get(Some(Duration::MAX)).unwrap(), 1);

        let pending = Future::new();
        let producer = pending.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            producer.set(2u32).unwrap();
        });
        assert_eq!(pending.get(Some(Duration::MAX)).unwrap(), 2);
        handle.join().unwrap();
    }

    #[test]
    fn panicking_callback_does_not_reach_the_fulfiller() {
        let f = Future::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        f.on_complete(|_: Result<u8>| panic!("bad callback"));
        let after = seen.clone();
        f.on_complete(move |outcome| after.lock().push(outcome.unwrap_or(0)));

        f.set(5).unwrap();
        assert_eq!(f.get(None).unwrap(), 5);
        assert_eq!(*seen.lock(), vec![5]);
    }

    #[test]
    fn combinators() {
        let f = Future::new();
        let g = f.map(|v: i32| v + 10);
        f.set(30).unwrap();
        assert_eq!(g.get(None).unwrap(), 40);

        let f = Future::new();
        f.set(vec![5, 15, 25]).unwrap();
        assert_eq!(f.filter(|v| *v > 10).get(None).unwrap(), vec![15, 25]);

        let f = Future::new();
        f.set(vec![1, 2, 3]).unwrap();
        assert_eq!(f.reduce(|a, b| a + b).get(None).unwrap(), 6);
        assert_eq!(f.fold(10, |a, b| a + b).get(None).unwrap(), 16);
        assert_eq!(f.map_each(|v| v * 2).get(None).unwrap(), vec![2, 4, 6]);
    }

    #[test]
    fn combinators_do_not_touch_the_source() {
        let f = Future::new();
        let _ = f.map(|v: i32| v * 100);
        f.set(1).unwrap();
        assert_eq!(f.get(None).unwrap(), 1);
    }

    #[test]
    fn reduce_of_empty_list_fails() {
        let f: Future<Vec<i32>> = Future::ready(Vec::new());
        assert!(matches!(
            f.reduce(|a, b| a + b).get(None),
            Err(ActorError::InvalidValue(_))
        ));
    }

    #[test]
    fn value_combinators_check_shape_at_get_time() {
        let f = Future::ready(json!(7));
        assert!(matches!(
            f.filter(|_| true).get(None),
            Err(ActorError::InvalidValue(_))
        ));
        assert_eq!(
            f.map_each(|v| json!(v.as_i64().unwrap_or(0) + 1)).get(None).unwrap(),
            json!(8)
        );

        let list = Future::ready(json!([1, 2, 3]));
        let sum = list.reduce(
            |a, b| json!(a.as_i64().unwrap_or(0) + b.as_i64().unwrap_or(0)),
            Some(json!(100)),
        );
        assert_eq!(sum.get_as::<i64>(None).unwrap(), 106);
        assert_eq!(
            list.map_each(|v| json!(v.as_i64().unwrap_or(0) * 3)).get(None).unwrap(),
            json!([3, 6, 9])
        );
    }

    #[test]
    fn join_preserves_order_and_first_error() {
        let a = Future::new();
        let b = Future::new();
        let c = Future::new();
        let joined = a.join([b.clone(), c.clone()]);
        c.set(3).unwrap();
        a.set(1).unwrap();
        assert!(!joined.is_ready());
        b.set(2).unwrap();
        assert_eq!(joined.get(None).unwrap(), vec![1, 2, 3]);

        let a: Future<i32> = Future::new();
        let b = Future::new();
        let joined = a.join([b.clone()]);
        b.fail(ActorError::invalid("second")).unwrap();
        assert!(!joined.is_ready());
        a.set(1).unwrap();
        assert!(matches!(joined.get(None), Err(ActorError::InvalidValue(m)) if m == "second"));
    }

    #[test]
    fn get_all_applies_timeout_per_future() {
        let ready = vec![Future::ready(1), Future::ready(2)];
        assert_eq!(get_all(&ready, None).unwrap(), vec![1, 2]);

        let pending = vec![Future::ready(1), Future::new()];
        let err = get_all(&pending, Some(Duration::from_millis(10))).unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn panicking_callback_fails_derived_future() {
        let f = Future::new();
        let g: Future<i32> = f.map(|_: i32| panic!("bad map"));
        f.set(1).unwrap();
        assert!(matches!(g.get(None), Err(ActorError::Panicked { message, .. }) if message == "bad map"));
    }

    #[tokio::test]
    async fn wait_resolves_from_async_code() {
        let f = Future::new();
        let producer = f.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            producer.set(9u32).unwrap();
        });
        assert_eq!(f.wait().await.unwrap(), 9);
        assert_eq!(f.wait().await.unwrap(), 9);
    }
}
