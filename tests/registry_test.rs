use actor_runtime::{Actor, ActorError, ActorRef, Context, Registry, ThreadScheduler};
use parking_lot::Mutex;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

const WAIT: Option<Duration> = Some(Duration::from_secs(5));

type StopLog = Arc<Mutex<Vec<&'static str>>>;

#[derive(Clone, Debug)]
enum Signal {
    Ping,
    Count,
}

/// Counts pings and records its name when stopped.
struct Listener {
    name: &'static str,
    pings: usize,
    stopped: StopLog,
}

impl Listener {
    fn new(name: &'static str, stopped: &StopLog) -> Self {
        Self {
            name,
            pings: 0,
            stopped: stopped.clone(),
        }
    }
}

impl Actor for Listener {
    type Message = Signal;
    type Reply = usize;
    type Error = Infallible;

    fn on_receive(&mut self, signal: Signal, _ctx: &Context<Self>) -> Result<usize, Infallible> {
        if let Signal::Ping = signal {
            self.pings += 1;
        }
        Ok(self.pings)
    }

    fn on_stop(&mut self, _ctx: &Context<Self>) -> Result<(), Infallible> {
        self.stopped.lock().push(self.name);
        Ok(())
    }
}

/// Same message type as [`Listener`], different actor type.
#[derive(Default)]
struct Echo {
    pings: usize,
}

impl Actor for Echo {
    type Message = Signal;
    type Reply = usize;
    type Error = Infallible;

    fn on_receive(&mut self, signal: Signal, _ctx: &Context<Self>) -> Result<usize, Infallible> {
        if let Signal::Ping = signal {
            self.pings += 1;
        }
        Ok(self.pings)
    }
}

struct Doubler;

impl Actor for Doubler {
    type Message = u32;
    type Reply = u32;
    type Error = Infallible;

    fn on_receive(&mut self, value: u32, _ctx: &Context<Self>) -> Result<u32, Infallible> {
        Ok(value * 2)
    }
}

fn start<A: Actor>(actor: A, registry: &Registry) -> ActorRef<A> {
    actor
        .start_with(registry, &ThreadScheduler::default())
        .unwrap()
}

#[test]
fn lookups_find_registered_actors() {
    let registry = Registry::new();
    let log = StopLog::default();
    let first = start(Listener::new("first", &log), &registry);
    let second = start(Listener::new("second", &log), &registry);
    let doubler = start(Doubler, &registry);

    let all: Vec<String> = registry.get_all().iter().map(|r| r.urn().to_string()).collect();
    assert_eq!(all, vec![first.urn(), second.urn(), doubler.urn()]);

    assert_eq!(registry.get_by_class::<Listener>(), vec![first.clone(), second.clone()]);
    assert_eq!(registry.get_by_class::<Doubler>(), vec![doubler.clone()]);
    assert!(registry.get_by_class::<Echo>().is_empty());

    assert_eq!(registry.get_by_class_name("Listener").len(), 2);
    assert_eq!(
        registry.get_by_class_name(std::any::type_name::<Doubler>()),
        vec![doubler.erase()]
    );
    assert!(registry.get_by_class_name("Nobody").is_empty());

    assert_eq!(registry.get_by_urn(second.urn()), Some(second.erase()));
    assert_eq!(registry.get_by_urn("urn:uuid:unknown"), None);

    registry.stop_all(WAIT);
}

#[test]
fn erased_refs_recover_their_type() {
    let registry = Registry::new();
    let doubler = start(Doubler, &registry);
    let erased = registry.get_by_urn(doubler.urn()).unwrap();

    assert!(erased.is::<Doubler>());
    assert!(!erased.is::<Echo>());
    assert!(erased.downcast::<Echo>().is_none());
    let typed = erased.downcast::<Doubler>().unwrap();
    assert_eq!(typed, doubler);
    assert_eq!(typed.ask(21, WAIT).unwrap(), 42);

    assert!(erased.tell(7u32).is_ok());
    assert!(matches!(erased.tell("seven"), Err(ActorError::InvalidValue(_))));
    assert_eq!(erased.to_string(), doubler.to_string());

    assert!(erased.stop(WAIT).unwrap());
    assert!(!erased.is_alive());
}

#[test]
fn stopped_actors_leave_the_registry() {
    let registry = Registry::new();
    let doubler = start(Doubler, &registry);
    assert_eq!(registry.len(), 1);

    assert!(doubler.stop(WAIT).unwrap());
    assert!(registry.get_by_urn(doubler.urn()).is_none());
    assert!(registry.is_empty());
}

#[test]
fn registering_twice_is_a_no_op() {
    let registry = Registry::new();
    let doubler = start(Doubler, &registry);

    registry.register(&doubler);
    assert_eq!(registry.len(), 1);
    assert!(registry.unregister(&doubler));
    assert!(!registry.unregister(&doubler));
    assert!(registry.is_empty());

    // Still alive, just no longer listed.
    assert!(doubler.is_alive());
    assert!(doubler.stop(WAIT).unwrap());
}

#[test]
fn broadcast_reaches_actors_by_message_type() {
    let registry = Registry::new();
    let log = StopLog::default();
    let first = start(Listener::new("first", &log), &registry);
    let second = start(Listener::new("second", &log), &registry);
    let echo = start(Echo::default(), &registry);
    let _doubler = start(Doubler, &registry);

    assert_eq!(registry.broadcast(Signal::Ping), 3);
    assert_eq!(registry.broadcast_to::<Listener>(Signal::Ping), 2);
    assert_eq!(registry.broadcast(7u32), 1);
    assert_eq!(registry.broadcast("nobody takes strings"), 0);

    assert_eq!(first.ask(Signal::Count, WAIT).unwrap(), 2);
    assert_eq!(second.ask(Signal::Count, WAIT).unwrap(), 2);
    assert_eq!(echo.ask(Signal::Count, WAIT).unwrap(), 1);

    registry.stop_all(WAIT);
}

#[test]
fn stop_all_stops_the_most_recent_actor_first() {
    let registry = Registry::new();
    let log = StopLog::default();
    let a = start(Listener::new("a", &log), &registry);
    let b = start(Listener::new("b", &log), &registry);
    let c = start(Listener::new("c", &log), &registry);

    let results = registry.stop_all(WAIT);
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| matches!(r, Ok(true))));
    assert_eq!(*log.lock(), vec!["c", "b", "a"]);
    assert!(registry.is_empty());
    assert!(![a, b, c].iter().any(|r| r.is_alive()));
}

#[test]
fn stop_all_futures_does_not_wait() {
    let registry = Registry::new();
    let log = StopLog::default();
    let listener = start(Listener::new("only", &log), &registry);
    let echo = start(Echo::default(), &registry);

    let futures = registry.stop_all_futures();
    assert_eq!(futures.len(), 2);
    let stopped = actor_runtime::get_all(&futures, WAIT).unwrap();
    assert_eq!(stopped, vec![true, true]);
    assert!(!listener.is_alive() && !echo.is_alive());
    assert_eq!(*log.lock(), vec!["only"]);
}

#[test]
fn clear_stops_and_empties() {
    let registry = Registry::new();
    let doubler = start(Doubler, &registry);
    let echo = start(Echo::default(), &registry);

    registry.clear();
    assert!(registry.is_empty());
    assert!(!doubler.is_alive());
    assert!(!echo.is_alive());
    // A cleared registry is still usable.
    let again = start(Doubler, &registry);
    assert_eq!(registry.len(), 1);
    assert!(again.stop(WAIT).unwrap());
}

#[test]
fn clones_share_one_table() {
    let registry = Registry::new();
    let view = registry.clone();
    let doubler = start(Doubler, &registry);

    assert_eq!(view.get_by_urn(doubler.urn()), Some(doubler.erase()));
    view.stop_all(WAIT);
    assert!(registry.is_empty());
}

#[test]
fn start_uses_the_global_registry() {
    actor_runtime::try_setup_tracing();
    let doubler = Doubler.start().unwrap();

    assert!(Registry::global().get_by_urn(doubler.urn()).is_some());
    assert_eq!(doubler.ask(4, WAIT).unwrap(), 8);
    assert!(doubler.stop(WAIT).unwrap());
    assert!(Registry::global().get_by_urn(doubler.urn()).is_none());
}
