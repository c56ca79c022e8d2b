//! # Observability
//!
//! The runtime logs through `tracing` with structured fields. Every worker runs
//! inside an `actor` span carrying the actor's class and URN, so all events an
//! actor emits (lifecycle, dispatch, failures) can be filtered per actor.
//!
//! | Level   | Events                                                        |
//! |---------|---------------------------------------------------------------|
//! | `info`  | actor started / stopped, stop-all requested                   |
//! | `debug` | each dispatched envelope, registry changes, inbox drain count |
//! | `warn`  | unexpected user messages, unregistering an unknown actor      |
//! | `error` | unhandled failures, failures in `on_stop` / `on_failure`, fatal errors, panicking completion callbacks |
//!
//! ```bash
//! RUST_LOG=actor_runtime=debug cargo test
//! ```

/// Installs a compact fmt subscriber filtered by `RUST_LOG`.
///
/// Panics if a global subscriber is already set; see [`try_setup_tracing`].
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}

/// Like [`setup_tracing`], but returns `false` instead of panicking when a
/// subscriber is already installed. Handy in tests.
pub fn try_setup_tracing() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .with_test_writer()
        .try_init()
        .is_ok()
}
