use std::sync::Arc;

use fieldbook::{
    FixedClock, Queue, Repository,
    backend::{BackendImpl, database::InMemory},
};

/// Creates a test backend based on TEST_BACKEND env var.
///
/// Supported values:
/// - "inmemory" or unset: InMemory backend (default)
/// - "sqlite": SQLite in-memory backend (requires `sqlite` feature)
///
/// # Panics
/// Panics if TEST_BACKEND=sqlite but the `sqlite` feature is not enabled.
pub async fn test_backend() -> Arc<dyn BackendImpl> {
    match std::env::var("TEST_BACKEND").as_deref() {
        Ok("sqlite") => {
            #[cfg(feature = "sqlite")]
            {
                use fieldbook::backend::database::Sqlite;
                Arc::new(
                    Sqlite::in_memory()
                        .await
                        .expect("Failed to create SQLite backend"),
                )
            }
            #[cfg(not(feature = "sqlite"))]
            {
                panic!("TEST_BACKEND=sqlite requires the 'sqlite' feature to be enabled")
            }
        }
        Ok("inmemory") | Err(_) => Arc::new(InMemory::new()),
        Ok(other) => panic!("Unknown TEST_BACKEND: {other}"),
    }
}

/// A queue over a fresh test backend.
pub async fn test_queue() -> Queue {
    Queue::from_arc(test_backend().await)
}

/// A repository over a fresh test backend, with a clock the test controls.
pub async fn test_repository() -> (Repository, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::default());
    let repository = Repository::with_clock(test_queue().await, clock.clone());
    (repository, clock)
}

/// Every backend the crate was built with, for conformance tests.
pub async fn all_backends() -> Vec<(&'static str, Arc<dyn BackendImpl>)> {
    #[allow(unused_mut)]
    let mut backends: Vec<(&'static str, Arc<dyn BackendImpl>)> =
        vec![("inmemory", Arc::new(InMemory::new()))];
    #[cfg(feature = "sqlite")]
    {
        use fieldbook::backend::database::Sqlite;
        backends.push((
            "sqlite",
            Arc::new(
                Sqlite::in_memory()
                    .await
                    .expect("Failed to create SQLite backend"),
            ),
        ));
    }
    backends
}
