//! Shared helpers for integration tests.

use std::sync::{Arc, Once};

use parking_lot::Mutex;

use freshet::{observer, Context, Failure, FnSubscriber, Subscriber};

static INIT_LOGGING: Once = Once::new();

/// Initialize tracing output for tests. Safe to call repeatedly; the first
/// call wins.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Everything a collecting subscriber observed.
#[derive(Clone, Default)]
pub struct Collected<V> {
    pub values: Arc<Mutex<Vec<V>>>,
    pub errors: Arc<Mutex<Vec<String>>>,
    pub completes: Arc<Mutex<usize>>,
}

impl<V> Collected<V> {
    pub fn new() -> Self {
        Self {
            values: Arc::new(Mutex::new(Vec::new())),
            errors: Arc::new(Mutex::new(Vec::new())),
            completes: Arc::new(Mutex::new(0)),
        }
    }

    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.values.lock().clone()
    }

    pub fn completes(&self) -> usize {
        *self.completes.lock()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }
}

/// A subscriber recording values, errors, and completions into `log`.
pub fn collect<V>(log: &Collected<V>) -> impl Subscriber<Value = V, Error = Failure>
where
    V: Clone + Send + Sync + 'static,
{
    let log = log.clone();
    FnSubscriber::new(move |ctx: &Context| {
        let values = log.values.clone();
        let errors = log.errors.clone();
        let completes = log.completes.clone();
        observer::from_fns(
            ctx.lifetime().clone(),
            move |v| values.lock().push(v),
            move |e: Failure| errors.lock().push(e.to_string()),
            move || *completes.lock() += 1,
        )
    })
}
