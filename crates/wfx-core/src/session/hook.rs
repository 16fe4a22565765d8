use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex},
};

use tokio::sync::OnceCell;
use tracing::debug;

type HookFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
type HookFn = Box<dyn FnOnce() -> HookFuture + Send + 'static>;

/// Named teardown callback registered with a [`crate::Session`].
///
/// The callback runs at most once no matter how many clones call [`ShutdownHook::run`]
/// or how many times; concurrent callers wait for the first run to finish.
#[derive(Clone)]
pub struct ShutdownHook {
    inner: Arc<HookInner>,
}

struct HookInner {
    name: String,
    callback: Mutex<Option<HookFn>>,
    done: OnceCell<()>,
}

impl ShutdownHook {
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let callback: HookFn = Box::new(move || Box::pin(f()));
        Self {
            inner: Arc::new(HookInner {
                name: name.into(),
                callback: Mutex::new(Some(callback)),
                done: OnceCell::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn has_run(&self) -> bool {
        self.inner.done.initialized()
    }

    /// Run the callback, or wait for the run already in progress.
    pub async fn run(&self) {
        self.inner
            .done
            .get_or_init(|| async {
                let callback = match self.inner.callback.lock() {
                    Ok(mut slot) => slot.take(),
                    Err(poisoned) => poisoned.into_inner().take(),
                };
                if let Some(callback) = callback {
                    debug!(hook = %self.inner.name, "running shutdown hook");
                    callback().await;
                }
            })
            .await;
    }
}

impl fmt::Debug for ShutdownHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownHook")
            .field("name", &self.inner.name)
            .field("has_run", &self.has_run())
            .finish()
    }
}
