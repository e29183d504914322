//! Lifecycle adapters
//!
//! Host frameworks expose their process events as [`Signal`]s. An adapter connects
//! the manager's connect/disconnect procedures to those signals. Hosts attach the
//! adapters they need explicitly; nothing is detected at runtime.
//!
//! ```text
//! PreforkHooks.post_fork            ──► setup_connection
//! TaskWorkerSignals.worker_process_init ─► setup_connection
//! TaskWorkerSignals.beat_init       ──► setup_connection
//! TaskWorkerSignals.worker_shutting_down ─► shutdown_connection
//! ```

use futures::FutureExt;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tracing::{debug, warn};

use crate::error::{CqlError, CqlResult};
use crate::manager::CqlManager;

type Handler = Arc<dyn Fn() -> BoxFuture<'static, CqlResult<()>> + Send + Sync>;

/// A named host event with any number of receivers
pub struct Signal {
    name: &'static str,
    handlers: RwLock<Vec<Handler>>,
}

impl Signal {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            handlers: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn connect<F, Fut>(&self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CqlResult<()>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move || hook().boxed());
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    pub fn receivers(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Run every receiver in connection order, stopping at the first failure
    pub async fn send(&self) -> CqlResult<()> {
        let handlers: Vec<Handler> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        debug!(signal = %self.name, receivers = handlers.len(), "Dispatching lifecycle signal");

        for handler in handlers {
            handler().await.map_err(|e| {
                warn!(signal = %self.name, error = %e, "Lifecycle hook failed");
                CqlError::Hook {
                    hook: self.name.to_string(),
                    source: Box::new(e),
                }
            })?;
        }
        Ok(())
    }
}

/// Attaches the manager to a host framework's lifecycle events
pub trait LifecycleAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    fn register(&self, manager: &Arc<CqlManager>);
}

/// Hook table of a prefork server (one post-fork event per worker process)
pub struct PreforkHooks {
    pub post_fork: Signal,
}

impl PreforkHooks {
    pub fn new() -> Self {
        Self {
            post_fork: Signal::new("post_fork"),
        }
    }
}

impl Default for PreforkHooks {
    fn default() -> Self {
        Self::new()
    }
}

/// Signals emitted by a background task framework
pub struct TaskWorkerSignals {
    pub worker_process_init: Signal,
    pub beat_init: Signal,
    pub worker_shutting_down: Signal,
}

impl TaskWorkerSignals {
    pub fn new() -> Self {
        Self {
            worker_process_init: Signal::new("worker_process_init"),
            beat_init: Signal::new("beat_init"),
            worker_shutting_down: Signal::new("worker_shutting_down"),
        }
    }
}

impl Default for TaskWorkerSignals {
    fn default() -> Self {
        Self::new()
    }
}

/// Reconnects in every forked worker, since sockets must not cross a fork
pub struct PreforkAdapter {
    hooks: Arc<PreforkHooks>,
}

impl PreforkAdapter {
    pub fn new(hooks: Arc<PreforkHooks>) -> Self {
        Self { hooks }
    }
}

impl LifecycleAdapter for PreforkAdapter {
    fn name(&self) -> &'static str {
        "prefork"
    }

    fn register(&self, manager: &Arc<CqlManager>) {
        connect_setup(&self.hooks.post_fork, manager);
    }
}

/// Connects on worker and scheduler start, disconnects on worker shutdown
pub struct TaskWorkerAdapter {
    signals: Arc<TaskWorkerSignals>,
}

impl TaskWorkerAdapter {
    pub fn new(signals: Arc<TaskWorkerSignals>) -> Self {
        Self { signals }
    }
}

impl LifecycleAdapter for TaskWorkerAdapter {
    fn name(&self) -> &'static str {
        "task_worker"
    }

    fn register(&self, manager: &Arc<CqlManager>) {
        connect_setup(&self.signals.worker_process_init, manager);
        connect_setup(&self.signals.beat_init, manager);

        let weak = Arc::downgrade(manager);
        self.signals.worker_shutting_down.connect(move || {
            let manager = weak.upgrade();
            async move {
                match manager {
                    Some(manager) => manager.shutdown_connection().await,
                    None => Ok(()),
                }
            }
        });
    }
}

// Hooks hold a weak reference; a dropped manager turns them into no-ops.
fn connect_setup(signal: &Signal, manager: &Arc<CqlManager>) {
    let weak: Weak<CqlManager> = Arc::downgrade(manager);
    signal.connect(move || {
        let manager = weak.upgrade();
        async move {
            match manager {
                Some(manager) => manager.setup_connection().await,
                None => Ok(()),
            }
        }
    });
}
