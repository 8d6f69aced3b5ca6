use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

pub type HandlerError = Box<dyn Error + Send + Sync>;
pub type Handler<E> = Arc<dyn Fn(&E) -> Result<(), HandlerError> + Send + Sync>;

/// Result of one dispatch pass over an event's registered handlers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub invoked: usize,
    pub failed: usize,
}

/// Callbacks keyed by event name. A failing handler is logged and counted
/// but never stops the remaining handlers for the same event.
pub struct HandlerRegistry<E> {
    handlers: RwLock<HashMap<String, Vec<Handler<E>>>>,
    routed: AtomicU64,
    errors: AtomicU64,
}

impl<E> HandlerRegistry<E> {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            routed: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub async fn register<F>(&self, event_type: &str, handler: F)
    where
        F: Fn(&E) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.write().await;
        handlers
            .entry(event_type.to_string())
            .or_default()
            .push(Arc::new(handler));

        tracing::info!("registered handler for event: {event_type}");
    }

    pub async fn dispatch(&self, event_type: &str, event: &E) -> DispatchOutcome {
        let handlers = {
            let handlers = self.handlers.read().await;
            handlers.get(event_type).cloned().unwrap_or_default()
        };

        let mut outcome = DispatchOutcome::default();
        for handler in handlers {
            match handler(event) {
                Ok(()) => {
                    outcome.invoked += 1;
                    self.routed.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    outcome.failed += 1;
                    self.errors.fetch_add(1, Ordering::Relaxed);
                    tracing::error!("event handler error ({event_type}): {e}");
                }
            }
        }

        outcome
    }

    pub async fn handler_count(&self, event_type: &str) -> usize {
        let handlers = self.handlers.read().await;
        handlers.get(event_type).map(Vec::len).unwrap_or(0)
    }

    pub fn routed(&self) -> u64 {
        self.routed.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

impl<E> Default for HandlerRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}
