//! Event dispatcher
//!
//! Handlers are registered per [`EventKind`] or for every event. Dispatching
//! first applies the event to the state cache, in the caller's task, then
//! spawns one supervised task per matching handler. Handlers therefore run
//! concurrently with each other and with later events.

use cord_cache::State;
use cord_common::TaskSupervisor;
use cord_core::{Event, EventKind, EventPayload, EventSink};
use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

type HandlerFn = Arc<dyn Fn(Arc<Event>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Registry key: one event kind, or every event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum HandlerKey {
    Kind(EventKind),
    Any,
}

#[derive(Clone)]
struct Registered {
    id: u64,
    once: bool,
    handler: HandlerFn,
}

/// Routes events to registered handlers
pub struct Dispatcher {
    handlers: RwLock<HashMap<HandlerKey, Vec<Registered>>>,
    next_id: AtomicU64,
    state: Option<Arc<State>>,
    supervisor: Arc<TaskSupervisor>,
}

impl Dispatcher {
    /// Create a dispatcher that updates `state` (when given) before handlers run
    pub fn new(state: Option<Arc<State>>, supervisor: Arc<TaskSupervisor>) -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            state,
            supervisor,
        }
    }

    /// Register a handler for one event type
    ///
    /// The handler receives its own copy of the payload.
    pub fn add_handler<E, F, Fut>(self: &Arc<Self>, handler: F) -> HandlerRegistration
    where
        E: EventPayload,
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register(HandlerKey::Kind(E::KIND), false, typed(handler))
    }

    /// Register a handler for one event type that runs at most once
    pub fn add_handler_once<E, F, Fut>(self: &Arc<Self>, handler: F) -> HandlerRegistration
    where
        E: EventPayload,
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register(HandlerKey::Kind(E::KIND), true, typed(handler))
    }

    /// Register a handler for every event
    pub fn add_any_handler<F, Fut>(self: &Arc<Self>, handler: F) -> HandlerRegistration
    where
        F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: HandlerFn =
            Arc::new(move |event: Arc<Event>| -> BoxFuture<'static, ()> { Box::pin(handler(event)) });
        self.register(HandlerKey::Any, false, handler)
    }

    fn register(self: &Arc<Self>, key: HandlerKey, once: bool, handler: HandlerFn) -> HandlerRegistration {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .write()
            .entry(key)
            .or_default()
            .push(Registered { id, once, handler });

        debug!(?key, id, once, "handler registered");
        HandlerRegistration {
            dispatcher: Arc::downgrade(self),
            key,
            id,
        }
    }

    fn remove(&self, key: HandlerKey, id: u64) -> bool {
        let mut handlers = self.handlers.write();
        let Some(list) = handlers.get_mut(&key) else {
            return false;
        };
        let before = list.len();
        list.retain(|r| r.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.remove(&key);
        }
        removed
    }

    /// Handlers that would receive an event of `kind`, "any" handlers included
    pub fn handler_count(&self, kind: EventKind) -> usize {
        let handlers = self.handlers.read();
        [HandlerKey::Kind(kind), HandlerKey::Any]
            .iter()
            .filter_map(|key| handlers.get(key))
            .map(Vec::len)
            .sum()
    }

    /// Update the state cache with `event`, then hand it to every matching handler
    pub fn dispatch(&self, mut event: Event) {
        let kind = event.kind();

        if let Some(state) = &self.state {
            if let Err(err) = state.on_event(&mut event) {
                if err.is_not_found() {
                    debug!(%kind, error = %err, "state not updated");
                } else {
                    warn!(%kind, error = %err, "error updating state");
                }
            }
        }

        let mut matched: Vec<(HandlerKey, Registered)> = {
            let handlers = self.handlers.read();
            [HandlerKey::Kind(kind), HandlerKey::Any]
                .into_iter()
                .filter_map(|key| handlers.get(&key).map(|list| (key, list)))
                .flat_map(|(key, list)| list.iter().map(move |r| (key, r.clone())))
                .collect()
        };

        // A once-handler runs only for the dispatch that manages to remove it
        if matched.iter().any(|(_, r)| r.once) {
            matched.retain(|(key, r)| !r.once || self.remove(*key, r.id));
        }

        if matched.is_empty() {
            trace!(%kind, "no handlers");
            return;
        }

        let event = Arc::new(event);
        for (_, registered) in matched {
            // Invoked inside the task so a panicking handler stays contained
            let handler = registered.handler;
            let event = Arc::clone(&event);
            if self
                .supervisor
                .spawn(async move { handler(event).await })
                .is_none()
            {
                debug!(%kind, "client closed, dropping event");
                return;
            }
        }
    }
}

impl EventSink for Dispatcher {
    fn emit(&self, event: Event) {
        self.dispatch(event);
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handlers", &self.handlers.read().values().map(Vec::len).sum::<usize>())
            .field("state", &self.state.is_some())
            .finish_non_exhaustive()
    }
}

fn typed<E, F, Fut>(handler: F) -> HandlerFn
where
    E: EventPayload,
    F: Fn(E) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |event: Arc<Event>| -> BoxFuture<'static, ()> {
        let future = E::from_event(&event).cloned().map(&handler);
        Box::pin(async move {
            if let Some(future) = future {
                future.await;
            }
        })
    })
}

/// Handle returned by handler registration
///
/// Dropping it keeps the handler registered; call [`remove`](Self::remove)
/// to unregister.
#[derive(Debug)]
pub struct HandlerRegistration {
    dispatcher: Weak<Dispatcher>,
    key: HandlerKey,
    id: u64,
}

impl HandlerRegistration {
    /// Unregister the handler. Returns false if it was already gone.
    pub fn remove(self) -> bool {
        self.dispatcher
            .upgrade()
            .is_some_and(|dispatcher| dispatcher.remove(self.key, self.id))
    }
}
