use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Shared event handler callback
pub type Handler<T> = Arc<dyn Fn(&T) + Send + Sync + 'static>;

type Registry<T> = HashMap<String, Vec<(ListenerId, Handler<T>)>>;

/// Identifies one registered handler. Unique across every emitter in the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Synchronous publish/subscribe registry keyed by event name.
///
/// `emit` runs handlers in registration order against a snapshot taken when
/// the call starts, so handlers may register or remove listeners (including
/// themselves) while being invoked. A panicking handler is logged and does
/// not stop the remaining handlers.
///
/// Cloning an emitter yields another handle to the same registry.
///
/// # Example
///
/// ```
/// use realtime_pubsub::EventEmitter;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let emitter = EventEmitter::<u32>::new();
/// let total = Arc::new(AtomicUsize::new(0));
///
/// let sink = Arc::clone(&total);
/// let listener = emitter.on("tick", move |n| {
///     sink.fetch_add(*n as usize, Ordering::SeqCst);
/// });
///
/// emitter.emit("tick", &2);
/// listener.unsubscribe();
/// emitter.emit("tick", &3);
///
/// assert_eq!(total.load(Ordering::SeqCst), 2);
/// ```
pub struct EventEmitter<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T: 'static> EventEmitter<T> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Registers a handler; the returned [`Listener`] unsubscribes it.
    pub fn on<F>(&self, event: impl Into<String>, handler: F) -> Listener<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = ListenerId::next();
        let event = event.into();
        self.insert(&event, id, Arc::new(handler));
        self.listener(event, id)
    }

    /// Registers a handler that unregisters itself after its first invocation.
    pub fn once<F>(&self, event: impl Into<String>, handler: F) -> Listener<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = ListenerId::next();
        let event = event.into();
        let registry = Arc::downgrade(&self.registry);
        let name = event.clone();
        let fired = AtomicBool::new(false);

        let wrapper = move |data: &T| {
            if fired.swap(true, Ordering::SeqCst) {
                return;
            }
            if let Some(registry) = registry.upgrade() {
                remove(&registry, &name, id);
            }
            handler(data);
        };

        self.insert(&event, id, Arc::new(wrapper));
        self.listener(event, id)
    }

    /// Removes a specific handler. Returns `false` if it was not registered.
    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        remove(&self.registry, event, id)
    }

    /// Invokes every handler registered for `event` and returns how many ran.
    pub fn emit(&self, event: &str, data: &T) -> usize {
        let snapshot: Vec<Handler<T>> = match self.lock().get(event) {
            Some(handlers) => handlers.iter().map(|(_, h)| Arc::clone(h)).collect(),
            None => return 0,
        };

        for handler in &snapshot {
            guarded(event, || handler(data));
        }

        snapshot.len()
    }

    /// Clears one event's handlers, or every event's when `event` is `None`.
    pub fn remove_all_listeners(&self, event: Option<&str>) {
        let mut registry = self.lock();
        match event {
            Some(event) => {
                registry.remove(event);
            }
            None => registry.clear(),
        }
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.lock().get(event).map_or(0, Vec::len)
    }

    pub fn has_listeners(&self, event: &str) -> bool {
        self.listener_count(event) > 0
    }

    pub fn event_names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub(crate) fn insert(&self, event: &str, id: ListenerId, handler: Handler<T>) {
        self.lock()
            .entry(event.to_string())
            .or_default()
            .push((id, handler));
    }

    fn listener(&self, event: String, id: ListenerId) -> Listener<T> {
        Listener {
            id,
            event,
            registry: Arc::downgrade(&self.registry),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry<T>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: 'static> Default for EventEmitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for EventEmitter<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T> std::fmt::Debug for EventEmitter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_map()
            .entries(registry.iter().map(|(event, handlers)| (event, handlers.len())))
            .finish()
    }
}

/// Handle to a registered handler, returned by [`EventEmitter::on`].
pub struct Listener<T> {
    id: ListenerId,
    event: String,
    registry: Weak<Mutex<Registry<T>>>,
}

impl<T> Listener<T> {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    /// Removes the handler. Returns `false` if it was already gone.
    pub fn unsubscribe(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => remove(&registry, &self.event, self.id),
            None => false,
        }
    }
}

/// Runs a callback, logging a panic instead of propagating it.
pub(crate) fn guarded(context: &str, f: impl FnOnce()) -> bool {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(_) => {
            tracing::error!("Handler for '{}' panicked", context);
            false
        }
    }
}

fn remove<T>(registry: &Mutex<Registry<T>>, event: &str, id: ListenerId) -> bool {
    let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(handlers) = registry.get_mut(event) else {
        return false;
    };

    let before = handlers.len();
    handlers.retain(|(existing, _)| *existing != id);
    let removed = handlers.len() != before;

    if handlers.is_empty() {
        registry.remove(event);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::AtomicUsize;

    fn recorder() -> (Arc<StdMutex<Vec<String>>>, impl Fn(&str) -> Box<dyn Fn(&u32) + Send + Sync>) {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let make = move |name: &str| -> Box<dyn Fn(&u32) + Send + Sync> {
            let sink = Arc::clone(&sink);
            let name = name.to_string();
            Box::new(move |n: &u32| sink.lock().unwrap().push(format!("{name}:{n}")))
        };
        (log, make)
    }

    #[test]
    fn test_emit_in_registration_order() {
        let emitter = EventEmitter::<u32>::new();
        let (log, make) = recorder();

        emitter.on("tick", make("a"));
        emitter.on("tick", make("b"));
        emitter.on("other", make("c"));

        assert_eq!(emitter.emit("tick", &1), 2);
        assert_eq!(*log.lock().unwrap(), vec!["a:1", "b:1"]);
    }

    #[test]
    fn test_emit_without_listeners() {
        let emitter = EventEmitter::<u32>::new();
        assert_eq!(emitter.emit("nobody", &1), 0);
    }

    #[test]
    fn test_off_removes_only_that_handler() {
        let emitter = EventEmitter::<u32>::new();
        let (log, make) = recorder();

        let first = emitter.on("tick", make("a")).id();
        emitter.on("tick", make("b"));

        assert!(emitter.off("tick", first));
        assert!(!emitter.off("tick", first));
        emitter.emit("tick", &7);

        assert_eq!(*log.lock().unwrap(), vec!["b:7"]);
    }

    #[test]
    fn test_listener_unsubscribe() {
        let emitter = EventEmitter::<u32>::new();
        let (log, make) = recorder();

        let listener = emitter.on("tick", make("a"));
        assert_eq!(listener.event(), "tick");
        assert!(listener.unsubscribe());
        emitter.emit("tick", &1);

        assert!(log.lock().unwrap().is_empty());
        assert!(!emitter.has_listeners("tick"));
    }

    #[test]
    fn test_once_fires_once() {
        let emitter = EventEmitter::<u32>::new();
        let (log, make) = recorder();

        emitter.once("tick", make("once"));
        emitter.emit("tick", &1);
        emitter.emit("tick", &2);

        assert_eq!(*log.lock().unwrap(), vec!["once:1"]);
        assert_eq!(emitter.listener_count("tick"), 0);
    }

    #[test]
    fn test_once_fires_once_under_reentrant_emit() {
        let emitter = EventEmitter::<u32>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let inner = emitter.clone();
        emitter.on("tick", move |n| {
            if *n == 0 {
                inner.emit("tick", &1);
            }
        });
        let counter = Arc::clone(&calls);
        emitter.once("tick", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        emitter.emit("tick", &0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_removal_during_emit_does_not_skip_handlers() {
        let emitter = EventEmitter::<u32>::new();
        let (log, make) = recorder();

        let victim = Arc::new(StdMutex::new(None::<ListenerId>));
        let remover_emitter = emitter.clone();
        let remover_victim = Arc::clone(&victim);
        emitter.on("tick", move |_| {
            if let Some(id) = *remover_victim.lock().unwrap() {
                remover_emitter.off("tick", id);
            }
        });
        let id = emitter.on("tick", make("b")).id();
        *victim.lock().unwrap() = Some(id);
        emitter.on("tick", make("c"));

        emitter.emit("tick", &1);
        assert_eq!(*log.lock().unwrap(), vec!["b:1", "c:1"]);

        emitter.emit("tick", &2);
        assert_eq!(*log.lock().unwrap(), vec!["b:1", "c:1", "c:2"]);
    }

    #[test]
    fn test_handlers_added_during_emit_run_next_time() {
        let emitter = EventEmitter::<u32>::new();
        let (log, make) = recorder();

        let adder = emitter.clone();
        let make = Arc::new(make);
        let make_late = Arc::clone(&make);
        emitter.once("tick", move |_| {
            adder.on("tick", make_late("late"));
        });
        emitter.on("tick", make("a"));

        emitter.emit("tick", &1);
        assert_eq!(*log.lock().unwrap(), vec!["a:1"]);

        emitter.emit("tick", &2);
        assert_eq!(*log.lock().unwrap(), vec!["a:1", "a:2", "late:2"]);
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let emitter = EventEmitter::<u32>::new();
        let (log, make) = recorder();

        emitter.on("tick", make("a"));
        emitter.on("tick", |_| panic!("handler failure"));
        emitter.on("tick", make("c"));

        assert_eq!(emitter.emit("tick", &1), 3);
        assert_eq!(emitter.emit("tick", &2), 3);
        assert_eq!(*log.lock().unwrap(), vec!["a:1", "c:1", "a:2", "c:2"]);
    }

    #[test]
    fn test_remove_all_listeners() {
        let emitter = EventEmitter::<u32>::new();
        let (_log, make) = recorder();

        emitter.on("a", make("a"));
        emitter.on("b", make("b"));

        emitter.remove_all_listeners(Some("a"));
        assert!(!emitter.has_listeners("a"));
        assert!(emitter.has_listeners("b"));

        emitter.remove_all_listeners(None);
        assert!(emitter.event_names().is_empty());
    }
}
