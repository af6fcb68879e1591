use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, VecDeque},
    rc::{Rc, Weak},
};

use derive_ex::derive_ex;
use futures::{pin_mut, Stream, StreamExt};
use parse_display::Display;
use tracing::{debug, trace, warn};

use crate::{listeners::Listeners, Atom, DispatcherConfig, InvalidState, Subscription};


/// A state transition: computes the next state from a dispatched value and the current state.
///
/// Handlers should be pure. Results of side effects started by a handler must
/// come back through another dispatch.
pub trait Handler<S, V>: 'static {
    fn handle(&self, value: &V, state: &S) -> S;
}
impl<S, V, F> Handler<S, V> for F
where
    F: Fn(&V, &S) -> S + 'static,
{
    fn handle(&self, value: &V, state: &S) -> S {
        self(value, state)
    }
}

/// A value addressed to the handler registered for `namespace`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action<V> {
    pub namespace: String,
    pub value: V,
}
impl<V> Action<V> {
    pub fn new(namespace: impl Into<String>, value: V) -> Self {
        Self {
            namespace: namespace.into(),
            value,
        }
    }
}

/// Notification sent to subscribers after each completed dispatch.
#[derive(Debug)]
pub struct DispatchEvent<'a, S, V> {
    pub namespace: &'a str,
    pub value: &'a V,
    pub state: &'a Rc<S>,
}

/// Outcome of a successful dispatch call.
#[derive(Debug)]
pub enum Dispatched<S> {
    /// The handler ran and its result became the current state.
    Applied(Rc<S>),

    /// Another dispatch was running; the action runs after it finishes.
    Queued,
}
impl<S> Dispatched<S> {
    pub fn state(&self) -> Option<&Rc<S>> {
        match self {
            Dispatched::Applied(state) => Some(state),
            Dispatched::Queued => None,
        }
    }
    pub fn is_queued(&self) -> bool {
        matches!(self, Dispatched::Queued)
    }
}

#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[display("no handler registered for `{0}`")]
    MissingHandler(String),

    #[display("{0}")]
    InvalidState(InvalidState),

    #[display("`{0}` dispatched while another dispatch is running")]
    Reentrant(String),

    #[display("more than {0} dispatches queued by a single dispatch")]
    RedispatchLimit(usize),

    #[display("dispatcher has been dropped")]
    Closed,
}
impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::InvalidState(e) => Some(e),
            _ => None,
        }
    }
}
impl From<InvalidState> for DispatchError {
    fn from(e: InvalidState) -> Self {
        DispatchError::InvalidState(e)
    }
}

type Subscriber<S, V> = dyn Fn(&DispatchEvent<S, V>);

/// Routes actions to named handlers and stores the results in an [`Atom`].
///
/// One dispatch cycle looks up the handler, calls it with the value and the
/// current state, replaces the atom's state with the result, then notifies
/// the subscribers.
#[derive_ex(Clone, bound())]
pub struct Dispatcher<S: 'static, V: 'static>(Rc<DispatcherNode<S, V>>);

impl<S: 'static, V: 'static> Dispatcher<S, V> {
    pub fn new(atom: Atom<S>) -> Self {
        Self::with_config(atom, DispatcherConfig::default())
    }
    pub fn with_config(atom: Atom<S>, config: DispatcherConfig) -> Self {
        Self(Rc::new(DispatcherNode {
            atom,
            config,
            handlers: RefCell::new(HashMap::new()),
            subscribers: RefCell::new(Listeners::new()),
            is_dispatching: Cell::new(false),
            queue: RefCell::new(VecDeque::new()),
        }))
    }

    /// Create a dispatcher owning a new atom initialized with `state`.
    pub fn from_state(state: S) -> Self {
        Self::new(Atom::new(state))
    }

    pub fn atom(&self) -> &Atom<S> {
        &self.0.atom
    }
    pub fn state(&self) -> Rc<S> {
        self.0.atom.get()
    }
    pub fn config(&self) -> &DispatcherConfig {
        &self.0.config
    }

    /// Registers `f` as the handler for `namespace`.
    ///
    /// Returns `true` if it replaced an existing handler.
    pub fn register(
        &self,
        namespace: impl Into<String>,
        f: impl Fn(&V, &S) -> S + 'static,
    ) -> bool {
        self.register_handler(namespace, f)
    }
    pub fn register_handler(
        &self,
        namespace: impl Into<String>,
        handler: impl Handler<S, V>,
    ) -> bool {
        let namespace = namespace.into();
        let replaced = self
            .0
            .handlers
            .borrow_mut()
            .insert(namespace.clone(), Rc::new(handler))
            .is_some();
        if replaced {
            debug!(namespace = namespace.as_str(), "handler replaced");
        }
        replaced
    }
    pub fn unregister(&self, namespace: &str) -> bool {
        self.0.handlers.borrow_mut().remove(namespace).is_some()
    }
    pub fn has_handler(&self, namespace: &str) -> bool {
        self.0.handlers.borrow().contains_key(namespace)
    }

    /// Names of the registered handlers, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<_> = self.0.handlers.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// Runs one dispatch cycle for `value` addressed to `namespace`.
    ///
    /// If called while a dispatch is running (from a handler, a watcher or a
    /// subscriber), the action is queued and runs once the running dispatch
    /// has notified its subscribers.
    pub fn dispatch(
        &self,
        namespace: impl Into<String>,
        value: V,
    ) -> Result<Dispatched<S>, DispatchError> {
        self.dispatch_action(Action::new(namespace, value))
    }
    pub fn dispatch_action(&self, action: Action<V>) -> Result<Dispatched<S>, DispatchError> {
        self.0.dispatch(action)
    }

    /// Registers a callback that is called after every completed dispatch.
    pub fn subscribe(&self, f: impl Fn(&DispatchEvent<S, V>) + 'static) -> Subscription {
        let key = self.0.subscribers.borrow_mut().insert(Rc::new(f));
        Subscription::from_weak_fn(Rc::downgrade(&self.0), move |node| {
            node.subscribers.borrow_mut().remove(key);
        })
    }

    /// Returns a handle that does not keep the dispatcher alive.
    pub fn handle(&self) -> DispatchHandle<S, V> {
        DispatchHandle(Rc::downgrade(&self.0))
    }
}
impl<S: std::fmt::Debug + 'static, V: 'static> std::fmt::Debug for Dispatcher<S, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("state", &self.0.atom)
            .field("namespaces", &self.namespaces())
            .finish()
    }
}

/// Weak handle to a [`Dispatcher`] for use inside handlers, callbacks and futures.
#[derive_ex(Clone, bound())]
pub struct DispatchHandle<S: 'static, V: 'static>(Weak<DispatcherNode<S, V>>);

impl<S: 'static, V: 'static> DispatchHandle<S, V> {
    pub fn dispatch(
        &self,
        namespace: impl Into<String>,
        value: V,
    ) -> Result<Dispatched<S>, DispatchError> {
        self.dispatch_action(Action::new(namespace, value))
    }
    pub fn dispatch_action(&self, action: Action<V>) -> Result<Dispatched<S>, DispatchError> {
        let Some(node) = self.0.upgrade() else {
            return Err(DispatchError::Closed);
        };
        node.dispatch(action)
    }

    /// Dispatches every action produced by `actions`, in order.
    ///
    /// Stops at the first failed dispatch.
    pub async fn forward(
        &self,
        actions: impl Stream<Item = Action<V>>,
    ) -> Result<(), DispatchError> {
        pin_mut!(actions);
        while let Some(action) = actions.next().await {
            self.dispatch_action(action)?;
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.0.strong_count() == 0
    }
}

struct DispatcherNode<S: 'static, V: 'static> {
    atom: Atom<S>,
    config: DispatcherConfig,
    handlers: RefCell<HashMap<String, Rc<dyn Handler<S, V>>>>,
    subscribers: RefCell<Listeners<Subscriber<S, V>>>,
    is_dispatching: Cell<bool>,
    queue: RefCell<VecDeque<Action<V>>>,
}

impl<S: 'static, V: 'static> DispatcherNode<S, V> {
    fn handler(&self, namespace: &str) -> Option<Rc<dyn Handler<S, V>>> {
        self.handlers.borrow().get(namespace).cloned()
    }

    fn dispatch(&self, action: Action<V>) -> Result<Dispatched<S>, DispatchError> {
        if self.is_dispatching.get() {
            return self.enqueue(action);
        }
        let _guard = DispatchGuard::new(self);
        let state = self.run(&action)?;
        self.drain()?;
        Ok(Dispatched::Applied(state))
    }

    fn enqueue(&self, action: Action<V>) -> Result<Dispatched<S>, DispatchError> {
        if !self.config.queue_reentrant {
            return Err(DispatchError::Reentrant(action.namespace));
        }
        if !self.handlers.borrow().contains_key(&action.namespace) {
            return Err(DispatchError::MissingHandler(action.namespace));
        }
        trace!(namespace = action.namespace.as_str(), "dispatch queued");
        self.queue.borrow_mut().push_back(action);
        Ok(Dispatched::Queued)
    }

    fn pop_queued(&self) -> Option<Action<V>> {
        self.queue.borrow_mut().pop_front()
    }

    fn drain(&self) -> Result<(), DispatchError> {
        let mut drained = 0;
        while let Some(action) = self.pop_queued() {
            drained += 1;
            if drained > self.config.max_redispatch {
                warn!(
                    namespace = action.namespace.as_str(),
                    limit = self.config.max_redispatch,
                    "redispatch limit reached; discarding queued dispatches"
                );
                return Err(DispatchError::RedispatchLimit(self.config.max_redispatch));
            }
            if let Err(e) = self.run(&action) {
                warn!(namespace = action.namespace.as_str(), error = %e, "queued dispatch skipped");
            }
        }
        Ok(())
    }

    fn run(&self, action: &Action<V>) -> Result<Rc<S>, DispatchError> {
        let namespace = action.namespace.as_str();
        let handler = self
            .handler(namespace)
            .ok_or_else(|| DispatchError::MissingHandler(namespace.to_owned()))?;
        debug!(namespace, "dispatch");
        let next = handler.handle(&action.value, &self.atom.get());
        let state = self.atom.reset(next)?;

        let subscribers = self.subscribers.borrow().snapshot();
        trace!(namespace, subscribers = subscribers.len(), "dispatch applied");
        let event = DispatchEvent {
            namespace,
            value: &action.value,
            state: &state,
        };
        for subscriber in subscribers {
            subscriber(&event);
        }
        Ok(state)
    }
}

struct DispatchGuard<'a, S: 'static, V: 'static>(&'a DispatcherNode<S, V>);

impl<'a, S: 'static, V: 'static> DispatchGuard<'a, S, V> {
    fn new(node: &'a DispatcherNode<S, V>) -> Self {
        node.is_dispatching.set(true);
        Self(node)
    }
}
impl<S: 'static, V: 'static> Drop for DispatchGuard<'_, S, V> {
    fn drop(&mut self) {
        self.0.queue.borrow_mut().clear();
        self.0.is_dispatching.set(false);
    }
}
