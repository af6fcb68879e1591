use std::{cell::RefCell, collections::HashMap, rc::Rc};

use derive_ex::derive_ex;
use parse_display::Display;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{listeners::Listeners, Subscription};


type Watcher<T> = dyn Fn(&T, &T);
type Validator<T> = dyn Fn(&T) -> bool;

/// A single mutable slot holding an immutable value.
///
/// The value is replaced as a whole, never mutated in place.
/// Each replacement is reported to the registered watchers as `(old, new)`,
/// synchronously and in registration order.
///
/// Cloning an `Atom` produces another handle to the same slot.
#[derive_ex(Clone, bound())]
pub struct Atom<T: 'static>(Rc<AtomNode<T>>);

impl<T: 'static> Atom<T> {
    /// Create a new `Atom` with the given initial value.
    pub fn new(value: T) -> Self {
        Self(Rc::new(AtomNode {
            value: RefCell::new(Rc::new(value)),
            watchers: RefCell::new(Listeners::new()),
            keyed: RefCell::new(HashMap::new()),
            validator: RefCell::new(None),
        }))
    }

    /// Returns the current value.
    pub fn get(&self) -> Rc<T> {
        self.0.value.borrow().clone()
    }

    /// Calls `f` with the current value.
    ///
    /// The atom is not borrowed while `f` runs, so `f` may replace it.
    pub fn with<U>(&self, f: impl FnOnce(&T) -> U) -> U {
        f(&self.get())
    }

    /// Replaces the value and notifies the watchers.
    ///
    /// Returns the new value.
    pub fn reset(&self, value: T) -> Result<Rc<T>, InvalidState> {
        self.0.replace(Rc::new(value))
    }

    /// Replaces the value only if it differs from the current one.
    ///
    /// If the values are equal, no watcher is notified and the current value is returned.
    pub fn reset_dedup(&self, value: T) -> Result<Rc<T>, InvalidState>
    where
        T: PartialEq,
    {
        let current = self.get();
        if *current == value {
            return Ok(current);
        }
        self.reset(value)
    }

    /// Replaces the value with the result of `f` applied to the current value.
    pub fn swap(&self, f: impl FnOnce(&T) -> T) -> Result<Rc<T>, InvalidState> {
        let next = f(&self.get());
        self.reset(next)
    }

    /// Replaces the value only if the current value is `expected` (by identity).
    ///
    /// Returns `Ok(false)` without notifying anyone if the value has been replaced since `expected` was obtained.
    pub fn compare_and_set(&self, expected: &Rc<T>, value: T) -> Result<bool, InvalidState> {
        if !Rc::ptr_eq(&*self.0.value.borrow(), expected) {
            return Ok(false);
        }
        self.reset(value)?;
        Ok(true)
    }

    /// Registers a watcher that is called with `(old, new)` after every replacement.
    ///
    /// The watcher is removed when the returned `Subscription` is dropped.
    pub fn watch(&self, f: impl Fn(&T, &T) + 'static) -> Subscription {
        let key = self.0.watchers.borrow_mut().insert(Rc::new(f));
        Subscription::from_weak_fn(Rc::downgrade(&self.0), move |node| {
            node.watchers.borrow_mut().remove(key);
        })
    }

    /// Registers a watcher under `key`.
    ///
    /// If a watcher with the same key exists, it is replaced and keeps its place in the notification order.
    pub fn add_watch(&self, key: impl Into<String>, f: impl Fn(&T, &T) + 'static) {
        let key = key.into();
        let f: Rc<Watcher<T>> = Rc::new(f);
        let mut keyed = self.0.keyed.borrow_mut();
        let mut watchers = self.0.watchers.borrow_mut();
        if let Some(&index) = keyed.get(&key) {
            watchers.replace(index, f);
        } else {
            keyed.insert(key, watchers.insert(f));
        }
    }

    /// Removes the watcher registered under `key`.
    ///
    /// Returns `false` if there was none.
    pub fn remove_watch(&self, key: &str) -> bool {
        let Some(index) = self.0.keyed.borrow_mut().remove(key) else {
            return false;
        };
        self.0.watchers.borrow_mut().remove(index)
    }

    pub fn watcher_count(&self) -> usize {
        self.0.watchers.borrow().len()
    }

    /// Installs a validator that every new value must pass.
    ///
    /// Fails without installing anything if the current value does not pass.
    pub fn set_validator(&self, f: impl Fn(&T) -> bool + 'static) -> Result<(), InvalidState> {
        if !f(&self.get()) {
            return Err(InvalidState::new());
        }
        *self.0.validator.borrow_mut() = Some(Rc::new(f));
        Ok(())
    }

    pub fn clear_validator(&self) {
        self.0.validator.borrow_mut().take();
    }
}

impl<T: Default + 'static> Default for Atom<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
impl<T: std::fmt::Debug> std::fmt::Debug for Atom<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&*self.get(), f)
    }
}
impl<T> Serialize for Atom<T>
where
    T: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        T::serialize(&self.get(), serializer)
    }
}
impl<'de, T> Deserialize<'de> for Atom<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Atom<T>, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Atom::new)
    }
}

struct AtomNode<T: 'static> {
    value: RefCell<Rc<T>>,
    watchers: RefCell<Listeners<Watcher<T>>>,
    keyed: RefCell<HashMap<String, usize>>,
    validator: RefCell<Option<Rc<Validator<T>>>>,
}
impl<T: 'static> AtomNode<T> {
    fn validate(&self, value: &T) -> Result<(), InvalidState> {
        let validator = self.validator.borrow().clone();
        match validator {
            Some(validator) if !validator(value) => Err(InvalidState::new()),
            _ => Ok(()),
        }
    }
    fn replace(&self, new: Rc<T>) -> Result<Rc<T>, InvalidState> {
        self.validate(&new)?;
        let old = self.value.replace(new.clone());
        self.notify(&old, &new);
        Ok(new)
    }
    fn notify(&self, old: &T, new: &T) {
        let watchers = self.watchers.borrow().snapshot();
        trace!(watchers = watchers.len(), "atom replaced");
        for watcher in watchers {
            watcher(old, new);
        }
    }
}

/// The error returned when a validator rejects a new value.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
#[display("state rejected by validator")]
pub struct InvalidState {
    _private: (),
}
impl InvalidState {
    fn new() -> Self {
        Self { _private: () }
    }
}

impl std::error::Error for InvalidState {}
