use std::{
    mem::take,
    rc::{Rc, Weak},
};

#[cfg(test)]
mod tests;

/// Keeps a registration (watcher, subscriber, connected component) alive.
///
/// Dropping a `Subscription` removes the registration.
#[derive(Default)]
#[must_use]
pub struct Subscription(RawSubscription);

impl Subscription {
    pub fn empty() -> Self {
        Subscription(RawSubscription::Empty)
    }
    pub fn from_fn(f: impl FnOnce() + 'static) -> Self {
        Subscription(RawSubscription::Fn(Box::new(f)))
    }

    /// Create a `Subscription` that calls `unsubscribe` on drop if `this` is still alive.
    pub fn from_weak_fn<T: 'static>(
        this: Weak<T>,
        unsubscribe: impl FnOnce(Rc<T>) + 'static,
    ) -> Self {
        Self::from_fn(move || {
            if let Some(this) = this.upgrade() {
                unsubscribe(this)
            }
        })
    }

    /// Leave the registration in place for the rest of its owner's lifetime.
    pub fn detach(mut self) {
        self.0 = RawSubscription::Empty;
    }
}
impl Drop for Subscription {
    fn drop(&mut self) {
        match take(&mut self.0) {
            RawSubscription::Empty => {}
            RawSubscription::Fn(f) => f(),
        }
    }
}
impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            RawSubscription::Empty => write!(f, "Subscription(<empty>)"),
            RawSubscription::Fn(_) => write!(f, "Subscription(<active>)"),
        }
    }
}

#[derive(Default)]
enum RawSubscription {
    #[default]
    Empty,
    Fn(Box<dyn FnOnce() + 'static>),
}
