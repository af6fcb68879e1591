use derive_ex::Ex;
use serde::{Deserialize, Serialize};

#[cfg(test)]
mod tests;

/// Settings of a [`Dispatcher`](crate::Dispatcher).
///
/// Missing fields take their default values when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Ex)]
#[derive_ex(Default)]
#[default(Self::new())]
#[serde(default)]
pub struct DispatcherConfig {
    /// Maximum number of re-entrant dispatches drained after one outer dispatch.
    pub max_redispatch: usize,

    /// Queue dispatches made while a dispatch is running.
    ///
    /// If `false`, such dispatches fail with [`DispatchError::Reentrant`](crate::DispatchError::Reentrant).
    pub queue_reentrant: bool,
}

impl DispatcherConfig {
    pub const fn new() -> Self {
        Self {
            max_redispatch: 1024,
            queue_reentrant: true,
        }
    }
    pub fn with_max_redispatch(mut self, max_redispatch: usize) -> Self {
        self.max_redispatch = max_redispatch;
        self
    }
    pub fn with_queue_reentrant(mut self, queue_reentrant: bool) -> Self {
        self.queue_reentrant = queue_reentrant;
        self
    }
}
