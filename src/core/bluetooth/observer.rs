//! Observer list for connection state changes

use std::sync::{Arc, Mutex, Weak};

use crate::utils::lock;

type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

struct Registry<T> {
    next_id: u64,
    callbacks: Vec<(u64, Callback<T>)>,
}

/// Callbacks keyed by subscription id. Each callback receives its own copy of the value.
pub struct ObserverList<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T> Clone for ObserverList<T> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
        }
    }
}

impl<T> Default for ObserverList<T> {
    fn default() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                callbacks: Vec::new(),
            })),
        }
    }
}

impl<T: Clone + Send + 'static> ObserverList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback`; it stays registered until the returned [`Subscription`] goes away.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let id = {
            let mut registry = lock(&self.registry);
            let id = registry.next_id;
            registry.next_id += 1;
            registry.callbacks.push((id, Arc::new(callback)));
            id
        };

        let weak: Weak<Mutex<Registry<T>>> = Arc::downgrade(&self.registry);
        Subscription {
            remove: Some(Box::new(move || {
                if let Some(registry) = weak.upgrade() {
                    lock(&registry).callbacks.retain(|(cb_id, _)| *cb_id != id);
                }
            })),
        }
    }

    /// Calls every registered callback with a copy of `value`.
    ///
    /// The registry lock is released before any callback runs, so callbacks may
    /// subscribe or unsubscribe.
    pub fn notify(&self, value: &T) {
        let callbacks: Vec<Callback<T>> = lock(&self.registry)
            .callbacks
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in callbacks {
            callback(value.clone());
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.registry).callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle returned by `on_connection_state_change`. Dropping it unsubscribes.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct Subscription {
    remove: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.release();
    }

    /// Keeps the callback registered for the lifetime of the observed object.
    pub fn detach(mut self) {
        self.remove = None;
    }

    fn release(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
