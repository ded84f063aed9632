//! Named-channel publish/subscribe registry.
//!
//! Listeners are kept per channel in registration order and invoked
//! synchronously by [`EventBus::publish`]. The same closure may be registered
//! twice; each registration is delivered separately.

use std::collections::HashMap;
use std::hash::Hash;

type Listener<P> = Box<dyn FnMut(&P) + Send>;

/// Opaque handle returned by [`EventBus::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

pub struct EventBus<C, P> {
    listeners: HashMap<C, Vec<(SubscriptionHandle, Listener<P>)>>,
    next_handle: u64,
}

impl<C, P> Default for EventBus<C, P> {
    fn default() -> Self {
        Self { listeners: HashMap::new(), next_handle: 0 }
    }
}

impl<C, P> EventBus<C, P>
where
    C: Eq + Hash,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `listener` to the end of `channel`'s delivery list
    pub fn subscribe<F>(&mut self, channel: C, listener: F) -> SubscriptionHandle
    where
        F: FnMut(&P) + Send + 'static,
    {
        let handle = SubscriptionHandle(self.next_handle);
        self.next_handle += 1;
        self.listeners.entry(channel).or_default().push((handle, Box::new(listener)));
        handle
    }

    /// Remove the listener registered under `handle`.
    ///
    /// Returns `false` if the handle was already removed.
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        for listeners in self.listeners.values_mut() {
            if let Some(pos) = listeners.iter().position(|(h, _)| *h == handle) {
                drop(listeners.remove(pos));
                return true;
            }
        }
        false
    }

    /// Deliver `payload` to every listener on `channel`, in registration order.
    ///
    /// Returns the number of listeners invoked; zero when nobody subscribed.
    pub fn publish(&mut self, channel: &C, payload: &P) -> usize {
        let Some(listeners) = self.listeners.get_mut(channel) else {
            return 0;
        };
        for (_, listener) in listeners.iter_mut() {
            listener(payload);
        }
        listeners.len()
    }

    #[must_use]
    pub fn listener_count(&self, channel: &C) -> usize {
        self.listeners.get(channel).map_or(0, Vec::len)
    }
}
