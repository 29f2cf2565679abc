//! Message bus for a sandboxed frame's window.
//!
//! Models `window.postMessage` between the controller and an embedded
//! document. Every listener carries the origin it lives in; a post reaches
//! listeners whose origin matches the target origin, or all of them for
//! `"*"`. The sender is not excluded, so both sides see their own posts.

use std::sync::{Arc, Mutex, PoisonError};

/// Wildcard target origin.
pub const ANY_ORIGIN: &str = "*";

/// A delivered message event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowMessage {
    pub data: String,
    /// Origin of the sender.
    pub origin: String,
}

pub type ListenerId = u64;

type Listener = Arc<dyn Fn(&WindowMessage) + Send + Sync>;

struct Registration {
    id: ListenerId,
    origin: String,
    listener: Listener,
}

#[derive(Default)]
struct Listeners {
    next_id: ListenerId,
    registrations: Vec<Registration>,
}

/// Shared window object; clones refer to the same listener list.
#[derive(Clone, Default)]
pub struct Window {
    listeners: Arc<Mutex<Listeners>>,
}

impl Window {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a `message` listener that lives in `origin`.
    pub fn add_listener<F>(&self, origin: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&WindowMessage) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners.next_id += 1;
        let id = listeners.next_id;
        listeners.registrations.push(Registration {
            id,
            origin: origin.into(),
            listener: Arc::new(listener),
        });
        id
    }

    /// Returns false if `id` was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.registrations.len();
        listeners.registrations.retain(|r| r.id != id);
        listeners.registrations.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .registrations
            .len()
    }

    /// Posts `data` from `source_origin`. Returns how many listeners received it.
    ///
    /// Listeners are called after the lock is released, so a listener may
    /// post or unregister.
    pub fn post_message(&self, data: &str, target_origin: &str, source_origin: &str) -> usize {
        let targets: Vec<Listener> = {
            let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
            listeners
                .registrations
                .iter()
                .filter(|r| target_origin == ANY_ORIGIN || r.origin == target_origin)
                .map(|r| Arc::clone(&r.listener))
                .collect()
        };

        if targets.is_empty() {
            tracing::debug!(target_origin, "window message had no matching listener");
        }

        let message = WindowMessage {
            data: data.to_string(),
            origin: source_origin.to_string(),
        };
        for listener in &targets {
            listener(&message);
        }
        targets.len()
    }
}

impl std::fmt::Debug for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Window")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
