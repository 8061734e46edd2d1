//! Change notification.
//!
//! The manager announces "something you may want to redraw changed"
//! through a version counter. Listeners receive the new version
//! synchronously on the control context, after every mutation for the
//! current operation or event batch has been applied, and at most once
//! per version change.

/// Handle returned by [`ChangeDispatcher::subscribe`]; pass it back to
/// unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Callback invoked with the new tile version.
pub type ChangeListener = Box<dyn FnMut(u64) + Send>;

/// Listener registry owned by the manager.
#[derive(Default)]
pub struct ChangeDispatcher {
    next_id: u64,
    listeners: Vec<(ListenerId, ChangeListener)>,
}

impl ChangeDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener and return its handle.
    pub fn subscribe(&mut self, listener: ChangeListener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.listeners.push((id, listener));
        id
    }

    /// Remove a listener. Returns `false` if the handle was not found.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether no listeners are registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Invoke every listener with the new version.
    pub(crate) fn emit(&mut self, version: u64) {
        for (_, listener) in &mut self.listeners {
            listener(version);
        }
    }

    /// Drop all listeners.
    pub(crate) fn clear(&mut self) {
        self.listeners.clear();
    }
}
