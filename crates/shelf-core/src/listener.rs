//! Observer lists for change notifications.

use std::fmt;

/// Token returned on subscribe, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Callback<E> = Box<dyn FnMut(&E)>;

/// Ordered list of callbacks for events of type `E`.
///
/// Callbacks run synchronously, in subscription order, on the thread that
/// triggered the change.
pub struct Listeners<E> {
    next_id: u64,
    callbacks: Vec<(ListenerId, Callback<E>)>,
}

impl<E> Listeners<E> {
    /// Empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_id: 0,
            callbacks: Vec::new(),
        }
    }

    /// Subscribe `callback` and return its token.
    pub fn add(&mut self, callback: impl FnMut(&E) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.callbacks.push((id, Box::new(callback)));
        id
    }

    /// Unsubscribe. Returns `false` if `id` was not subscribed.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(existing, _)| *existing != id);
        self.callbacks.len() != before
    }

    /// Deliver `event` to every subscriber.
    pub fn notify(&mut self, event: &E) {
        for (_, callback) in &mut self.callbacks {
            callback(event);
        }
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Whether nobody is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.callbacks.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_notify_in_subscription_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut listeners = Listeners::new();
        let a = Rc::clone(&seen);
        listeners.add(move |e: &u32| a.borrow_mut().push(("a", *e)));
        let b = Rc::clone(&seen);
        listeners.add(move |e: &u32| b.borrow_mut().push(("b", *e)));

        listeners.notify(&7);
        assert_eq!(*seen.borrow(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn test_remove_stops_delivery() {
        let count = Rc::new(RefCell::new(0));
        let mut listeners = Listeners::new();
        let c = Rc::clone(&count);
        let id = listeners.add(move |_: &()| *c.borrow_mut() += 1);

        listeners.notify(&());
        assert!(listeners.remove(id));
        assert!(!listeners.remove(id));
        listeners.notify(&());

        assert_eq!(*count.borrow(), 1);
        assert!(listeners.is_empty());
    }

    #[test]
    fn test_ids_are_unique() {
        let mut listeners: Listeners<()> = Listeners::default();
        let a = listeners.add(|_| {});
        let b = listeners.add(|_| {});
        assert_ne!(a, b);
        assert_eq!(listeners.len(), 2);
    }
}
