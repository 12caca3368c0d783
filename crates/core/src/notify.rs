//! Transient user notifications.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Toasts older than this are dropped by [`Notifier::expire`].
pub const TOAST_LIFETIME_SECS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ToastId(u64);

impl ToastId {
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastVariant {
    #[default]
    Default,
    Destructive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Toast {
    pub id: ToastId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub variant: ToastVariant,
    pub created_at: DateTime<Utc>,
}

type Listener = Box<dyn FnMut(&[Toast]) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

/// Owned toast list. Listeners get the full list after every change.
#[derive(Default)]
pub struct Notifier {
    toasts: Vec<Toast>,
    next_id: u64,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("toasts", &self.toasts)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Notifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn toasts(&self) -> &[Toast] {
        &self.toasts
    }

    pub fn push(
        &mut self,
        title: impl Into<String>,
        description: Option<String>,
        variant: ToastVariant,
        now: DateTime<Utc>,
    ) -> ToastId {
        self.next_id += 1;
        let id = ToastId(self.next_id);
        self.toasts.push(Toast {
            id,
            title: title.into(),
            description,
            variant,
            created_at: now,
        });
        self.notify();
        id
    }

    /// Returns false if the toast was already gone.
    pub fn dismiss(&mut self, id: ToastId) -> bool {
        let before = self.toasts.len();
        self.toasts.retain(|t| t.id != id);
        let removed = self.toasts.len() != before;
        if removed {
            self.notify();
        }
        removed
    }

    /// Drop every toast at least [`TOAST_LIFETIME_SECS`] old.
    pub fn expire(&mut self, now: DateTime<Utc>) -> usize {
        let lifetime = Duration::seconds(TOAST_LIFETIME_SECS);
        let before = self.toasts.len();
        self.toasts.retain(|t| now - t.created_at < lifetime);
        let removed = before - self.toasts.len();
        if removed > 0 {
            self.notify();
        }
        removed
    }

    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&[Toast]) + Send + 'static,
    {
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    fn notify(&mut self) {
        for (_, listener) in &mut self.listeners {
            listener(&self.toasts);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use std::sync::{Arc, Mutex};

    #[test]
    fn ids_increment_and_dismiss_removes() {
        let mut n = Notifier::new();
        let a = n.push("Saved", None, ToastVariant::Default, fixed_now());
        let b = n.push("Failed", Some("retry".into()), ToastVariant::Destructive, fixed_now());
        assert_eq!(a.value() + 1, b.value());
        assert!(n.dismiss(a));
        assert!(!n.dismiss(a));
        assert_eq!(n.toasts().len(), 1);
        assert_eq!(n.toasts()[0].id, b);
    }

    #[test]
    fn expire_drops_after_five_seconds() {
        let mut n = Notifier::new();
        let t0 = fixed_now();
        n.push("old", None, ToastVariant::Default, t0);
        n.push("new", None, ToastVariant::Default, t0 + Duration::seconds(3));

        assert_eq!(n.expire(t0 + Duration::milliseconds(4_999)), 0);
        assert_eq!(n.expire(t0 + Duration::seconds(5)), 1);
        assert_eq!(n.toasts()[0].title, "new");
        assert_eq!(n.expire(t0 + Duration::seconds(8)), 1);
        assert!(n.toasts().is_empty());
    }

    #[test]
    fn listeners_get_full_list_until_unsubscribed() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut n = Notifier::new();
        let sink = Arc::clone(&seen);
        let id = n.subscribe(move |toasts| sink.lock().unwrap().push(toasts.len()));

        let a = n.push("one", None, ToastVariant::Default, fixed_now());
        n.push("two", None, ToastVariant::Default, fixed_now());
        n.dismiss(a);
        assert!(n.unsubscribe(id));
        n.push("three", None, ToastVariant::Default, fixed_now());

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 1]);
    }
}
