//! Recently seen messages, users, and groups.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::events::{EventRecord, Source, SourceKind};

/// Insertion-ordered map that evicts its oldest entry beyond `capacity`.
struct Bounded<V> {
    capacity: usize,
    order: VecDeque<String>,
    entries: HashMap<String, V>,
}

impl<V: Clone> Bounded<V> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::new(),
            entries: HashMap::new(),
        }
    }

    fn insert(&mut self, key: &str, value: V) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.insert(key.to_string(), value).is_some() {
            return;
        }

        self.order.push_back(key.to_string());
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key).cloned()
    }

    fn clear(&mut self) {
        self.order.clear();
        self.entries.clear();
    }
}

struct Tables {
    messages: Bounded<EventRecord>,
    users: Bounded<Source>,
    groups: Bounded<Source>,
}

/// Cache of entities seen in dispatched events.
///
/// Messages are keyed by message id. Users and groups map to the source of
/// the most recent event they appeared in; rooms count as groups.
pub(crate) struct EventCache {
    tables: Mutex<Tables>,
}

impl EventCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            tables: Mutex::new(Tables {
                messages: Bounded::new(capacity),
                users: Bounded::new(capacity),
                groups: Bounded::new(capacity),
            }),
        }
    }

    pub(crate) fn record(&self, event: &EventRecord) {
        let mut tables = self.lock();

        if event.kind.is_message() {
            if let Some(id) = event.raw_payload["message"]["id"].as_str() {
                tables.messages.insert(id, event.clone());
            }
        }

        let Some(source) = &event.source else {
            return;
        };
        if let Some(user_id) = &source.user_id {
            tables.users.insert(user_id, source.clone());
        }
        match source.kind {
            SourceKind::User => {}
            SourceKind::Group | SourceKind::Room => tables.groups.insert(&source.id, source.clone()),
        }
    }

    pub(crate) fn message(&self, message_id: &str) -> Option<EventRecord> {
        self.lock().messages.get(message_id)
    }

    pub(crate) fn user(&self, user_id: &str) -> Option<Source> {
        self.lock().users.get(user_id)
    }

    pub(crate) fn group(&self, group_id: &str) -> Option<Source> {
        self.lock().groups.get(group_id)
    }

    pub(crate) fn clear(&self) {
        let mut tables = self.lock();
        tables.messages.clear();
        tables.users.clear();
        tables.groups.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
