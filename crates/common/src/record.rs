//! Capabilities shared by every persisted record.
//!
//! Records embed a [`RecordMeta`] and expose it through [`Record`]; identity,
//! timestamps and soft deletion are then provided by blanket impls instead of
//! being re-implemented on each entity.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Identity, lifecycle flag and timestamps of a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordMeta {
    pub id: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecordMeta {
    /// A fresh, active record stamped with the current time.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for RecordMeta {
    fn default() -> Self {
        Self::new()
    }
}

pub trait Record {
    fn meta(&self) -> &RecordMeta;
    fn meta_mut(&mut self) -> &mut RecordMeta;
}

pub trait HasIdentity {
    fn id(&self) -> Uuid;
}

pub trait HasTimestamps {
    fn created_at(&self) -> DateTime<Utc>;
    fn updated_at(&self) -> DateTime<Utc>;
    /// Bump `updated_at` to now.
    fn touch(&mut self);
}

pub trait SoftDeletable {
    fn is_active(&self) -> bool;
    /// Mark the record inactive as of `at`. Calling it on an inactive record
    /// only refreshes `updated_at`.
    fn soft_delete(&mut self, at: DateTime<Utc>);
}

impl<T: Record> HasIdentity for T {
    fn id(&self) -> Uuid {
        self.meta().id
    }
}

impl<T: Record> HasTimestamps for T {
    fn created_at(&self) -> DateTime<Utc> {
        self.meta().created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.meta().updated_at
    }

    fn touch(&mut self) {
        self.meta_mut().updated_at = Utc::now();
    }
}

impl<T: Record> SoftDeletable for T {
    fn is_active(&self) -> bool {
        self.meta().is_active
    }

    fn soft_delete(&mut self, at: DateTime<Utc>) {
        let meta = self.meta_mut();
        meta.is_active = false;
        meta.updated_at = at;
    }
}

/// Sort newest first. Records sharing a `created_at` keep reverse insertion
/// order, so the most recently inserted one still comes first.
pub fn sort_newest_first<T: HasTimestamps>(records: &mut Vec<T>) {
    records.reverse();
    records.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
}

macro_rules! impl_record {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::record::Record for $ty {
                fn meta(&self) -> &$crate::record::RecordMeta {
                    &self.meta
                }

                fn meta_mut(&mut self) -> &mut $crate::record::RecordMeta {
                    &mut self.meta
                }
            }
        )*
    };
}

pub(crate) use impl_record;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[derive(Debug)]
    struct Note {
        meta: RecordMeta,
        label: &'static str,
    }

    impl_record!(Note);

    #[test]
    fn soft_delete_is_idempotent() {
        let mut note = Note {
            meta: RecordMeta::new(),
            label: "a",
        };
        assert!(note.is_active());
        note.soft_delete(Utc::now());
        note.soft_delete(Utc::now());
        assert!(!note.is_active());
        assert!(note.updated_at() >= note.created_at());
    }

    #[test]
    fn newest_first_breaks_ties_by_insertion() {
        let base = Utc::now();
        let mk = |label, offset| {
            let mut meta = RecordMeta::new();
            meta.created_at = base + Duration::seconds(offset);
            Note { meta, label }
        };
        let mut notes = vec![mk("old", 0), mk("tie-1", 5), mk("tie-2", 5), mk("new", 9)];
        sort_newest_first(&mut notes);
        let labels: Vec<_> = notes.iter().map(|n| n.label).collect();
        assert_eq!(labels, ["new", "tie-2", "tie-1", "old"]);
    }
}
