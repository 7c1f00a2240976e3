//! Id allocation for new patients and sessions.
//!
//! The engine treats ids as opaque unique strings and never inspects them.

use uuid::Uuid;

/// Source of fresh, unique ids
pub trait IdAllocator {
    fn next_id(&mut self) -> String;
}

/// Random v4 UUIDs, used in production
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidIds;

impl IdAllocator for UuidIds {
    fn next_id(&mut self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Deterministic `<prefix>-<n>` ids, for reproducible output
#[derive(Clone, Debug)]
pub struct SequentialIds {
    prefix: String,
    next: u64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new("s")
    }
}

impl IdAllocator for SequentialIds {
    fn next_id(&mut self) -> String {
        let id = format!("{}-{}", self.prefix, self.next);
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ids_are_deterministic() {
        let mut a = SequentialIds::new("x");
        let mut b = SequentialIds::new("x");

        assert_eq!(a.next_id(), "x-1");
        assert_eq!(a.next_id(), "x-2");
        assert_eq!(b.next_id(), "x-1");
    }

    #[test]
    fn test_uuid_ids_are_unique() {
        let mut ids = UuidIds;
        assert_ne!(ids.next_id(), ids.next_id());
    }
}
