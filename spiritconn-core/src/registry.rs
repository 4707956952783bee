//! Host registry
//!
//! Owns every [`HostRecord`] and preserves the order hosts were added in,
//! which is the order the host list displays them.

use std::collections::HashMap;

use crate::models::{HostId, HostRecord};

/// Ordered collection of host records
#[derive(Debug, Default)]
pub struct HostRegistry {
    records: HashMap<HostId, HostRecord>,
    order: Vec<HostId>,
}

impl HostRegistry {
    /// Creates an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record, returning its id. A record with the same id replaces
    /// the old one in place without changing its position.
    pub fn add(&mut self, record: HostRecord) -> HostId {
        let id = record.id;
        if self.records.insert(id, record).is_none() {
            self.order.push(id);
        }
        id
    }

    /// Looks up a record by id
    #[must_use]
    pub fn get(&self, id: HostId) -> Option<&HostRecord> {
        self.records.get(&id)
    }

    /// Looks up a record mutably by id
    pub fn get_mut(&mut self, id: HostId) -> Option<&mut HostRecord> {
        self.records.get_mut(&id)
    }

    /// Finds the first record with the given display name
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&HostRecord> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id))
            .find(|r| r.name == name)
    }

    /// Removes a record
    pub fn remove(&mut self, id: HostId) -> Option<HostRecord> {
        let removed = self.records.remove(&id);
        if removed.is_some() {
            self.order.retain(|other| *other != id);
        }
        removed
    }

    /// Ids in insertion order
    #[must_use]
    pub fn ids(&self) -> Vec<HostId> {
        self.order.clone()
    }

    /// Records in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &HostRecord> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    /// Number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the registry holds no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_get() {
        let mut registry = HostRegistry::new();
        let id = registry.add(HostRecord::new("office", "192.168.1.50"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(id).map(|r| r.name.as_str()), Some("office"));
    }

    #[test]
    fn iteration_preserves_insertion_order() {
        let mut registry = HostRegistry::new();
        registry.add(HostRecord::new("a", "10.0.0.1"));
        registry.add(HostRecord::new("b", "10.0.0.2"));
        registry.add(HostRecord::new("c", "10.0.0.3"));

        let names: Vec<_> = registry.iter().map(|r| r.name.clone()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn remove_keeps_order_of_the_rest() {
        let mut registry = HostRegistry::new();
        registry.add(HostRecord::new("a", "10.0.0.1"));
        let b = registry.add(HostRecord::new("b", "10.0.0.2"));
        registry.add(HostRecord::new("c", "10.0.0.3"));

        assert!(registry.remove(b).is_some());
        assert!(registry.remove(b).is_none());

        let names: Vec<_> = registry.iter().map(|r| r.name.clone()).collect();
        assert_eq!(names, ["a", "c"]);
        assert_eq!(registry.ids().len(), 2);
    }

    #[test]
    fn find_by_name() {
        let mut registry = HostRegistry::new();
        registry.add(HostRecord::new("office", "192.168.1.50"));
        assert!(registry.find_by_name("office").is_some());
        assert!(registry.find_by_name("nowhere").is_none());
    }
}
