//! Instance registry.
//!
//! # Responsibilities
//! - Own the ordered list of registered instances
//! - Give each registration a private entry key so duplicate ids stay distinct
//! - Provide the mutations the balancer and health checker need
//!
//! # Design Decisions
//! - Duplicate ids are appended, not merged
//! - Lookups by id act on the first matching entry; removal drops all of them
//! - Callers only ever receive clones

use std::time::SystemTime;
use crate::instance::{InstanceSpec, InstanceStatus, ServiceInstance};

/// Opaque key for one registration, stable for the lifetime of the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryKey(u64);

#[derive(Debug)]
struct Entry {
    key: EntryKey,
    instance: ServiceInstance,
}

/// The balancer's list of known backends.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    entries: Vec<Entry>,
    next_key: u64,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new healthy instance and return its entry key.
    pub fn add(&mut self, spec: InstanceSpec, now: SystemTime) -> EntryKey {
        let key = EntryKey(self.next_key);
        self.next_key += 1;
        self.entries.push(Entry {
            key,
            instance: ServiceInstance::from_spec(spec, now),
        });
        key
    }

    /// Remove every entry with `id`. Returns how many were removed.
    pub fn remove(&mut self, id: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.instance.id != id);
        before - self.entries.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.instance.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ServiceInstance> {
        self.entries.iter().map(|e| &e.instance).find(|i| i.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ServiceInstance> {
        self.entries.iter_mut().map(|e| &mut e.instance).find(|i| i.id == id)
    }

    pub fn get_entry_mut(&mut self, key: EntryKey) -> Option<&mut ServiceInstance> {
        self.entries
            .iter_mut()
            .find(|e| e.key == key)
            .map(|e| &mut e.instance)
    }

    /// Borrowing iterator in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ServiceInstance> {
        self.entries.iter().map(|e| &e.instance)
    }

    /// Copy of every instance, in registration order.
    pub fn snapshot(&self) -> Vec<ServiceInstance> {
        self.iter().cloned().collect()
    }

    /// Entry keys paired with copies of their instances (for probing).
    pub fn keyed_snapshot(&self) -> Vec<(EntryKey, ServiceInstance)> {
        self.entries
            .iter()
            .map(|e| (e.key, e.instance.clone()))
            .collect()
    }

    /// Record a probe result against one entry.
    ///
    /// Returns the previous status so callers can log transitions, or `None`
    /// if the entry was removed while the probe was in flight. A draining
    /// instance keeps its status.
    pub fn apply_probe(
        &mut self,
        key: EntryKey,
        healthy: bool,
        response_time_ms: u64,
        checked_at: SystemTime,
    ) -> Option<(InstanceStatus, InstanceStatus)> {
        let instance = self.get_entry_mut(key)?;
        let previous = instance.status;
        instance.last_check = checked_at;
        instance.response_time_ms = response_time_ms;
        if previous != InstanceStatus::Draining {
            instance.status = if healthy {
                InstanceStatus::Healthy
            } else {
                InstanceStatus::Unhealthy
            };
        }
        Some((previous, instance.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(id: &str) -> InstanceSpec {
        InstanceSpec::new(id, "127.0.0.1", 9000)
    }

    #[test]
    fn test_duplicate_ids_are_appended() {
        let mut registry = InstanceRegistry::new();
        let k1 = registry.add(spec("a"), SystemTime::UNIX_EPOCH);
        let k2 = registry.add(spec("a"), SystemTime::UNIX_EPOCH);

        assert_ne!(k1, k2);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.remove("a"), 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut registry = InstanceRegistry::new();
        registry.add(spec("a"), SystemTime::UNIX_EPOCH);
        assert_eq!(registry.remove("missing"), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_apply_probe_preserves_draining() {
        let mut registry = InstanceRegistry::new();
        let key = registry.add(spec("a"), SystemTime::UNIX_EPOCH);
        registry.get_mut("a").unwrap().status = InstanceStatus::Draining;

        let (before, after) = registry
            .apply_probe(key, false, 42, SystemTime::UNIX_EPOCH)
            .unwrap();
        assert_eq!(before, InstanceStatus::Draining);
        assert_eq!(after, InstanceStatus::Draining);
        assert_eq!(registry.get("a").unwrap().response_time_ms, 42);
    }

    #[test]
    fn test_apply_probe_after_removal() {
        let mut registry = InstanceRegistry::new();
        let key = registry.add(spec("a"), SystemTime::UNIX_EPOCH);
        registry.remove("a");
        assert!(registry.apply_probe(key, true, 1, SystemTime::UNIX_EPOCH).is_none());
    }
}
