//! The cache store: loaded resources, in-flight keys and recorded errors.
//!
//! Every method assumes the caller holds the manager's lock. The store itself
//! has no synchronization.

use std::sync::Arc;

use cairn_core::alloc::{HashMap, HashSet};

use crate::asset::Resource;
use crate::error::{AssetError, AssetResult};
use crate::event::{AssetEvent, AssetEventBuffer};
use crate::key::AssetKey;
use crate::state::LoadState;

#[derive(Default)]
pub(crate) struct CacheStore {
    loaded: HashMap<AssetKey, Resource>,
    pending: HashSet<AssetKey>,
    errors: HashMap<AssetKey, Arc<AssetError>>,
    /// Failures not yet returned by `wait`, latest per key.
    unreported: HashMap<AssetKey, Arc<AssetError>>,
    events: AssetEventBuffer,
    closed: bool,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store keeping at most `capacity` undrained events.
    pub fn with_event_capacity(capacity: usize) -> Self {
        Self {
            events: AssetEventBuffer::with_capacity(capacity),
            ..Self::default()
        }
    }

    pub fn state(&self, key: &AssetKey) -> LoadState {
        if self.loaded.contains_key(key) {
            LoadState::Loaded
        } else if self.pending.contains(key) {
            LoadState::Pending
        } else if self.errors.contains_key(key) {
            LoadState::Errored
        } else {
            LoadState::Missing
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn set_closed(&mut self) {
        self.closed = true;
    }

    pub fn ensure_open(&self) -> AssetResult<()> {
        if self.closed {
            Err(AssetError::Closed)
        } else {
            Ok(())
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn loaded(&self, key: &AssetKey) -> Option<&Resource> {
        self.loaded.get(key)
    }

    pub fn error(&self, key: &AssetKey) -> Option<&Arc<AssetError>> {
        self.errors.get(key)
    }

    pub fn loaded_keys(&self) -> Vec<AssetKey> {
        let mut keys: Vec<_> = self.loaded.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// `Missing/Errored -> Pending`. Returns false (and changes nothing) if the
    /// key is already loaded or pending.
    pub fn mark_pending(&mut self, key: &AssetKey) -> bool {
        if self.loaded.contains_key(key) || self.pending.contains(key) {
            return false;
        }
        self.errors.remove(key);
        self.unreported.remove(key);
        self.pending.insert(key.clone());
        self.debug_check(key);
        true
    }

    /// `Pending -> Loaded/Errored`. Returns the recorded error on failure.
    pub fn complete(&mut self, key: &AssetKey, result: AssetResult<Resource>) -> Option<Arc<AssetError>> {
        self.pending.remove(key);
        let recorded = match result {
            Ok(resource) => {
                tracing::debug!("Loaded {}", key);
                self.loaded.insert(key.clone(), resource);
                self.events.push(AssetEvent::Loaded { key: key.clone() });
                None
            }
            Err(err) => Some(self.record_error(key, err)),
        };
        self.debug_check(key);
        recorded
    }

    /// Record a failure for a key that is not pending anymore.
    pub fn record_error(&mut self, key: &AssetKey, err: AssetError) -> Arc<AssetError> {
        tracing::debug!("Failed {}: {}", key, err);
        let err = Arc::new(err);
        self.events.push(AssetEvent::LoadFailed {
            key: key.clone(),
            error: err.to_string(),
        });
        self.errors.insert(key.clone(), Arc::clone(&err));
        self.unreported.insert(key.clone(), Arc::clone(&err));
        err
    }

    /// Remove a loaded resource, e.g. for promotion or discard.
    pub fn take_loaded(&mut self, key: &AssetKey) -> Option<Resource> {
        self.loaded.remove(key)
    }

    /// Put back a resource taken with [`take_loaded`](Self::take_loaded).
    pub fn insert_loaded(&mut self, key: AssetKey, resource: Resource) {
        self.loaded.insert(key.clone(), resource);
        self.debug_check(&key);
    }

    pub fn clear_error(&mut self, key: &AssetKey) -> bool {
        self.unreported.remove(key);
        self.errors.remove(key).is_some()
    }

    pub fn push_event(&mut self, event: AssetEvent) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<AssetEvent> {
        self.events.take()
    }

    /// Drop every loaded entry and error record whose key is not in `keep`.
    ///
    /// Returns the removed resources so the caller can release them outside
    /// the lock. Must not be called while loads are pending.
    pub fn retain_only(&mut self, keep: &HashSet<AssetKey>) -> Vec<(AssetKey, Resource)> {
        debug_assert!(self.pending.is_empty(), "flush while loads are in flight");
        self.errors.retain(|key, _| keep.contains(key));
        self.unreported.retain(|key, _| keep.contains(key));

        let stale: Vec<AssetKey> = self
            .loaded
            .keys()
            .filter(|key| !keep.contains(*key))
            .cloned()
            .collect();
        let mut removed = Vec::with_capacity(stale.len());
        for key in stale {
            if let Some(resource) = self.loaded.remove(&key) {
                self.events.push(AssetEvent::Flushed { key: key.clone() });
                removed.push((key, resource));
            }
        }
        removed
    }

    /// Empty the store for shutdown, returning every loaded resource.
    pub fn drain_loaded(&mut self) -> Vec<(AssetKey, Resource)> {
        self.errors.clear();
        self.unreported.clear();
        self.loaded.drain().collect()
    }

    pub fn take_unreported(&mut self) -> Vec<(AssetKey, Arc<AssetError>)> {
        self.unreported.drain().collect()
    }

    pub fn all_errors(&self) -> Vec<(AssetKey, Arc<AssetError>)> {
        self.errors
            .iter()
            .map(|(key, err)| (key.clone(), Arc::clone(err)))
            .collect()
    }

    /// True if no key is in more than one of the three maps.
    pub fn is_consistent(&self) -> bool {
        self.pending
            .iter()
            .all(|key| !self.loaded.contains_key(key) && !self.errors.contains_key(key))
            && self.errors.keys().all(|key| !self.loaded.contains_key(key))
    }

    fn debug_check(&self, key: &AssetKey) {
        debug_assert!(
            [
                self.loaded.contains_key(key),
                self.pending.contains(key),
                self.errors.contains_key(key),
            ]
            .iter()
            .filter(|present| **present)
            .count()
                <= 1,
            "{} is in more than one state",
            key
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::RawFile;
    use crate::key::AssetKind;

    fn file(bytes: &[u8]) -> Resource {
        Resource::ready(AssetKind::File, RawFile::new(bytes.to_vec()))
    }

    #[test]
    fn test_state_machine() {
        let mut store = CacheStore::new();
        let key = AssetKey::file("a");
        assert_eq!(store.state(&key), LoadState::Missing);

        assert!(store.mark_pending(&key));
        assert!(!store.mark_pending(&key));
        assert_eq!(store.state(&key), LoadState::Pending);

        assert!(store.complete(&key, Ok(file(b"a"))).is_none());
        assert_eq!(store.state(&key), LoadState::Loaded);
        assert!(!store.mark_pending(&key));
        assert!(store.is_consistent());
    }

    #[test]
    fn test_error_then_retry() {
        let mut store = CacheStore::new();
        let key = AssetKey::texture("bad.png");
        store.mark_pending(&key);
        let err = store.complete(&key, Err(AssetError::Cancelled)).unwrap();
        assert!(err.is_cancelled());
        assert_eq!(store.state(&key), LoadState::Errored);
        assert_eq!(store.take_unreported().len(), 1);
        assert!(store.take_unreported().is_empty());

        // a new load clears the stale error
        assert!(store.mark_pending(&key));
        assert!(store.error(&key).is_none());
        assert!(store.is_consistent());
    }

    #[test]
    fn test_retain_only() {
        let mut store = CacheStore::new();
        for name in ["a", "b", "c"] {
            let key = AssetKey::file(name);
            store.mark_pending(&key);
            store.complete(&key, Ok(file(name.as_bytes())));
        }
        let bad = AssetKey::file("bad");
        store.mark_pending(&bad);
        store.complete(&bad, Err(AssetError::Cancelled));
        store.take_events();

        let keep: HashSet<_> = [AssetKey::file("b")].into_iter().collect();
        let mut removed: Vec<_> = store.retain_only(&keep).into_iter().map(|(k, _)| k).collect();
        removed.sort();
        assert_eq!(removed, vec![AssetKey::file("a"), AssetKey::file("c")]);
        assert_eq!(store.loaded_keys(), vec![AssetKey::file("b")]);
        assert_eq!(store.state(&bad), LoadState::Missing);
        assert!(store.take_events().iter().all(|e| e.is_removed()));
    }

    #[test]
    fn test_repeated_failure_reported_once() {
        let mut store = CacheStore::new();
        let key = AssetKey::file("missing");
        for _ in 0..3 {
            assert!(store.mark_pending(&key));
            store.complete(&key, Err(AssetError::Cancelled));
        }
        let unreported = store.take_unreported();
        assert_eq!(unreported.len(), 1);
        assert_eq!(unreported[0].0, key);
    }

    #[test]
    fn test_events_bounded() {
        let mut store = CacheStore::with_event_capacity(4);
        let key = AssetKey::file("a");
        for _ in 0..100 {
            store.mark_pending(&key);
            store.complete(&key, Ok(file(b"a")));
            store.take_loaded(&key);
        }
        assert_eq!(store.take_events().len(), 4);
    }
}
