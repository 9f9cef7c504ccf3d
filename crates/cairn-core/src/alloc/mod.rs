//! Collection types used across Cairn.
//!
//! Re-exports the AHash-backed hash collections so every crate in the
//! workspace hashes keys the same way.

// Re-export optimized hash collections
pub use ahash::{AHashMap as HashMap, AHashSet as HashSet};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashmap_ahash() {
        let mut map = HashMap::new();
        map.insert("key", "value");
        assert_eq!(map.get("key"), Some(&"value"));
    }

    #[test]
    fn test_hashset_ahash() {
        let mut set = HashSet::new();
        set.insert(42);
        assert!(set.contains(&42));
        assert!(!set.contains(&7));
    }
}
