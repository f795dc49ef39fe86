//! Hash collections using AHash.
//!
//! The renderer keys caches by small plain-data structs (pipeline keys,
//! sampler states, texture ids), where AHash is considerably faster than SipHash.

pub use ahash::{AHashMap as HashMap, AHashSet as HashSet, RandomState};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashmap_ahash() {
        let mut map = HashMap::new();
        map.insert((1u32, 2u32), "pipeline");
        assert_eq!(map.get(&(1, 2)), Some(&"pipeline"));
    }

    #[test]
    fn test_hashset_ahash() {
        let mut set = HashSet::new();
        set.insert(42u64);
        assert!(set.contains(&42));
        assert!(!set.insert(42));
    }
}
