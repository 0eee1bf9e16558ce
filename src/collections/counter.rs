use std::hash::Hash;

use super::HashMap;

/// Exact frequency counter over an arbitrary key type, used by
/// `threshold` and by the annotation-frequency pass of `annotate_contexts`.
pub struct ExactCounter<K: Eq + Hash> {
    map: HashMap<K, u64>,
}

impl<K: Eq + Hash> Default for ExactCounter<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash> ExactCounter<K> {
    pub fn new() -> Self {
        Self {
            map: HashMap::default(),
        }
    }

    pub fn add(&mut self, key: K) {
        self.map.entry(key).and_modify(|count| *count += 1).or_insert(1);
    }

    pub fn get(&self, key: &K) -> u64 {
        self.map.get(key).copied().unwrap_or(0)
    }

    pub fn into_sorted_vec(self) -> Vec<(K, u64)>
    where
        K: Ord,
    {
        let mut items: Vec<(K, u64)> = self.map.into_iter().collect();
        items.sort_unstable_by(|a, b| a.1.cmp(&b.1).reverse().then_with(|| a.0.cmp(&b.0)));
        items
    }
}
