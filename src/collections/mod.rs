mod counter;

pub use counter::ExactCounter;

/// Fast, non-cryptographic hasher used throughout the core for the
/// high-churn maps built while counting and interning (annotation
/// records, type→id maps, pivot table cells).
pub type HashMap<K, V> = std::collections::HashMap<K, V, ahash::RandomState>;
pub type HashSet<K> = std::collections::HashSet<K, ahash::RandomState>;
