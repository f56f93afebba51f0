//! Record of every envelope hash this node has seen.

use crate::transport::EnvelopeHash;
use std::collections::HashSet;

/// Append-only set of processed envelope hashes
///
/// Lives as long as the process. Nothing is ever evicted, so an envelope is
/// applied and relayed at most once per node.
#[derive(Debug, Default)]
pub struct HashHistory {
    seen: HashSet<EnvelopeHash>,
}

impl HashHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a hash. Returns false if it was already present.
    pub fn insert(&mut self, hash: EnvelopeHash) -> bool {
        self.seen.insert(hash)
    }

    /// Number of distinct hashes seen
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether nothing was seen yet
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Number;

    #[test]
    fn test_insert_once() {
        let mut history = HashHistory::new();
        assert!(history.is_empty());

        assert!(history.insert(EnvelopeHash::Numeric(Number::from(7))));
        assert!(!history.insert(EnvelopeHash::Numeric(Number::from(7))));
        assert!(history.insert(EnvelopeHash::Text("7".to_string())));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_wide_and_fractional_hashes_dedup() {
        let mut history = HashHistory::new();
        let wide = EnvelopeHash::Numeric(Number::from(u64::MAX));
        let fractional = EnvelopeHash::Numeric(serde_json::from_str("1.5").unwrap());

        assert!(history.insert(wide.clone()));
        assert!(history.insert(fractional.clone()));
        assert!(!history.insert(wide));
        assert!(!history.insert(fractional));
        assert_eq!(history.len(), 2);
    }
}
