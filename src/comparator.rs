//! LessDB - Key Comparators
//! Three-way orderings over byte keys, shared by the memtable and the
//! block reader.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::types::{extract_tag, extract_user_key};

/// A total order over byte keys.
pub trait Comparator: Send + Sync {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;

    /// Name identifying the ordering, stable across releases.
    fn name(&self) -> &'static str;
}

/// Lexicographic byte order.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytewiseComparator;

impl Comparator for BytewiseComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }

    fn name(&self) -> &'static str {
        "lessdb.BytewiseComparator"
    }
}

/// Orders internal keys by user key ascending, then by sequence number
/// descending, so the newest version of a user key sorts first.
#[derive(Clone)]
pub struct InternalKeyComparator {
    user: Arc<dyn Comparator>,
}

impl InternalKeyComparator {
    pub fn new(user: Arc<dyn Comparator>) -> Self {
        Self { user }
    }

    /// Internal-key order over plain bytewise user keys.
    pub fn bytewise() -> Self {
        Self::new(Arc::new(BytewiseComparator))
    }

    pub fn user_comparator(&self) -> &dyn Comparator {
        self.user.as_ref()
    }
}

impl Default for InternalKeyComparator {
    fn default() -> Self {
        Self::bytewise()
    }
}

impl std::fmt::Debug for InternalKeyComparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InternalKeyComparator")
            .field("user", &self.user.name())
            .finish()
    }
}

impl Comparator for InternalKeyComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        self.user
            .compare(extract_user_key(a), extract_user_key(b))
            // higher tag (newer sequence) first
            .then_with(|| extract_tag(b).cmp(&extract_tag(a)))
    }

    fn name(&self) -> &'static str {
        "lessdb.InternalKeyComparator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{encode_internal_key, ValueType};

    #[test]
    fn test_bytewise() {
        let cmp = BytewiseComparator;
        assert_eq!(cmp.compare(b"a", b"b"), Ordering::Less);
        assert_eq!(cmp.compare(b"ab", b"a"), Ordering::Greater);
        assert_eq!(cmp.compare(b"", b""), Ordering::Equal);
    }

    #[test]
    fn test_user_key_ascending() {
        let cmp = InternalKeyComparator::bytewise();
        let a = encode_internal_key(b"a", 1, ValueType::Value);
        let b = encode_internal_key(b"b", 100, ValueType::Value);
        assert_eq!(cmp.compare(&a, &b), Ordering::Less);
    }

    #[test]
    fn test_sequence_descending() {
        let cmp = InternalKeyComparator::bytewise();
        let old = encode_internal_key(b"k", 5, ValueType::Value);
        let new = encode_internal_key(b"k", 6, ValueType::Value);
        assert_eq!(cmp.compare(&new, &old), Ordering::Less);
        assert_eq!(cmp.compare(&old, &old), Ordering::Equal);
    }

    #[test]
    fn test_kind_breaks_ties() {
        let cmp = InternalKeyComparator::bytewise();
        let put = encode_internal_key(b"k", 5, ValueType::Value);
        let del = encode_internal_key(b"k", 5, ValueType::Deletion);
        assert_eq!(cmp.compare(&put, &del), Ordering::Less);
    }
}
