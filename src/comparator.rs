//! Key ordering
//!
//! Every sorted structure in the crate orders keys through a shared
//! comparator so that memstores, SSTables and the merge engine agree.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Total order over byte keys.
pub trait KeyComparator: Send + Sync {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;
}

/// Shared handle to a comparator.
pub type Comparator = Arc<dyn KeyComparator>;

/// Plain lexicographic byte order.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytewiseComparator;

impl KeyComparator for BytewiseComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}

/// The default comparator used when none is configured.
pub fn bytewise() -> Comparator {
    Arc::new(BytewiseComparator)
}

impl fmt::Debug for dyn KeyComparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyComparator")
    }
}
