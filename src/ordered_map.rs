//! Ordered Map
//!
//! In-memory sorted key → value structure whose order is defined by an
//! injected [`KeyComparator`](crate::comparator::KeyComparator). Backs the
//! memstore and the map-based SSTable index.

use std::cmp::Ordering;
use std::collections::btree_map::{self, BTreeMap};
use std::ops::Bound;

use crate::comparator::Comparator;
use crate::error::{Result, StrataError};

/// A key paired with the comparator that orders it.
#[derive(Clone)]
pub(crate) struct OrderedKey {
    key: Vec<u8>,
    cmp: Comparator,
}

impl OrderedKey {
    fn new(key: Vec<u8>, cmp: &Comparator) -> Self {
        Self {
            key,
            cmp: cmp.clone(),
        }
    }
}

impl PartialEq for OrderedKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OrderedKey {}

impl PartialOrd for OrderedKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp.compare(&self.key, &other.key)
    }
}

/// Sorted map keyed by byte strings.
pub struct OrderedMap<V> {
    map: BTreeMap<OrderedKey, V>,
    cmp: Comparator,
}

impl<V> OrderedMap<V> {
    pub fn new(cmp: Comparator) -> Self {
        Self {
            map: BTreeMap::new(),
            cmp,
        }
    }

    fn probe(&self, key: &[u8]) -> OrderedKey {
        OrderedKey::new(key.to_vec(), &self.cmp)
    }

    /// Insert a new key. Fails with `KeyAlreadyExists` on duplicates.
    pub fn insert(&mut self, key: Vec<u8>, value: V) -> Result<()> {
        match self.map.entry(OrderedKey::new(key, &self.cmp)) {
            btree_map::Entry::Occupied(_) => Err(StrataError::KeyAlreadyExists),
            btree_map::Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(())
            }
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<&V> {
        self.map.get(&self.probe(key))
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut V> {
        let probe = self.probe(key);
        self.map.get_mut(&probe)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.map.contains_key(&self.probe(key))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn comparator(&self) -> &Comparator {
        &self.cmp
    }

    /// All entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &V)> + '_ {
        self.map.iter().map(|(k, v)| (k.key.as_slice(), v))
    }

    /// Entries with keys at or after `start`.
    pub fn iter_starting_at(&self, start: &[u8]) -> impl Iterator<Item = (&[u8], &V)> + '_ {
        self.map
            .range((Bound::Included(self.probe(start)), Bound::Unbounded))
            .map(|(k, v)| (k.key.as_slice(), v))
    }

    /// Entries with keys in `[lo, hi]`. Fails if `hi` sorts before `lo`.
    pub fn iter_between(
        &self,
        lo: &[u8],
        hi: &[u8],
    ) -> Result<impl Iterator<Item = (&[u8], &V)> + '_> {
        if self.cmp.compare(hi, lo) == Ordering::Less {
            return Err(StrataError::InvalidArgument(
                "range upper bound sorts before lower bound".into(),
            ));
        }
        Ok(self
            .map
            .range((
                Bound::Included(self.probe(lo)),
                Bound::Included(self.probe(hi)),
            ))
            .map(|(k, v)| (k.key.as_slice(), v)))
    }

    /// The first entry strictly after `key`, or the first entry at all.
    ///
    /// Lets owning iterators resume without borrowing the map.
    pub fn next_after(&self, key: Option<&[u8]>) -> Option<(&[u8], &V)> {
        let lower = match key {
            Some(k) => Bound::Excluded(self.probe(k)),
            None => Bound::Unbounded,
        };
        self.map
            .range((lower, Bound::Unbounded))
            .next()
            .map(|(k, v)| (k.key.as_slice(), v))
    }

    /// The first entry at or after `key`.
    pub fn first_at_or_after(&self, key: &[u8]) -> Option<(&[u8], &V)> {
        self.iter_starting_at(key).next()
    }
}

impl<V> std::fmt::Debug for OrderedMap<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderedMap").field("len", &self.map.len()).finish()
    }
}
