//! Merge Engine
//!
//! k-way merge of sorted entry streams through a binary min-heap.
//!
//! - [`Merger::merge`] emits every entry once in global key order.
//! - [`Merger::merge_compact`] groups entries sharing a key across sources
//!   and hands the group to a reduce function, which picks the surviving
//!   entry or drops the key entirely.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::comparator::Comparator;
use crate::error::{Result, StrataError};

use super::{Entry, EntryIter, SSTableStreamWriter};

/// One sorted input together with a caller-chosen context token
///
/// The engine itself only uses the context to break key ties; reduce
/// functions receive it to tell sources apart (e.g. by recency).
pub struct MergeSource {
    pub context: usize,
    pub iter: EntryIter,
}

impl MergeSource {
    pub fn new(context: usize, iter: EntryIter) -> Self {
        Self { context, iter }
    }
}

// =============================================================================
// Priority Queue
// =============================================================================

/// Current head of one source, ordered for a min-heap
struct HeapEntry {
    entry: Entry,
    context: usize,
    /// Index into `PriorityQueue::sources`
    slot: usize,
    key_order: Comparator,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap pops the largest item, so both comparisons are reversed:
        // smallest key first, then the lowest context on ties.
        self.key_order
            .compare(&other.entry.key, &self.entry.key)
            .then_with(|| other.context.cmp(&self.context))
    }
}

/// Min-heap over the current head of each source
pub struct PriorityQueue {
    heap: BinaryHeap<HeapEntry>,
    sources: Vec<EntryIter>,
}

impl PriorityQueue {
    /// Prime every source with its first entry; empty sources are dropped
    pub fn new(sources: Vec<MergeSource>, cmp: Comparator) -> Result<Self> {
        let mut heap = BinaryHeap::with_capacity(sources.len());
        let mut iters = Vec::with_capacity(sources.len());

        for MergeSource { context, mut iter } in sources {
            if let Some(first) = iter.next() {
                heap.push(HeapEntry {
                    entry: first?,
                    context,
                    slot: iters.len(),
                    key_order: cmp.clone(),
                });
                iters.push(iter);
            }
        }

        Ok(Self {
            heap,
            sources: iters,
        })
    }

    /// Pop the smallest entry and refill from the source it came from
    pub fn next(&mut self) -> Result<Option<(Entry, usize)>> {
        let Some(HeapEntry {
            entry,
            context,
            slot,
            key_order,
        }) = self.heap.pop()
        else {
            return Ok(None);
        };

        if let Some(refill) = self.sources[slot].next() {
            self.heap.push(HeapEntry {
                entry: refill?,
                context,
                slot,
                key_order,
            });
        }

        Ok(Some((entry, context)))
    }

    /// Sources that still have entries
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

// =============================================================================
// Reduce Functions
// =============================================================================

fn newest(values: Vec<Option<Vec<u8>>>, contexts: &[usize]) -> Option<Vec<u8>> {
    let newest = contexts
        .iter()
        .enumerate()
        .max_by_key(|(_, ctx)| **ctx)
        .map(|(i, _)| i)
        .unwrap_or(0);
    values.into_iter().nth(newest).flatten()
}

/// Keep the value of the source with the highest context, tombstones included
pub fn reduce_latest_wins(
    key: &[u8],
    values: Vec<Option<Vec<u8>>>,
    contexts: &[usize],
) -> Option<Entry> {
    Some(Entry {
        key: key.to_vec(),
        value: newest(values, contexts),
    })
}

/// Keep the newest value, dropping the key when that value is a tombstone
pub fn reduce_latest_wins_skip_tombstones(
    key: &[u8],
    values: Vec<Option<Vec<u8>>>,
    contexts: &[usize],
) -> Option<Entry> {
    newest(values, contexts).map(|value| Entry {
        key: key.to_vec(),
        value: Some(value),
    })
}

// =============================================================================
// Merger
// =============================================================================

/// Runs merges under one key order
#[derive(Clone)]
pub struct Merger {
    cmp: Comparator,
}

impl Merger {
    pub fn new(cmp: Comparator) -> Self {
        Self { cmp }
    }

    /// Every entry of every source in key order, without deduplication
    pub fn merge_iter(&self, sources: Vec<MergeSource>) -> Result<EntryIter> {
        let pq = PriorityQueue::new(sources, self.cmp.clone())?;
        Ok(Box::new(MergeIter { pq, failed: false }))
    }

    /// Plain merge into a writer
    pub fn merge(&self, sources: Vec<MergeSource>, writer: &mut SSTableStreamWriter) -> Result<()> {
        for entry in self.merge_iter(sources)? {
            let entry = entry?;
            writer.write_next(&entry.key, entry.value.as_deref())?;
        }
        Ok(())
    }

    /// Compacting merge as an iterator
    pub fn merge_compact_iter<F>(&self, sources: Vec<MergeSource>, reduce: F) -> Result<EntryIter>
    where
        F: Fn(&[u8], Vec<Option<Vec<u8>>>, &[usize]) -> Option<Entry> + Send + 'static,
    {
        let max_values = sources.len();
        let pq = PriorityQueue::new(sources, self.cmp.clone())?;
        Ok(Box::new(MergeCompactIter {
            pq,
            cmp: self.cmp.clone(),
            reduce: Box::new(reduce),
            max_values,
            pending: None,
            failed: false,
        }))
    }

    /// Compacting merge into a writer
    pub fn merge_compact<F>(
        &self,
        sources: Vec<MergeSource>,
        writer: &mut SSTableStreamWriter,
        reduce: F,
    ) -> Result<()>
    where
        F: Fn(&[u8], Vec<Option<Vec<u8>>>, &[usize]) -> Option<Entry> + Send + 'static,
    {
        for entry in self.merge_compact_iter(sources, reduce)? {
            let entry = entry?;
            writer.write_next(&entry.key, entry.value.as_deref())?;
        }
        Ok(())
    }
}

struct MergeIter {
    pq: PriorityQueue,
    failed: bool,
}

impl Iterator for MergeIter {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.pq.next() {
            Ok(next) => next.map(|(entry, _)| Ok(entry)),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

type ReduceFn = Box<dyn Fn(&[u8], Vec<Option<Vec<u8>>>, &[usize]) -> Option<Entry> + Send>;

struct MergeCompactIter {
    pq: PriorityQueue,
    cmp: Comparator,
    reduce: ReduceFn,
    max_values: usize,
    /// First entry of the next key group, already popped from the heap
    pending: Option<(Entry, usize)>,
    failed: bool,
}

impl MergeCompactIter {
    /// Collect the next key group and reduce it
    ///
    /// `Ok(None)` means the inputs are exhausted; a dropped key yields
    /// `Ok(Some(None))`.
    fn next_group(&mut self) -> Result<Option<Option<Entry>>> {
        let first = match self.pending.take() {
            Some(first) => first,
            None => match self.pq.next()? {
                Some(first) => first,
                None => return Ok(None),
            },
        };

        let (head, ctx) = first;
        let key = head.key;
        let mut values = vec![head.value];
        let mut contexts = vec![ctx];

        while let Some((entry, ctx)) = self.pq.next()? {
            if self.cmp.compare(&entry.key, &key) != Ordering::Equal {
                self.pending = Some((entry, ctx));
                break;
            }
            values.push(entry.value);
            contexts.push(ctx);
        }

        if values.is_empty() || values.len() > self.max_values {
            return Err(StrataError::Invariant(format!(
                "reduce received {} values for one key from {} sources",
                values.len(),
                self.max_values
            )));
        }

        Ok(Some((self.reduce)(&key, values, &contexts)))
    }
}

impl Iterator for MergeCompactIter {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            match self.next_group() {
                Ok(None) => return None,
                Ok(Some(None)) => continue,
                Ok(Some(Some(entry))) => return Some(Ok(entry)),
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
