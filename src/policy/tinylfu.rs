use std::hash::Hash;

use ahash::AHashMap;

use super::{CacheStore, ReplacementPolicy};
use crate::error::Error;
use crate::hash::SketchKey;
use crate::sketch::Sketch;

// ---------------------------------------------------------------------------
// Sentinel layout
//
// The first six slots of `nodes` are permanent HEAD/TAIL sentinels — one
// pair per segment.  Real entries start at index 6.  Sentinels always have
// `key = None` and are never evicted or looked up via the index.
// ---------------------------------------------------------------------------
const WINDOW_HEAD: usize = 0;
const WINDOW_TAIL: usize = 1;
const PROBATION_HEAD: usize = 2;
const PROBATION_TAIL: usize = 3;
const PROTECTED_HEAD: usize = 4;
const PROTECTED_TAIL: usize = 5;
const NULL: usize = usize::MAX;
const SENTINEL_COUNT: usize = 6;

/// Which segment a cache entry currently belongs to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Segment {
    Window,
    Probation,
    Protected,
}

/// A single node in the entry arena.
struct SegNode<K> {
    /// `None` only for sentinel slots.
    key: Option<K>,
    /// Index of the predecessor in the doubly-linked list.
    prev: usize,
    /// Index of the successor in the doubly-linked list.
    next: usize,
    segment: Segment,
}

// ---------------------------------------------------------------------------
// W-TinyLFU policy
// ---------------------------------------------------------------------------

/// W-TinyLFU admission policy over a pluggable frequency sketch.
///
/// ## Algorithm
///
/// Capacity is partitioned into three segments:
///
/// | Segment       | Share                    | Role |
/// |---------------|--------------------------|------|
/// | **Window**    | 1 % of total (min 1)     | Admits every newcomer; shields new arrivals from instant rejection |
/// | **Probation** | 20 % of the remainder    | Proving ground and eviction victim pool |
/// | **Protected** | everything else          | The established working set |
///
/// ### Miss path
/// 1. The sketch is updated for the missed key.
/// 2. If the window is full, its LRU entry becomes a *candidate*:
///    - probation has room → the candidate moves to probation;
///    - probation is full → the candidate duels probation's LRU entry
///      (the *victim*) on sketch estimates.  A strict win admits the
///      candidate and evicts the victim; anything else evicts the
///      candidate.
/// 3. The new key enters at the window MRU and the store's `put` runs.
///
/// ### Hit path
/// 1. The sketch is updated for the hit key.
/// 2. Window and protected hits refresh recency; a probation hit promotes
///    the entry to protected, demoting protected's LRU entry back to
///    probation when protected overflows.
///
/// ## References
/// - Einziger, Friedman, Manes (2017). *TinyLFU: A Highly Efficient Cache
///   Admission Policy.* ACM Transactions on Storage.
pub struct WTinyLfuPolicy<K, S> {
    sketch: S,

    /// Central node arena — both sentinels and real entries live here.
    nodes: Vec<SegNode<K>>,
    /// Maps `K → arena index` for O(1) access.
    index: AHashMap<K, usize>,
    /// Recycled arena slots.
    free_list: Vec<usize>,

    window_len: usize,
    probation_len: usize,
    protected_len: usize,

    max_window: usize,
    max_probation: usize,
    max_protected: usize,
}

impl<K, S> WTinyLfuPolicy<K, S>
where
    K: SketchKey + Hash + Eq + Clone,
    S: Sketch<K>,
{
    /// Creates a policy for a cache of `max_size` entries, admitting
    /// through `sketch`.
    pub fn new(max_size: usize, sketch: S) -> Result<Self, Error> {
        if max_size == 0 {
            return Err(Error::ZeroCapacity);
        }

        // Standard W-TinyLFU split.  The window gets a floor of one slot
        // so tiny caches degenerate to a pure window instead of a
        // zero-width one.
        let max_window = (max_size / 100).max(1).min(max_size);
        let max_probation = ((max_size - max_window) as f64 * 0.2) as usize;
        let max_protected = max_size - max_window - max_probation;

        let mut nodes: Vec<SegNode<K>> = Vec::with_capacity(SENTINEL_COUNT + max_size);
        let sentinel_segments = [
            Segment::Window,    // 0 = WINDOW_HEAD
            Segment::Window,    // 1 = WINDOW_TAIL
            Segment::Probation, // 2 = PROBATION_HEAD
            Segment::Probation, // 3 = PROBATION_TAIL
            Segment::Protected, // 4 = PROTECTED_HEAD
            Segment::Protected, // 5 = PROTECTED_TAIL
        ];
        for segment in sentinel_segments {
            nodes.push(SegNode {
                key: None,
                prev: NULL,
                next: NULL,
                segment,
            });
        }
        // Wire sentinel pairs: HEAD.next = TAIL, TAIL.prev = HEAD.
        nodes[WINDOW_HEAD].next = WINDOW_TAIL;
        nodes[WINDOW_TAIL].prev = WINDOW_HEAD;
        nodes[PROBATION_HEAD].next = PROBATION_TAIL;
        nodes[PROBATION_TAIL].prev = PROBATION_HEAD;
        nodes[PROTECTED_HEAD].next = PROTECTED_TAIL;
        nodes[PROTECTED_TAIL].prev = PROTECTED_HEAD;

        Ok(WTinyLfuPolicy {
            sketch,
            nodes,
            index: AHashMap::with_capacity(max_size),
            free_list: Vec::new(),
            window_len: 0,
            probation_len: 0,
            protected_len: 0,
            max_window,
            max_probation,
            max_protected,
        })
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn sketch(&self) -> &S {
        &self.sketch
    }

    pub fn sketch_mut(&mut self) -> &mut S {
        &mut self.sketch
    }

    /// Number of cached entries across all three segments.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Segment currently holding `key`, if it is cached.
    pub fn segment_of(&self, key: &K) -> Option<Segment> {
        self.index.get(key).map(|&idx| self.nodes[idx].segment)
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    pub fn probation_len(&self) -> usize {
        self.probation_len
    }

    pub fn protected_len(&self) -> usize {
        self.protected_len
    }

    pub fn window_capacity(&self) -> usize {
        self.max_window
    }

    pub fn probation_capacity(&self) -> usize {
        self.max_probation
    }

    pub fn protected_capacity(&self) -> usize {
        self.max_protected
    }

    /// Mean wall time of the underlying sketch's `update`, in seconds.
    pub fn update_time_avg_seconds(&self) -> f64 {
        self.sketch.update_time_avg_seconds()
    }

    /// Mean wall time of the underlying sketch's `estimate`, in seconds.
    pub fn estimate_time_avg_seconds(&self) -> f64 {
        self.sketch.estimate_time_avg_seconds()
    }

    // -----------------------------------------------------------------------
    // Linked-list helpers (operate on the arena by index)
    // -----------------------------------------------------------------------

    /// Inserts node `idx` immediately after sentinel `head` (MRU position).
    #[inline]
    fn link_after(&mut self, head: usize, idx: usize) {
        let old_first = self.nodes[head].next;
        self.nodes[idx].prev = head;
        self.nodes[idx].next = old_first;
        self.nodes[head].next = idx;
        self.nodes[old_first].prev = idx;
    }

    /// Removes node `idx` from its current position.
    #[inline]
    fn unlink(&mut self, idx: usize) {
        let prev = self.nodes[idx].prev;
        let next = self.nodes[idx].next;
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
        self.nodes[idx].prev = NULL;
        self.nodes[idx].next = NULL;
    }

    /// LRU entry of a segment, or `None` when the segment is empty.
    #[inline]
    fn segment_tail(&self, head: usize, tail: usize) -> Option<usize> {
        let idx = self.nodes[tail].prev;
        if idx == head {
            None
        } else {
            Some(idx)
        }
    }

    // -----------------------------------------------------------------------
    // Node lifecycle
    // -----------------------------------------------------------------------

    fn alloc_node(&mut self, key: K, segment: Segment) -> usize {
        if let Some(idx) = self.free_list.pop() {
            let node = &mut self.nodes[idx];
            node.key = Some(key);
            node.prev = NULL;
            node.next = NULL;
            node.segment = segment;
            idx
        } else {
            let idx = self.nodes.len();
            self.nodes.push(SegNode {
                key: Some(key),
                prev: NULL,
                next: NULL,
                segment,
            });
            idx
        }
    }

    /// Unlinks `idx`, drops it from the key index and recycles its slot.
    ///
    /// Returns the owned key so the caller can remove it from the store.
    fn evict_node(&mut self, idx: usize) -> Option<K> {
        self.unlink(idx);
        match self.nodes[idx].segment {
            Segment::Window => self.window_len -= 1,
            Segment::Probation => self.probation_len -= 1,
            Segment::Protected => self.protected_len -= 1,
        }
        let key = self.nodes[idx].key.take()?;
        self.index.remove(&key);
        self.free_list.push(idx);
        Some(key)
    }

    /// Moves a linked node to the MRU position of another segment.
    fn transfer_to(&mut self, idx: usize, head: usize, to: Segment) {
        self.unlink(idx);
        match self.nodes[idx].segment {
            Segment::Window => self.window_len -= 1,
            Segment::Probation => self.probation_len -= 1,
            Segment::Protected => self.protected_len -= 1,
        }
        self.link_after(head, idx);
        self.nodes[idx].segment = to;
        match to {
            Segment::Window => self.window_len += 1,
            Segment::Probation => self.probation_len += 1,
            Segment::Protected => self.protected_len += 1,
        }
    }

    // -----------------------------------------------------------------------
    // Promotion
    // -----------------------------------------------------------------------

    /// Promotes a probation entry to protected (MRU position).
    ///
    /// If protected overflows, its LRU entry is demoted back to probation.
    fn promote(&mut self, idx: usize) {
        debug_assert_eq!(self.nodes[idx].segment, Segment::Probation);
        self.transfer_to(idx, PROTECTED_HEAD, Segment::Protected);

        while self.protected_len > self.max_protected {
            let Some(demoted) = self.segment_tail(PROTECTED_HEAD, PROTECTED_TAIL) else {
                break;
            };
            self.transfer_to(demoted, PROBATION_HEAD, Segment::Probation);
        }
    }

    /// Handles a cache hit: refresh recency, promoting probation entries.
    ///
    /// Window and protected hits move to their segment's MRU position; a
    /// probation hit promotes the entry to protected, demoting protected's
    /// LRU entry back to probation when protected overflows.
    pub fn on_hit(&mut self, key: &K) {
        self.sketch.update(key);

        let Some(&idx) = self.index.get(key) else {
            #[cfg(debug_assertions)]
            log::warn!("WTinyLfuPolicy: hit for a key that is not tracked");
            return;
        };
        match self.nodes[idx].segment {
            Segment::Window => {
                self.unlink(idx);
                self.link_after(WINDOW_HEAD, idx);
            }
            Segment::Probation => self.promote(idx),
            Segment::Protected => {
                self.unlink(idx);
                self.link_after(PROTECTED_HEAD, idx);
            }
        }
    }

    /// Frequency duel between the window tail and the probation tail.
    ///
    /// Returns `true` when the candidate's estimate is strictly higher —
    /// ties go to the incumbent.
    fn candidate_wins(&self, candidate: usize, victim: usize) -> bool {
        match (
            self.nodes[candidate].key.as_ref(),
            self.nodes[victim].key.as_ref(),
        ) {
            (Some(cand_key), Some(victim_key)) => {
                self.sketch.estimate(cand_key) > self.sketch.estimate(victim_key)
            }
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Policy trait implementation
// ---------------------------------------------------------------------------

impl<K, V, S> ReplacementPolicy<K, V> for WTinyLfuPolicy<K, S>
where
    K: SketchKey + Hash + Eq + Clone,
    S: Sketch<K>,
{
    /// Called on every cache hit.
    fn on_hit(&mut self, key: &K) {
        WTinyLfuPolicy::on_hit(self, key);
    }

    /// Called on every cache miss.
    ///
    /// Runs the admission pipeline described on [`WTinyLfuPolicy`], then
    /// inserts the new key at the window MRU and stores the value.
    fn on_miss(&mut self, cache: &mut dyn CacheStore<K, V>, key: K, value: V) {
        #[cfg(debug_assertions)]
        if self.index.contains_key(&key) {
            log::warn!("WTinyLfuPolicy: miss for a key that is already tracked");
        }

        self.sketch.update(&key);

        if self.window_len == self.max_window {
            if self.probation_len == self.max_probation {
                let candidate = self.segment_tail(WINDOW_HEAD, WINDOW_TAIL);
                let victim = self.segment_tail(PROBATION_HEAD, PROBATION_TAIL);
                match (candidate, victim) {
                    (Some(candidate), Some(victim)) => {
                        if self.candidate_wins(candidate, victim) {
                            // Candidate takes the victim's place on probation.
                            self.transfer_to(candidate, PROBATION_HEAD, Segment::Probation);
                            if let Some(evicted) = self.evict_node(victim) {
                                cache.remove(&evicted);
                            }
                        } else if let Some(evicted) = self.evict_node(candidate) {
                            cache.remove(&evicted);
                        }
                    }
                    (Some(candidate), None) => {
                        // Probation is configured to zero slots; nothing
                        // to duel, the window tail goes straight out.
                        if let Some(evicted) = self.evict_node(candidate) {
                            cache.remove(&evicted);
                        }
                    }
                    _ => {}
                }
            } else if let Some(candidate) = self.segment_tail(WINDOW_HEAD, WINDOW_TAIL) {
                self.transfer_to(candidate, PROBATION_HEAD, Segment::Probation);
            }
        }

        let idx = self.alloc_node(key.clone(), Segment::Window);
        self.index.insert(key.clone(), idx);
        self.link_after(WINDOW_HEAD, idx);
        self.window_len += 1;
        cache.put(key, value);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::MockCache;
    use crate::sketch::CountMinSketch;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn make(cap: usize) -> WTinyLfuPolicy<u64, CountMinSketch<u64>> {
        let sketch = CountMinSketch::with_rng(cap, &mut StdRng::seed_from_u64(9)).unwrap();
        WTinyLfuPolicy::new(cap, sketch).unwrap()
    }

    fn drive_miss(
        policy: &mut WTinyLfuPolicy<u64, CountMinSketch<u64>>,
        cache: &mut MockCache<u64>,
        key: u64,
    ) {
        policy.on_miss(cache, key, key);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let sketch = CountMinSketch::with_rng(8, &mut StdRng::seed_from_u64(1)).unwrap();
        assert!(matches!(
            WTinyLfuPolicy::<u64, _>::new(0, sketch),
            Err(Error::ZeroCapacity)
        ));
    }

    #[test]
    fn segment_caps_follow_the_standard_split() {
        let policy = make(1000);
        assert_eq!(policy.window_capacity(), 10);
        assert_eq!(policy.probation_capacity(), 198);
        assert_eq!(policy.protected_capacity(), 792);
        assert_eq!(
            policy.window_capacity() + policy.probation_capacity() + policy.protected_capacity(),
            1000
        );
    }

    #[test]
    fn new_entries_start_in_the_window() {
        let mut policy = make(100);
        let mut cache = MockCache::new(100);
        drive_miss(&mut policy, &mut cache, 7);
        assert_eq!(policy.segment_of(&7), Some(Segment::Window));
        assert!(cache.contains(&7));
        assert_eq!(policy.len(), 1);
    }

    #[test]
    fn window_overflow_spills_into_probation() {
        let mut policy = make(400); // window 4, probation 79
        let mut cache = MockCache::new(400);
        for key in 0..10u64 {
            drive_miss(&mut policy, &mut cache, key);
        }
        assert_eq!(policy.window_len(), 4);
        assert_eq!(policy.probation_len(), 6);
        assert_eq!(policy.segment_of(&0), Some(Segment::Probation));
        assert_eq!(policy.segment_of(&9), Some(Segment::Window));
    }

    #[test]
    fn probation_hit_promotes_to_protected() {
        let mut policy = make(400);
        let mut cache = MockCache::new(400);
        for key in 0..10u64 {
            drive_miss(&mut policy, &mut cache, key);
        }
        assert_eq!(policy.segment_of(&0), Some(Segment::Probation));
        policy.on_hit(&0);
        assert_eq!(policy.segment_of(&0), Some(Segment::Protected));
        assert_eq!(policy.protected_len(), 1);
    }

    #[test]
    fn segment_sizes_never_exceed_their_caps() {
        let mut policy = make(200);
        let mut cache = MockCache::new(200);
        for round in 0..5 {
            for key in 0..300u64 {
                let key = key.wrapping_mul(round + 1);
                if policy.contains(&key) {
                    policy.on_hit(&key);
                } else {
                    drive_miss(&mut policy, &mut cache, key);
                }
            }
        }
        assert!(policy.window_len() <= policy.window_capacity());
        assert!(policy.probation_len() <= policy.probation_capacity());
        assert!(policy.protected_len() <= policy.protected_capacity());
    }

    #[test]
    fn index_matches_segment_lists() {
        let mut policy = make(150);
        let mut cache = MockCache::new(150);
        for key in 0..500u64 {
            if policy.contains(&(key % 120)) {
                policy.on_hit(&(key % 120));
            } else {
                drive_miss(&mut policy, &mut cache, key % 120);
            }
        }
        assert_eq!(
            policy.len(),
            policy.window_len() + policy.probation_len() + policy.protected_len()
        );
        assert_eq!(policy.len(), cache.len());
    }

    #[test]
    fn single_slot_cache_degenerates_to_a_window() {
        let mut policy = make(1);
        let mut cache = MockCache::new(1);
        assert_eq!(policy.window_capacity(), 1);
        assert_eq!(policy.probation_capacity(), 0);
        assert_eq!(policy.protected_capacity(), 0);

        drive_miss(&mut policy, &mut cache, 1);
        drive_miss(&mut policy, &mut cache, 2);
        assert!(!policy.contains(&1), "every miss must evict the incumbent");
        assert!(policy.contains(&2));
        assert!(!cache.contains(&1));
        assert!(cache.contains(&2));
        assert_eq!(policy.len(), 1);
    }

    #[test]
    fn frequent_candidate_beats_cold_victim() {
        // Fill probation, then give one evicted key a high frequency and
        // reinsert it: it should win the duel and push out the victim.
        let mut policy = make(200); // window 2, probation 39
        let mut cache = MockCache::new(200);
        for key in 0..43u64 {
            drive_miss(&mut policy, &mut cache, key);
        }
        assert_eq!(policy.probation_len(), policy.probation_capacity());

        // Build frequency for a fresh key well above any incumbent's.
        for _ in 0..16 {
            policy.sketch_mut().update(&999u64);
        }
        drive_miss(&mut policy, &mut cache, 999);
        drive_miss(&mut policy, &mut cache, 1000);
        drive_miss(&mut policy, &mut cache, 1001);
        assert!(
            policy.segment_of(&999).is_some(),
            "hot candidate should have been admitted past the duel"
        );
    }

    #[test]
    fn hot_items_survive_scan_pollution() {
        // Classic W-TinyLFU property: frequently accessed items withstand
        // a flood of one-hit-wonder insertions.
        let cap = 100usize;
        let mut policy = make(cap);
        let mut cache = MockCache::new(cap);

        for key in 0..20u64 {
            drive_miss(&mut policy, &mut cache, key);
        }
        for _ in 0..8 {
            for key in 0..20u64 {
                policy.on_hit(&key);
            }
        }

        for key in 1000..1400u64 {
            if !policy.contains(&key) {
                drive_miss(&mut policy, &mut cache, key);
            }
        }

        let survivors = (0..20u64).filter(|k| policy.contains(k)).count();
        assert!(
            survivors >= 10,
            "only {} / 20 hot items survived the scan",
            survivors
        );
    }
}
