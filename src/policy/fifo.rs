use super::{CacheStore, ReplacementPolicy};
use crate::error::Error;

/// Fixed-capacity ring buffer.
pub struct RingFifo<T> {
    buf: Vec<Option<T>>,
    head: usize,
    tail: usize,
    len: usize,
}

impl<T> RingFifo<T> {
    /// Creates an empty ring with room for `capacity` elements.
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0);
        let mut buf = Vec::with_capacity(capacity);
        buf.resize_with(capacity, || None);
        RingFifo {
            buf,
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    /// Appends `element`, dropping the oldest entry when full.
    pub fn enqueue(&mut self, element: T) {
        if self.len == self.buf.len() {
            self.buf[self.head] = None;
            self.head = (self.head + 1) % self.buf.len();
            self.len -= 1;
        }
        self.buf[self.tail] = Some(element);
        self.tail = (self.tail + 1) % self.buf.len();
        self.len += 1;
    }

    /// Removes and returns the oldest element.
    pub fn dequeue(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let element = self.buf[self.head].take();
        self.head = (self.head + 1) % self.buf.len();
        self.len -= 1;
        element
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.buf.len()
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }
}

/// First-in-first-out eviction: hits are ignored; a miss on a full cache
/// evicts the oldest key.  The baseline the sketch-driven policies are
/// compared against.
pub struct FifoPolicy<K> {
    queue: RingFifo<K>,
}

impl<K: Clone> FifoPolicy<K> {
    pub fn new(max_size: usize) -> Result<Self, Error> {
        if max_size == 0 {
            return Err(Error::ZeroCapacity);
        }
        Ok(FifoPolicy {
            queue: RingFifo::new(max_size),
        })
    }

    /// Hits leave the queue order untouched.
    pub fn on_hit(&mut self, _key: &K) {}
}

impl<K: Clone, V> ReplacementPolicy<K, V> for FifoPolicy<K> {
    fn on_hit(&mut self, key: &K) {
        FifoPolicy::on_hit(self, key);
    }

    fn on_miss(&mut self, cache: &mut dyn CacheStore<K, V>, key: K, value: V) {
        if cache.is_full() {
            if let Some(evicted) = self.queue.dequeue() {
                cache.remove(&evicted);
            }
        }
        cache.put(key.clone(), value);
        self.queue.enqueue(key);
    }
}
