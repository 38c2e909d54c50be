use std::collections::VecDeque;

/// Bounded FIFO between a time-critical producer and the main loop.
///
/// Overflow policy: the incoming element is dropped and counted. The producer
/// side never blocks and the queue never grows past its capacity; samples
/// already buffered keep their production order.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    buf: VecDeque<T>,
    capacity: usize,
    dropped: u64,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Enqueue one element. Returns false (and counts the loss) when full.
    pub fn put(&mut self, value: T) -> bool {
        if self.buf.len() >= self.capacity {
            self.dropped += 1;
            return false;
        }
        self.buf.push_back(value);
        true
    }

    pub fn get(&mut self) -> Option<T> {
        self.buf.pop_front()
    }

    pub fn has_data(&self) -> bool {
        !self.buf.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Elements rejected because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

/// Queue of raw sensor readings fed from the periodic sampling source.
pub type SampleQueue = BoundedQueue<crate::signal::RawSample>;

/// Queue of debounced button/encoder events.
pub type InputQueue = BoundedQueue<crate::device::InputEvent>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_fifo_order() {
        let mut q: BoundedQueue<u16> = BoundedQueue::new(4);
        for v in [10u16, 20, 30] {
            assert!(q.put(v));
        }
        assert_eq!(q.get(), Some(10));
        assert_eq!(q.get(), Some(20));
        assert_eq!(q.get(), Some(30));
        assert_eq!(q.get(), None);
        assert!(!q.has_data());
    }

    #[test]
    fn full_queue_drops_newest_and_counts() {
        let mut q: BoundedQueue<u16> = BoundedQueue::new(2);
        assert!(q.put(1));
        assert!(q.put(2));
        assert!(!q.put(3));
        assert!(!q.put(4));
        assert_eq!(q.len(), 2);
        assert_eq!(q.dropped(), 2);
        // buffered context survives, the overflow was discarded
        assert_eq!(q.get(), Some(1));
        assert_eq!(q.get(), Some(2));
        assert_eq!(q.get(), None);
    }

    #[test]
    fn input_queue_carries_panel_events() {
        use crate::device::InputEvent;

        let mut q = InputQueue::new(30);
        assert!(q.put(InputEvent::Confirm));
        assert!(q.put(InputEvent::StartStop));
        assert_eq!(q.get(), Some(InputEvent::Confirm));
        assert_eq!(q.get(), Some(InputEvent::StartStop));
        assert_eq!(q.get(), None);
    }

    #[test]
    fn clear_empties_without_touching_drop_counter() {
        let mut q: BoundedQueue<u16> = BoundedQueue::new(1);
        q.put(1);
        q.put(2);
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.dropped(), 1);
    }
}
