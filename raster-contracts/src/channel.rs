//! A minimal bounded, multi/single-producer-consumer FIFO with a non-blocking
//! size query, implementing both the "Primitive channel contract" and the
//! client output channel shape of `spec.md` §6. A real deployment would
//! likely back this with `tokio::sync::mpsc`, but that type doesn't expose a
//! synchronous length probe; the scheduler's gates need exactly that
//! (`ext_receive_nothing` samples channel size every idle tick), so a small
//! `Mutex<VecDeque>` wrapper is the more direct fit.
use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

/// A bounded queue of `T`. Cloning shares the same underlying buffer.
#[derive(Clone)]
pub struct BoundedChannel<T> {
    inner: Arc<Mutex<VecDeque<T>>>,
    capacity: usize,
}

impl<T> BoundedChannel<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(1024)))),
            capacity,
        }
    }

    /// Prefills the channel with `items`, for primitive sources that hand a
    /// collection of already-known arrays to a consumer up front.
    pub fn prefilled(capacity: usize, items: impl IntoIterator<Item = T>) -> Self {
        let chan = Self::new(capacity);
        {
            let mut guard = chan.inner.lock();
            guard.extend(items);
        }
        chan
    }

    /// Non-blocking push. Returns `Err(item)` if the channel is at capacity.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        let mut guard = self.inner.lock();
        if guard.len() >= self.capacity {
            return Err(item);
        }
        guard.push_back(item);
        Ok(())
    }

    /// Non-blocking pop.
    pub fn try_pop(&self) -> Option<T> {
        self.inner.lock().pop_front()
    }

    /// Current occupancy. Non-blocking, matching the contract's size query.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn respects_capacity() {
        let chan: BoundedChannel<i32> = BoundedChannel::new(2);
        assert!(chan.try_push(1).is_ok());
        assert!(chan.try_push(2).is_ok());
        assert!(chan.try_push(3).is_err());
        assert_eq!(chan.len(), 2);
    }

    #[test]
    fn fifo_order() {
        let chan: BoundedChannel<i32> = BoundedChannel::new(4);
        chan.try_push(1).unwrap();
        chan.try_push(2).unwrap();
        assert_eq!(chan.try_pop(), Some(1));
        assert_eq!(chan.try_pop(), Some(2));
        assert_eq!(chan.try_pop(), None);
    }
}
