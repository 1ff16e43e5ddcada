use std::collections::VecDeque;

use rand::seq::SliceRandom;

use super::QueueStrategy;

/// Ordered store whose [`dispatch`](TrackQueue::dispatch) end depends on the
/// strategy: front for FIFO, back for LIFO.
#[derive(Debug, Clone)]
pub struct TrackQueue<T> {
    items: VecDeque<T>,
    strategy: QueueStrategy,
}

impl<T> Default for TrackQueue<T> {
    fn default() -> Self {
        Self {
            items: VecDeque::new(),
            strategy: QueueStrategy::Fifo,
        }
    }
}

impl<T: Clone> TrackQueue<T> {
    pub fn new(strategy: QueueStrategy) -> Self {
        Self {
            items: VecDeque::new(),
            strategy,
        }
    }

    pub fn strategy(&self) -> QueueStrategy {
        self.strategy
    }

    pub fn set_strategy(&mut self, strategy: QueueStrategy) {
        self.strategy = strategy;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn add(&mut self, item: T) {
        self.items.push_back(item);
    }

    pub fn add_many(&mut self, items: impl IntoIterator<Item = T>) {
        self.items.extend(items);
    }

    /// Inserts at `index`, clamped to the end.
    pub fn insert(&mut self, item: T, index: usize) {
        let index = index.min(self.items.len());
        self.items.insert(index, item);
    }

    /// Puts `item` where the next [`dispatch`](Self::dispatch) takes from.
    pub fn push_next(&mut self, item: T) {
        match self.strategy {
            QueueStrategy::Fifo => self.items.push_front(item),
            QueueStrategy::Lifo => self.items.push_back(item),
        }
    }

    /// Pops the next item.
    pub fn dispatch(&mut self) -> Option<T> {
        match self.strategy {
            QueueStrategy::Fifo => self.items.pop_front(),
            QueueStrategy::Lifo => self.items.pop_back(),
        }
    }

    /// Pops a random item.
    pub fn dispatch_random(&mut self) -> Option<T> {
        if self.items.is_empty() {
            return None;
        }
        let idx = rand::random::<usize>() % self.items.len();
        self.items.remove(idx)
    }

    /// The item [`dispatch`](Self::dispatch) would return.
    pub fn peek(&self) -> Option<&T> {
        match self.strategy {
            QueueStrategy::Fifo => self.items.front(),
            QueueStrategy::Lifo => self.items.back(),
        }
    }

    pub fn at(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Option<&T> {
        self.items.iter().find(|i| pred(i))
    }

    pub fn position(&self, pred: impl Fn(&T) -> bool) -> Option<usize> {
        self.items.iter().position(pred)
    }

    pub fn remove_at(&mut self, index: usize) -> Option<T> {
        self.items.remove(index)
    }

    /// Removes every item matching `pred`, returning them in order.
    pub fn remove(&mut self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        let mut removed = Vec::new();
        let mut kept = VecDeque::with_capacity(self.items.len());
        for item in self.items.drain(..) {
            if pred(&item) {
                removed.push(item);
            } else {
                kept.push_back(item);
            }
        }
        self.items = kept;
        removed
    }

    /// Removes and returns the first `count` items.
    pub fn drain_front(&mut self, count: usize) -> Vec<T> {
        let count = count.min(self.items.len());
        self.items.drain(..count).collect()
    }

    pub fn swap(&mut self, a: usize, b: usize) -> bool {
        if a >= self.items.len() || b >= self.items.len() {
            return false;
        }
        self.items.swap(a, b);
        true
    }

    pub fn shuffle(&mut self) {
        self.items.make_contiguous().shuffle(&mut rand::thread_rng());
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}
