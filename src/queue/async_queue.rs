use std::{collections::VecDeque, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::common::errors::{PlayerError, PlayerResult};

struct Slot {
    id: u64,
    /// Present until the slot's turn comes.
    waker: Option<oneshot::Sender<()>>,
}

impl Slot {
    fn consume(&mut self) {
        if let Some(tx) = self.waker.take() {
            let _ = tx.send(());
        }
    }
}

#[derive(Default)]
struct QueueState {
    entries: VecDeque<Slot>,
    next_id: u64,
}

/// FIFO turn-taking lock: each [`acquire`](AsyncQueue::acquire) waits for
/// every earlier entry to be released.
///
/// Entries can be cancelled from anywhere in the line, not only the head.
/// Dropping an entry releases it.
#[derive(Clone, Default)]
pub struct AsyncQueue {
    state: Arc<Mutex<QueueState>>,
}

impl std::fmt::Debug for AsyncQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncQueue").field("size", &self.size()).finish()
    }
}

impl AsyncQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins the line. With `signal`, firing the token removes the entry and
    /// fails its wait with [`PlayerError::Cancelled`].
    pub fn acquire(&self, signal: Option<CancellationToken>) -> AsyncQueueEntry {
        let (tx, rx) = oneshot::channel();
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;

        let mut slot = Slot { id, waker: Some(tx) };
        if state.entries.is_empty() {
            slot.consume();
        }
        state.entries.push_back(slot);

        AsyncQueueEntry {
            id,
            queue: self.clone(),
            turn: Some(rx),
            signal,
            cancel: CancellationToken::new(),
        }
    }

    /// Drops the head entry and hands the turn to the next one.
    pub fn release(&self) {
        let mut state = self.state.lock();
        state.entries.pop_front();
        if let Some(head) = state.entries.front_mut() {
            head.consume();
        }
    }

    /// Cancels every waiting entry and empties the line.
    pub fn clear(&self) {
        self.state.lock().entries.clear();
    }

    pub fn size(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    fn remove(&self, id: u64) {
        let mut state = self.state.lock();
        let Some(idx) = state.entries.iter().position(|s| s.id == id) else {
            return;
        };
        state.entries.remove(idx);
        if idx == 0 {
            if let Some(head) = state.entries.front_mut() {
                head.consume();
            }
        }
    }
}

/// One place in an [`AsyncQueue`].
pub struct AsyncQueueEntry {
    id: u64,
    queue: AsyncQueue,
    turn: Option<oneshot::Receiver<()>>,
    signal: Option<CancellationToken>,
    cancel: CancellationToken,
}

impl AsyncQueueEntry {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Resolves once every earlier entry has been released.
    pub async fn get_task(&mut self) -> PlayerResult<()> {
        let turn = self.turn.take().ok_or(PlayerError::Cancelled)?;
        let signal = self.signal.clone().unwrap_or_default();

        let result = tokio::select! {
            biased;
            res = turn => res.map_err(|_| PlayerError::Cancelled),
            _ = self.cancel.cancelled() => Err(PlayerError::Cancelled),
            _ = signal.cancelled() => Err(PlayerError::Cancelled),
        };
        if result.is_err() {
            self.queue.remove(self.id);
        }
        result
    }

    /// Leaves the line. A pending [`get_task`](Self::get_task) fails with
    /// [`PlayerError::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
        self.queue.remove(self.id);
    }

    /// Gives up the turn so the next entry can run.
    pub fn release(self) {}
}

impl Drop for AsyncQueueEntry {
    fn drop(&mut self) {
        self.queue.remove(self.id);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_entries_run_in_acquire_order() {
        let queue = AsyncQueue::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..5 {
            let mut entry = queue.acquire(None);
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                entry.get_task().await.unwrap();
                tokio::time::sleep(Duration::from_millis(5 - i)).await;
                order.lock().push(i);
                entry.release();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_cancelling_middle_entry_does_not_stall() {
        let queue = AsyncQueue::new();
        let mut first = queue.acquire(None);
        let signal = CancellationToken::new();
        let mut second = queue.acquire(Some(signal.clone()));
        let mut third = queue.acquire(None);

        first.get_task().await.unwrap();
        signal.cancel();
        assert_eq!(second.get_task().await, Err(PlayerError::Cancelled));
        assert_eq!(queue.size(), 2);

        first.release();
        tokio::time::timeout(Duration::from_secs(1), third.get_task())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelling_waiting_head_repairs_line() {
        let queue = AsyncQueue::new();
        let running = queue.acquire(None);
        let mut waiting = queue.acquire(None);
        let mut last = queue.acquire(None);

        waiting.cancel();
        assert_eq!(waiting.get_task().await, Err(PlayerError::Cancelled));

        queue.release();
        drop(running);
        last.get_task().await.unwrap();
        assert_eq!(queue.size(), 1);
    }

    #[tokio::test]
    async fn test_clear_fails_waiters() {
        let queue = AsyncQueue::new();
        let _head = queue.acquire(None);
        let mut waiter = queue.acquire(None);
        queue.clear();
        assert_eq!(waiter.get_task().await, Err(PlayerError::Cancelled));
    }
}
