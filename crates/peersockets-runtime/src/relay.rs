//! Relay queue
//!
//! Network callbacks push envelopes from whatever context the client runs
//! them in; a single consumer drains them asynchronously. Producers are
//! serialized by the queue lock and never wait on the consumer.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::QueuePolicy;

/// Relay queue counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub enqueued: u64,
    pub delivered: u64,
    pub dropped: u64,
}

struct QueueInner<T> {
    items: VecDeque<T>,
    closed: bool,
    stats: RelayStats,
}

/// Multi-producer, single-consumer envelope queue
pub struct RelayQueue<T> {
    inner: Mutex<QueueInner<T>>,
    notify: Notify,
    policy: QueuePolicy,
}

impl<T> RelayQueue<T> {
    pub fn new(policy: QueuePolicy) -> Self {
        let policy = match policy {
            QueuePolicy::DropOldest { capacity } => QueuePolicy::DropOldest {
                capacity: capacity.max(1),
            },
            other => other,
        };
        RelayQueue {
            inner: Mutex::new(QueueInner {
                items: VecDeque::new(),
                closed: false,
                stats: RelayStats::default(),
            }),
            notify: Notify::new(),
            policy,
        }
    }

    /// Enqueue an envelope. Returns false once the queue is closed.
    pub fn push(&self, item: T) -> bool {
        {
            let mut inner = self.inner.lock();
            if inner.closed {
                return false;
            }
            if let QueuePolicy::DropOldest { capacity } = self.policy {
                if inner.items.len() >= capacity {
                    inner.items.pop_front();
                    inner.stats.dropped += 1;
                    tracing::trace!(capacity, "relay queue full, evicted oldest envelope");
                }
            }
            inner.items.push_back(item);
            inner.stats.enqueued += 1;
        }
        self.notify.notify_one();
        true
    }

    /// Wait for the next envelope; `None` once the queue is closed
    pub async fn recv(&self) -> Option<T> {
        loop {
            {
                let mut inner = self.inner.lock();
                if let Some(item) = inner.items.pop_front() {
                    inner.stats.delivered += 1;
                    return Some(item);
                }
                if inner.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Next envelope if one is already queued
    pub fn try_recv(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        let item = inner.items.pop_front()?;
        inner.stats.delivered += 1;
        Some(item)
    }

    /// Close the queue, discarding anything undelivered and waking the consumer
    pub fn close(&self) {
        {
            let mut inner = self.inner.lock();
            inner.closed = true;
            inner.items.clear();
        }
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    pub fn policy(&self) -> QueuePolicy {
        self.policy
    }

    pub fn stats(&self) -> RelayStats {
        self.inner.lock().stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = RelayQueue::new(QueuePolicy::Unbounded);
        for i in 0..5 {
            assert!(queue.push(i));
        }
        for i in 0..5 {
            assert_eq!(queue.recv().await, Some(i));
        }
        assert_eq!(queue.try_recv(), None);
        assert_eq!(queue.stats().delivered, 5);
    }

    #[tokio::test]
    async fn test_recv_wakes_on_push() {
        let queue = Arc::new(RelayQueue::new(QueuePolicy::Unbounded));
        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.recv().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.push("hello");
        assert_eq!(consumer.await.unwrap(), Some("hello"));
    }

    #[tokio::test]
    async fn test_close_wakes_consumer() {
        let queue: Arc<RelayQueue<u8>> = Arc::new(RelayQueue::new(QueuePolicy::Unbounded));
        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.recv().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.close();
        assert_eq!(consumer.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_push_after_close_rejected() {
        let queue = RelayQueue::new(QueuePolicy::Unbounded);
        queue.push(1);
        queue.close();
        assert!(!queue.push(2));
        assert!(queue.is_closed());
        assert!(queue.is_empty());
        assert_eq!(queue.recv().await, None);
    }

    #[test]
    fn test_drop_oldest_keeps_newest() {
        let queue = RelayQueue::new(QueuePolicy::DropOldest { capacity: 3 });
        for i in 0..10 {
            queue.push(i);
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.try_recv(), Some(7));
        assert_eq!(queue.try_recv(), Some(8));
        assert_eq!(queue.try_recv(), Some(9));
        let stats = queue.stats();
        assert_eq!(stats.enqueued, 10);
        assert_eq!(stats.dropped, 7);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let queue = RelayQueue::new(QueuePolicy::DropOldest { capacity: 0 });
        assert_eq!(queue.policy(), QueuePolicy::DropOldest { capacity: 1 });
        queue.push('a');
        queue.push('b');
        assert_eq!(queue.try_recv(), Some('b'));
    }

    #[test]
    fn test_concurrent_producers_are_serialized() {
        let queue = Arc::new(RelayQueue::new(QueuePolicy::Unbounded));
        let producers: Vec<_> = (0..4u32)
            .map(|p| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for i in 0..250u32 {
                        queue.push((p, i));
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        assert_eq!(queue.len(), 1000);
        // Per-producer order survives interleaving
        let mut last = [None::<u32>; 4];
        while let Some((p, i)) = queue.try_recv() {
            let slot = &mut last[p as usize];
            assert!(slot.map_or(true, |prev| prev < i));
            *slot = Some(i);
        }
    }
}
