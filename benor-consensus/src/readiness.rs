//! Readiness barrier: "every peer is reachable", checked before round 0.

use std::time::Duration;

use async_trait::async_trait;
use benor_common::NodeId;
use tokio::sync::watch;

#[async_trait]
pub trait ReadinessBarrier: Send + Sync {
    async fn all_ready(&self) -> bool;

    /// Blocks until [`ReadinessBarrier::all_ready`] holds, re-checking every
    /// `poll_interval`. Implementations with change notification override
    /// this and ignore the interval.
    async fn wait_ready(&self, poll_interval: Duration) {
        while !self.all_ready().await {
            tokio::time::sleep(poll_interval).await;
        }
    }
}

/// A barrier that is always open. Used when readiness is established by
/// construction, e.g. an in-process mesh built before any node starts.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysReady;

#[async_trait]
impl ReadinessBarrier for AlwaysReady {
    async fn all_ready(&self) -> bool {
        true
    }
}

/// One flag per node, flipped as each node comes up.
///
/// Waiters are woken on every change instead of polling.
#[derive(Debug)]
pub struct ReadyFlags {
    flags: watch::Sender<Vec<bool>>,
}

impl ReadyFlags {
    pub fn new(n: usize) -> Self {
        let (flags, _) = watch::channel(vec![false; n]);
        Self { flags }
    }

    /// Marks `id` ready. Out-of-range ids are ignored.
    pub fn set_ready(&self, id: NodeId) {
        self.flags.send_modify(|flags| {
            if let Some(flag) = flags.get_mut(id.0) {
                *flag = true;
            }
        });
    }

    pub fn is_ready(&self, id: NodeId) -> bool {
        self.flags.borrow().get(id.0).copied().unwrap_or(false)
    }

    fn all_set(&self) -> bool {
        self.flags.borrow().iter().all(|ready| *ready)
    }
}

#[async_trait]
impl ReadinessBarrier for ReadyFlags {
    async fn all_ready(&self) -> bool {
        self.all_set()
    }

    async fn wait_ready(&self, _poll_interval: Duration) {
        let mut rx = self.flags.subscribe();
        loop {
            let ready = rx.borrow_and_update().iter().all(|ready| *ready);
            if ready {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_flags_open_when_every_node_is_ready() {
        let flags = ReadyFlags::new(3);
        assert!(!flags.all_ready().await);

        flags.set_ready(NodeId(0));
        flags.set_ready(NodeId(2));
        assert!(flags.is_ready(NodeId(2)));
        assert!(!flags.all_ready().await);

        flags.set_ready(NodeId(1));
        assert!(flags.all_ready().await);
    }

    #[tokio::test]
    async fn test_out_of_range_id_is_ignored() {
        let flags = ReadyFlags::new(1);
        flags.set_ready(NodeId(4));
        assert!(!flags.all_ready().await);
        assert!(!flags.is_ready(NodeId(4)));
    }

    #[tokio::test]
    async fn test_wait_ready_wakes_on_last_flag() {
        let flags = Arc::new(ReadyFlags::new(2));
        flags.set_ready(NodeId(0));

        let waiter = {
            let flags = Arc::clone(&flags);
            tokio::spawn(async move { flags.wait_ready(Duration::from_secs(3600)).await })
        };

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        flags.set_ready(NodeId(1));
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_wait_polls() {
        struct ReadyAfter(std::sync::atomic::AtomicUsize);

        #[async_trait]
        impl ReadinessBarrier for ReadyAfter {
            async fn all_ready(&self) -> bool {
                self.0.fetch_sub(1, std::sync::atomic::Ordering::SeqCst) == 1
            }
        }

        let barrier = ReadyAfter(std::sync::atomic::AtomicUsize::new(3));
        let started = tokio::time::Instant::now();
        barrier.wait_ready(Duration::from_secs(1)).await;
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }
}
