use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Two-level admission control: a swarm-wide cap on in-flight model/tool
/// operations composed with a per-agent cap on concurrent tool calls.
///
/// The global ticket is always taken before the local one; taking them the
/// other way round lets many agents hold their local ticket while starved
/// for a global one. Callers queue without timeout when a limit is
/// saturated — timeouts belong to the model-call boundary, not here.
#[derive(Clone)]
pub struct AdmissionController {
    global: Option<Arc<Semaphore>>,
    local: Option<Arc<Semaphore>>,
}

/// RAII ticket pair. Field order matters: the local permit is declared
/// first so it drops before the global one, releasing in reverse
/// acquisition order.
pub struct AdmissionTicket {
    _local: Option<OwnedSemaphorePermit>,
    _global: Option<OwnedSemaphorePermit>,
}

impl AdmissionController {
    /// `global` is shared by every agent in the swarm; `local_limit` is
    /// this agent's own cap. Either may be absent.
    pub fn new(global: Option<Arc<Semaphore>>, local_limit: Option<usize>) -> Self {
        Self {
            global,
            local: local_limit.map(|n| Arc::new(Semaphore::new(n))),
        }
    }

    /// No limits configured; acquire returns immediately.
    pub fn unbounded() -> Self {
        Self {
            global: None,
            local: None,
        }
    }

    /// Acquire global then local, waiting as long as it takes.
    pub async fn acquire(&self) -> Result<AdmissionTicket> {
        let global = match &self.global {
            Some(sem) => Some(
                sem.clone()
                    .acquire_owned()
                    .await
                    .context("global admission semaphore closed")?,
            ),
            None => None,
        };
        let local = match &self.local {
            Some(sem) => Some(
                sem.clone()
                    .acquire_owned()
                    .await
                    .context("local admission semaphore closed")?,
            ),
            None => None,
        };
        Ok(AdmissionTicket {
            _local: local,
            _global: global,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Tracks the high-water mark of concurrently admitted tasks.
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Gauge {
        fn new() -> Self {
            Self {
                current: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }

        fn enter(&self) {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
        }

        fn exit(&self) {
            self.current.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn unbounded_admits_immediately() {
        let controller = AdmissionController::unbounded();
        let _ticket = controller.acquire().await.unwrap();
    }

    #[tokio::test]
    async fn global_limit_bounds_whole_tree() {
        let global = Arc::new(Semaphore::new(2));
        let gauge = Arc::new(Gauge::new());

        // Two "agents" sharing the global semaphore, no local cap.
        let mut handles = Vec::new();
        for _ in 0..2 {
            let controller = AdmissionController::new(Some(global.clone()), None);
            for _ in 0..8 {
                let controller = controller.clone();
                let gauge = gauge.clone();
                handles.push(tokio::spawn(async move {
                    let _ticket = controller.acquire().await.unwrap();
                    gauge.enter();
                    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                    gauge.exit();
                }));
            }
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(gauge.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn local_limit_bounds_single_agent() {
        let global = Arc::new(Semaphore::new(2));
        let controller = AdmissionController::new(Some(global), Some(1));
        let gauge = Arc::new(Gauge::new());

        let mut handles = Vec::new();
        for _ in 0..6 {
            let controller = controller.clone();
            let gauge = gauge.clone();
            handles.push(tokio::spawn(async move {
                let _ticket = controller.acquire().await.unwrap();
                gauge.enter();
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                gauge.exit();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(gauge.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ticket_release_frees_waiters() {
        let controller = AdmissionController::new(None, Some(1));
        let first = controller.acquire().await.unwrap();

        let waiter = {
            let controller = controller.clone();
            tokio::spawn(async move {
                let _ticket = controller.acquire().await.unwrap();
            })
        };

        // Waiter cannot finish until the first ticket drops.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        drop(first);
        waiter.await.unwrap();
    }
}
