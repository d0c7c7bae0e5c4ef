//! Job queue feeding the dispatcher

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::service::Service;

/// A unit of work for the dispatcher
#[derive(Debug, Clone)]
pub enum ScanJob {
    /// Probe this service
    Probe(Service),
    /// Stop dispatching. Never a probe target.
    Stop,
}

/// Producer side of the queue. Cloneable; depth is shared.
#[derive(Debug, Clone)]
pub struct ScanQueue {
    tx: mpsc::UnboundedSender<ScanJob>,
    depth: Arc<AtomicUsize>,
}

/// Consumer side of the queue, owned by the dispatcher
#[derive(Debug)]
pub struct JobReceiver {
    rx: mpsc::UnboundedReceiver<ScanJob>,
    depth: Arc<AtomicUsize>,
}

impl ScanQueue {
    /// Create a connected queue and receiver
    pub fn new() -> (ScanQueue, JobReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let depth = Arc::new(AtomicUsize::new(0));
        (
            ScanQueue {
                tx,
                depth: depth.clone(),
            },
            JobReceiver { rx, depth },
        )
    }

    /// Append a job. Returns false once the receiver is gone.
    pub fn push(&self, job: ScanJob) -> bool {
        // Count first so the receiver never decrements below zero.
        self.depth.fetch_add(1, Ordering::Relaxed);
        match self.tx.send(job) {
            Ok(()) => true,
            Err(_) => {
                self.depth.fetch_sub(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Approximate number of queued jobs. Racy by nature; for display only.
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn depth_counter(&self) -> Arc<AtomicUsize> {
        self.depth.clone()
    }
}

impl JobReceiver {
    /// Wait for the next job
    pub async fn next(&mut self) -> Option<ScanJob> {
        let job = self.rx.recv().await?;
        self.depth.fetch_sub(1, Ordering::Relaxed);
        Some(job)
    }
}
