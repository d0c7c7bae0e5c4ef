//! Scan engine: job dispatch under a concurrency cap
//!
//! One dispatcher task reads the job queue. For every probe job it waits
//! for a free slot on a semaphore of `concurrency` permits and spawns a
//! probe task owning that permit. The permit is the task's registration as
//! active; dropping the task future, whether it returned or panicked, hands
//! the slot to the next job.
//!
//! Shutdown is sentinel based: [`ScanEngine::terminate`] queues one
//! [`ScanJob::Stop`] per slot and the dispatcher exits on the first one it
//! dequeues. Surplus sentinels are left in the queue.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use super::probe::{ProtocolProbe, ResultMap};
use super::queue::{JobReceiver, ScanJob, ScanQueue};
use super::service::Service;
use crate::config::ScanConfig;
use crate::network::{Access, Collaborators, Protocol};

/// Lifecycle of a scan engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Accepting jobs, dispatcher not started
    Created,
    /// Dispatcher running
    Running,
    /// Termination requested, waiting for the dispatcher and in-flight probes
    Draining,
    /// Dispatcher exited and all probes finished
    Terminated,
}

/// Cheap read-only view of a running engine, for progress reporting
#[derive(Debug, Clone)]
pub struct ScanMonitor {
    depth: Arc<AtomicUsize>,
    slots: Arc<Semaphore>,
    concurrency: usize,
}

impl ScanMonitor {
    /// Approximate queue depth
    pub fn pending(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// Number of probe tasks currently holding a slot
    pub fn active(&self) -> usize {
        self.concurrency
            .saturating_sub(self.slots.available_permits())
    }
}

/// Main scanning engine
pub struct ScanEngine {
    concurrency: usize,
    queue: ScanQueue,
    receiver: Option<JobReceiver>,
    slots: Arc<Semaphore>,
    probe: Arc<ProtocolProbe>,
    results: Arc<ResultMap>,
    dispatcher: Option<JoinHandle<()>>,
    state: ScanState,
    started_at: Option<Instant>,
}

impl ScanEngine {
    /// Create an engine probing with the system collaborators
    pub fn new(config: &ScanConfig) -> crate::Result<Self> {
        let collaborators = Collaborators::system(config.smbclient.clone());
        Self::with_collaborators(config, collaborators)
    }

    /// Create an engine with explicit collaborators
    pub fn with_collaborators(
        config: &ScanConfig,
        collaborators: Collaborators,
    ) -> crate::Result<Self> {
        config.validate()?;

        let (queue, receiver) = ScanQueue::new();
        let probe = ProtocolProbe::new(collaborators, config.timeout_duration());

        Ok(Self {
            concurrency: config.concurrency,
            queue,
            receiver: Some(receiver),
            slots: Arc::new(Semaphore::new(config.concurrency)),
            probe: Arc::new(probe),
            results: Arc::new(ResultMap::new()),
            dispatcher: None,
            state: ScanState::Created,
            started_at: None,
        })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn timeout(&self) -> Duration {
        self.probe.timeout()
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Collaborators used by the probes (also useful for hostname display)
    pub fn collaborators(&self) -> &Collaborators {
        self.probe.collaborators()
    }

    /// Queue a single service
    pub fn enqueue(&self, service: Service) -> bool {
        let queued = self.queue.push(ScanJob::Probe(service));
        if !queued {
            log::warn!("scan already stopped, job dropped");
        }
        queued
    }

    /// Queue one probe job per address for the given protocol. Returns the
    /// number of jobs accepted.
    pub fn add_protocol<I>(&self, protocol: Protocol, addresses: I) -> usize
    where
        I: IntoIterator<Item = IpAddr>,
    {
        let mut queued = 0;
        for address in addresses {
            if !self.queue.push(ScanJob::Probe(Service::new(protocol, address))) {
                log::warn!("scan already stopped, remaining {} jobs dropped", protocol);
                break;
            }
            queued += 1;
        }
        log::debug!("queued {} {} jobs", queued, protocol);
        queued
    }

    pub fn add_http<I: IntoIterator<Item = IpAddr>>(&self, addresses: I) -> usize {
        self.add_protocol(Protocol::Http, addresses)
    }

    pub fn add_https<I: IntoIterator<Item = IpAddr>>(&self, addresses: I) -> usize {
        self.add_protocol(Protocol::Https, addresses)
    }

    pub fn add_ftp<I: IntoIterator<Item = IpAddr>>(&self, addresses: I) -> usize {
        self.add_protocol(Protocol::Ftp, addresses)
    }

    pub fn add_smb<I: IntoIterator<Item = IpAddr>>(&self, addresses: I) -> usize {
        self.add_protocol(Protocol::Smb, addresses)
    }

    /// Start dispatching. Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        let receiver = match (self.state, self.receiver.take()) {
            (ScanState::Created, Some(receiver)) => receiver,
            (state, receiver) => {
                self.receiver = receiver;
                log::warn!("start() ignored in state {:?}", state);
                return;
            }
        };

        log::info!(
            "Starting scan: {} jobs queued, concurrency {}, timeout {:?}",
            self.pending(),
            self.concurrency,
            self.timeout()
        );

        self.dispatcher = Some(tokio::spawn(dispatch(
            receiver,
            self.slots.clone(),
            self.probe.clone(),
            self.results.clone(),
        )));
        self.started_at = Some(Instant::now());
        self.state = ScanState::Running;
    }

    /// Stop admitting jobs and wait until the dispatcher has exited and
    /// every probe already running has finished. Always returns; calling it
    /// again, or before `start`, returns immediately. If the returned future
    /// is dropped before completion the engine stays `Draining` and the next
    /// call resumes the wait.
    pub async fn terminate(&mut self) {
        match self.state {
            ScanState::Terminated => return,
            ScanState::Created => {
                self.receiver = None;
                self.state = ScanState::Terminated;
                log::debug!("terminate() before start, nothing to drain");
                return;
            }
            ScanState::Running | ScanState::Draining => {}
        }

        if self.state == ScanState::Running {
            self.state = ScanState::Draining;
            for _ in 0..self.concurrency {
                self.queue.push(ScanJob::Stop);
            }
        }

        if let Some(dispatcher) = self.dispatcher.as_mut() {
            if let Err(e) = dispatcher.await {
                log::error!("dispatcher task failed: {}", e);
            }
            self.dispatcher = None;
        }

        // Every slot back in hand means no probe is in flight.
        let all = u32::try_from(self.concurrency).unwrap_or(u32::MAX);
        match self.slots.acquire_many(all).await {
            Ok(permits) => drop(permits),
            Err(e) => log::error!("could not drain probe slots: {}", e),
        }

        self.state = ScanState::Terminated;
        let elapsed = self.started_at.map(|t| t.elapsed()).unwrap_or_default();
        log::info!(
            "Scan terminated after {:.2}s: {} services answered, {} entries left in queue",
            elapsed.as_secs_f64(),
            self.results.len(),
            self.pending()
        );
    }

    /// Approximate queue depth
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Number of probe tasks currently running
    pub fn active(&self) -> usize {
        self.monitor().active()
    }

    pub fn monitor(&self) -> ScanMonitor {
        ScanMonitor {
            depth: self.queue.depth_counter(),
            slots: self.slots.clone(),
            concurrency: self.concurrency,
        }
    }

    /// Snapshot of the verdicts recorded so far
    pub fn services(&self) -> HashMap<Service, Access> {
        self.results
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }
}

impl std::fmt::Debug for ScanEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanEngine")
            .field("concurrency", &self.concurrency)
            .field("state", &self.state)
            .field("pending", &self.pending())
            .field("results", &self.results.len())
            .finish()
    }
}

async fn dispatch(
    mut jobs: JobReceiver,
    slots: Arc<Semaphore>,
    probe: Arc<ProtocolProbe>,
    results: Arc<ResultMap>,
) {
    while let Some(job) = jobs.next().await {
        let service = match job {
            ScanJob::Probe(service) => service,
            ScanJob::Stop => break,
        };

        let permit = match slots.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        let probe = probe.clone();
        let results = results.clone();
        tokio::spawn(async move {
            let _permit = permit;
            probe.run(&service, &results).await;
        });
    }
    log::debug!("dispatcher exited");
}
