// crates/orchestrator/src/orchestrator.rs
//! Orchestrator - bounded worker pool and shutdown protocol
//!
//! Shutdown order:
//! 1. the feeder runs out of names (or is cancelled) and drops the job sender
//! 2. each worker exits once the job queue is closed and empty (or on cancel)
//! 3. the supervisor joins every worker, then drops the last result sender
//! 4. the consumer sees the result queue close after draining it

use anyhow::{Context, Result};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use buckscan_common::{BucketName, PoolOptions, ProbeVerdict, Prober, StatsSnapshot};
use crate::progress::ProgressTracker;

/// Lifecycle of one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ScanState {
    Idle = 0,
    Running = 1,
    /// No more names will be queued; workers finish what is left.
    Draining = 2,
    Done = 3,
}

impl ScanState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ScanState::Idle,
            1 => ScanState::Running,
            2 => ScanState::Draining,
            _ => ScanState::Done,
        }
    }
}

#[derive(Debug)]
struct StateCell(AtomicU8);

impl StateCell {
    fn new() -> Self {
        Self(AtomicU8::new(ScanState::Idle as u8))
    }

    fn get(&self) -> ScanState {
        ScanState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move forward only; a late transition never rewinds the state.
    fn advance(&self, to: ScanState) {
        self.0.fetch_max(to as u8, Ordering::AcqRel);
    }
}

/// Orchestrator fans bucket names out to a fixed pool of probers.
pub struct Orchestrator {
    prober: Arc<dyn Prober>,
    options: PoolOptions,
    cancel: CancellationToken,
    state: Arc<StateCell>,
}

impl Orchestrator {
    /// Create an orchestrator. The worker count is clamped when the scan starts.
    pub fn new(prober: Arc<dyn Prober>, options: PoolOptions) -> Self {
        Self {
            prober,
            options,
            cancel: CancellationToken::new(),
            state: Arc::new(StateCell::new()),
        }
    }

    /// Tie the scan to an external cancel signal (e.g. Ctrl-C).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn effective_workers(&self) -> usize {
        self.options.effective_workers()
    }

    /// Start the scan. Verdicts come back through the handle in completion order.
    ///
    /// Consumes the orchestrator: a scan cannot be restarted.
    #[instrument(skip_all)]
    pub fn run<S>(self, names: S) -> ScanHandle
    where
        S: Stream<Item = BucketName> + Send + Unpin + 'static,
    {
        let workers = self.options.effective_workers();
        let depth = self.options.effective_queue_depth();
        // child token: dropping the handle must not cancel the caller's token
        let cancel = self.cancel.child_token();
        let state = self.state;
        let progress = Arc::new(ProgressTracker::new());

        info!(
            "Starting scan prober={} workers={} queue_depth={}",
            self.prober.name(),
            workers,
            depth
        );
        state.advance(ScanState::Running);

        let (jobs_tx, jobs_rx) = mpsc::channel::<BucketName>(depth);
        let (results_tx, results_rx) = mpsc::channel::<ProbeVerdict>(depth);

        let feeder = tokio::spawn(feed(names, jobs_tx, cancel.clone(), state.clone()));

        let jobs_rx = Arc::new(Mutex::new(jobs_rx));
        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            handles.push(tokio::spawn(work(
                id,
                jobs_rx.clone(),
                results_tx.clone(),
                self.prober.clone(),
                cancel.clone(),
            )));
        }
        drop(jobs_rx);

        let supervisor = tokio::spawn(supervise(handles, results_tx));

        ScanHandle {
            results: results_rx,
            progress,
            state,
            cancel,
            feeder: Some(feeder),
            supervisor: Some(supervisor),
        }
    }
}

/// Pull names into the job queue until the source ends or the scan is cancelled.
async fn feed<S>(
    mut names: S,
    jobs: mpsc::Sender<BucketName>,
    cancel: CancellationToken,
    state: Arc<StateCell>,
) -> usize
where
    S: Stream<Item = BucketName> + Send + Unpin + 'static,
{
    let mut queued = 0usize;
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = names.next() => next,
        };
        let Some(name) = next else { break };

        // blocks while the queue is full
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = jobs.send(name) => {
                if sent.is_err() {
                    break;
                }
            }
        }
        queued += 1;
    }

    drop(jobs);
    state.advance(ScanState::Draining);
    debug!("Job queue closed after {} names", queued);
    queued
}

async fn work(
    id: usize,
    jobs: Arc<Mutex<mpsc::Receiver<BucketName>>>,
    results: mpsc::Sender<ProbeVerdict>,
    prober: Arc<dyn Prober>,
    cancel: CancellationToken,
) {
    let mut probed = 0usize;
    loop {
        // cancellation is only checked between jobs; an issued probe runs to completion
        let job = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            job = async { jobs.lock().await.recv().await } => job,
        };
        let Some(name) = job else { break };

        let verdict = prober.probe(&name).await;
        probed += 1;
        if results.send(verdict).await.is_err() {
            debug!(worker = id, "Result consumer gone");
            break;
        }
    }
    debug!(worker = id, probed, "Worker exiting");
}

/// Wait for every worker, then close the result queue.
async fn supervise(workers: Vec<JoinHandle<()>>, results: mpsc::Sender<ProbeVerdict>) {
    for w in workers {
        if let Err(e) = w.await {
            warn!("Worker task failed: {}", e);
        }
    }
    drop(results);
    debug!("All workers finished; result queue closed");
}

/// Consumer side of a running scan.
///
/// Every verdict pulled through the handle is counted exactly once.
pub struct ScanHandle {
    results: mpsc::Receiver<ProbeVerdict>,
    progress: Arc<ProgressTracker>,
    state: Arc<StateCell>,
    cancel: CancellationToken,
    feeder: Option<JoinHandle<usize>>,
    supervisor: Option<JoinHandle<()>>,
}

impl ScanHandle {
    /// Next verdict in completion order, or `None` once the result queue is closed and drained.
    pub async fn next(&mut self) -> Option<ProbeVerdict> {
        let next = self.results.recv().await;
        self.on_result(next)
    }

    fn on_result(&mut self, next: Option<ProbeVerdict>) -> Option<ProbeVerdict> {
        match next {
            Some(verdict) => {
                self.progress.observe(&verdict);
                Some(verdict)
            }
            None => {
                self.state.advance(ScanState::Done);
                None
            }
        }
    }

    pub fn state(&self) -> ScanState {
        self.state.get()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.progress.snapshot()
    }

    /// Live counters for displays that redraw while the scan runs.
    pub fn subscribe(&self) -> watch::Receiver<StatsSnapshot> {
        self.progress.subscribe()
    }

    /// Stop queueing names. In-flight probes still deliver their verdicts.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Drain what is left, join every task and return the final counters.
    pub async fn finish(mut self) -> Result<StatsSnapshot> {
        while self.next().await.is_some() {}

        let queued = match self.feeder.take() {
            Some(h) => h.await.context("Feeder task failed")?,
            None => 0,
        };
        if let Some(h) = self.supervisor.take() {
            h.await.context("Supervisor task failed")?;
        }

        self.progress.log_summary(queued);
        Ok(self.stats())
    }
}

impl Stream for ScanHandle {
    type Item = ProbeVerdict;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        match self.results.poll_recv(cx) {
            Poll::Ready(next) => Poll::Ready(self.on_result(next)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ScanHandle {
    fn drop(&mut self) {
        if self.state.get() != ScanState::Done {
            self.cancel.cancel();
        }
    }
}
