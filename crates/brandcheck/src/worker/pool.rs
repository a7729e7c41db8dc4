use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use log::{debug, error, info, warn};
use tokio::runtime::{Handle, Runtime};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::error::WorkerError;
use crate::pipeline::{AssetProgressEvent, BroadcastProgress, NoopProgress, Pipeline};
use crate::worker::job::{AssetJob, AssetJobResult};

const RECV_TIMEOUT: Duration = Duration::from_millis(100);
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// OS worker threads driving the async pipeline on a shared runtime.
pub struct WorkerPool {
    job_sender: Sender<AssetJob>,
    result_receiver: Receiver<AssetJobResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    cancel: CancellationToken,
    runtime: Runtime,
}

impl WorkerPool {
    pub fn new(
        pipeline: Arc<Pipeline>,
        worker_count: usize,
        queue_capacity: usize,
    ) -> Result<Self, WorkerError> {
        Self::with_progress_sender(pipeline, worker_count, queue_capacity, None)
    }

    /// Creates a pool whose runs publish progress on `progress_sender`.
    pub fn with_progress_sender(
        pipeline: Arc<Pipeline>,
        worker_count: usize,
        queue_capacity: usize,
        progress_sender: Option<broadcast::Sender<AssetProgressEvent>>,
    ) -> Result<Self, WorkerError> {
        if worker_count == 0 {
            return Err(WorkerError::SpawnFailed(
                "worker_count must be at least 1".to_string(),
            ));
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_count)
            .thread_name("brandcheck-io")
            .enable_all()
            .build()
            .map_err(|e| WorkerError::SpawnFailed(format!("tokio runtime: {}", e)))?;

        let (job_sender, job_receiver) = bounded::<AssetJob>(queue_capacity.max(1));
        let (result_sender, result_receiver) = unbounded::<AssetJobResult>();
        let shutdown = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let worker = Worker {
                id: worker_id,
                jobs: job_receiver.clone(),
                results: result_sender.clone(),
                shutdown: Arc::clone(&shutdown),
                cancel: cancel.clone(),
                pipeline: Arc::clone(&pipeline),
                runtime: runtime.handle().clone(),
                progress_sender: progress_sender.clone(),
            };

            let handle = thread::Builder::new()
                .name(format!("brandcheck-worker-{}", worker_id))
                .spawn(move || worker.run())
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Ok(Self {
            job_sender,
            result_receiver,
            workers,
            shutdown,
            cancel,
            runtime,
        })
    }

    /// Sender side of the job queue, for [`AssetQueue`](super::AssetQueue).
    pub fn job_sender(&self) -> Sender<AssetJob> {
        self.job_sender.clone()
    }

    /// Blocks while the queue is full.
    pub fn submit(&self, job: AssetJob) -> Result<(), WorkerError> {
        if self.is_shutdown() {
            return Err(WorkerError::ChannelClosed);
        }

        self.job_sender
            .send(job)
            .map_err(|_| WorkerError::ChannelClosed)
    }

    /// Returns `Ok(false)` when the queue is full.
    pub fn try_submit(&self, job: AssetJob) -> Result<bool, WorkerError> {
        if self.is_shutdown() {
            return Err(WorkerError::ChannelClosed);
        }

        match self.job_sender.try_send(job) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => Ok(false),
            Err(TrySendError::Disconnected(_)) => Err(WorkerError::ChannelClosed),
        }
    }

    pub fn try_recv_result(&self) -> Option<AssetJobResult> {
        self.result_receiver.try_recv().ok()
    }

    pub fn recv_result_timeout(&self, timeout: Duration) -> Option<AssetJobResult> {
        self.result_receiver.recv_timeout(timeout).ok()
    }

    /// Stops accepting jobs and cancels in-flight runs.
    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
        self.cancel.cancel();
    }

    pub fn wait(self) {
        // Drop sender to signal workers to exit
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        self.runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

struct Worker {
    id: usize,
    jobs: Receiver<AssetJob>,
    results: Sender<AssetJobResult>,
    shutdown: Arc<AtomicBool>,
    cancel: CancellationToken,
    pipeline: Arc<Pipeline>,
    runtime: Handle,
    progress_sender: Option<broadcast::Sender<AssetProgressEvent>>,
}

impl Worker {
    fn run(self) {
        debug!("Worker {} started", self.id);

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                debug!("Worker {} received shutdown signal", self.id);
                break;
            }

            match self.jobs.recv_timeout(RECV_TIMEOUT) {
                Ok(job) => {
                    debug!(
                        "Worker {} processing asset {} ({:?})",
                        self.id, job.asset_id, job.origin
                    );

                    let outcome = match &self.progress_sender {
                        Some(sender) => {
                            let progress = BroadcastProgress::new(&job.asset_id, sender.clone());
                            self.runtime
                                .block_on(self.pipeline.run(&job.asset_id, &progress, &self.cancel))
                        }
                        None => self.runtime.block_on(self.pipeline.run(
                            &job.asset_id,
                            &NoopProgress,
                            &self.cancel,
                        )),
                    };

                    let result = AssetJobResult {
                        asset_id: job.asset_id,
                        outcome,
                    };
                    if let Err(e) = self.results.send(result) {
                        warn!("Worker {} failed to send result: {}", self.id, e);
                        break;
                    }
                }
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                    continue;
                }
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                    debug!("Worker {} job channel disconnected", self.id);
                    break;
                }
            }
        }

        debug!("Worker {} stopped", self.id);
    }
}
