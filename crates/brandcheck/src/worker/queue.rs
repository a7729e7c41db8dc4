//! Enqueue interface: persists the `pending` row, then hands a job to the
//! worker pool without waiting for it.

use std::sync::Arc;

use crossbeam_channel::{Sender, TrySendError};
use tracing::{debug, info, warn};

use crate::db::{AssetRepository, RequeueOutcome};
use crate::error::WorkerError;
use crate::worker::job::{AssetJob, EnqueueRequest, JobOrigin};

pub struct AssetQueue {
    repo: Arc<dyn AssetRepository>,
    sender: Option<Sender<AssetJob>>,
}

impl AssetQueue {
    pub fn new(repo: Arc<dyn AssetRepository>, sender: Sender<AssetJob>) -> Self {
        Self {
            repo,
            sender: Some(sender),
        }
    }

    /// A queue with no workers behind it. Assets are only written as
    /// `pending`; a running pool picks them up on its next sweep.
    pub fn detached(repo: Arc<dyn AssetRepository>) -> Self {
        Self { repo, sender: None }
    }

    /// Inserts the asset as `pending` and returns its id.
    ///
    /// A full queue is not an error; the pending sweep picks the asset up.
    pub fn enqueue(&self, request: EnqueueRequest) -> Result<String, WorkerError> {
        let asset = request.into_asset();
        self.repo.insert(&asset)?;
        info!(
            asset_id = %asset.asset_id,
            campaign_id = %asset.campaign_id,
            mime_type = %asset.mime_type,
            "Asset enqueued"
        );

        self.hand_off(AssetJob::new(asset.asset_id.clone(), JobOrigin::Enqueued));
        Ok(asset.asset_id)
    }

    /// Moves a `failed` asset back to `pending` and resubmits it.
    pub fn requeue(&self, asset_id: &str) -> Result<(), WorkerError> {
        match self.repo.requeue(asset_id)? {
            RequeueOutcome::Requeued => {
                info!(asset_id = %asset_id, "Asset requeued");
                self.hand_off(AssetJob::new(asset_id, JobOrigin::Requeued));
                Ok(())
            }
            RequeueOutcome::NotFound => Err(WorkerError::AssetNotFound(asset_id.to_string())),
            RequeueOutcome::WrongStatus(status) => Err(WorkerError::NotRequeueable {
                id: asset_id.to_string(),
                status: status.to_string(),
            }),
        }
    }

    /// Resubmits `pending` assets, oldest first, up to the free queue space.
    /// Returns how many were handed off.
    pub fn resubmit_pending(&self) -> Result<usize, WorkerError> {
        let Some(sender) = &self.sender else {
            return Ok(0);
        };
        let free = match sender.capacity() {
            Some(capacity) => capacity.saturating_sub(sender.len()),
            None => usize::MAX,
        };
        if free == 0 {
            return Ok(0);
        }

        let ids = self.repo.list_pending(free)?;
        let mut submitted = 0;
        for asset_id in ids {
            if !self.hand_off(AssetJob::new(asset_id, JobOrigin::Sweep)) {
                break;
            }
            submitted += 1;
        }

        if submitted > 0 {
            debug!(count = submitted, "Resubmitted pending assets");
        }
        Ok(submitted)
    }

    fn hand_off(&self, job: AssetJob) -> bool {
        let Some(sender) = &self.sender else {
            debug!(asset_id = %job.asset_id, "No workers attached; asset left pending");
            return false;
        };
        match sender.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(job)) => {
                warn!(asset_id = %job.asset_id, "Work queue full; asset left pending");
                false
            }
            Err(TrySendError::Disconnected(job)) => {
                warn!(asset_id = %job.asset_id, "Work queue closed; asset left pending");
                false
            }
        }
    }
}
