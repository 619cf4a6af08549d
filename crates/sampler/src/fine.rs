//! The `FineSampler`: a long-running task that repeatedly calls
//! [`Sampling::sample_fine`] against an already-loaded heavy region,
//! publishing samples, checkpoints, and status for the engine to consume.

use std::sync::Arc;

use async_trait::async_trait;
use control::LastValue;
use model::{Artifact, ArtifactId, FineSample, Marker};
use task::{labels::TaskLabels, TaskCleaner, TaskManager};
use tokio::sync::oneshot;

use crate::{Error, FineOutcome, SamplerState, Sampling};

/// Everything the engine needs to talk to a running `FineSampler`.
pub struct FineSamplerHandle<S: Sampling> {
    /// The artifact this sampler is streaming.
    pub artifact_id: ArtifactId,
    /// The queue of fine samples produced so far. Bounded: a `FineSampler`
    /// blocks on this queue rather than spinning when the engine is slow to
    /// drain it.
    pub samples: flume::Receiver<FineSample<S::Payload, S::FineInfo, S::HeavyInfo>>,
    /// Last published checkpoint, or `None` if none has been published yet.
    /// Read (not consumed) by the engine when an artifact is evicted, so the
    /// checkpoint can be handed back if the artifact is re-admitted later.
    pub checkpoint: LastValue<S::Checkpoint>,
    /// Last published lifecycle state.
    pub status: LastValue<SamplerState>,
    /// Slot the engine uses to route a message to this sampler. Consuming:
    /// only the most recent undelivered message is kept.
    pub message: LastValue<S::Message>,
}

/// Spawns the task that runs `sample_fine` in a loop for a single artifact,
/// after first waiting for the artifact's `HeavyLoader` result. Registers
/// the task with `task_manager`.
pub fn spawn_fine_sampler<S>(
    sampling: Arc<S>,
    artifact: Artifact<S::Record>,
    heavy_ready: oneshot::Receiver<Result<S::Heavy, Error<S::Error>>>,
    queue_capacity: usize,
    task_manager: &mut TaskManager,
) -> FineSamplerHandle<S>
where
    S: Sampling,
{
    let artifact_id = artifact.id();
    let (samples_tx, samples_rx) = flume::bounded(queue_capacity);
    let checkpoint = LastValue::new();
    let status = LastValue::new();
    let message = LastValue::new();

    status.set(SamplerState::Starting);

    let handle = FineSamplerHandle {
        artifact_id,
        samples: samples_rx,
        checkpoint: checkpoint.clone(),
        status: status.clone(),
        message: message.clone(),
    };

    let join_handle = tokio::spawn(run(sampling, artifact, heavy_ready, samples_tx, checkpoint, status, message));
    task_manager.register(join_handle, &TaskLabels::new("fine_sampler", &artifact_id.to_string(), "sampler"));

    handle
}

async fn run<S>(
    sampling: Arc<S>,
    artifact: Artifact<S::Record>,
    heavy_ready: oneshot::Receiver<Result<S::Heavy, Error<S::Error>>>,
    samples_tx: flume::Sender<FineSample<S::Payload, S::FineInfo, S::HeavyInfo>>,
    checkpoint: LastValue<S::Checkpoint>,
    status: LastValue<SamplerState>,
    message: LastValue<S::Message>,
) -> Box<dyn TaskCleaner>
where
    S: Sampling,
{
    let artifact_id = artifact.id();

    let heavy = match heavy_ready.await {
        Ok(Ok(heavy)) => heavy,
        Ok(Err(error)) => {
            tracing::error!(%artifact_id, %error, "heavy loader failed, fine sampler exiting");
            status.set(SamplerState::Terminated);
            return Box::new(FineSamplerCleaner { artifact_id });
        }
        Err(_) => {
            tracing::warn!(%artifact_id, "heavy loader task dropped before sending a result");
            status.set(SamplerState::Terminated);
            return Box::new(FineSamplerCleaner { artifact_id });
        }
    };

    let heavy_info = sampling.heavy_info(&heavy);
    status.set(SamplerState::Streaming);

    let mut call_count: u64 = 0;
    loop {
        let pending_message = message.take();

        match sampling.sample_fine(call_count, &heavy, pending_message).await {
            Ok(FineOutcome::Sample {
                payload,
                fine_info,
                checkpoint: next_checkpoint,
            }) => {
                let sample = FineSample::new(payload, fine_info, heavy_info.clone(), artifact_id);
                if samples_tx.send_async(sample).await.is_err() {
                    tracing::info!(%artifact_id, "fine sample queue closed, stopping sampler");
                    break;
                }
                checkpoint.set(next_checkpoint);
                call_count += 1;
            }
            Ok(FineOutcome::Drained) => {
                tracing::debug!(%artifact_id, "fine sampler drained");
                status.set(SamplerState::Drained);
                break;
            }
            Err(error) => {
                tracing::error!(%artifact_id, %error, "sample_fine failed, stopping sampler");
                break;
            }
        }
    }

    status.set(SamplerState::Terminated);
    Box::new(FineSamplerCleaner { artifact_id })
}

#[derive(Debug)]
struct FineSamplerCleaner {
    artifact_id: ArtifactId,
}

#[async_trait]
impl TaskCleaner for FineSamplerCleaner {
    async fn cleanup(&self) {
        tracing::trace!(artifact_id = %self.artifact_id, "fine sampler task joined");
    }
}

/// Converts a sampler's last known checkpoint into the wire-level marker
/// used when no checkpoint has ever been published.
pub fn checkpoint_or_empty<CP>(checkpoint: Option<CP>) -> Result<CP, Marker> {
    checkpoint.ok_or(Marker::Empty)
}
