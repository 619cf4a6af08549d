//! Admission and eviction of a single artifact into/out of the working set.

use std::sync::Arc;

use config::EngineConfig;
use control::LastValue;
use model::{Artifact, FineSample};
use sampler::{fine::spawn_fine_sampler, heavy::spawn_heavy_loader, SamplerState, Sampling};
use task::TaskManager;

use crate::working_set::LoadedArtifact;

/// Spawns the `HeavyLoader` and `FineSampler` for `artifact`, wires a
/// forwarder task that copies its fine samples into the engine's shared
/// output queue, and returns the bookkeeping the working set tracks for it.
///
/// If `artifact` was evicted earlier in this run, `resume_from` and
/// `resume_message` carry the checkpoint and last undelivered message its
/// sampler had preserved, so `load_heavy` and `sample_fine` resume rather
/// than restart.
pub(crate) fn admit<S>(
    sampling: Arc<S>,
    artifact: Artifact<S::Record>,
    resume_from: Option<S::Checkpoint>,
    resume_message: Option<S::Message>,
    config: &EngineConfig,
    task_manager: &mut TaskManager,
    output_tx: flume::Sender<FineSample<S::Payload, S::FineInfo, S::HeavyInfo>>,
) -> LoadedArtifact<S>
where
    S: Sampling,
    S::Record: Clone,
{
    let artifact_id = artifact.id();
    let heavy_ready = spawn_heavy_loader(
        sampling.clone(),
        artifact.clone(),
        resume_message.clone(),
        resume_from.clone(),
        task_manager,
    );
    let handle = spawn_fine_sampler(sampling, artifact, heavy_ready, config.per_artifact_queue_capacity, task_manager);

    if let Some(checkpoint) = resume_from {
        handle.checkpoint.set(checkpoint);
    }
    if let Some(message) = resume_message {
        handle.message.set(message);
    }

    let samples_for_forwarder = handle.samples.clone();
    let samples_for_drain = handle.samples;
    let forwarder = tokio::spawn(async move {
        while let Ok(sample) = samples_for_forwarder.recv_async().await {
            if output_tx.send_async(sample).await.is_err() {
                tracing::debug!(%artifact_id, "engine output queue closed, forwarder stopping");
                break;
            }
        }
        tracing::trace!(%artifact_id, "forwarder stopped: sampler queue closed");
    });

    LoadedArtifact {
        artifact_id,
        checkpoint: handle.checkpoint,
        status: handle.status,
        message: handle.message,
        samples: samples_for_drain,
        forwarder,
    }
}

/// Evicts a loaded artifact: aborts its forwarder (which, by dropping the
/// sampler's queue receiver, causes the sampler to notice and wind down),
/// and returns its last published checkpoint and undelivered message, if
/// any, so they can be handed back on a future re-admission.
///
/// When `grab_on_evict` is set, whatever fine samples the sampler had
/// already buffered ahead of the now-aborted forwarder are drained
/// best-effort into `output_tx` rather than discarded. A sample that
/// doesn't fit in `output_tx` (the engine's output queue is full) is logged
/// and dropped rather than blocking eviction.
pub(crate) fn evict<S>(
    entry: LoadedArtifact<S>,
    grab_on_evict: bool,
    output_tx: &flume::Sender<FineSample<S::Payload, S::FineInfo, S::HeavyInfo>>,
) -> (Option<S::Checkpoint>, Option<S::Message>)
where
    S: Sampling,
{
    entry.forwarder.abort();

    if grab_on_evict {
        let mut recovered = 0u64;
        loop {
            match entry.samples.try_recv() {
                Ok(sample) => match output_tx.try_send(sample) {
                    Ok(()) => recovered += 1,
                    Err(_) => {
                        tracing::warn!(
                            artifact_id = %entry.artifact_id,
                            "LostOnEvict: buffered sample dropped, output queue full"
                        );
                        break;
                    }
                },
                Err(_) => break,
            }
        }
        if recovered > 0 {
            tracing::debug!(artifact_id = %entry.artifact_id, recovered, "drained buffered samples on evict");
        }
    }

    (entry.checkpoint.get(), entry.message.get())
}

pub(crate) fn is_exhausted(status: &LastValue<SamplerState>) -> bool {
    matches!(status.get(), Some(SamplerState::Drained) | Some(SamplerState::Terminated))
}
