//! The `HeavyLoader`: a one-shot task that materializes the heavy region of
//! an artifact (e.g. decoding a whole-slide image) and hands the result back
//! to its owning `FineSampler` over a oneshot channel.

use std::sync::Arc;

use async_trait::async_trait;
use model::Artifact;
use task::{labels::TaskLabels, TaskCleaner, TaskManager};
use tokio::sync::oneshot;

use crate::{Error, Sampling};

/// Spawns the one-shot task that runs [`Sampling::load_heavy`] for a single
/// artifact, registering it with `task_manager` so the engine can join it on
/// shutdown. Returns a receiver that yields the heavy region (or the
/// callback's error) exactly once.
///
/// `last_msg` and `prior_checkpoint` carry this artifact's preserved message
/// and checkpoint from an earlier admission; both are `None` on a cold
/// start.
pub fn spawn_heavy_loader<S>(
    sampling: Arc<S>,
    artifact: Artifact<S::Record>,
    last_msg: Option<S::Message>,
    prior_checkpoint: Option<S::Checkpoint>,
    task_manager: &mut TaskManager,
) -> oneshot::Receiver<Result<S::Heavy, Error<S::Error>>>
where
    S: Sampling,
{
    let (tx, rx) = oneshot::channel();
    let artifact_id = artifact.id().0;

    let handle = tokio::spawn(async move {
        let outcome = sampling
            .load_heavy(&artifact, last_msg, prior_checkpoint)
            .await
            .map_err(|source| Error::Sampling { artifact_id, source });
        if tx.send(outcome).is_err() {
            tracing::warn!(%artifact_id, "heavy loader result dropped: nobody was listening");
        }
        Box::new(HeavyLoaderCleaner { artifact_id }) as Box<dyn TaskCleaner>
    });

    task_manager.register(handle, &TaskLabels::new("heavy_loader", &artifact_id.to_string(), "sampler"));
    rx
}

#[derive(Debug)]
struct HeavyLoaderCleaner {
    artifact_id: u64,
}

#[async_trait]
impl TaskCleaner for HeavyLoaderCleaner {
    async fn cleanup(&self) {
        tracing::trace!(artifact_id = %self.artifact_id, "heavy loader task joined");
    }
}
