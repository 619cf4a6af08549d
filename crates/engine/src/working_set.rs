//! The engine's working set: the admitted artifacts currently being
//! streamed, and the pool of artifacts still waiting to be admitted.

use std::collections::HashMap;

use model::{ArtifactId, FineSample};
use sampler::SamplerState;
use scheduler::{EngineView, SamplerStatus};
use tokio::task::JoinHandle;

/// Bookkeeping the engine keeps for one admitted artifact.
pub(crate) struct LoadedArtifact<S: sampler::Sampling> {
    pub(crate) artifact_id: ArtifactId,
    pub(crate) checkpoint: control::LastValue<S::Checkpoint>,
    pub(crate) status: control::LastValue<SamplerState>,
    pub(crate) message: control::LastValue<S::Message>,
    /// A second handle onto the sampler's fine-sample queue, independent of
    /// the one the forwarder task drains. Lets eviction grab whatever is
    /// still buffered after the forwarder is aborted.
    pub(crate) samples: flume::Receiver<FineSample<S::Payload, S::FineInfo, S::HeavyInfo>>,
    /// The forwarder task copying this artifact's fine samples into the
    /// engine's shared output queue. Aborting it is how eviction is
    /// implemented: the sampler notices its queue has no more consumers and
    /// winds itself down.
    pub(crate) forwarder: JoinHandle<()>,
}

/// The engine's view of its own state, plus the scaffolding needed to
/// satisfy [`EngineView`] without cloning on every reschedule tick.
pub(crate) struct WorkingSet<S: sampler::Sampling> {
    pub(crate) loaded: HashMap<ArtifactId, LoadedArtifact<S>>,
    pub(crate) waiting: Vec<ArtifactId>,
    /// Checkpoints preserved across an evict/re-admit cycle, keyed by
    /// artifact. Consulted when an artifact is re-admitted so its sampler
    /// can resume where it left off.
    pub(crate) preserved_checkpoints: HashMap<ArtifactId, S::Checkpoint>,
    /// Last undelivered message preserved across an evict/re-admit cycle,
    /// keyed by artifact. Consulted when an artifact is re-admitted so the
    /// message it never got to see is handed to its new `HeavyLoader`.
    pub(crate) preserved_messages: HashMap<ArtifactId, S::Message>,
    /// Total number of times each artifact has been admitted, kept across
    /// evictions (unlike `loaded`, which only tracks currently-admitted
    /// artifacts). Schedulers read this for both loaded and waiting ids.
    pub(crate) sched_counts: HashMap<ArtifactId, u64>,
}

impl<S: sampler::Sampling> WorkingSet<S> {
    pub(crate) fn new(waiting: Vec<ArtifactId>) -> Self {
        Self {
            loaded: HashMap::new(),
            waiting,
            preserved_checkpoints: HashMap::new(),
            preserved_messages: HashMap::new(),
            sched_counts: HashMap::new(),
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.loaded.is_empty() && self.waiting.is_empty()
    }

    pub(crate) fn record_admission(&mut self, id: ArtifactId) {
        *self.sched_counts.entry(id).or_insert(0) += 1;
    }
}

/// Read-only facade over [`WorkingSet`] handed to the scheduler, keeping the
/// scheduler crate decoupled from the engine's internal bookkeeping types.
pub(crate) struct WorkingSetView<'a, S: sampler::Sampling> {
    pub(crate) loaded_ids: Vec<ArtifactId>,
    pub(crate) working_set: &'a WorkingSet<S>,
}

impl<'a, S: sampler::Sampling> WorkingSetView<'a, S> {
    pub(crate) fn new(working_set: &'a WorkingSet<S>) -> Self {
        Self {
            loaded_ids: working_set.loaded.keys().copied().collect(),
            working_set,
        }
    }
}

impl<'a, S: sampler::Sampling> EngineView<ArtifactId> for WorkingSetView<'a, S> {
    fn loaded(&self) -> &[ArtifactId] {
        &self.loaded_ids
    }

    fn waiting(&self) -> &[ArtifactId] {
        &self.working_set.waiting
    }

    fn sched_count(&self, id: &ArtifactId) -> u64 {
        self.working_set.sched_counts.get(id).copied().unwrap_or(0)
    }

    fn status(&self, id: &ArtifactId) -> Option<SamplerStatus> {
        self.working_set.loaded.get(id).and_then(|entry| entry.status.get()).map(|state| match state {
            SamplerState::Starting | SamplerState::Streaming => SamplerStatus::Streaming,
            SamplerState::Drained => SamplerStatus::Drained,
            SamplerState::Terminated => SamplerStatus::Terminated,
        })
    }
}
