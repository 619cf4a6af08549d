use std::sync::Arc;

use async_trait::async_trait;
use gleaner::{
    config::EngineConfig,
    model::{Artifact, ArtifactId, Dataset, Marker},
    sampler::{FineOutcome, Sampling},
    scheduler::DefaultScheduler,
    task::TaskManager,
};

/// Counts up to `max` then drains, publishing `call_count` as its payload
/// and its own checkpoint on every sample.
struct CountingSampling {
    max: u64,
}

#[async_trait]
impl Sampling for CountingSampling {
    type Record = ();
    type Heavy = ();
    type Payload = u64;
    type FineInfo = ();
    type HeavyInfo = ();
    type Checkpoint = u64;
    type Message = ();
    type Error = std::convert::Infallible;

    async fn load_heavy(
        &self,
        _artifact: &Artifact<Self::Record>,
        _last_msg: Option<Self::Message>,
        _prior_checkpoint: Option<Self::Checkpoint>,
    ) -> Result<Self::Heavy, Self::Error> {
        Ok(())
    }

    fn heavy_info(&self, _heavy: &Self::Heavy) -> Self::HeavyInfo {}

    async fn sample_fine(
        &self,
        call_count: u64,
        _heavy: &Self::Heavy,
        _message: Option<Self::Message>,
    ) -> Result<FineOutcome<Self::Payload, Self::FineInfo, Self::Checkpoint>, Self::Error> {
        let next = call_count + 1;
        if next > self.max {
            return Ok(FineOutcome::Drained);
        }
        Ok(FineOutcome::Sample {
            payload: next,
            fine_info: (),
            checkpoint: next,
        })
    }
}

fn dataset(count: u64) -> Dataset<()> {
    let artifacts = (0..count).map(|id| Artifact::new(ArtifactId(id), ())).collect();
    Dataset::new("test", artifacts).expect("unique ids")
}

/// E1: after warmup, the engine streams samples whose artifact ids are a
/// subset of the dataset and whose first payload per artifact is 1.
#[tokio::test]
async fn cold_start_yields_samples_from_the_initial_working_set() {
    let config = EngineConfig {
        working_set_capacity: 3,
        reschedule_interval_ms: 20,
        ..Default::default()
    };
    let sampling = Arc::new(CountingSampling { max: 5 });
    let handle = gleaner::engine::start(sampling, DefaultScheduler, dataset(5), config, TaskManager::new());

    let mut first_payload_per_artifact: std::collections::HashMap<ArtifactId, u64> = std::collections::HashMap::new();
    for _ in 0..4 {
        let sample = handle.get().await.expect("engine still running");
        assert!(sample.artifact_id.0 < 5);
        first_payload_per_artifact.entry(sample.artifact_id).or_insert(sample.payload);
    }

    for payload in first_payload_per_artifact.values() {
        assert_eq!(*payload, 1, "first sample per artifact starts its own counter at 1");
    }
}

/// E5: once the scheduler halts, `get()` drains whatever is buffered and
/// then returns the terminal marker for good.
#[tokio::test]
async fn halt_drains_then_returns_terminal_marker() {
    struct HaltAfterOne;
    impl gleaner::scheduler::Scheduler<ArtifactId> for HaltAfterOne {
        fn initial_schedule(&self, candidates: &[ArtifactId], capacity: usize) -> Vec<ArtifactId> {
            candidates.iter().take(capacity).copied().collect()
        }

        fn schedule(&self, _view: &dyn gleaner::scheduler::EngineView<ArtifactId>) -> gleaner::scheduler::Decision<ArtifactId> {
            gleaner::scheduler::Decision::Halt
        }
    }

    let config = EngineConfig {
        working_set_capacity: 2,
        reschedule_interval_ms: 10,
        ..Default::default()
    };
    let sampling = Arc::new(CountingSampling { max: 1000 });
    let handle = gleaner::engine::start(sampling, HaltAfterOne, dataset(2), config, TaskManager::new());

    let mut drained = 0;
    loop {
        match handle.get().await {
            Ok(_) => drained += 1,
            Err(marker) => {
                assert_eq!(marker, Marker::Halt);
                break;
            }
        }
        if drained > 10_000 {
            panic!("engine never halted");
        }
    }
    assert!(drained > 0, "some samples should have been buffered before halt");

    // A second call after the terminal marker keeps returning it, not hanging.
    assert_eq!(handle.get().await.unwrap_err(), Marker::Halt);
}

/// `pause()` stops admission but lets loaded artifacts drain; calling it
/// twice must not panic or change the outcome (E9: idempotence).
#[tokio::test]
async fn pause_is_idempotent() {
    let config = EngineConfig {
        working_set_capacity: 1,
        reschedule_interval_ms: 500,
        ..Default::default()
    };
    let sampling = Arc::new(CountingSampling { max: 3 });
    let handle = gleaner::engine::start(sampling, DefaultScheduler, dataset(1), config, TaskManager::new());

    handle.pause().unwrap();
    handle.pause().unwrap();

    let mut samples = 0;
    while handle.get().await.is_ok() {
        samples += 1;
    }
    assert_eq!(samples, 3);
}
