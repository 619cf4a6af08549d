use std::sync::Arc;

use async_trait::async_trait;
use color_eyre::eyre::Result;
use mimalloc_rust::GlobalMiMalloc;
use model::{Artifact, ArtifactId, Dataset, Marker};
use sampler::{FineOutcome, Sampling};
use scheduler::DefaultScheduler;
use task::TaskManager;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

// Recommended global allocator to get the best performance out of the engine.
#[global_allocator]
static GLOBAL_MIMALLOC: GlobalMiMalloc = GlobalMiMalloc;

/// A toy `Sampling` implementation: `load_heavy` is instant, and
/// `sample_fine` counts up to 5 before draining. Stands in for whatever
/// actually opens and reads a gigapixel image in a real pipeline.
struct CountingSampling;

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
        if next > 5 {
            return Ok(FineOutcome::Drained);
        }
        Ok(FineOutcome::Sample {
            payload: next,
            fine_info: (),
            checkpoint: next,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init()?;

    let artifacts = (0..10).map(|id| Artifact::new(ArtifactId(id), ())).collect();
    let dataset = Dataset::new("demo", artifacts)?;

    let config = config::EngineConfig {
        working_set_capacity: 3,
        reschedule_interval_ms: 50,
        ..Default::default()
    };

    let handle = engine::start(Arc::new(CountingSampling), DefaultScheduler, dataset, config, TaskManager::new());

    let mut received = 0;
    loop {
        match handle.get().await {
            Ok(sample) => {
                tracing::info!(artifact_id = %sample.artifact_id, payload = sample.payload, "sample");
                received += 1;
                if received >= 20 {
                    handle.pause()?;
                }
            }
            Err(Marker::Halt | Marker::EndOfStream) => break,
            Err(_) => break,
        }
    }

    tracing::info!(received, "demo finished");
    Ok(())
}

fn init() -> Result<()> {
    color_eyre::install()?;
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
    Ok(())
}
