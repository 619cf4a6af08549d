#![deny(
    trivial_numeric_casts,
    missing_docs,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    unused_extern_crates,
    unused_results
)]
#![warn(rust_2021_compatibility, unreachable_pub)]

//! The sampler half of the pipeline: a one-shot `HeavyLoader` that
//! materializes the heavy region of an artifact, and a continuously-running
//! `FineSampler` that draws fine samples from it until the artifact is
//! drained.
//!
//! The two user-supplied callbacks are captured by a single [`Sampling`]
//! trait so a caller only ever implements one type, regardless of how many
//! artifacts the engine ends up juggling concurrently.

pub mod fine;
pub mod heavy;
pub mod state;

use async_trait::async_trait;
use model::Artifact;

pub use state::SamplerState;

/// Errors surfaced by a sampler worker loop. Errors from the user's
/// [`Sampling`] implementation are wrapped in [`Error::Sampling`]; the
/// sampler crate itself only ever fails on channel or task plumbing.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error<E> {
    /// The user's `load_heavy` or `sample_fine` callback failed.
    #[error("sampling callback failed (artifact: {artifact_id}): {source}")]
    Sampling {
        /// The artifact being processed when the callback failed.
        artifact_id: u64,
        /// The underlying error.
        #[source]
        source: E,
    },

    /// The fine sample queue closed while a sampler was still producing:
    /// the engine evicted this artifact (or shut down) before the sampler
    /// noticed.
    #[error("fine sample queue closed for artifact {artifact_id}")]
    QueueClosed {
        /// The artifact whose queue closed.
        artifact_id: u64,
    },
}

/// Outcome of a single call to [`Sampling::sample_fine`].
#[derive(Debug)]
pub enum FineOutcome<P, FI, CP> {
    /// A fine sample was produced, along with the checkpoint the sampler
    /// should publish so a future eviction/resume can pick up from here.
    Sample {
        /// The sample payload.
        payload: P,
        /// Metadata describing this particular sample.
        fine_info: FI,
        /// Checkpoint to publish after this sample is queued.
        checkpoint: CP,
    },
    /// No more fine samples remain for this heavy region.
    Drained,
}

/// The pair of callbacks a caller supplies to drive sampling.
///
/// `load_heavy` runs once per artifact, in a dedicated task, and produces
/// the heavy region (e.g. a decoded whole-slide image) that `sample_fine` is
/// then called against repeatedly. `load_heavy` is handed the artifact's
/// preserved checkpoint and last undelivered message from a prior
/// admission, if this is a re-admit rather than a cold start; `sample_fine`
/// is handed how many times it has already been called for this heavy
/// region and the most recent undelivered message from the engine, if any.
#[async_trait]
pub trait Sampling: Send + Sync + 'static {
    /// The opaque per-artifact record carried by the caller's `Dataset`.
    type Record: Send + Sync + 'static;
    /// The heavy region materialized once per artifact.
    type Heavy: Send + Sync + 'static;
    /// The payload of an individual fine sample.
    type Payload: Send + 'static;
    /// Metadata describing an individual fine sample.
    type FineInfo: Send + Sync + Clone + 'static;
    /// Metadata describing the heavy region itself, cheap enough to attach
    /// to every fine sample drawn from it (the heavy region proper is not,
    /// which is why it is kept out of `FineSample`).
    type HeavyInfo: Send + Sync + Clone + 'static;
    /// A resumption checkpoint published after every fine sample.
    type Checkpoint: Send + Sync + Clone + 'static;
    /// A message the consumer can route to a specific artifact's sampler.
    type Message: Send + Clone + 'static;
    /// The error type returned by either callback.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Materializes the heavy region for `artifact`. Called exactly once per
    /// artifact, before any call to `sample_fine`. `last_msg` and
    /// `prior_checkpoint` carry this artifact's preserved message and
    /// checkpoint from a previous admission; both are `None` on a cold
    /// start.
    async fn load_heavy(
        &self,
        artifact: &Artifact<Self::Record>,
        last_msg: Option<Self::Message>,
        prior_checkpoint: Option<Self::Checkpoint>,
    ) -> Result<Self::Heavy, Self::Error>;

    /// Derives the lightweight metadata attached to every fine sample drawn
    /// from `heavy`. Called once, right after `load_heavy` succeeds.
    fn heavy_info(&self, heavy: &Self::Heavy) -> Self::HeavyInfo;

    /// Produces the next fine sample from `heavy`, or reports that the
    /// region is drained. `call_count` is the number of times this sampler
    /// has already called `sample_fine` for this heavy region (`0` on the
    /// first call); `message` is the most recent undelivered message
    /// addressed to this artifact, if any.
    async fn sample_fine(
        &self,
        call_count: u64,
        heavy: &Self::Heavy,
        message: Option<Self::Message>,
    ) -> Result<FineOutcome<Self::Payload, Self::FineInfo, Self::Checkpoint>, Self::Error>;
}
