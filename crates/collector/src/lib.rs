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

//! The collector drains an [`engine::EngineHandle`], routes each fine sample
//! through a user-supplied [`Collecting`] implementation, and periodically
//! asks that implementation whether it is done. Three accumulation modes
//! mirror [`config::CollectorMode`]: keep everything, fold into a running
//! value, or stream rows to disk via a [`stream_writer::StreamWriter`].

pub mod stream_writer;

use std::{
    collections::{HashMap, VecDeque},
    time::Duration,
};

use async_trait::async_trait;
use config::{CollectorConfig, CollectorMode};
use engine::EngineHandle;
use model::{ArtifactId, FineSample, ShadowSample};
use sampler::Sampling;
use stream_writer::StreamWriter;

/// Errors surfaced by the collector.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The user's [`Collecting::process`] callback failed.
    #[error("collector callback failed (artifact: {artifact_id}): {source}")]
    Process {
        /// The artifact being processed when the callback failed.
        artifact_id: ArtifactId,
        /// The underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The configured mode was [`CollectorMode::StreamToFile`] but no
    /// [`stream_writer::StreamWriter`] was supplied.
    #[error("mode is stream_to_file but no stream writer was configured")]
    MissingStreamWriter,

    /// The stream writer reported an error.
    #[error(transparent)]
    StreamWriter(#[from] stream_writer::Error),
}

/// User hooks driving how a collector turns fine samples into results.
///
/// `Row` is the type written to disk under [`CollectorMode::StreamToFile`];
/// implementations that never use that mode can pick any `Serialize` type,
/// including `()`.
#[async_trait]
pub trait Collecting<S>: Send + Sync + 'static
where
    S: Sampling,
{
    /// A processed piece derived from one fine sample.
    type Batch: Send + 'static;
    /// The running per-artifact accumulator built by [`Collecting::accumulate`].
    type Accum: Clone + Send + 'static;
    /// The row type serialized by the stream writer.
    type Row: serde::Serialize + Send + 'static;
    /// The error type returned by [`Collecting::process`].
    type Error: std::error::Error + Send + Sync + 'static;

    /// Turns one fine sample into zero or more processed pieces.
    fn process(
        &self,
        sample: FineSample<S::Payload, S::FineInfo, S::HeavyInfo>,
    ) -> Result<Vec<Self::Batch>, Self::Error>;

    /// Folds `new` into the running accumulator for `artifact_id`. Used only
    /// in [`CollectorMode::Accumulate`].
    fn accumulate(&self, prev: Option<Self::Accum>, new: Self::Batch, artifact_id: ArtifactId) -> Self::Accum;

    /// Turns a processed piece into the row written under
    /// [`CollectorMode::StreamToFile`].
    fn to_row(&self, batch: &Self::Batch) -> Self::Row;

    /// Polled every `poll_interval_ms`; once true, the collector finalizes
    /// and stops.
    async fn finished_collecting(&self) -> bool;
}

/// Final results snapshotted once [`Collecting::finished_collecting`] returns
/// true. Only the field matching the configured mode is populated.
#[derive(Debug)]
pub struct CollectedResults<B, A, FI, HI> {
    /// Populated under [`CollectorMode::SaveAll`]: every processed piece, in
    /// arrival order, per artifact.
    pub saved: HashMap<ArtifactId, Vec<B>>,
    /// Populated under [`CollectorMode::Accumulate`]: the final running value
    /// per artifact.
    pub accumulated: HashMap<ArtifactId, A>,
    /// Data-free shadow copies of the most recently produced samples,
    /// capped at `CollectorConfig::shadow_buffer_capacity`. Empty unless
    /// that option is set.
    pub shadow: VecDeque<ShadowSample<FI, HI>>,
}

impl<B, A, FI, HI> Default for CollectedResults<B, A, FI, HI> {
    fn default() -> Self {
        Self {
            saved: HashMap::new(),
            accumulated: HashMap::new(),
            shadow: VecDeque::new(),
        }
    }
}

/// Drains an engine, applying a [`Collecting`] implementation to every fine
/// sample until it reports it is done (or the engine itself stops).
pub struct Collector<S, C>
where
    S: Sampling,
    C: Collecting<S>,
{
    engine: EngineHandle<S>,
    collecting: C,
    config: CollectorConfig,
    stream_writer: Option<StreamWriter<C::Row>>,
}

impl<S, C> Collector<S, C>
where
    S: Sampling,
    C: Collecting<S>,
{
    /// Creates a collector. `stream_writer` is required when `config.mode`
    /// is [`CollectorMode::StreamToFile`], ignored otherwise.
    pub fn new(
        engine: EngineHandle<S>,
        collecting: C,
        config: CollectorConfig,
        stream_writer: Option<StreamWriter<C::Row>>,
    ) -> Self {
        Self {
            engine,
            collecting,
            config,
            stream_writer,
        }
    }

    /// Runs the collect loop to completion: pulls samples, routes them per
    /// the configured mode, and polls `finished_collecting` on a fixed
    /// cadence. Returns once the hook reports true (after pausing the
    /// engine) or the engine itself stops.
    pub async fn run(mut self) -> Result<CollectedResults<C::Batch, C::Accum, S::FineInfo, S::HeavyInfo>, Error> {
        if self.config.mode == CollectorMode::StreamToFile && self.stream_writer.is_none() {
            return Err(Error::MissingStreamWriter);
        }

        let mut results = CollectedResults::default();
        let mut poll = tokio::time::interval(Duration::from_millis(self.config.poll_interval_ms));
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        'outer: loop {
            tokio::select! {
                sample = self.engine.get() => {
                    match sample {
                        Ok(sample) => {
                            self.route(sample, &mut results).await?;
                            // Keep draining up to `batch_size` samples back to
                            // back before yielding to the poll tick, so a busy
                            // engine isn't starved by a short poll interval.
                            for _ in 1..self.config.batch_size {
                                match self.engine.get().await {
                                    Ok(sample) => self.route(sample, &mut results).await?,
                                    Err(_marker) => break 'outer,
                                }
                            }
                        }
                        Err(_marker) => break,
                    }
                }
                _ = poll.tick() => {
                    if self.collecting.finished_collecting().await {
                        let _ = self.engine.pause();
                        break;
                    }
                }
            }
        }

        if let Some(stream_writer) = self.stream_writer.take() {
            stream_writer.flush_and_close().await;
        }

        Ok(results)
    }

    async fn route(
        &mut self,
        sample: FineSample<S::Payload, S::FineInfo, S::HeavyInfo>,
        results: &mut CollectedResults<C::Batch, C::Accum, S::FineInfo, S::HeavyInfo>,
    ) -> Result<(), Error> {
        let artifact_id = sample.artifact_id;

        if let Some(capacity) = self.config.shadow_buffer_capacity {
            if capacity > 0 {
                if results.shadow.len() >= capacity {
                    let _ = results.shadow.pop_front();
                }
                results.shadow.push_back(sample.shadow());
            }
        }

        let pieces = self.collecting.process(sample).map_err(|source| Error::Process {
            artifact_id,
            source: Box::new(source),
        })?;

        for piece in pieces {
            match self.config.mode {
                CollectorMode::SaveAll => {
                    results.saved.entry(artifact_id).or_default().push(piece);
                }
                CollectorMode::Accumulate => {
                    let prev = results.accumulated.remove(&artifact_id);
                    let next = self.collecting.accumulate(prev, piece, artifact_id);
                    let _ = results.accumulated.insert(artifact_id, next);
                }
                CollectorMode::StreamToFile => {
                    let row = self.collecting.to_row(&piece);
                    if let Some(stream_writer) = &self.stream_writer {
                        stream_writer.write(artifact_id, row).await?;
                    }
                }
            }
        }

        Ok(())
    }
}
