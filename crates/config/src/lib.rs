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

//! Validated configuration structs for the engine, the collector, and the
//! optional stream writer. Loading these from a file (YAML, TOML, ...) is
//! left to the caller; this crate only owns shape and validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

/// Errors raised while validating a configuration value.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A configuration struct failed its `validator` checks.
    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

/// Configuration of the engine's working set and reschedule loop.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EngineConfig {
    /// Maximum number of artifacts admitted into the working set at once.
    #[validate(range(min = 1, max = 10_000))]
    #[serde(default = "default_working_set_capacity")]
    pub working_set_capacity: usize,

    /// Bound on each artifact's own `FineSampler` output queue. A sampler
    /// blocks (rather than spins) once this many unconsumed samples have
    /// piled up.
    #[validate(range(min = 1, max = 100_000))]
    #[serde(default = "default_per_artifact_queue_capacity")]
    pub per_artifact_queue_capacity: usize,

    /// Bound on the engine's merged output queue, drained by the collector.
    #[validate(range(min = 1, max = 100_000))]
    #[serde(default = "default_output_queue_capacity")]
    pub output_queue_capacity: usize,

    /// How often the reschedule loop re-evaluates the working set, in
    /// milliseconds.
    #[validate(range(min = 1, max = 3_600_000))]
    #[serde(default = "default_reschedule_interval_ms")]
    pub reschedule_interval_ms: u64,

    /// Whether eviction drains an evicted sampler's already-buffered fine
    /// samples into the output queue, best-effort, instead of discarding
    /// them.
    #[serde(default = "default_grab_on_evict")]
    pub grab_on_evict: bool,

    /// Whether `send_message` and per-artifact message preservation across
    /// eviction/re-admission are active. When `false`, messages are dropped
    /// rather than routed or preserved.
    #[serde(default = "default_enable_messages")]
    pub enable_messages: bool,

    /// Whether checkpoints are preserved across an evict/re-admit cycle and
    /// handed back to `load_heavy` on resumption. When `false`, every
    /// admission is treated as a cold start.
    #[serde(default = "default_enable_checkpoints")]
    pub enable_checkpoints: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            working_set_capacity: default_working_set_capacity(),
            per_artifact_queue_capacity: default_per_artifact_queue_capacity(),
            output_queue_capacity: default_output_queue_capacity(),
            reschedule_interval_ms: default_reschedule_interval_ms(),
            grab_on_evict: default_grab_on_evict(),
            enable_messages: default_enable_messages(),
            enable_checkpoints: default_enable_checkpoints(),
        }
    }
}

const fn default_working_set_capacity() -> usize {
    10
}

const fn default_per_artifact_queue_capacity() -> usize {
    100
}

const fn default_output_queue_capacity() -> usize {
    10_000
}

const fn default_reschedule_interval_ms() -> u64 {
    10_000
}

const fn default_grab_on_evict() -> bool {
    true
}

const fn default_enable_messages() -> bool {
    true
}

const fn default_enable_checkpoints() -> bool {
    true
}

/// How the collector accumulates what it reads from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectorMode {
    /// Keep every collected item in memory, in arrival order.
    SaveAll,
    /// Fold every collected item into a running accumulator, keeping no
    /// per-item history.
    Accumulate,
    /// Write every collected item straight to disk through a stream writer.
    StreamToFile,
}

/// Configuration of the collector.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CollectorConfig {
    /// How collected items are accumulated.
    #[serde(default = "default_collector_mode")]
    pub mode: CollectorMode,

    /// How often the collector checks whether the engine has finished, in
    /// milliseconds, while waiting for more output.
    #[validate(range(min = 1, max = 3_600_000))]
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How many fine samples the collector pulls from the engine, back to
    /// back, between each `finished_collecting` poll.
    #[validate(range(min = 1, max = 100_000))]
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Opt-in: when set, the collector keeps a capped ring buffer of
    /// data-free shadow copies of recently produced samples (payload
    /// dropped, metadata kept) for post-hoc visualization. `None` (the
    /// default) keeps no shadow history.
    #[serde(default)]
    pub shadow_buffer_capacity: Option<usize>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            mode: default_collector_mode(),
            poll_interval_ms: default_poll_interval_ms(),
            batch_size: default_batch_size(),
            shadow_buffer_capacity: None,
        }
    }
}

const fn default_collector_mode() -> CollectorMode {
    CollectorMode::SaveAll
}

const fn default_poll_interval_ms() -> u64 {
    5_000
}

const fn default_batch_size() -> usize {
    1
}

/// How a [`StreamWriterConfig`] lays out files on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamWriterLayout {
    /// Every row is appended to a single CSV file.
    SingleFile,
    /// Rows are split into one CSV file per artifact.
    PerArtifact,
}

/// Configuration of the CSV stream writer.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StreamWriterConfig {
    /// Single-file or per-artifact file layout.
    pub layout: StreamWriterLayout,

    /// For [`StreamWriterLayout::SingleFile`], the file to write to (must
    /// end in `.csv`). For [`StreamWriterLayout::PerArtifact`], the
    /// directory new per-artifact files are created under (must be empty at
    /// construction).
    #[validate(length(min = 1))]
    pub path: String,

    /// How long to wait, after being asked to flush and close, before
    /// draining the remaining queue and closing files.
    #[validate(range(min = 0, max = 3_600))]
    #[serde(default = "default_flush_delay_secs")]
    pub flush_delay_secs: u64,
}

const fn default_flush_delay_secs() -> u64 {
    3
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn engine_config_defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn engine_config_rejects_zero_capacity() {
        let mut config = EngineConfig::default();
        config.working_set_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn stream_writer_config_rejects_empty_path() {
        let config = StreamWriterConfig {
            layout: StreamWriterLayout::SingleFile,
            path: String::new(),
            flush_delay_secs: 3,
        };
        assert!(config.validate().is_err());
    }
}
