//! The lifecycle of a `FineSampler`, published through a `LastValue` so the
//! engine can poll it without synchronizing with the sampler task.

/// Lifecycle state of a `FineSampler` task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    /// `load_heavy` is still running.
    Starting,
    /// `sample_fine` is being called in a loop; samples are flowing.
    Streaming,
    /// `sample_fine` reported `FineOutcome::Drained`; the task is winding
    /// down.
    Drained,
    /// The task has exited and released its heavy region.
    Terminated,
}
