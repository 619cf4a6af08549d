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

//! Scheduling policies for the engine's working set.
//!
//! A scheduler is deliberately a *pure function* over a read-only view of
//! the engine's state: given which artifacts are currently loaded, which are
//! waiting, and how many times each has been scheduled, it decides which
//! loaded artifact (if any) should be evicted and which waiting artifact (if
//! any) should be admitted in its place. It never touches a channel, a
//! clock, or a task: the engine is solely responsible for carrying out the
//! decision.

mod default;
mod label_balanced;

pub use default::DefaultScheduler;
pub use label_balanced::LabelBalancedScheduler;

/// The lifecycle state of a `FineSampler`, as observed by a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerStatus {
    /// Still producing fine samples.
    Streaming,
    /// Has produced every fine sample it will ever produce; its queue may
    /// still hold buffered samples.
    Drained,
    /// Has stopped and released its heavy resources.
    Terminated,
}

impl SamplerStatus {
    /// Returns true if this sampler is a good candidate for eviction: it has
    /// nothing left to contribute to the working set.
    pub fn is_eviction_candidate(&self) -> bool {
        matches!(self, SamplerStatus::Drained | SamplerStatus::Terminated)
    }
}

/// A read-only view of the engine's working set, as exposed to a scheduler.
///
/// Implemented by the engine; schedulers only ever see it through this
/// trait, which keeps scheduling policies decoupled from the engine's
/// internal bookkeeping.
pub trait EngineView<Id> {
    /// Ids of artifacts currently admitted into the working set.
    fn loaded(&self) -> &[Id];

    /// Ids of artifacts not yet admitted.
    fn waiting(&self) -> &[Id];

    /// How many times this artifact has been scheduled (admitted) since the
    /// run started. Used to bias policies away from starving any artifact.
    fn sched_count(&self, id: &Id) -> u64;

    /// The current lifecycle state of the artifact's sampler, if it is
    /// loaded. Ids not currently loaded have no defined status.
    fn status(&self, id: &Id) -> Option<SamplerStatus>;
}

/// A scheduling decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision<Id> {
    /// Evict `evict` from the working set and admit `admit` in its place.
    Reschedule {
        /// The loaded artifact to evict.
        evict: Id,
        /// The waiting artifact to admit.
        admit: Id,
    },
    /// Nothing to do this tick: either the working set is already optimal,
    /// or no waiting artifact is eligible to be admitted.
    Skip,
    /// No further rescheduling should occur; the engine should begin
    /// winding down.
    Halt,
}

/// A scheduling policy.
///
/// Implementations MUST be pure with respect to the view they're given:
/// given the same view, `schedule` should make the same decision. Intended
/// to be cheap enough to call on every reschedule tick.
pub trait Scheduler<Id>: Send + Sync {
    /// Chooses the initial working set from `candidates`, picking at most
    /// `capacity` of them.
    fn initial_schedule(&self, candidates: &[Id], capacity: usize) -> Vec<Id>;

    /// Decides whether to reschedule given the current state of the working
    /// set.
    fn schedule(&self, view: &dyn EngineView<Id>) -> Decision<Id>;
}

/// Computes the cold-start-biased weight of an artifact from how many times
/// it has already been scheduled: never-scheduled artifacts get an
/// overwhelming weight so they are picked before anything else, and the
/// weight decays as `1 / (1 + sched_count)` afterwards.
pub(crate) fn cold_start_weight(sched_count: u64) -> f64 {
    if sched_count == 0 {
        1e7
    } else {
        1.0 / (1.0 + sched_count as f64)
    }
}
