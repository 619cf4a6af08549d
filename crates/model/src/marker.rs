//! A tagged variant replacing the ad-hoc sentinel strings of the source
//! domain ("empty cache", "halt", "last instance").

/// Wire-level sentinel distinct from any valid payload value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// Absent-checkpoint marker: no checkpoint has ever been published for
    /// the artifact.
    Empty,
    /// Scheduler-initiated soft shutdown.
    Halt,
    /// `Collector::next` (and `Engine::get`) return this once the engine has
    /// finished and the output queue has drained.
    EndOfStream,
}
