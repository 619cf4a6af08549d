//! Definition of an artifact, the source unit (patient/slide) from which many
//! fine samples can be drawn.

use std::{
    fmt::{Display, Formatter},
    hash::{Hash, Hasher},
};

/// Stable integer identity of an [`Artifact`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArtifactId(pub u64);

impl Display for ArtifactId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ArtifactId {
    fn from(value: u64) -> Self {
        ArtifactId(value)
    }
}

/// An artifact is the source unit (a "patient" in the domain this pipeline
/// was distilled from) from which a `HeavyLoader` materializes a heavy
/// region and a `FineSampler` draws many fine samples.
///
/// Equality, hashing, and ordering are by `id` alone: the `record` is an
/// opaque bag consumed only by user callbacks, never by the engine.
#[derive(Debug, Clone)]
pub struct Artifact<R> {
    id: ArtifactId,
    /// Opaque record (paths, metadata, labels, ...) owned by the caller's
    /// callbacks.
    pub record: R,
}

impl<R> Artifact<R> {
    /// Creates a new artifact with the given id and opaque record.
    pub fn new(id: ArtifactId, record: R) -> Self {
        Self { id, record }
    }

    /// Returns the stable id of this artifact.
    pub fn id(&self) -> ArtifactId {
        self.id
    }
}

impl<R> PartialEq for Artifact<R> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<R> Eq for Artifact<R> {}

impl<R> Hash for Artifact<R> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<R> PartialOrd for Artifact<R> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<R> Ord for Artifact<R> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}
