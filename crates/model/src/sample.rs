//! A `FineSample` is an individual training example delivered to the
//! consumer; a `ShadowSample` is the data-free copy kept after collation so a
//! post-hoc visualization API can inspect what was produced without holding
//! onto the (possibly large) payload.

use crate::ArtifactId;

/// An individual sample produced by a `FineSampler`.
#[derive(Debug, Clone)]
pub struct FineSample<P, FI, HI> {
    /// The sample payload, owned by the sample while it sits in a queue.
    pub payload: P,
    /// Per-sample metadata returned by `sample_fine` alongside the payload.
    pub fine_info: FI,
    /// Metadata describing the heavy region this sample was drawn from.
    pub heavy_info: HI,
    /// The artifact this sample was drawn from.
    pub artifact_id: ArtifactId,
}

impl<P, FI, HI> FineSample<P, FI, HI> {
    /// Creates a new fine sample.
    pub fn new(payload: P, fine_info: FI, heavy_info: HI, artifact_id: ArtifactId) -> Self {
        Self {
            payload,
            fine_info,
            heavy_info,
            artifact_id,
        }
    }

    /// Consumes this sample, dropping its payload, and returns the
    /// data-free shadow kept for visualization after collation.
    pub fn into_shadow(self) -> ShadowSample<FI, HI> {
        ShadowSample {
            fine_info: self.fine_info,
            heavy_info: self.heavy_info,
            artifact_id: self.artifact_id,
        }
    }
}

impl<P, FI: Clone, HI: Clone> FineSample<P, FI, HI> {
    /// Builds the data-free shadow of this sample without consuming it, so
    /// a caller can still move the payload elsewhere afterwards.
    pub fn shadow(&self) -> ShadowSample<FI, HI> {
        ShadowSample {
            fine_info: self.fine_info.clone(),
            heavy_info: self.heavy_info.clone(),
            artifact_id: self.artifact_id,
        }
    }
}

/// A data-free copy of a [`FineSample`]: same metadata, payload dropped.
#[derive(Debug, Clone)]
pub struct ShadowSample<FI, HI> {
    /// Per-sample metadata, unchanged from the source sample.
    pub fine_info: FI,
    /// Heavy-region metadata, unchanged from the source sample.
    pub heavy_info: HI,
    /// The artifact this sample was drawn from.
    pub artifact_id: ArtifactId,
}
