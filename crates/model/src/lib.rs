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

//! Data model shared by the sampling pipeline: artifacts, datasets, fine
//! samples, and the tagged markers that replace the ad-hoc sentinel values
//! of the source domain.

mod artifact;
mod dataset;
mod marker;
mod sample;

pub use artifact::{Artifact, ArtifactId};
pub use dataset::{Dataset, Error};
pub use marker::Marker;
pub use sample::{FineSample, ShadowSample};
