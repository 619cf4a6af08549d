#![doc = include_str!("../README.md")]
#![deny(
    trivial_numeric_casts,
    missing_docs,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    unused_extern_crates,
    unused_results,
    variant_size_differences
)]
#![warn(rust_2021_compatibility, unreachable_pub)]

//! Re-exports of every crate in this workspace, for callers who want the
//! whole pipeline behind a single dependency.

pub use collector;
pub use config;
pub use context;
pub use control;
pub use engine;
pub use model;
pub use sampler;
pub use scheduler;
pub use task;
