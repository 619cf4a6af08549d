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

//! Control-plane primitives shared by the sampler, scheduler, and engine:
//! a last-value-wins register for status/checkpoint/message slots, and a
//! combinator that races an interval timer against a message channel.

mod last_value;
mod signal;

pub use last_value::LastValue;
pub use signal::{ControlReceiver, ControlSignal};
