//! Progress reporting module
//!
//! An observer that renders job and byte progress with indicatif.

mod reporter;

pub use reporter::*;
