//! Configuration module for jobcopy
//!
//! CLI arguments, the JSON-loadable copy configuration and scheduler
//! limits.

mod settings;

pub use settings::*;
