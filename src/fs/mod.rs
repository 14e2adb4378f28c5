//! File system collaborators
//!
//! Tree enumeration for the plan builder and the open/create/metadata
//! primitives used by the write jobs.

mod enumerator;
mod operations;

pub use enumerator::*;
pub use operations::*;
