//! Pure data types for repoglob: stat entries, remote records, content errors.
//!
//! This crate is a leaf dependency with no async runtime and no I/O. It exists
//! so the matcher, the adapter, and client implementations can agree on
//! record shapes without depending on each other.

pub mod entry;
pub mod error;
pub mod stat;

// Flat re-exports for convenience
pub use entry::*;
pub use error::*;
pub use stat::*;
