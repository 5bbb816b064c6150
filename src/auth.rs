//! Authorization kinds and correlation identifiers.

pub mod id;
pub mod kind;

pub use id::*;
pub use kind::*;
