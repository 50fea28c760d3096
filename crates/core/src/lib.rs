//! Domain types shared by every zimage crate.
//!
//! Everything here is pure: request bounds, default and seed resolution,
//! job records and the artifact naming scheme. No I/O happens in this crate.

pub mod error;
pub mod generation;
pub mod job;
pub mod types;
