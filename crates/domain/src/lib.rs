//! Shared domain types for all pairflow crates.
//!
//! Everything here is plain data plus the collaborator traits the core
//! components talk through. No I/O happens in this crate.

pub mod config;
pub mod error;
pub mod events;
pub mod exercise;
pub mod session;
pub mod stream;

pub use error::{Error, Result};
