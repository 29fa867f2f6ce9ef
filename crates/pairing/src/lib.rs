//! The pairing engine: bounded, streamed AI interventions.

pub mod chunk;
pub mod engine;
pub mod level;
pub mod prompt;

pub use chunk::InterventionChunk;
pub use engine::{InterventionContext, InterventionPlan, PairingEngine};
