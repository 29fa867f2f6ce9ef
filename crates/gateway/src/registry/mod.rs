//! File-backed collaborators: the exercise registry and the spec
//! service. Both are thin read-only adapters; the core only sees the
//! `pf-domain` traits.

pub mod exercises;
pub mod specs;

pub use exercises::FileExerciseRegistry;
pub use specs::FileSpecService;
