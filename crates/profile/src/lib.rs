//! Longitudinal learning profile: incremental statistics over session
//! events, skill assessment for the pairing engine, and read-only
//! analytics.

pub mod aggregator;
pub mod analytics;
pub mod assessment;
pub mod model;
pub mod store;
pub mod topic;

pub use aggregator::ProfileAggregator;
pub use assessment::{assess, GrowthRate, SkillAssessment};
pub use model::LearningProfile;
pub use store::ProfileStore;
