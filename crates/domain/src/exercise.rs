//! Read-only domain objects consumed from external collaborators.
//!
//! Exercises come from the exercise registry (YAML packs on disk);
//! spec documents come from the spec service. The core treats both as
//! opaque bundles and never writes them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::{CodeSnapshot, Level};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Exercise bundle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The phases and options attached to an exercise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRecipe {
    #[serde(default = "d_true")]
    pub format: bool,
    #[serde(default = "d_true")]
    pub build: bool,
    #[serde(default = "d_true")]
    pub test: bool,
    /// Extra flags passed to the test tool (e.g. `-race`).
    #[serde(default)]
    pub test_flags: Vec<String>,
    /// Wall-clock override for sandbox phases, seconds.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl Default for CheckRecipe {
    fn default() -> Self {
        Self {
            format: true,
            build: true,
            test: true,
            test_flags: Vec::new(),
            timeout_seconds: None,
        }
    }
}

fn d_true() -> bool {
    true
}

/// An exercise bundle as loaded from a pack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exercise {
    /// Full reference, `<pack>/<category>/<slug>`.
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub difficulty: String,
    /// What "done" looks like, shown to the model when reviewing.
    #[serde(default)]
    pub rubric: Vec<String>,
    #[serde(default)]
    pub starter_code: CodeSnapshot,
    #[serde(default)]
    pub test_code: CodeSnapshot,
    #[serde(default)]
    pub recipe: CheckRecipe,
    /// Author-curated hints keyed by intervention level.
    #[serde(default)]
    pub hints: BTreeMap<Level, Vec<String>>,
}

impl Exercise {
    /// Starter and test code merged into one snapshot (test files win on
    /// path collisions, which pack authors avoid anyway).
    pub fn initial_snapshot(&self) -> CodeSnapshot {
        let mut code = self.starter_code.clone();
        for (path, content) in &self.test_code {
            code.insert(path.clone(), content.clone());
        }
        code
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Spec documents
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One acceptance criterion inside a feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Criterion {
    pub text: String,
    #[serde(default)]
    pub satisfied: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub criteria: Vec<Criterion>,
}

/// A validated specification document for feature-guidance sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecDoc {
    pub path: String,
    pub name: String,
    pub goals: Vec<String>,
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl SpecDoc {
    /// The first unsatisfied criterion with its owning feature, in
    /// document order.
    pub fn next_criterion(&self) -> Option<(&Feature, &Criterion)> {
        self.features.iter().find_map(|f| {
            f.criteria
                .iter()
                .find(|c| !c.satisfied)
                .map(|c| (f, c))
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Collaborator traits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Read-only exercise lookup, queried at session creation and prompt
/// assembly time.
#[async_trait::async_trait]
pub trait ExerciseRegistry: Send + Sync {
    /// Load an exercise by its full reference. Missing exercises signal
    /// `exercise-not-found`.
    async fn load(&self, exercise_id: &str) -> Result<Exercise>;
}

/// Spec document loading plus validation.
#[async_trait::async_trait]
pub trait SpecService: Send + Sync {
    /// Load and validate a spec. Structural problems (missing goals,
    /// empty features) signal `spec-invalid`.
    async fn load_validated(&self, spec_path: &str) -> Result<SpecDoc>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec_with(flags: &[(bool, bool)]) -> SpecDoc {
        SpecDoc {
            path: "x.yaml".into(),
            name: "x".into(),
            goals: vec!["goal".into()],
            features: flags
                .iter()
                .enumerate()
                .map(|(i, (a, b))| Feature {
                    name: format!("f{i}"),
                    summary: String::new(),
                    criteria: vec![
                        Criterion {
                            text: format!("f{i}c0"),
                            satisfied: *a,
                        },
                        Criterion {
                            text: format!("f{i}c1"),
                            satisfied: *b,
                        },
                    ],
                })
                .collect(),
        }
    }

    #[test]
    fn next_criterion_walks_in_order() {
        let spec = spec_with(&[(true, true), (true, false)]);
        let (feature, criterion) = spec.next_criterion().unwrap();
        assert_eq!(feature.name, "f1");
        assert_eq!(criterion.text, "f1c1");
    }

    #[test]
    fn next_criterion_none_when_all_satisfied() {
        let spec = spec_with(&[(true, true)]);
        assert!(spec.next_criterion().is_none());
    }

    #[test]
    fn initial_snapshot_merges_test_code() {
        let mut ex = Exercise {
            id: "go-v1/basics/hello".into(),
            title: "hello".into(),
            description: String::new(),
            difficulty: "intro".into(),
            rubric: vec![],
            starter_code: CodeSnapshot::new(),
            test_code: CodeSnapshot::new(),
            recipe: CheckRecipe::default(),
            hints: BTreeMap::new(),
        };
        ex.starter_code
            .insert("main.go".into(), "package main".into());
        ex.test_code
            .insert("main_test.go".into(), "package main".into());
        let snap = ex.initial_snapshot();
        assert_eq!(snap.len(), 2);
        assert!(snap.contains_key("main_test.go"));
    }

    #[test]
    fn recipe_defaults_enable_all_phases() {
        let r: CheckRecipe = serde_json::from_str("{}").unwrap();
        assert!(r.format && r.build && r.test);
        assert!(r.timeout_seconds.is_none());
    }
}
