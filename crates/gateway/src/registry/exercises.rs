//! YAML exercise-pack loader.
//!
//! An exercise `<pack>/<category>/<slug>` lives at
//! `<root>/<pack>/<category>/<slug>.yaml`. Files are read on every
//! lookup - packs are small and authors expect edits to show up without
//! a daemon restart.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use pf_domain::error::{Error, Result};
use pf_domain::exercise::{CheckRecipe, Exercise, ExerciseRegistry};
use pf_domain::session::{CodeSnapshot, Level};

pub struct FileExerciseRegistry {
    root: PathBuf,
}

/// On-disk exercise shape; the id comes from the lookup path.
#[derive(Debug, Deserialize)]
struct ExerciseDoc {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    difficulty: String,
    #[serde(default)]
    rubric: Vec<String>,
    #[serde(default)]
    starter_code: CodeSnapshot,
    #[serde(default)]
    test_code: CodeSnapshot,
    #[serde(default)]
    recipe: CheckRecipe,
    #[serde(default)]
    hints: BTreeMap<Level, Vec<String>>,
}

impl FileExerciseRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, exercise_id: &str) -> Result<PathBuf> {
        let rel = Path::new(exercise_id);
        if rel.is_absolute()
            || rel
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::RootDir))
        {
            return Err(Error::BadRequest(format!(
                "invalid exercise reference: {exercise_id}"
            )));
        }
        Ok(self.root.join(format!("{exercise_id}.yaml")))
    }
}

#[async_trait::async_trait]
impl ExerciseRegistry for FileExerciseRegistry {
    async fn load(&self, exercise_id: &str) -> Result<Exercise> {
        let path = self.path_for(exercise_id)?;
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|_| Error::ExerciseNotFound(exercise_id.to_string()))?;

        let doc: ExerciseDoc = serde_yaml::from_str(&raw).map_err(|e| {
            tracing::warn!(exercise_id, error = %e, "malformed exercise file");
            Error::Internal(format!("exercise {exercise_id} is malformed: {e}"))
        })?;

        Ok(Exercise {
            id: exercise_id.to_string(),
            title: doc.title,
            description: doc.description,
            difficulty: doc.difficulty,
            rubric: doc.rubric,
            starter_code: doc.starter_code,
            test_code: doc.test_code,
            recipe: doc.recipe,
            hints: doc.hints,
        })
    }
}
