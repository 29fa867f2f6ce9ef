//! Spec document service.
//!
//! Loads YAML specification documents for feature-guidance sessions and
//! validates their structure. Anything structurally wrong - including a
//! file that cannot be read or parsed - signals `spec-invalid`, since
//! from the client's point of view the reference they configured does
//! not denote a usable spec.

use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use pf_domain::error::{Error, Result};
use pf_domain::exercise::{Criterion, Feature, SpecDoc, SpecService};

pub struct FileSpecService {
    root: PathBuf,
}

#[derive(Debug, Deserialize)]
struct SpecFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    goals: Vec<String>,
    #[serde(default)]
    features: Vec<FeatureDoc>,
}

#[derive(Debug, Deserialize)]
struct FeatureDoc {
    name: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    criteria: Vec<CriterionDoc>,
}

#[derive(Debug, Deserialize)]
struct CriterionDoc {
    text: String,
    #[serde(default)]
    satisfied: bool,
}

impl FileSpecService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, spec_path: &str) -> Result<PathBuf> {
        let rel = Path::new(spec_path);
        if rel.is_absolute()
            || rel
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::RootDir))
        {
            return Err(Error::BadRequest(format!(
                "invalid spec reference: {spec_path}"
            )));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait::async_trait]
impl SpecService for FileSpecService {
    async fn load_validated(&self, spec_path: &str) -> Result<SpecDoc> {
        let path = self.path_for(spec_path)?;
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| Error::SpecInvalid(format!("cannot read {spec_path}: {e}")))?;

        let file: SpecFile = serde_yaml::from_str(&raw)
            .map_err(|e| Error::SpecInvalid(format!("{spec_path} is not valid YAML: {e}")))?;

        if file.goals.iter().all(|g| g.trim().is_empty()) {
            return Err(Error::SpecInvalid(format!("{spec_path} has no goals")));
        }
        for feature in &file.features {
            if feature.name.trim().is_empty() {
                return Err(Error::SpecInvalid(format!(
                    "{spec_path} has a feature without a name"
                )));
            }
            if feature.criteria.iter().any(|c| c.text.trim().is_empty()) {
                return Err(Error::SpecInvalid(format!(
                    "{spec_path}: feature \"{}\" has an empty acceptance criterion",
                    feature.name
                )));
            }
        }

        Ok(SpecDoc {
            path: spec_path.to_string(),
            name: file.name.unwrap_or_else(|| spec_path.to_string()),
            goals: file.goals,
            features: file
                .features
                .into_iter()
                .map(|f| Feature {
                    name: f.name,
                    summary: f.summary,
                    criteria: f
                        .criteria
                        .into_iter()
                        .map(|c| Criterion {
                            text: c.text,
                            satisfied: c.satisfied,
                        })
                        .collect(),
                })
                .collect(),
        })
    }
}
