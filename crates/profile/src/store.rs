//! Durable profile store.
//!
//! One JSON document per profile id under the state path, written
//! atomically (temp file + rename) so observers never see a partial
//! profile.

use std::path::{Path, PathBuf};

use pf_domain::error::{Error, Result};

use crate::model::LearningProfile;

pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    pub fn open(state_path: &Path) -> Result<Self> {
        let dir = state_path.join("profiles");
        std::fs::create_dir_all(&dir).map_err(Error::Io)?;
        Ok(Self { dir })
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    pub fn get(&self, id: &str) -> Result<Option<LearningProfile>> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
        match serde_json::from_str(&raw) {
            Ok(profile) => Ok(Some(profile)),
            Err(e) => {
                tracing::warn!(profile_id = %id, error = %e, "profile file corrupt, starting fresh");
                Ok(None)
            }
        }
    }

    pub fn upsert(&self, profile: &LearningProfile) -> Result<()> {
        let path = self.path_for(&profile.id);
        let json = serde_json::to_string_pretty(profile)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(Error::Io)?;
        std::fs::rename(&tmp, &path).map_err(Error::Io)?;
        Ok(())
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let path = self.path_for(id);
        if !path.exists() {
            return Err(Error::NotFound(format!("profile {id}")));
        }
        std::fs::remove_file(&path).map_err(Error::Io)
    }
}
