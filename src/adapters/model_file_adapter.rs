//! File-backed model registry.
//!
//! A JSON registry file lists every registered model version with the
//! blake3 hash of its artifact. The registry file is re-read on every
//! `get_active` call, so an activation flip by an operator is visible to
//! the next decision run without a restart. `load` re-hashes the artifact
//! bytes and refuses to parse anything whose hash disagrees with the
//! registered value.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::error::TrendgateError;
use crate::domain::model::{ModelArtifact, ModelHandle};
use crate::ports::model_registry::ModelRegistryPort;

pub struct FileModelRegistry {
    registry_path: PathBuf,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    models: Vec<ModelHandle>,
}

fn db_err(e: impl std::fmt::Display) -> TrendgateError {
    TrendgateError::Database {
        reason: e.to_string(),
    }
}

impl FileModelRegistry {
    pub fn new(registry_path: PathBuf) -> Self {
        Self { registry_path }
    }

    fn read_registry(&self) -> Result<RegistryFile, TrendgateError> {
        if !self.registry_path.exists() {
            return Ok(RegistryFile::default());
        }
        let content = fs::read_to_string(&self.registry_path)?;
        serde_json::from_str(&content)
            .map_err(|e| db_err(format!("corrupt model registry: {e}")))
    }

    fn write_registry(&self, registry: &RegistryFile) -> Result<(), TrendgateError> {
        let content = serde_json::to_string_pretty(registry)
            .map_err(|e| db_err(format!("cannot serialize model registry: {e}")))?;
        fs::write(&self.registry_path, content)?;
        Ok(())
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.registry_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(path)
        }
    }

    /// Register a new artifact, inactive. The version is read from the
    /// artifact itself; the hash is computed from the raw bytes.
    pub fn register(
        &self,
        artifact_path: &str,
        asset_class: &str,
    ) -> Result<ModelHandle, TrendgateError> {
        let bytes = fs::read(self.resolve(artifact_path))?;
        let artifact: ModelArtifact = serde_json::from_slice(&bytes).map_err(|e| {
            TrendgateError::ModelInvalid {
                version: artifact_path.to_string(),
                reason: e.to_string(),
            }
        })?;

        let mut registry = self.read_registry()?;
        if registry.models.iter().any(|m| m.version == artifact.version) {
            return Err(TrendgateError::ModelInvalid {
                version: artifact.version,
                reason: "version already registered".into(),
            });
        }

        let handle = ModelHandle {
            version: artifact.version.clone(),
            path: artifact_path.to_string(),
            file_hash: blake3::hash(&bytes).to_hex().to_string(),
            asset_class: asset_class.to_string(),
            is_active: false,
        };
        registry.models.push(handle.clone());
        self.write_registry(&registry)?;
        info!(version = %handle.version, hash = %handle.file_hash, "model registered");
        Ok(handle)
    }

    /// Make `version` the single active model of its asset class.
    pub fn activate(&self, version: &str) -> Result<ModelHandle, TrendgateError> {
        let mut registry = self.read_registry()?;
        let asset_class = registry
            .models
            .iter()
            .find(|m| m.version == version)
            .map(|m| m.asset_class.clone())
            .ok_or_else(|| TrendgateError::ModelInvalid {
                version: version.to_string(),
                reason: "not registered".into(),
            })?;

        let mut activated = None;
        for model in &mut registry.models {
            if model.asset_class == asset_class {
                model.is_active = model.version == version;
                if model.is_active {
                    activated = Some(model.clone());
                }
            }
        }
        let handle = activated.ok_or_else(|| TrendgateError::ModelInvalid {
            version: version.to_string(),
            reason: "not registered".into(),
        })?;
        self.write_registry(&registry)?;
        info!(version, "model activated");
        Ok(handle)
    }

    pub fn list(&self) -> Result<Vec<ModelHandle>, TrendgateError> {
        Ok(self.read_registry()?.models)
    }
}

impl ModelRegistryPort for FileModelRegistry {
    fn get_active(&self, asset_class: &str) -> Result<Option<ModelHandle>, TrendgateError> {
        Ok(self
            .read_registry()?
            .models
            .into_iter()
            .find(|m| m.is_active && m.asset_class == asset_class))
    }

    fn load(&self, handle: &ModelHandle) -> Result<ModelArtifact, TrendgateError> {
        let bytes = fs::read(self.resolve(&handle.path))?;

        let actual = blake3::hash(&bytes).to_hex().to_string();
        if actual != handle.file_hash {
            return Err(TrendgateError::HashMismatch {
                version: handle.version.clone(),
                expected: handle.file_hash.clone(),
                actual,
            });
        }

        let artifact: ModelArtifact =
            serde_json::from_slice(&bytes).map_err(|e| TrendgateError::ModelInvalid {
                version: handle.version.clone(),
                reason: e.to_string(),
            })?;

        if artifact.version != handle.version {
            return Err(TrendgateError::ModelInvalid {
                version: handle.version.clone(),
                reason: format!("artifact declares version {}", artifact.version),
            });
        }

        Ok(artifact)
    }
}
