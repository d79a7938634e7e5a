//! Model registry types and the probability gateway.
//!
//! The gateway re-reads the active handle from the registry on every call,
//! so an administrative activation flip is picked up by the very next
//! decision run. Loaded artifacts (the expensive part) are cached by
//! (version, hash); the active pointer itself is never cached.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::domain::error::TrendgateError;
use crate::domain::features::FeatureVector;
use crate::ports::model_registry::ModelRegistryPort;

/// A registered model version. At most one handle per asset class is
/// active at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelHandle {
    pub version: String,
    pub path: String,
    pub file_hash: String,
    pub asset_class: String,
    pub is_active: bool,
}

/// A loaded probability model: logistic regression over a named subset of
/// the pipeline's features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: String,
    pub features: Vec<String>,
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl ModelArtifact {
    /// P(positive outcome) for one feature vector.
    pub fn probability(&self, features: &FeatureVector) -> Result<f64, TrendgateError> {
        if self.weights.len() != self.features.len() {
            return Err(TrendgateError::ModelInvalid {
                version: self.version.clone(),
                reason: format!(
                    "{} weights for {} features",
                    self.weights.len(),
                    self.features.len()
                ),
            });
        }

        let mut z = self.bias;
        for (name, weight) in self.features.iter().zip(&self.weights) {
            let value = features.get(name).ok_or_else(|| TrendgateError::ModelInvalid {
                version: self.version.clone(),
                reason: format!("unknown feature {name}"),
            })?;
            z += weight * value;
        }

        Ok((1.0 / (1.0 + (-z).exp())).clamp(0.0, 1.0))
    }
}

/// Probability gate over the currently active model.
pub struct ModelGateway<'a> {
    registry: &'a dyn ModelRegistryPort,
    asset_class: String,
    cache: RefCell<HashMap<(String, String), Rc<ModelArtifact>>>,
}

impl<'a> ModelGateway<'a> {
    pub fn new(registry: &'a dyn ModelRegistryPort, asset_class: &str) -> Self {
        ModelGateway {
            registry,
            asset_class: asset_class.to_string(),
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Query the active model. Fails with `NoActiveModel` when none is
    /// active and `HashMismatch` when the stored artifact fails its
    /// integrity check; neither is ever silently downgraded.
    pub fn probability(&self, features: &FeatureVector) -> Result<f64, TrendgateError> {
        let artifact = self.active_artifact()?;
        artifact.probability(features)
    }

    fn active_artifact(&self) -> Result<Rc<ModelArtifact>, TrendgateError> {
        let handle = self
            .registry
            .get_active(&self.asset_class)?
            .ok_or_else(|| TrendgateError::NoActiveModel {
                asset_class: self.asset_class.clone(),
            })?;

        let key = (handle.version.clone(), handle.file_hash.clone());
        if let Some(artifact) = self.cache.borrow().get(&key) {
            return Ok(Rc::clone(artifact));
        }

        let artifact = Rc::new(self.registry.load(&handle)?);
        self.cache
            .borrow_mut()
            .insert(key, Rc::clone(&artifact));
        Ok(artifact)
    }
}
