//! Model registry port trait.

use crate::domain::error::TrendgateError;
use crate::domain::model::{ModelArtifact, ModelHandle};

pub trait ModelRegistryPort {
    /// The active handle for an asset class, re-read from the source of
    /// truth on every call.
    fn get_active(&self, asset_class: &str) -> Result<Option<ModelHandle>, TrendgateError>;

    /// Load and integrity-check the artifact behind a handle. Fails with
    /// `HashMismatch` when the bytes do not hash to the registered value.
    fn load(&self, handle: &ModelHandle) -> Result<ModelArtifact, TrendgateError>;
}
