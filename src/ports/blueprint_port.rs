//! Blueprint source port trait.

use crate::domain::blueprint::Blueprint;
use crate::domain::error::ReentryError;
use std::path::Path;

pub trait BlueprintPort {
    /// Load a blueprint, validating it when a schema path is given.
    fn load(&self, path: &Path, schema_path: Option<&Path>) -> Result<Blueprint, ReentryError>;
}
