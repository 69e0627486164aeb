//! Runtime settings access port trait.

use crate::domain::error::ReentryError;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;

    fn require_string(&self, section: &str, key: &str) -> Result<String, ReentryError> {
        self.get_string(section, key)
            .ok_or_else(|| ReentryError::ConfigMissing {
                section: section.to_string(),
                key: key.to_string(),
            })
    }
}
