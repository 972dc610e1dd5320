use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use super::normalizers::{Profile, ProfileDefinition};
use crate::error::{Result, SeederError};

/// Registry of source profiles, keyed by profile name
pub struct NormalizationRegistry {
    profiles: HashMap<String, ProfileDefinition>,
}

impl NormalizationRegistry {
    /// Create a registry holding the built-in profiles
    pub fn new() -> Self {
        let mut profiles = HashMap::new();
        for profile in Profile::all() {
            profiles.insert(profile.name().to_string(), profile.definition());
        }
        Self { profiles }
    }

    pub fn get(&self, name: &str) -> Option<&ProfileDefinition> {
        self.profiles.get(name)
    }

    /// Look up a profile, failing with the list of known names
    pub fn resolve(&self, name: &str) -> Result<&ProfileDefinition> {
        self.get(name).ok_or_else(|| {
            SeederError::Config(format!(
                "unknown profile '{}', known profiles: {}",
                name,
                self.list_profiles().join(", ")
            ))
        })
    }

    /// Layer config-file tables over the registered profiles.
    ///
    /// Tables merge key by key into an existing profile; arrays and scalars
    /// replace. An unknown name defines a new profile and must set `input`.
    pub fn apply_overrides(&mut self, overrides: &HashMap<String, toml::Value>) -> Result<()> {
        for (name, table) in overrides {
            let mut merged = match self.profiles.get(name) {
                Some(existing) => serde_json::to_value(existing)?,
                None => Value::Object(Default::default()),
            };
            merge_values(&mut merged, serde_json::to_value(table)?);

            let definition: ProfileDefinition = serde_json::from_value(merged)
                .map_err(|e| SeederError::Config(format!("profile '{}': {}", name, e)))?;
            definition
                .normalizer
                .validate()
                .map_err(|e| SeederError::Config(format!("profile '{}': {}", name, e)))?;

            debug!("Applied config overrides to profile {}", name);
            self.profiles.insert(name.clone(), definition);
        }
        Ok(())
    }

    /// All registered profile names, sorted
    pub fn list_profiles(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for NormalizationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
