use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::constants::{
    DEFAULT_CONFIG_FILE, DEFAULT_TABLE, DEFAULT_TIMEOUT_SECONDS, ENV_SUPABASE_ANON_KEY, ENV_SUPABASE_KEY,
    ENV_SUPABASE_PROJECT_REF, ENV_SUPABASE_SERVICE_ROLE_KEY, ENV_SUPABASE_URL,
};
use crate::error::{Result, SeederError};
use crate::infra::ColumnMapping;
use crate::pipeline::upload::UploadOptions;

/// Contents of `seeder.toml`. Every section and key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub supabase: SupabaseSection,
    pub upload: UploadSection,
    /// Per-profile overrides, merged over the built-in profiles
    pub profiles: HashMap<String, toml::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SupabaseSection {
    pub url: Option<String>,
    pub key: Option<String>,
    pub table: Option<String>,
    pub timeout_seconds: Option<u64>,
    /// Record fields sent to the table and their column names
    pub columns: Option<ColumnMapping>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UploadSection {
    pub batch_size: Option<usize>,
    pub conflict_key: Option<Vec<String>>,
    pub individual_retry: Option<bool>,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Values given on the command line; they win over everything else.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub url: Option<String>,
    pub key: Option<String>,
    pub table: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub batch_size: Option<usize>,
    pub conflict_key: Option<Vec<String>>,
    pub individual_retry: Option<bool>,
    pub limit: Option<u64>,
    pub dry_run: bool,
}

/// Resolved settings for one run
#[derive(Debug, Clone)]
pub struct Config {
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
    pub table: String,
    pub timeout: Duration,
    pub columns: ColumnMapping,
    pub upload: UploadOptions,
    /// Stop after this many source units
    pub limit: Option<u64>,
    pub dry_run: bool,
    pub profiles: HashMap<String, toml::Value>,
}

impl Config {
    /// Load `.env`, the config file and the environment, then apply CLI overrides.
    ///
    /// An explicitly named config file must exist; the default `seeder.toml` is optional.
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        dotenv::dotenv().ok();

        let file = match path {
            Some(p) => {
                let text = fs::read_to_string(p).map_err(|e| {
                    SeederError::Config(format!("Failed to read config file '{}': {}", p.display(), e))
                })?;
                info!("Loaded config from {}", p.display());
                FileConfig::parse(&text)?
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                let text = fs::read_to_string(DEFAULT_CONFIG_FILE)?;
                info!("Loaded config from {}", DEFAULT_CONFIG_FILE);
                FileConfig::parse(&text)?
            }
            None => {
                debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                FileConfig::default()
            }
        };

        Self::resolve(file, |name| std::env::var(name).ok(), overrides)
    }

    /// Merge sources with precedence CLI > env > file > defaults.
    pub fn resolve<F>(file: FileConfig, env: F, overrides: &ConfigOverrides) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        let env_url = lookup(ENV_SUPABASE_URL)
            .or_else(|| lookup(ENV_SUPABASE_PROJECT_REF).map(|r| format!("https://{}.supabase.co", r.trim())));
        let env_key = lookup(ENV_SUPABASE_KEY)
            .or_else(|| lookup(ENV_SUPABASE_SERVICE_ROLE_KEY))
            .or_else(|| lookup(ENV_SUPABASE_ANON_KEY));

        let defaults = UploadOptions::default();
        let upload = UploadOptions {
            batch_size: overrides
                .batch_size
                .or(file.upload.batch_size)
                .unwrap_or(defaults.batch_size),
            conflict_key: overrides
                .conflict_key
                .clone()
                .or(file.upload.conflict_key)
                .unwrap_or(defaults.conflict_key),
            individual_retry: overrides
                .individual_retry
                .or(file.upload.individual_retry)
                .unwrap_or(defaults.individual_retry),
        };

        let timeout_seconds = overrides
            .timeout_seconds
            .or(file.supabase.timeout_seconds)
            .unwrap_or(DEFAULT_TIMEOUT_SECONDS);

        let config = Self {
            supabase_url: overrides.url.clone().or(env_url).or(file.supabase.url),
            supabase_key: overrides.key.clone().or(env_key).or(file.supabase.key),
            table: overrides
                .table
                .clone()
                .or(file.supabase.table)
                .unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            timeout: Duration::from_secs(timeout_seconds),
            columns: file.supabase.columns.unwrap_or_default(),
            upload,
            limit: overrides.limit,
            dry_run: overrides.dry_run,
            profiles: file.profiles,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that hold for every command
    pub fn validate(&self) -> Result<()> {
        self.upload.validate()?;
        self.columns.validate()?;
        if self.timeout.is_zero() {
            return Err(SeederError::Config("timeout_seconds must be greater than 0".to_string()));
        }
        if self.table.trim().is_empty() {
            return Err(SeederError::Config("table must not be empty".to_string()));
        }
        Ok(())
    }

    /// URL and key for commands that talk to the remote store
    pub fn remote_credentials(&self) -> Result<(&str, &str)> {
        let url = self.supabase_url.as_deref().ok_or_else(|| {
            SeederError::Config(format!(
                "Supabase URL missing: set {} or {}, or pass --url",
                ENV_SUPABASE_URL, ENV_SUPABASE_PROJECT_REF
            ))
        })?;
        let key = self.supabase_key.as_deref().ok_or_else(|| {
            SeederError::Config(format!(
                "Supabase key missing: set {} or {}",
                ENV_SUPABASE_KEY, ENV_SUPABASE_SERVICE_ROLE_KEY
            ))
        })?;
        Ok((url, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env_from(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| pairs.iter().find(|(k, _)| *k == name).map(|(_, v)| v.to_string())
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_any_source() {
        let config = Config::resolve(FileConfig::default(), no_env, &ConfigOverrides::default()).unwrap();
        assert_eq!(config.upload.batch_size, 1000);
        assert_eq!(config.upload.conflict_key, vec!["name".to_string()]);
        assert_eq!(config.table, "foods");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.remote_credentials().is_err());
    }

    #[test]
    fn test_precedence_cli_over_env_over_file() {
        let file = FileConfig::parse(
            r#"
            [supabase]
            url = "https://file.supabase.co"
            key = "file-key"

            [upload]
            batch_size = 250
            individual_retry = true
            "#,
        )
        .unwrap();
        let env = env_from(&[("SUPABASE_URL", "https://env.supabase.co")]);
        let overrides = ConfigOverrides {
            batch_size: Some(50),
            ..ConfigOverrides::default()
        };

        let config = Config::resolve(file, env, &overrides).unwrap();
        assert_eq!(config.upload.batch_size, 50);
        assert!(config.upload.individual_retry);
        assert_eq!(config.supabase_url.as_deref(), Some("https://env.supabase.co"));
        assert_eq!(config.supabase_key.as_deref(), Some("file-key"));
    }

    #[test]
    fn test_project_ref_and_service_role_key() {
        let env = env_from(&[
            ("SUPABASE_PROJECT_REF", "abcd1234"),
            ("SUPABASE_SERVICE_ROLE_KEY", "service"),
        ]);
        let config = Config::resolve(FileConfig::default(), env, &ConfigOverrides::default()).unwrap();
        assert_eq!(
            config.remote_credentials().unwrap(),
            ("https://abcd1234.supabase.co", "service")
        );
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let zero_batch = ConfigOverrides {
            batch_size: Some(0),
            ..ConfigOverrides::default()
        };
        assert!(matches!(
            Config::resolve(FileConfig::default(), no_env, &zero_batch),
            Err(SeederError::Config(_))
        ));

        let empty_key = ConfigOverrides {
            conflict_key: Some(Vec::new()),
            ..ConfigOverrides::default()
        };
        assert!(Config::resolve(FileConfig::default(), no_env, &empty_key).is_err());

        let zero_timeout = ConfigOverrides {
            timeout_seconds: Some(0),
            ..ConfigOverrides::default()
        };
        assert!(Config::resolve(FileConfig::default(), no_env, &zero_timeout).is_err());
    }

    #[test]
    fn test_profile_tables_are_kept_for_registry() {
        let file = FileConfig::parse(
            r#"
            [profiles.ifct-ocr.ocr]
            columns = ["water", "protein", "_", "fat", "carbs"]
            "#,
        )
        .unwrap();
        let config = Config::resolve(file, no_env, &ConfigOverrides::default()).unwrap();
        assert!(config.profiles.contains_key("ifct-ocr"));
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let err = Config::load(Some(Path::new("/no/such/seeder.toml")), &ConfigOverrides::default())
            .err()
            .unwrap();
        assert!(matches!(err, SeederError::Config(_)));
    }

    #[test]
    fn test_load_reads_explicit_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[upload]\nbatch_size = 10\nconflict_key = [\"name\", \"source\"]").unwrap();
        let config = Config::load(Some(file.path()), &ConfigOverrides::default()).unwrap();
        assert_eq!(config.upload.batch_size, 10);
        assert_eq!(config.upload.conflict_key.len(), 2);
    }

    #[test]
    fn test_column_mapping_from_file() {
        let file = FileConfig::parse(
            r#"
            [supabase]
            table = "foods_indian"

            [supabase.columns]
            fields = ["name", "localized_name", "fiber_g"]
            rename = { localized_name = "name_hindi" }
            "#,
        )
        .unwrap();
        let config = Config::resolve(file, no_env, &ConfigOverrides::default()).unwrap();
        assert_eq!(config.table, "foods_indian");
        assert_eq!(config.columns.column("localized_name"), "name_hindi");
        assert_eq!(config.columns.fields.len(), 3);

        let defaults = Config::resolve(FileConfig::default(), no_env, &ConfigOverrides::default()).unwrap();
        assert_eq!(defaults.columns, ColumnMapping::default());

        let bad = FileConfig::parse("[supabase.columns]\nfields = [\"water_g\"]\n").unwrap();
        assert!(matches!(
            Config::resolve(bad, no_env, &ConfigOverrides::default()),
            Err(SeederError::Config(_))
        ));
    }
}
