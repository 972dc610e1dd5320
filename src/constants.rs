//! Defaults shared across the seeder. Anything here can be overridden from
//! `seeder.toml`, the environment, or the command line.

// Remote store
pub const DEFAULT_TABLE: &str = "foods";
pub const DEFAULT_CONFLICT_KEY: &str = "name";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_CONFIG_FILE: &str = "seeder.toml";

// Environment variable names
pub const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
pub const ENV_SUPABASE_PROJECT_REF: &str = "SUPABASE_PROJECT_REF";
pub const ENV_SUPABASE_KEY: &str = "SUPABASE_KEY";
pub const ENV_SUPABASE_SERVICE_ROLE_KEY: &str = "SUPABASE_SERVICE_ROLE_KEY";
pub const ENV_SUPABASE_ANON_KEY: &str = "SUPABASE_ANON_KEY";
pub const ENV_PUSHGATEWAY_URL: &str = "SEEDER_PUSHGATEWAY_URL";

// Upload
pub const DEFAULT_BATCH_SIZE: usize = 1000;
/// Error messages from the remote store are cut to this many chars in logs.
pub const ERROR_MESSAGE_LIMIT: usize = 120;
/// Number of rejected rows logged individually before going quiet.
pub const REJECTION_SAMPLE_LIMIT: usize = 5;

// Record shape
pub const MAX_NAME_BYTES: usize = 255;
pub const MIN_NAME_CHARS: usize = 2;
pub const DEFAULT_SERVING_SIZE_G: f64 = 100.0;
pub const MIN_CALORIES: f64 = 10.0;
pub const MAX_CALORIES: f64 = 1000.0;

// Source tags
pub const SOURCE_OPENFOODFACTS: &str = "openfoodfacts";
pub const SOURCE_IFCT_CSV: &str = "IFCT2017";
pub const SOURCE_IFCT_OCR: &str = "IFCT2017_OCR";

// Profile names (used in CLI and config)
pub const PROFILE_OPENFOODFACTS: &str = "openfoodfacts";
pub const PROFILE_IFCT_CSV: &str = "ifct-csv";
pub const PROFILE_IFCT_OCR: &str = "ifct-ocr";

/// Get all supported profile names
pub fn get_supported_profiles() -> Vec<&'static str> {
    vec![PROFILE_OPENFOODFACTS, PROFILE_IFCT_CSV, PROFILE_IFCT_OCR]
}
