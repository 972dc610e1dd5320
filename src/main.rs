use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use nutrition_seeder::app::ports::RemoteStorePort;
use nutrition_seeder::app::{extract_records, open_units, CountUseCase, ImportUseCase, RunStats};
use nutrition_seeder::config::{Config, ConfigOverrides};
use nutrition_seeder::constants::{PROFILE_IFCT_OCR, PROFILE_OPENFOODFACTS};
use nutrition_seeder::infra::{FileRecordOutputAdapter, SupabaseStore};
use nutrition_seeder::logging;
use nutrition_seeder::observability;
use nutrition_seeder::pipeline::ingestion::Delimiter;
use nutrition_seeder::pipeline::processing::normalize::normalizers::{InputKind, ProfileDefinition};
use nutrition_seeder::pipeline::processing::normalize::{NormalizationRegistry, RecordNormalizer};
use nutrition_seeder::pipeline::storage::{DuplicatePolicy, InMemoryStore};

#[derive(Parser)]
#[command(name = "nutrition_seeder")]
#[command(about = "Seed the foods table from product exports and food-composition tables")]
#[command(version = "0.1.0")]
struct Cli {
    /// Config file (defaults to ./seeder.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a delimited file (OpenFoodFacts export, cleaned IFCT CSV)
    Import {
        #[command(flatten)]
        args: ImportArgs,
        /// Source profile. Available: openfoodfacts, ifct-csv
        #[arg(long, default_value = PROFILE_OPENFOODFACTS)]
        profile: String,
    },
    /// Import OCR text lines of a food-composition table
    ImportOcr {
        #[command(flatten)]
        args: ImportArgs,
        #[arg(long, default_value = PROFILE_IFCT_OCR)]
        profile: String,
    },
    /// Extract and normalize only, writing accepted records to a .csv or .ndjson file
    Extract {
        /// Input file
        input: PathBuf,
        /// Output file; the extension picks the format
        #[arg(long, short)]
        output: PathBuf,
        #[arg(long, default_value = PROFILE_OPENFOODFACTS)]
        profile: String,
        /// Force the delimiter (tab or comma) instead of detecting it
        #[arg(long)]
        delimiter: Option<Delimiter>,
        /// Stop after this many source units
        #[arg(long)]
        limit: Option<u64>,
        #[arg(long)]
        summary_json: Option<PathBuf>,
    },
    /// Count rows in the remote table
    Count {
        /// Break the count down by category
        #[arg(long)]
        by_category: bool,
        #[command(flatten)]
        remote: RemoteArgs,
    },
}

#[derive(Args, Clone)]
struct RemoteArgs {
    /// Supabase project URL (overrides SUPABASE_URL)
    #[arg(long)]
    url: Option<String>,
    /// Target table
    #[arg(long)]
    table: Option<String>,
    /// Per-request timeout in seconds
    #[arg(long)]
    timeout_seconds: Option<u64>,
}

#[derive(Args, Clone)]
struct ImportArgs {
    /// Input file
    input: PathBuf,
    #[command(flatten)]
    remote: RemoteArgs,
    /// Records per upsert
    #[arg(long)]
    batch_size: Option<usize>,
    /// Conflict key columns, comma separated
    #[arg(long, value_delimiter = ',')]
    conflict_key: Option<Vec<String>>,
    /// Resubmit records one at a time when a batch fails
    #[arg(long, conflicts_with = "no_individual_retry")]
    individual_retry: bool,
    /// Turn off the per-record fallback even if the config file enables it
    #[arg(long)]
    no_individual_retry: bool,
    /// Stop after this many source units
    #[arg(long)]
    limit: Option<u64>,
    /// Upload into an in-memory table instead of the remote store
    #[arg(long)]
    dry_run: bool,
    /// Force the delimiter (tab or comma) instead of detecting it
    #[arg(long)]
    delimiter: Option<Delimiter>,
    /// Also write the run summary as JSON
    #[arg(long)]
    summary_json: Option<PathBuf>,
}

impl RemoteArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            url: self.url.clone(),
            table: self.table.clone(),
            timeout_seconds: self.timeout_seconds,
            ..ConfigOverrides::default()
        }
    }
}

impl ImportArgs {
    fn retry_override(&self) -> Option<bool> {
        match (self.individual_retry, self.no_individual_retry) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }

    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            batch_size: self.batch_size,
            conflict_key: self.conflict_key.clone(),
            individual_retry: self.retry_override(),
            limit: self.limit,
            dry_run: self.dry_run,
            ..self.remote.overrides()
        }
    }
}

fn load_profile(config: &Config, profile: &str) -> anyhow::Result<ProfileDefinition> {
    let mut registry = NormalizationRegistry::new();
    registry.apply_overrides(&config.profiles)?;
    Ok(registry.resolve(profile)?.clone())
}

fn remote_store(config: &Config) -> anyhow::Result<Arc<dyn RemoteStorePort>> {
    let (url, key) = config.remote_credentials()?;
    let store = SupabaseStore::new(url, key, &config.table, config.timeout)?.with_columns(config.columns.clone())?;
    Ok(Arc::new(store))
}

fn finish_summary(stats: &RunStats, summary_json: Option<&Path>) -> anyhow::Result<()> {
    stats.print_summary();
    if let Some(path) = summary_json {
        stats
            .write_json(path)
            .with_context(|| format!("writing summary to {}", path.display()))?;
        println!("💾 Summary written to {}", path.display());
    }
    Ok(())
}

async fn run_import(
    config_path: Option<&Path>,
    args: ImportArgs,
    profile: &str,
    expected_input: InputKind,
) -> anyhow::Result<()> {
    let config = Config::load(config_path, &args.overrides())?;
    let definition = load_profile(&config, profile)?;
    if definition.input != expected_input {
        let command = match definition.input {
            InputKind::Delimited => "import",
            InputKind::OcrText => "import-ocr",
        };
        bail!("profile '{}' reads {:?} input, use the `{}` command", profile, definition.input, command);
    }

    let store: Arc<dyn RemoteStorePort> = if config.dry_run {
        println!("🧪 Dry run: uploads go to an in-memory table");
        Arc::new(InMemoryStore::new(DuplicatePolicy::Reject))
    } else {
        remote_store(&config)?
    };

    let units = open_units(&definition, &args.input, args.delimiter)?;
    let use_case = ImportUseCase::new(store, config.upload.clone())
        .with_limit(config.limit)
        .with_dry_run(config.dry_run);
    use_case.probe().await.context("remote store is unreachable")?;

    println!("🚀 Importing {} with profile {}", args.input.display(), profile);
    let normalizer = RecordNormalizer::new(definition.normalizer);
    let stats = use_case.run(profile, &normalizer, units).await?;

    finish_summary(&stats, args.summary_json.as_deref())?;
    observability::push_all(&stats.run_id.to_string()).await;
    Ok(())
}

fn run_extract(
    config_path: Option<&Path>,
    input: &Path,
    output: &Path,
    profile: &str,
    delimiter: Option<Delimiter>,
    limit: Option<u64>,
    summary_json: Option<&Path>,
) -> anyhow::Result<()> {
    let overrides = ConfigOverrides {
        limit,
        ..ConfigOverrides::default()
    };
    let config = Config::load(config_path, &overrides)?;
    let definition = load_profile(&config, profile)?;
    let units = open_units(&definition, input, delimiter)?;
    let normalizer = RecordNormalizer::new(definition.normalizer);
    let mut sink = FileRecordOutputAdapter::create(output)?;

    println!("🔧 Extracting {} with profile {}", input.display(), profile);
    let stats = extract_records(profile, &normalizer, units, &mut sink, config.limit)?;
    println!("💾 Accepted records saved to {}", output.display());
    finish_summary(&stats, summary_json)
}

async fn run_count(config_path: Option<&Path>, by_category: bool, remote: &RemoteArgs) -> anyhow::Result<()> {
    let config = Config::load(config_path, &remote.overrides())?;
    let counter = CountUseCase::new(remote_store(&config)?);
    let total = counter.total().await?;
    println!("📊 {} rows in {}", total, config.table);
    if by_category {
        for (category, count) in counter.by_category().await? {
            println!("   {}: {}", category, count);
        }
    }
    info!("Counted {} rows", total);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = logging::init_logging();
    let cli = Cli::parse();

    if let Err(e) = observability::init("nutrition_seeder") {
        warn!("Metrics disabled: {}", e);
    }

    let config_path = cli.config.as_deref();
    let result = match cli.command {
        Commands::Import { args, profile } => run_import(config_path, args, &profile, InputKind::Delimited).await,
        Commands::ImportOcr { args, profile } => run_import(config_path, args, &profile, InputKind::OcrText).await,
        Commands::Extract {
            input,
            output,
            profile,
            delimiter,
            limit,
            summary_json,
        } => run_extract(config_path, &input, &output, &profile, delimiter, limit, summary_json.as_deref()),
        Commands::Count { by_category, remote } => run_count(config_path, by_category, &remote).await,
    };

    if let Err(e) = &result {
        error!("❌ {:#}", e);
    }
    result
}
