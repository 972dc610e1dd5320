use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::app::ports::{RecordOutputPort, RemoteStorePort};
use crate::app::run_stats::RunStats;
use crate::constants::REJECTION_SAMPLE_LIMIT;
use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::ingestion::{DelimitedSource, Delimiter, Extraction, OcrLineExtractor, OcrTextSource};
use crate::pipeline::processing::normalize::normalizers::{InputKind, ProfileDefinition};
use crate::pipeline::processing::normalize::Normalizer;
use crate::pipeline::upload::{BatchUploader, UploadOptions};
use crate::types::NutritionRecord;

/// Forward-only stream of extracted units
pub type Units = Box<dyn Iterator<Item = Extraction> + Send>;

/// Open `path` with the extractor the profile calls for.
///
/// `delimiter` overrides the profile's (or detected) delimiter for delimited input.
pub fn open_units(definition: &ProfileDefinition, path: &Path, delimiter: Option<Delimiter>) -> Result<Units> {
    match definition.input {
        InputKind::Delimited => {
            let mut options = definition.delimited.clone();
            if delimiter.is_some() {
                options.delimiter = delimiter;
            }
            Ok(Box::new(DelimitedSource::open(path, &options)?))
        }
        InputKind::OcrText => {
            let extractor = OcrLineExtractor::new(definition.ocr.clone())?;
            let lines = OcrTextSource::open(path)?;
            Ok(Box::new(extractor.extract_lines(lines)))
        }
    }
}

/// Runs units through the normalizer, tallying skips and rejections, and yields
/// only the accepted records.
pub struct AcceptedRecords<'a, I> {
    units: I,
    normalizer: &'a dyn Normalizer,
    stats: &'a mut RunStats,
    limit: Option<u64>,
    samples_logged: usize,
}

impl<'a, I: Iterator<Item = Extraction>> AcceptedRecords<'a, I> {
    pub fn new(units: I, normalizer: &'a dyn Normalizer, stats: &'a mut RunStats, limit: Option<u64>) -> Self {
        Self {
            units,
            normalizer,
            stats,
            limit,
            samples_logged: 0,
        }
    }
}

impl<I: Iterator<Item = Extraction>> Iterator for AcceptedRecords<'_, I> {
    type Item = NutritionRecord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.limit.is_some_and(|limit| self.stats.units_read >= limit) {
                return None;
            }
            let unit = self.units.next()?;
            self.stats.units_read += 1;
            metrics::extract::unit_read();

            let row = match unit {
                Extraction::Row(row) => row,
                Extraction::Skip(reason) => {
                    debug!("Skipped unit {}: {}", self.stats.units_read, reason);
                    metrics::extract::unit_skipped(reason.as_str());
                    self.stats.record_skip(reason);
                    continue;
                }
            };

            match self.normalizer.normalize(&row) {
                Ok(record) => {
                    self.stats.accepted += 1;
                    return Some(record);
                }
                Err(reason) => {
                    if self.samples_logged < REJECTION_SAMPLE_LIMIT {
                        self.samples_logged += 1;
                        info!("Rejected row {}: {}", row.position(), reason);
                    } else {
                        debug!("Rejected row {}: {}", row.position(), reason);
                    }
                    metrics::normalize::record_rejected(reason.code());
                    self.stats.record_rejection(&reason);
                }
            }
        }
    }
}

/// Use case wiring extractor, normalizer and uploader into one pass
pub struct ImportUseCase {
    store: Arc<dyn RemoteStorePort>,
    upload: UploadOptions,
    limit: Option<u64>,
    dry_run: bool,
}

impl ImportUseCase {
    pub fn new(store: Arc<dyn RemoteStorePort>, upload: UploadOptions) -> Self {
        Self {
            store,
            upload,
            limit: None,
            dry_run: false,
        }
    }

    /// Stop after this many source units
    pub fn with_limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    /// Mark the run as a dry run in its summary
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Check the store answers before reading any input. Returns the existing row count.
    #[instrument(skip(self))]
    pub async fn probe(&self) -> Result<u64> {
        info!("🔌 Connecting to remote store...");
        let existing = self.store.count(None).await?;
        info!("✅ Connected, {} rows already present", existing);
        Ok(existing)
    }

    /// Import every accepted record from `units`.
    ///
    /// Only configuration problems are errors; bad units and failed batches are counted.
    #[instrument(skip(self, normalizer, units))]
    pub async fn run<I>(&self, profile: &str, normalizer: &dyn Normalizer, units: I) -> Result<RunStats>
    where
        I: Iterator<Item = Extraction> + Send,
    {
        let started = Instant::now();
        let mut stats = RunStats::new(profile, self.dry_run);
        let mut uploader = BatchUploader::new(Arc::clone(&self.store), self.upload.clone())?;

        info!(
            "🚀 Starting import for {} (batch size {}, conflict key {:?})",
            profile, self.upload.batch_size, self.upload.conflict_key
        );

        for record in AcceptedRecords::new(units, normalizer, &mut stats, self.limit) {
            if let Some(report) = uploader.push(record).await {
                debug!("Batch {} done: {}", report.index, report.outcome.label());
            }
        }

        if self.limit.is_some_and(|limit| stats.units_read >= limit) {
            info!("Stopped after reaching the limit of {} units", stats.units_read);
        }

        let tally = uploader.finish().await;
        stats.finish(tally, started.elapsed());

        if stats.other_errors() > 0 {
            warn!("{} records failed to upload", stats.other_errors());
        }
        info!(
            "🏁 Import finished: {} imported, {} rejected, {} skipped, {} duplicate conflicts, {} errors",
            stats.imported(),
            stats.rejected_at_validation,
            stats.skipped_at_extraction,
            stats.duplicate_conflicts(),
            stats.other_errors()
        );
        Ok(stats)
    }
}

/// Run extraction and normalization only, writing accepted records to `output`.
#[instrument(skip(normalizer, units, output))]
pub fn extract_records<I>(
    profile: &str,
    normalizer: &dyn Normalizer,
    units: I,
    output: &mut dyn RecordOutputPort,
    limit: Option<u64>,
) -> Result<RunStats>
where
    I: Iterator<Item = Extraction>,
{
    let started = Instant::now();
    let mut stats = RunStats::new(profile, true);
    let mut written = 0u64;
    for record in AcceptedRecords::new(units, normalizer, &mut stats, limit) {
        output.write_record(&record)?;
        written += 1;
    }
    output.finish()?;
    info!("💾 Wrote {} records", written);

    stats.finish(Default::default(), started.elapsed());
    Ok(stats)
}
