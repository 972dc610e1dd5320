//! Batched submission of records to the remote store.
//!
//! Records are buffered until a batch is full, then submitted as one upsert.
//! Each batch ends in exactly one [`BatchOutcome`]; nothing is retried as a
//! whole, and the per-record fallback runs at most once per batch.

use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::app::ports::{RemoteStorePort, StoreError, StoreErrorKind};
use crate::constants::{DEFAULT_BATCH_SIZE, DEFAULT_CONFLICT_KEY, ERROR_MESSAGE_LIMIT};
use crate::error::{Result, SeederError};
use crate::observability::metrics;
use crate::types::NutritionRecord;

/// Batching and retry settings
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOptions {
    pub batch_size: usize,
    /// Columns the remote unique constraint covers
    pub conflict_key: Vec<String>,
    /// Resubmit records one at a time after a non-conflict batch failure
    pub individual_retry: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            conflict_key: vec![DEFAULT_CONFLICT_KEY.to_string()],
            individual_retry: false,
        }
    }
}

impl UploadOptions {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(SeederError::Config("batch_size must be greater than 0".to_string()));
        }
        if self.conflict_key.is_empty() || self.conflict_key.iter().any(|c| c.trim().is_empty()) {
            return Err(SeederError::Config("conflict_key must name at least one column".to_string()));
        }
        Ok(())
    }
}

/// Terminal state of one submitted batch
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// Every record in the batch counts as imported
    Committed,
    /// The store refused the batch on its unique key
    DuplicateRejected,
    /// The batch failed and each record was resubmitted alone
    IndividualRetry { imported: u64, duplicates: u64, errors: u64 },
    /// The batch failed and its records count as errors
    Failed { kind: StoreErrorKind, message: String },
}

impl BatchOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            BatchOutcome::Committed => "committed",
            BatchOutcome::DuplicateRejected => "duplicate_rejected",
            BatchOutcome::IndividualRetry { .. } => "individual_retry",
            BatchOutcome::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// 1-based submission order
    pub index: u64,
    pub size: usize,
    pub outcome: BatchOutcome,
    pub elapsed: Duration,
}

/// Upload-side counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadTally {
    pub imported: u64,
    pub duplicate_conflicts: u64,
    pub other_errors: u64,
    /// Batch upserts sent, one per batch
    pub submissions: u64,
    /// Single-record upserts sent by the retry fallback
    pub retry_submissions: u64,
    pub batches: u64,
    pub committed_batches: u64,
    pub duplicate_batches: u64,
    pub retried_batches: u64,
    pub failed_batches: u64,
}

impl UploadTally {
    fn apply(&mut self, report: &BatchReport) {
        self.batches += 1;
        self.submissions += 1;
        match &report.outcome {
            BatchOutcome::Committed => {
                self.committed_batches += 1;
                self.imported += report.size as u64;
            }
            BatchOutcome::DuplicateRejected => {
                self.duplicate_batches += 1;
                self.duplicate_conflicts += 1;
            }
            BatchOutcome::IndividualRetry {
                imported,
                duplicates,
                errors,
            } => {
                self.retried_batches += 1;
                self.retry_submissions += report.size as u64;
                self.imported += imported;
                self.duplicate_conflicts += duplicates;
                self.other_errors += errors;
            }
            BatchOutcome::Failed { .. } => {
                self.failed_batches += 1;
                self.other_errors += report.size as u64;
            }
        }
    }
}

/// Cut a remote error message for logging, on a char boundary.
pub fn truncate_message(message: &str) -> String {
    match message.char_indices().nth(ERROR_MESSAGE_LIMIT) {
        Some((idx, _)) => format!("{}…", &message[..idx]),
        None => message.to_string(),
    }
}

/// Buffers records and drives each full batch through the outcome state machine.
pub struct BatchUploader {
    store: Arc<dyn RemoteStorePort>,
    options: UploadOptions,
    pending: Vec<NutritionRecord>,
    tally: UploadTally,
}

impl BatchUploader {
    pub fn new(store: Arc<dyn RemoteStorePort>, options: UploadOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            store,
            pending: Vec::with_capacity(options.batch_size),
            options,
            tally: UploadTally::default(),
        })
    }

    /// Buffer a record, submitting the batch when it reaches `batch_size`.
    pub async fn push(&mut self, record: NutritionRecord) -> Option<BatchReport> {
        self.pending.push(record);
        if self.pending.len() >= self.options.batch_size {
            self.flush().await
        } else {
            None
        }
    }

    /// Submit whatever is buffered, if anything.
    pub async fn flush(&mut self) -> Option<BatchReport> {
        if self.pending.is_empty() {
            return None;
        }
        let batch = std::mem::replace(&mut self.pending, Vec::with_capacity(self.options.batch_size));
        let report = self.submit(batch).await;
        self.tally.apply(&report);
        Some(report)
    }

    /// Flush the final partial batch and return the totals.
    pub async fn finish(mut self) -> UploadTally {
        self.flush().await;
        self.tally
    }

    /// Upload a whole sequence of records in batches.
    pub async fn upload_all<I>(mut self, records: I) -> UploadTally
    where
        I: IntoIterator<Item = NutritionRecord>,
    {
        for record in records {
            self.push(record).await;
        }
        self.finish().await
    }

    async fn submit(&self, batch: Vec<NutritionRecord>) -> BatchReport {
        let index = self.tally.batches + 1;
        let started = Instant::now();

        let outcome = match self.store.upsert(&batch, &self.options.conflict_key).await {
            Ok(()) => {
                metrics::upload::records_imported(batch.len() as u64);
                BatchOutcome::Committed
            }
            Err(err) if err.is_conflict() => {
                debug!("Batch {} hit duplicate key: {}", index, truncate_message(&err.message));
                metrics::upload::duplicate_conflicts(1);
                BatchOutcome::DuplicateRejected
            }
            Err(err) if self.options.individual_retry => {
                warn!(
                    "Batch {} failed ({}), retrying {} records individually: {}",
                    index,
                    err.kind,
                    batch.len(),
                    truncate_message(&err.message)
                );
                self.retry_individually(&batch).await
            }
            Err(err) => {
                warn!(
                    "❌ Batch {} failed ({}), {} records not imported: {}",
                    index,
                    err.kind,
                    batch.len(),
                    truncate_message(&err.message)
                );
                metrics::upload::errors(batch.len() as u64);
                BatchOutcome::Failed {
                    kind: err.kind,
                    message: truncate_message(&err.message),
                }
            }
        };

        let elapsed = started.elapsed();
        metrics::upload::batch_finished(outcome.label(), elapsed.as_secs_f64());
        info!(
            "Batch {}: {} records, {} in {:.2}s",
            index,
            batch.len(),
            outcome.label(),
            elapsed.as_secs_f64()
        );

        BatchReport {
            index,
            size: batch.len(),
            outcome,
            elapsed,
        }
    }

    async fn retry_individually(&self, batch: &[NutritionRecord]) -> BatchOutcome {
        let (mut imported, mut duplicates, mut errors) = (0u64, 0u64, 0u64);
        for record in batch {
            match self
                .store
                .upsert(std::slice::from_ref(record), &self.options.conflict_key)
                .await
            {
                Ok(()) => imported += 1,
                Err(StoreError {
                    kind: StoreErrorKind::Conflict,
                    ..
                }) => duplicates += 1,
                Err(err) => {
                    debug!("Record '{}' failed on retry: {}", record.name, truncate_message(&err.message));
                    errors += 1;
                }
            }
        }
        metrics::upload::records_imported(imported);
        metrics::upload::duplicate_conflicts(duplicates);
        metrics::upload::errors(errors);
        BatchOutcome::IndividualRetry {
            imported,
            duplicates,
            errors,
        }
    }
}
