use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

use crate::error::Result;
use crate::pipeline::ingestion::SkipReason;
use crate::pipeline::processing::quality_gate::RejectReason;
use crate::pipeline::upload::UploadTally;

/// Counters for one import run, printed at the end and optionally saved as JSON
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub profile: String,
    pub dry_run: bool,
    pub units_read: u64,
    pub skipped_at_extraction: u64,
    pub skipped_by_reason: BTreeMap<String, u64>,
    /// Records produced by the normalizer and handed to the uploader
    pub accepted: u64,
    pub rejected_at_validation: u64,
    pub rejected_by_reason: BTreeMap<String, u64>,
    #[serde(flatten)]
    pub upload: UploadTally,
    pub elapsed_secs: f64,
    /// Source units read per second
    pub throughput: f64,
}

impl RunStats {
    pub fn new(profile: impl Into<String>, dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            profile: profile.into(),
            dry_run,
            units_read: 0,
            skipped_at_extraction: 0,
            skipped_by_reason: BTreeMap::new(),
            accepted: 0,
            rejected_at_validation: 0,
            rejected_by_reason: BTreeMap::new(),
            upload: UploadTally::default(),
            elapsed_secs: 0.0,
            throughput: 0.0,
        }
    }

    pub fn record_skip(&mut self, reason: SkipReason) {
        self.skipped_at_extraction += 1;
        *self.skipped_by_reason.entry(reason.to_string()).or_insert(0) += 1;
    }

    pub fn record_rejection(&mut self, reason: &RejectReason) {
        self.rejected_at_validation += 1;
        *self.rejected_by_reason.entry(reason.to_string()).or_insert(0) += 1;
    }

    pub fn finish(&mut self, upload: UploadTally, elapsed: Duration) {
        self.upload = upload;
        self.elapsed_secs = elapsed.as_secs_f64();
        self.throughput = if self.elapsed_secs > 0.0 {
            self.units_read as f64 / self.elapsed_secs
        } else {
            0.0
        };
    }

    pub fn imported(&self) -> u64 {
        self.upload.imported
    }

    pub fn duplicate_conflicts(&self) -> u64 {
        self.upload.duplicate_conflicts
    }

    pub fn other_errors(&self) -> u64 {
        self.upload.other_errors
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn print_summary(&self) {
        let mode = if self.dry_run { " (dry run)" } else { "" };
        println!("\n📊 Import Results for {}{}:", self.profile, mode);
        println!("   Run id: {}", self.run_id);
        println!("   Units read: {}", self.units_read);
        println!("   Skipped at extraction: {}", self.skipped_at_extraction);
        for (reason, count) in &self.skipped_by_reason {
            println!("      {}: {}", reason, count);
        }
        println!("   Rejected at validation: {}", self.rejected_at_validation);
        for (reason, count) in &self.rejected_by_reason {
            println!("      {}: {}", reason, count);
        }
        println!("   ✅ Imported: {}", self.upload.imported);
        println!("   🔁 Duplicate conflicts: {}", self.upload.duplicate_conflicts);
        println!("   ❌ Other errors: {}", self.upload.other_errors);
        println!(
            "   Batches: {} ({} committed, {} duplicate, {} retried, {} failed)",
            self.upload.batches,
            self.upload.committed_batches,
            self.upload.duplicate_batches,
            self.upload.retried_batches,
            self.upload.failed_batches
        );
        println!("   Elapsed: {:.2}s ({:.0} units/s)", self.elapsed_secs, self.throughput);
    }
}
