use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

use crate::error::Result as SeederResult;
use crate::types::NutritionRecord;

/// Coarse classification of a failed remote call; drives the batch state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreErrorKind {
    /// Unique-key violation; the rows already exist
    Conflict,
    /// Network failure, timeout or 5xx
    Transport,
    /// Bad credentials or row-level security refusal
    Unauthorized,
    Other,
}

impl StoreErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreErrorKind::Conflict => "conflict",
            StoreErrorKind::Transport => "transport",
            StoreErrorKind::Unauthorized => "unauthorized",
            StoreErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure from a [`RemoteStorePort`] call
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} error (status {status:?}, code {code:?}): {message}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub status: Option<u16>,
    pub code: Option<String>,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn is_conflict(&self) -> bool {
        self.kind == StoreErrorKind::Conflict
    }
}

/// Equality filter for row counts (`column = value`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountFilter {
    pub column: String,
    pub value: String,
}

impl CountFilter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// Remote table the seeder writes into
#[async_trait]
pub trait RemoteStorePort: Send + Sync {
    /// Insert `records`, ignoring rows whose `conflict_key` columns already exist.
    async fn upsert(&self, records: &[NutritionRecord], conflict_key: &[String]) -> Result<(), StoreError>;

    /// Number of rows, optionally restricted by an equality filter.
    async fn count(&self, filter: Option<&CountFilter>) -> Result<u64, StoreError>;
}

/// Destination for accepted records when extracting without uploading
pub trait RecordOutputPort {
    fn write_record(&mut self, record: &NutritionRecord) -> SeederResult<()>;

    /// Flush buffered output. Called once after the last record.
    fn finish(&mut self) -> SeederResult<()>;
}
