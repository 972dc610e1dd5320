use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use crate::app::ports::{CountFilter, RemoteStorePort, StoreError, StoreErrorKind};
use crate::infra::error_classifier::PG_UNIQUE_VIOLATION;
use crate::types::NutritionRecord;

/// What the store does with a row whose conflict key already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Skip the row and accept the rest, like `resolution=ignore-duplicates`
    Ignore,
    /// Refuse the whole submission with a unique violation
    Reject,
}

#[derive(Default)]
struct State {
    rows: Vec<NutritionRecord>,
    keys: HashSet<Vec<String>>,
    submissions: Vec<usize>,
    scripted_failures: VecDeque<StoreError>,
}

/// In-memory remote store for dry runs and tests.
///
/// Enforces the conflict key the same way the `foods` table does. Each upsert is
/// all-or-nothing.
#[derive(Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
    policy: DuplicatePolicy,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(DuplicatePolicy::Reject)
    }
}

impl InMemoryStore {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            policy,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock leaves plain data behind; keep going
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make the next upsert calls fail with these errors, in order.
    pub fn fail_next(&self, errors: impl IntoIterator<Item = StoreError>) {
        self.lock().scripted_failures.extend(errors);
    }

    /// Preload rows as if they were imported by an earlier run.
    pub fn seed(&self, records: impl IntoIterator<Item = NutritionRecord>, conflict_key: &[String]) {
        let mut state = self.lock();
        for record in records {
            state.keys.insert(key_of(&record, conflict_key));
            state.rows.push(record);
        }
    }

    pub fn rows(&self) -> Vec<NutritionRecord> {
        self.lock().rows.clone()
    }

    /// Size of every upsert call received, in order, including failed ones.
    pub fn submissions(&self) -> Vec<usize> {
        self.lock().submissions.clone()
    }
}

fn key_of(record: &NutritionRecord, conflict_key: &[String]) -> Vec<String> {
    conflict_key
        .iter()
        .map(|column| record.key_value(column).unwrap_or_default())
        .collect()
}

#[async_trait]
impl RemoteStorePort for InMemoryStore {
    async fn upsert(&self, records: &[NutritionRecord], conflict_key: &[String]) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.submissions.push(records.len());

        if let Some(err) = state.scripted_failures.pop_front() {
            return Err(err);
        }

        let mut batch_keys = HashSet::new();
        let mut fresh = Vec::with_capacity(records.len());
        for record in records {
            let key = key_of(record, conflict_key);
            let duplicate = state.keys.contains(&key) || !batch_keys.insert(key.clone());
            if duplicate {
                match self.policy {
                    DuplicatePolicy::Ignore => continue,
                    DuplicatePolicy::Reject => {
                        return Err(StoreError::new(
                            StoreErrorKind::Conflict,
                            format!("duplicate key value violates unique constraint: ({})", key.join(", ")),
                        )
                        .with_status(409)
                        .with_code(PG_UNIQUE_VIOLATION));
                    }
                }
            }
            fresh.push((key, record.clone()));
        }

        debug!("In-memory store accepted {} of {} rows", fresh.len(), records.len());
        for (key, record) in fresh {
            state.keys.insert(key);
            state.rows.push(record);
        }
        Ok(())
    }

    async fn count(&self, filter: Option<&CountFilter>) -> Result<u64, StoreError> {
        let state = self.lock();
        let count = match filter {
            None => state.rows.len(),
            Some(f) => state
                .rows
                .iter()
                .filter(|r| r.key_value(&f.column).as_deref() == Some(f.value.as_str()))
                .count(),
        };
        Ok(count as u64)
    }
}
