use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_RANGE};
use std::time::Duration;
use serde_json::{Map, Value};
use tracing::debug;

use super::column_mapping::ColumnMapping;
use super::error_classifier;
use crate::app::ports::{CountFilter, RemoteStorePort, StoreError, StoreErrorKind};
use crate::error::{Result, SeederError};
use crate::types::NutritionRecord;

const PREFER_IGNORE_DUPLICATES: &str = "resolution=ignore-duplicates,return=minimal";
const PREFER_COUNT_EXACT: &str = "count=exact";

/// PostgREST table behind a Supabase project.
///
/// Authenticates with both `apikey` and `Authorization: Bearer` headers, which
/// is what Supabase expects for service-role and anon keys alike.
pub struct SupabaseStore {
    client: reqwest::Client,
    base_url: String,
    table: String,
    key: String,
    columns: ColumnMapping,
}

impl SupabaseStore {
    pub fn new(url: &str, key: &str, table: &str, timeout: Duration) -> Result<Self> {
        if url.trim().is_empty() {
            return Err(SeederError::Config("Supabase URL is empty".to_string()));
        }
        if key.trim().is_empty() {
            return Err(SeederError::Config("Supabase key is empty".to_string()));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            table: table.to_string(),
            key: key.to_string(),
            columns: ColumnMapping::default(),
        })
    }

    /// Send records through this column mapping instead of the `foods` default
    pub fn with_columns(mut self, columns: ColumnMapping) -> Result<Self> {
        columns.validate()?;
        self.columns = columns;
        Ok(self)
    }

    /// JSON rows for one upsert, in the remote table's column names
    pub fn upsert_body(&self, records: &[NutritionRecord]) -> std::result::Result<Vec<Map<String, Value>>, StoreError> {
        self.columns
            .project(records)
            .map_err(|e| StoreError::new(StoreErrorKind::Other, format!("could not build upsert body: {}", e)))
    }

    /// `on_conflict` value, with conflict key fields mapped to column names
    pub fn on_conflict(&self, conflict_key: &[String]) -> String {
        conflict_key
            .iter()
            .map(|field| self.columns.column(field))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn auth_headers(&self) -> std::result::Result<HeaderMap, StoreError> {
        let invalid = |_| StoreError::new(StoreErrorKind::Unauthorized, "Supabase key is not a valid header value");
        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_str(&self.key).map_err(invalid)?);
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {}", self.key)).map_err(invalid)?,
        );
        Ok(headers)
    }

    async fn error_from(resp: reqwest::Response) -> StoreError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        error_classifier::from_response(status, &body)
    }
}

/// Total from a PostgREST `Content-Range` value ("0-24/3573", "*/0").
pub fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit_once('/').and_then(|(_, total)| total.trim().parse().ok())
}

#[async_trait]
impl RemoteStorePort for SupabaseStore {
    async fn upsert(&self, records: &[NutritionRecord], conflict_key: &[String]) -> std::result::Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let body = self.upsert_body(records)?;
        let resp = self
            .client
            .post(self.endpoint())
            .headers(self.auth_headers()?)
            .header("Prefer", PREFER_IGNORE_DUPLICATES)
            .query(&[("on_conflict", self.on_conflict(conflict_key))])
            .json(&body)
            .send()
            .await
            .map_err(|e| error_classifier::from_reqwest(&e))?;

        if resp.status().is_success() {
            debug!("Upserted {} records into {}", records.len(), self.table);
            Ok(())
        } else {
            Err(Self::error_from(resp).await)
        }
    }

    async fn count(&self, filter: Option<&CountFilter>) -> std::result::Result<u64, StoreError> {
        let mut query = vec![("select".to_string(), "*".to_string())];
        if let Some(f) = filter {
            query.push((self.columns.column(&f.column).to_string(), format!("eq.{}", f.value)));
        }

        let resp = self
            .client
            .head(self.endpoint())
            .headers(self.auth_headers()?)
            .header("Prefer", PREFER_COUNT_EXACT)
            .query(&query)
            .send()
            .await
            .map_err(|e| error_classifier::from_reqwest(&e))?;

        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }

        resp.headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range)
            .ok_or_else(|| StoreError::new(StoreErrorKind::Other, "count response had no Content-Range total"))
    }
}
