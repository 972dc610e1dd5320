use serde::Deserialize;

use crate::app::ports::{StoreError, StoreErrorKind};

/// Postgres unique violation
pub const PG_UNIQUE_VIOLATION: &str = "23505";
/// Postgres insufficient privilege (row-level security refusals land here)
pub const PG_INSUFFICIENT_PRIVILEGE: &str = "42501";

const CONFLICT_PHRASES: &[&str] = &["duplicate key", "unique constraint", "already exists"];
const UNAUTHORIZED_PHRASES: &[&str] = &["row-level security", "permission denied", "jwt", "invalid api key"];
const TRANSPORT_PHRASES: &[&str] = &["timed out", "timeout", "connection", "dns error"];

/// Decide what kind of failure a remote response represents.
///
/// Database error codes are the most specific signal, then the HTTP status;
/// message text is only consulted when neither settles it.
pub fn classify(status: Option<u16>, code: Option<&str>, message: &str) -> StoreErrorKind {
    match code {
        Some(PG_UNIQUE_VIOLATION) => return StoreErrorKind::Conflict,
        Some(PG_INSUFFICIENT_PRIVILEGE) => return StoreErrorKind::Unauthorized,
        // PostgREST's own JWT errors
        Some(c) if c.starts_with("PGRST30") => return StoreErrorKind::Unauthorized,
        _ => {}
    }

    match status {
        Some(409) => return StoreErrorKind::Conflict,
        Some(401) | Some(403) => return StoreErrorKind::Unauthorized,
        Some(408) | Some(429) => return StoreErrorKind::Transport,
        Some(s) if s >= 500 => return StoreErrorKind::Transport,
        _ => {}
    }

    let lowered = message.to_lowercase();
    let mentions = |phrases: &[&str]| phrases.iter().any(|p| lowered.contains(p));
    if mentions(CONFLICT_PHRASES) {
        StoreErrorKind::Conflict
    } else if mentions(UNAUTHORIZED_PHRASES) {
        StoreErrorKind::Unauthorized
    } else if mentions(TRANSPORT_PHRASES) {
        StoreErrorKind::Transport
    } else {
        StoreErrorKind::Other
    }
}

/// PostgREST error body
#[derive(Debug, Deserialize)]
struct PostgrestError {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

/// Build a [`StoreError`] from a non-success HTTP response.
pub fn from_response(status: u16, body: &str) -> StoreError {
    let parsed: Option<PostgrestError> = serde_json::from_str(body).ok();
    let (code, message) = match parsed {
        Some(err) => {
            let mut message = err.message.unwrap_or_default();
            if let Some(details) = err.details.filter(|d| !d.is_empty()) {
                message = format!("{} ({})", message, details);
            }
            (err.code, message)
        }
        None => (None, body.trim().to_string()),
    };

    let kind = classify(Some(status), code.as_deref(), &message);
    let mut error = StoreError::new(kind, message).with_status(status);
    if let Some(code) = code {
        error = error.with_code(code);
    }
    error
}

/// Build a [`StoreError`] from a client-side failure (connect, timeout, body decode).
pub fn from_reqwest(err: &reqwest::Error) -> StoreError {
    let status = err.status().map(|s| s.as_u16());
    let kind = if err.is_timeout() || err.is_connect() {
        StoreErrorKind::Transport
    } else {
        classify(status, None, &err.to_string())
    };
    let mut error = StoreError::new(kind, err.to_string());
    if let Some(status) = status {
        error = error.with_status(status);
    }
    error
}
