/// Parse raw numeric text from a source column.
///
/// Accepts surrounding whitespace and a single decimal comma ("2,7").
/// Returns `None` for blank text, unparseable text and non-finite values.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let parsed = if trimmed.contains(',') && !trimmed.contains('.') && trimmed.matches(',').count() == 1 {
        trimmed.replace(',', ".").parse::<f64>()
    } else {
        trimmed.parse::<f64>()
    };

    parsed.ok().filter(|v| v.is_finite())
}

/// Numeric coercion with a caller-supplied fallback. Never fails.
pub fn coerce_number(raw: Option<&str>, default: f64) -> f64 {
    raw.and_then(parse_number).unwrap_or(default)
}
