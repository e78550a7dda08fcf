//! Input validation for paper records
//!
//! Pure checks run before anything reaches the store:
//! - Paper payloads (all findings are collected, never fail-fast)
//! - Path identifiers
//! - List query parameters

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::{NewPaper, PaperFilter};
use crate::errors::{AppError, Result};

/// Years must be strictly greater than this
pub const MIN_YEAR_EXCLUSIVE: i64 = 1900;

pub const TITLE_REQUIRED: &str = "Title is required";
pub const AUTHORS_REQUIRED: &str = "Authors are required";
pub const VENUE_REQUIRED: &str = "Published venue is required";
pub const YEAR_REQUIRED: &str = "Published year is required";
pub const YEAR_INVALID: &str = "Valid year after 1900 is required";

/// Incoming paper body as the client sent it.
///
/// Every field is kept as raw JSON so a payload with missing or mistyped
/// fields still deserializes and can be reported on in full. Fields the
/// store assigns (`id`, `created_at`, `updated_at`) are not part of the
/// payload and are dropped on deserialization.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PaperPayload {
    #[serde(default)]
    pub title: Option<Value>,
    #[serde(default)]
    pub authors: Option<Value>,
    #[serde(default)]
    pub published_in: Option<Value>,
    #[serde(default)]
    pub year: Option<Value>,
}

impl PaperPayload {
    /// Build a well-typed payload
    pub fn new(
        title: impl Into<String>,
        authors: impl Into<String>,
        published_in: impl Into<String>,
        year: i64,
    ) -> Self {
        Self {
            title: Some(Value::String(title.into())),
            authors: Some(Value::String(authors.into())),
            published_in: Some(Value::String(published_in.into())),
            year: Some(Value::from(year)),
        }
    }

    /// Read a parsed JSON body. Anything but an object carries no fields.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(_) => serde_json::from_value(value).unwrap_or_default(),
            _ => Self::default(),
        }
    }

    /// Validate and convert into a record the store accepts
    pub fn into_record(&self) -> Result<NewPaper> {
        self.check()
            .map_err(|messages| AppError::Validation { messages })
    }

    fn check(&self) -> std::result::Result<NewPaper, Vec<String>> {
        let mut messages = Vec::new();

        let title = required_text(self.title.as_ref());
        if title.is_none() {
            messages.push(TITLE_REQUIRED.to_string());
        }

        let authors = required_text(self.authors.as_ref());
        if authors.is_none() {
            messages.push(AUTHORS_REQUIRED.to_string());
        }

        let published_in = required_text(self.published_in.as_ref());
        if published_in.is_none() {
            messages.push(VENUE_REQUIRED.to_string());
        }

        let year = match self.year.as_ref().map(parse_year) {
            None | Some(YearField::Blank) => {
                messages.push(YEAR_REQUIRED.to_string());
                None
            }
            Some(YearField::Invalid) => {
                messages.push(YEAR_INVALID.to_string());
                None
            }
            Some(YearField::Valid(year)) => Some(year),
        };

        match (title, authors, published_in, year) {
            (Some(title), Some(authors), Some(published_in), Some(year)) => Ok(NewPaper {
                title: title.to_string(),
                authors: authors.to_string(),
                published_in: published_in.to_string(),
                year,
            }),
            _ => Err(messages),
        }
    }
}

/// Check a payload against the field rules.
///
/// Returns every violation in field order: title, authors, published_in,
/// year. An empty list means the payload is valid.
pub fn validate_paper(payload: &PaperPayload) -> Vec<String> {
    match payload.check() {
        Ok(_) => Vec::new(),
        Err(messages) => messages,
    }
}

/// Parse a path identifier: one or more decimal digits, value >= 1
pub fn validate_id(raw: &str) -> Result<i64> {
    let invalid = || AppError::InvalidIdentifier {
        raw: raw.to_string(),
    };

    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    match raw.parse::<i64>() {
        Ok(id) if id >= 1 => Ok(id),
        _ => Err(invalid()),
    }
}

/// Raw list query parameters. Unknown keys are ignored.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ListQuery {
    pub year: Option<String>,
    pub published_in: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

/// Turn raw query parameters into a store filter.
///
/// Blank parameters count as absent; absent pagination falls back to the
/// defaults.
pub fn validate_filter(query: &ListQuery) -> Result<PaperFilter> {
    let mut filter = PaperFilter::new();

    if let Some(raw) = non_blank(query.year.as_deref()) {
        let year = raw
            .parse::<i64>()
            .ok()
            .filter(|y| *y > MIN_YEAR_EXCLUSIVE)
            .and_then(|y| i32::try_from(y).ok())
            .ok_or_else(|| AppError::InvalidFilter {
                message: format!("year must be an integer after {}", MIN_YEAR_EXCLUSIVE),
            })?;
        filter = filter.with_year(year);
    }

    if let Some(venue) = non_blank(query.published_in.as_deref()) {
        filter = filter.with_published_in(venue);
    }

    let limit = match non_blank(query.limit.as_deref()) {
        Some(raw) => raw.parse::<u64>().map_err(|_| AppError::InvalidFilter {
            message: "limit must be an integer between 1 and 100".to_string(),
        })?,
        None => filter.limit(),
    };

    let offset = match non_blank(query.offset.as_deref()) {
        Some(raw) => raw.parse::<u64>().map_err(|_| AppError::InvalidFilter {
            message: "offset must be a non-negative integer".to_string(),
        })?,
        None => filter.offset(),
    };

    filter.with_page(limit, offset)
}

enum YearField {
    Blank,
    Invalid,
    Valid(i32),
}

fn parse_year(value: &Value) -> YearField {
    let year = match value {
        Value::Null => return YearField::Blank,
        Value::String(s) if s.trim().is_empty() => return YearField::Blank,
        Value::String(s) => integer_from_str(s.trim()),
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integer_from_f64)),
        _ => None,
    };

    match year
        .filter(|y| *y > MIN_YEAR_EXCLUSIVE)
        .and_then(|y| i32::try_from(y).ok())
    {
        Some(year) => YearField::Valid(year),
        None => YearField::Invalid,
    }
}

fn integer_from_str(s: &str) -> Option<i64> {
    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().and_then(integer_from_f64))
}

fn integer_from_f64(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn required_text(value: Option<&Value>) -> Option<&str> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.as_str()),
        _ => None,
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}
