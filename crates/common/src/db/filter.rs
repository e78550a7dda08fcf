//! List filters for the papers table

use crate::errors::{AppError, Result};

pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 100;

/// Predicates and pagination for a list call.
///
/// `year` is an exact match, `published_in` a case-insensitive substring
/// match; both combine with AND. Pagination is always applied and the limit
/// is kept within `1..=100`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperFilter {
    year: Option<i32>,
    published_in: Option<String>,
    limit: u64,
    offset: u64,
}

impl Default for PaperFilter {
    fn default() -> Self {
        Self {
            year: None,
            published_in: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl PaperFilter {
    /// No predicates, first page of ten
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_published_in(mut self, venue: impl Into<String>) -> Self {
        self.published_in = Some(venue.into());
        self
    }

    /// Set the page window, rejecting a limit outside `1..=100`
    pub fn with_page(mut self, limit: u64, offset: u64) -> Result<Self> {
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(AppError::InvalidFilter {
                message: format!("limit must be an integer between 1 and {}", MAX_LIMIT),
            });
        }
        self.limit = limit;
        self.offset = offset;
        Ok(self)
    }

    pub fn year(&self) -> Option<i32> {
        self.year
    }

    pub fn published_in(&self) -> Option<&str> {
        self.published_in.as_deref()
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }
}

/// LIKE pattern matching `needle` anywhere, lowercased, wildcards escaped with `\`
pub(crate) fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_bounds() {
        assert!(PaperFilter::new().with_page(1, 0).is_ok());
        assert!(PaperFilter::new().with_page(100, 500).is_ok());
        assert!(PaperFilter::new().with_page(0, 0).is_err());
        assert!(PaperFilter::new().with_page(101, 0).is_err());
    }

    #[test]
    fn test_builder_keeps_predicates() {
        let filter = PaperFilter::new()
            .with_year(2023)
            .with_published_in("ICSE")
            .with_page(2, 4)
            .unwrap();
        assert_eq!(filter.year(), Some(2023));
        assert_eq!(filter.published_in(), Some("ICSE"));
        assert_eq!((filter.limit(), filter.offset()), (2, 4));
    }

    #[test]
    fn test_contains_pattern() {
        assert_eq!(contains_pattern("ICSE"), "%icse%");
        assert_eq!(contains_pattern("100%_x\\"), "%100\\%\\_x\\\\%");
    }
}
