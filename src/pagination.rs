use serde::Deserialize;

/// Raw `?page=` query. Kept as a string so that junk values fall back to
/// the first page instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// A 1-based page of a fixed-size listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub per_page: u32,
}

impl Page {
    /// Missing, non-numeric or zero page numbers select page 1.
    pub fn from_query(raw: Option<&str>, per_page: u32) -> Self {
        let number = raw
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|n| n.is_finite() && *n >= 1.0)
            .map(|n| n.trunc().min(u32::MAX as f64) as u32)
            .unwrap_or(1);

        Self {
            number,
            per_page: per_page.max(1),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.number as i64 - 1) * self.per_page as i64
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}
