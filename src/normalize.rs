use chrono::NaiveDate;

/// Domain plausibility window for the silver quote, CNY/kg.
pub const PLAUSIBLE_MIN: u32 = 8_000;
pub const PLAUSIBLE_MAX: u32 = 12_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    Empty,
    NonNumeric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizedPrice {
    /// Numeric and inside the plausibility window.
    Valid(u32),
    /// Numeric but outside the window. Returned, not discarded; the caller
    /// decides whether to persist it.
    Implausible(u32),
    Invalid(InvalidReason),
}

pub struct PriceNormalizer {
    min: u32,
    max: u32,
}

impl PriceNormalizer {
    pub fn new() -> Self {
        Self::with_window(PLAUSIBLE_MIN, PLAUSIBLE_MAX)
    }

    pub fn with_window(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// Strips thousands separators and whitespace; the remainder must be
    /// entirely numeric or the result is invalid with a reason.
    pub fn normalize(&self, raw: &str) -> NormalizedPrice {
        let cleaned: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ',')
            .collect();
        if cleaned.is_empty() {
            return NormalizedPrice::Invalid(InvalidReason::Empty);
        }
        match cleaned.parse::<u32>() {
            Ok(n) if n >= self.min && n <= self.max => NormalizedPrice::Valid(n),
            Ok(n) => NormalizedPrice::Implausible(n),
            Err(_) => NormalizedPrice::Invalid(InvalidReason::NonNumeric),
        }
    }
}

impl Default for PriceNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedDate {
    pub date: NaiveDate,
    /// False when every format failed and the capture date was substituted.
    pub normalized: bool,
}

// Same precedence the page has been observed to need: month-name forms first
// (after scrubbing), then the slash/hyphen forms on the raw text.
const MONTH_NAME_FORMATS: &[&str] = &["%b %d, %Y", "%B %d, %Y"];
const NUMERIC_FORMATS: &[&str] = &["%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y"];

pub struct DateNormalizer;

impl DateNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Parses raw date text into a calendar date. Never fails: exhausting all
    /// formats substitutes `capture_date` with `normalized = false`.
    pub fn normalize(&self, raw: &str, capture_date: NaiveDate) -> NormalizedDate {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return NormalizedDate {
                date: capture_date,
                normalized: false,
            };
        }

        // Already ISO: parse and return as-is, so normalization is idempotent.
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return NormalizedDate {
                date,
                normalized: true,
            };
        }

        let scrubbed = scrub(trimmed);
        for format in MONTH_NAME_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(&scrubbed, format) {
                return NormalizedDate {
                    date,
                    normalized: true,
                };
            }
        }
        for format in NUMERIC_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
                return NormalizedDate {
                    date,
                    normalized: true,
                };
            }
        }

        NormalizedDate {
            date: capture_date,
            normalized: false,
        }
    }
}

impl Default for DateNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop everything but alphanumerics, comma and space, then collapse runs of
/// spaces, so "Jul. 24,  2025" still hits the month-name formats.
fn scrub(raw: &str) -> String {
    let kept: String = raw
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ',' {
                c
            } else {
                ' '
            }
        })
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}
