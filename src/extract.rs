use std::fmt;

use regex::Regex;

use crate::normalize::{PLAUSIBLE_MAX, PLAUSIBLE_MIN};
use crate::render::PageSession;

/// The currency-per-mass suffix that marks a token as a price rather than an
/// arbitrary number.
pub const UNIT_MARKER: &str = "CNY/kg";

/// Keyword anchoring the contextual-window price tier; the quote of interest
/// is labeled "Original" on the page.
const CONTEXT_KEYWORD: &str = "Original";
const CONTEXT_WINDOW_CHARS: usize = 200;

const PRICE_SELECTOR: &str = r#"div[class*="price"], span[class*="price"]"#;
const DATE_SELECTOR: &str = r#"time, div[class*="date"], span[class*="date"]"#;

/// Which cascade tier produced a candidate. Tier order is a design invariant:
/// reordering changes precedence. Names follow the price cascade; the date
/// cascade maps onto the same tiers (its "signature" is the observed
/// month-name form, its third tier the ISO pattern).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Structured,
    Signature,
    ContextWindow,
    BroadScan,
}

impl Strategy {
    pub fn tier(self) -> u8 {
        match self {
            Strategy::Structured => 1,
            Strategy::Signature => 2,
            Strategy::ContextWindow => 3,
            Strategy::BroadScan => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Structured => "structured",
            Strategy::Signature => "signature",
            Strategy::ContextWindow => "context_window",
            Strategy::BroadScan => "broad_scan",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw candidate for one field, tagged with provenance, or an explicit miss.
/// Extraction never errors on a miss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    Matched { raw: String, strategy: Strategy },
    Unmatched,
}

impl Extracted {
    fn matched(raw: impl Into<String>, strategy: Strategy) -> Self {
        Extracted::Matched {
            raw: raw.into(),
            strategy,
        }
    }
}

/// Runs the ordered strategy cascades over a rendered page. Deterministic for
/// identical page content; first tier to produce a candidate wins and later
/// tiers are not attempted.
pub struct Extractor {
    signature_re: Regex,
    broad_re: Regex,
    month_date_re: Regex,
    iso_date_re: Regex,
}

impl Extractor {
    pub fn new() -> anyhow::Result<Self> {
        let marker = regex::escape(UNIT_MARKER);
        // The exact shape previously observed on the page: thousands-grouped
        // digits right before the unit marker, e.g. "9,351 CNY/kg".
        let signature_re = Regex::new(&format!(r"(\d{{1,3}},\d{{3}})\s*{marker}"))?;
        // Any grouped-or-plain digit run followed by the unit marker.
        let broad_re = Regex::new(&format!(r"(\d+(?:,\d{{3}})*)\s*{marker}"))?;
        let month_date_re = Regex::new(r"[A-Z][a-z]{2,8}\.?\s+\d{1,2},\s+\d{4}")?;
        let iso_date_re = Regex::new(r"\b\d{4}-\d{2}-\d{2}\b")?;
        Ok(Self {
            signature_re,
            broad_re,
            month_date_re,
            iso_date_re,
        })
    }

    pub fn extract_price(&self, page: &dyn PageSession) -> Extracted {
        // Tier 1: semantically tagged price elements.
        for candidate in page.select_text(PRICE_SELECTOR) {
            if candidate.contains(UNIT_MARKER) && candidate.chars().any(|c| c.is_ascii_digit()) {
                if let Some(caps) = self.broad_re.captures(&candidate) {
                    return Extracted::matched(&caps[1], Strategy::Structured);
                }
            }
        }

        let body = page.body_text();

        // Tier 2: the previously-observed exact signature.
        if let Some(caps) = self.signature_re.captures(body) {
            return Extracted::matched(&caps[1], Strategy::Signature);
        }

        // Tier 3: bounded window trailing the context keyword.
        if let Some(idx) = body.find(CONTEXT_KEYWORD) {
            let window: String = body[idx + CONTEXT_KEYWORD.len()..]
                .chars()
                .take(CONTEXT_WINDOW_CHARS)
                .collect();
            if let Some(caps) = self.broad_re.captures(&window) {
                return Extracted::matched(&caps[1], Strategy::ContextWindow);
            }
        }

        // Tier 4: broad scan. Prefer the first in-window match; otherwise keep
        // the first match at all rather than dropping it (the normalizer will
        // flag it implausible downstream).
        let mut first: Option<String> = None;
        for caps in self.broad_re.captures_iter(body) {
            let raw = caps[1].to_string();
            if let Ok(n) = raw.replace(',', "").parse::<u32>() {
                if (PLAUSIBLE_MIN..=PLAUSIBLE_MAX).contains(&n) {
                    return Extracted::matched(raw, Strategy::BroadScan);
                }
            }
            first.get_or_insert(raw);
        }
        match first {
            Some(raw) => Extracted::matched(raw, Strategy::BroadScan),
            None => Extracted::Unmatched,
        }
    }

    pub fn extract_date(&self, page: &dyn PageSession) -> Extracted {
        // Tier 1: semantically tagged date elements.
        if let Some(candidate) = page.select_text(DATE_SELECTOR).into_iter().next() {
            return Extracted::matched(candidate, Strategy::Structured);
        }

        let body = page.body_text();

        // Tier 2: explicit month-name-plus-year, e.g. "Jul 24, 2025".
        if let Some(found) = self.month_date_re.find(body) {
            return Extracted::matched(found.as_str(), Strategy::Signature);
        }

        // Tier 3: ISO date anywhere in the text.
        if let Some(found) = self.iso_date_re.find(body) {
            return Extracted::matched(found.as_str(), Strategy::ContextWindow);
        }

        // Capture-time fallback happens in the record builder.
        Extracted::Unmatched
    }
}
