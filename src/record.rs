use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Local, NaiveDate};
use log::warn;

use crate::extract::{Extracted, Strategy};
use crate::normalize::{DateNormalizer, NormalizedPrice, PriceNormalizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    Normal,
    Degraded,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::Normal => "normal",
            Confidence::Degraded => "degraded",
        }
    }
}

/// The price field of a record. A failed extraction is an explicit `Invalid`,
/// never an omission and never a fabricated last-known value; an out-of-window
/// value is kept but visibly tagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Price {
    Observed(u32),
    Implausible(u32),
    Invalid,
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Price::Observed(n) | Price::Implausible(n) => write!(f, "{n}"),
            Price::Invalid => f.write_str("invalid"),
        }
    }
}

/// One capture, immutable once built. Corrections append a new record; history
/// is never rewritten.
#[derive(Debug, Clone)]
pub struct Record {
    pub capture_timestamp: DateTime<Local>,
    /// Always a well-formed calendar date; falls back to the capture date.
    pub trade_date: NaiveDate,
    pub price: Price,
    pub raw_date_text: String,
    pub raw_price_text: String,
    /// Which cascade tier produced the price candidate; `None` means none did.
    pub extraction_strategy: Option<Strategy>,
    /// False when the raw date was missing or failed every format.
    pub date_normalized: bool,
    pub confidence: Confidence,
    pub snapshot_reference: Option<PathBuf>,
}

impl Record {
    /// Attach a snapshot reference, consuming the record. Keeps the built
    /// record itself immutable.
    pub fn with_snapshot(self, reference: PathBuf) -> Record {
        Record {
            snapshot_reference: Some(reference),
            ..self
        }
    }

    pub fn strategy_label(&self) -> &'static str {
        match self.extraction_strategy {
            Some(strategy) => strategy.as_str(),
            None => "none",
        }
    }
}

/// Pure combination step: extractor outputs plus a capture timestamp in, one
/// record out. No I/O, structurally infallible; quality problems become flags
/// on the record instead of errors.
pub struct RecordBuilder {
    price_normalizer: PriceNormalizer,
    date_normalizer: DateNormalizer,
}

impl RecordBuilder {
    pub fn new() -> Self {
        Self {
            price_normalizer: PriceNormalizer::new(),
            date_normalizer: DateNormalizer::new(),
        }
    }

    pub fn build(
        &self,
        capture_timestamp: DateTime<Local>,
        date: &Extracted,
        price: &Extracted,
    ) -> Record {
        let capture_date = capture_timestamp.date_naive();

        let (raw_date_text, date_strategy) = raw_and_strategy(date);
        let normalized_date = self
            .date_normalizer
            .normalize(&raw_date_text, capture_date);
        if !normalized_date.normalized {
            warn!(
                "date not normalized (raw: {raw_date_text:?}, strategy: {}), using capture date",
                label(date_strategy)
            );
        }

        let (raw_price_text, price_strategy) = raw_and_strategy(price);
        let price = match self.price_normalizer.normalize(&raw_price_text) {
            NormalizedPrice::Valid(n) => Price::Observed(n),
            NormalizedPrice::Implausible(n) => {
                warn!("price {n} outside plausibility window, tagging implausible");
                Price::Implausible(n)
            }
            NormalizedPrice::Invalid(reason) => {
                warn!("price invalid ({reason:?}) from raw {raw_price_text:?}");
                Price::Invalid
            }
        };

        let confidence = if matches!(price, Price::Observed(_)) && normalized_date.normalized {
            Confidence::Normal
        } else {
            Confidence::Degraded
        };

        Record {
            capture_timestamp,
            trade_date: normalized_date.date,
            price,
            raw_date_text,
            raw_price_text,
            extraction_strategy: price_strategy,
            date_normalized: normalized_date.normalized,
            confidence,
            snapshot_reference: None,
        }
    }

    /// Minimal record for a run whose page never rendered, so the run is not
    /// silently unrecorded.
    pub fn degraded(&self, capture_timestamp: DateTime<Local>) -> Record {
        self.build(capture_timestamp, &Extracted::Unmatched, &Extracted::Unmatched)
    }
}

impl Default for RecordBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn raw_and_strategy(extracted: &Extracted) -> (String, Option<Strategy>) {
    match extracted {
        Extracted::Matched { raw, strategy } => (raw.clone(), Some(*strategy)),
        Extracted::Unmatched => (String::new(), None),
    }
}

fn label(strategy: Option<Strategy>) -> &'static str {
    strategy.map(Strategy::as_str).unwrap_or("none")
}
