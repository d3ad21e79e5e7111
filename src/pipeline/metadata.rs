//! Metadata normalisation: derive epoch-second dates from raw timestamps.
//!
//! Every document family reports its timestamps in a different textual
//! layout. The normaliser adds `ModifiedDate` and `CreatedDate` (Unix
//! seconds, as decimal strings) next to the original keys when, and only
//! when, the raw value parses. A value that does not parse is left alone and
//! no derived key is added; this is enrichment, not validation.

use crate::tools::Properties;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use std::collections::BTreeMap;

/// Normalised document metadata: property name → value.
pub type MetadataRecord = BTreeMap<String, String>;

/// Derived key for the last-modified time.
pub const MODIFIED_DATE: &str = "ModifiedDate";
/// Derived key for the creation time.
pub const CREATED_DATE: &str = "CreatedDate";

/// Textual timestamp layouts produced by the collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampLayout {
    /// `2006-01-02 15:04:05.999999999 -0700 MST`, as written by the property-set decoder.
    PropertySet,
    /// ISO 8601, as printed by `pdfinfo -isodates`. The offset is optional
    /// because poppler omits it when the PDF date has none; such values are
    /// read as UTC.
    PdfInfo,
    /// RFC 3339, as stored in Open XML core properties.
    Rfc3339,
}

impl TimestampLayout {
    /// Parse `raw` to Unix seconds.
    pub fn epoch_seconds(self, raw: &str) -> Option<i64> {
        let raw = raw.trim();
        match self {
            Self::PropertySet => {
                // The trailing zone abbreviation carries no information the
                // numeric offset does not already have.
                let (stamp, zone) = raw.rsplit_once(' ')?;
                if !zone.chars().all(|c| c.is_ascii_alphabetic()) {
                    return None;
                }
                DateTime::<FixedOffset>::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S%.f %z")
                    .ok()
                    .map(|dt| dt.timestamp())
            }
            Self::PdfInfo => match DateTime::parse_from_rfc3339(raw) {
                Ok(dt) => Some(dt.timestamp()),
                Err(_) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                    .ok()
                    .map(|dt| dt.and_utc().timestamp()),
            },
            Self::Rfc3339 => DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.timestamp()),
        }
    }
}

/// One `source → derived` date rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRule {
    pub source: &'static str,
    pub derived: &'static str,
}

/// Turns raw collaborator properties into a [`MetadataRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataNormalizer {
    layout: TimestampLayout,
    rules: &'static [DateRule],
}

impl MetadataNormalizer {
    /// Legacy compound-file documents: `LastSaveTime` and `CreateTime`.
    pub const COMPOUND_FILE: Self = Self {
        layout: TimestampLayout::PropertySet,
        rules: &[
            DateRule {
                source: "LastSaveTime",
                derived: MODIFIED_DATE,
            },
            DateRule {
                source: "CreateTime",
                derived: CREATED_DATE,
            },
        ],
    };

    /// PDF info dictionary as printed by `pdfinfo -isodates`.
    pub const PDF_INFO: Self = Self {
        layout: TimestampLayout::PdfInfo,
        rules: &[
            DateRule {
                source: "ModDate",
                derived: MODIFIED_DATE,
            },
            DateRule {
                source: "CreationDate",
                derived: CREATED_DATE,
            },
        ],
    };

    /// Open XML core properties.
    pub const OPEN_XML: Self = Self {
        layout: TimestampLayout::Rfc3339,
        rules: &[
            DateRule {
                source: "Modified",
                derived: MODIFIED_DATE,
            },
            DateRule {
                source: "Created",
                derived: CREATED_DATE,
            },
        ],
    };

    /// Fold `raw` into a record (later duplicates win) and add derived dates.
    pub fn normalize(&self, raw: Properties) -> MetadataRecord {
        let mut record: MetadataRecord = raw.into_iter().collect();
        for rule in self.rules {
            let derived = record
                .get(rule.source)
                .and_then(|value| self.layout.epoch_seconds(value));
            if let Some(secs) = derived {
                record.insert(rule.derived.to_string(), secs.to_string());
            }
        }
        record
    }
}

/// Normalise compound-file properties.
pub fn normalize_properties(raw: Properties) -> MetadataRecord {
    MetadataNormalizer::COMPOUND_FILE.normalize(raw)
}
