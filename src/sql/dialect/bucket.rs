//! Time bucket granularities for grouping date/datetime columns.

use serde::{Deserialize, Serialize};

/// Truncation granularity applied to a date/datetime group column.
///
/// Every dialect renders the same label shape for a given bucket:
///
/// | bucket  | label        |
/// |---------|--------------|
/// | day     | `YYYY-MM-DD` |
/// | week    | `YYYY-Www`   |
/// | month   | `YYYY-MM`    |
/// | quarter | `YYYY-Qn`    |
/// | year    | `YYYY`       |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    #[default]
    None,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl Bucket {
    pub const ALL: [Bucket; 6] = [
        Bucket::Day,
        Bucket::Week,
        Bucket::Month,
        Bucket::Quarter,
        Bucket::Year,
        Bucket::None,
    ];

    /// Parse a bucket name. The empty string is treated as `none`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" => Some(Bucket::None),
            "day" => Some(Bucket::Day),
            "week" => Some(Bucket::Week),
            "month" => Some(Bucket::Month),
            "quarter" => Some(Bucket::Quarter),
            "year" => Some(Bucket::Year),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::None => "none",
            Bucket::Day => "day",
            Bucket::Week => "week",
            Bucket::Month => "month",
            Bucket::Quarter => "quarter",
            Bucket::Year => "year",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Bucket::None)
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
