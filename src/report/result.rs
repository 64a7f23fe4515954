//! Report output types.

use serde::{Deserialize, Serialize};

use super::definition::NormalizedDefinition;

/// One data series. `data` lines up with [`ReportResult::labels`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub label: String,
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMeta {
    /// Sum of the data values.
    pub total: f64,
    pub definition: NormalizedDefinition,
    pub warnings: Vec<String>,
}

/// Chart-ready report output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportResult {
    pub labels: Vec<String>,
    pub series: Vec<Series>,
    pub meta: ReportMeta,
}

impl ReportResult {
    /// Single-series result built from `(label, value)` pairs.
    pub fn from_points(
        series_label: String,
        points: Vec<(String, f64)>,
        definition: NormalizedDefinition,
        warnings: Vec<String>,
    ) -> Self {
        let (labels, data): (Vec<String>, Vec<f64>) = points.into_iter().unzip();
        let total = data.iter().sum();
        Self {
            labels,
            series: vec![Series {
                label: series_label,
                data,
            }],
            meta: ReportMeta {
                total,
                definition,
                warnings,
            },
        }
    }
}

/// Outcome of validating a definition without running it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub definition: NormalizedDefinition,
}
