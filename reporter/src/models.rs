use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::intervals::Locus;

/// One row of a sample's identified-cleavage-site table.
#[derive(Debug, Clone)]
pub struct CleavageSite {
    pub name: String,
    pub locus: Locus,
    pub mismatches: u32,
    /// Aggregate read support for this site (`bi.sum.mi` in the table).
    pub read_support: f64,
}

impl CleavageSite {
    pub fn is_on_target(&self) -> bool {
        self.mismatches == 0
    }
}

/// A gene feature interval taken from the nearest-feature join output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneInterval {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TargetingStatus {
    #[serde(rename = "On target")]
    OnTarget,
    #[serde(rename = "Off target")]
    OffTarget,
}

/// A cleavage site joined to its nearest gene, with the distance recomputed
/// locally rather than trusted from the join tool.
#[derive(Debug, Clone, Serialize)]
pub struct CleavageAnnotation {
    pub site: String,
    pub locus: String,
    pub targeting_status: TargetingStatus,
    pub distance_to_gene: u64,
}

/// Fully populated per-sample statistics.
#[derive(Debug, Clone, Serialize)]
pub struct Sample {
    pub name: String,
    pub condition: String,
    pub total_reads: u64,
    pub high_quality_reads: u64,
    pub on_target_support: f64,
    pub off_target_support: f64,
    pub identified_sites: usize,
    pub cleavage_annotations: Vec<CleavageAnnotation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GlobalStats {
    pub total_reads: u64,
    /// Normalized cleavage-site total. Signed: the control subtraction is not
    /// provably non-negative for arbitrary inputs.
    pub total_cleaved: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConditionCount {
    pub condition: String,
    pub count: usize,
}

/// The statistics object handed to the report renderer. Samples are in
/// manifest order with the control excluded.
#[derive(Debug, Clone, Serialize)]
pub struct ReportStats {
    pub global: GlobalStats,
    pub conditions: Vec<ConditionCount>,
    pub samples: Vec<Sample>,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed table {path} (row {row}): {detail}")]
    MalformedTable {
        path: PathBuf,
        row: usize,
        detail: String,
    },

    #[error("cannot parse locus {value:?}: {detail}")]
    Parse { value: String, detail: String },

    #[error("cleavage site {site} has no nearest-feature row in {path}")]
    AnnotationLookup { site: String, path: PathBuf },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{tool} failed: {detail}")]
    Tool { tool: String, detail: String },

    #[error("{tool} timed out after {secs}s")]
    ToolTimeout { tool: String, secs: u64 },
}

impl ReportError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ReportError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn table(path: impl Into<PathBuf>, row: usize, detail: impl Into<String>) -> Self {
        ReportError::MalformedTable {
            path: path.into(),
            row,
            detail: detail.into(),
        }
    }
}
