use std::io::ErrorKind;
use std::path::Path;

use polars::prelude::*;
use tracing::debug;

use crate::models::{CleavageSite, ReportError};

/// Column names of the identified-cleavage-site table.
pub const LOCATION_COL: &str = "#BED Chromosome";
pub const NAME_COL: &str = "BED Name";
pub const MISMATCH_COL: &str = "Mismatches";
pub const SUPPORT_COL: &str = "bi.sum.mi";

/// A sample's identified table split into on/off-target subsets, with
/// read-support sums per subset.
#[derive(Debug)]
pub struct ClassifiedSites {
    pub sites: Vec<CleavageSite>,
    pub on_target_support: f64,
    pub off_target_support: f64,
}

impl ClassifiedSites {
    pub fn on_targets(&self) -> impl Iterator<Item = &CleavageSite> {
        self.sites.iter().filter(|s| s.is_on_target())
    }

    pub fn off_targets(&self) -> impl Iterator<Item = &CleavageSite> {
        self.sites.iter().filter(|s| !s.is_on_target())
    }
}

/// Read the tab-separated identified table with its header row.
pub fn load_identified_table(path: &Path) -> Result<DataFrame, ReportError> {
    if !path.is_file() {
        return Err(ReportError::io(
            path,
            std::io::Error::new(ErrorKind::NotFound, "identified table not found"),
        ));
    }

    CsvReadOptions::default()
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_separator(b'\t'))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|e| ReportError::table(path, 0, e.to_string()))
}

pub(crate) fn require_column<'a>(
    df: &'a DataFrame,
    name: &str,
    path: &Path,
) -> Result<&'a Column, ReportError> {
    df.column(name)
        .map_err(|_| ReportError::table(path, 0, format!("missing column {:?}", name)))
}

pub(crate) fn string_cell(col: &Column, row: usize, path: &Path) -> Result<String, ReportError> {
    match col.get(row) {
        Ok(AnyValue::String(s)) => Ok(s.to_string()),
        Ok(AnyValue::StringOwned(s)) => Ok(s.to_string()),
        Ok(other) => Err(ReportError::table(
            path,
            row + 1,
            format!("expected string in {:?}, found {}", col.name(), other),
        )),
        Err(e) => Err(ReportError::table(path, row + 1, e.to_string())),
    }
}

pub(crate) fn numeric_cell(col: &Column, row: usize, path: &Path) -> Result<f64, ReportError> {
    let bad = |found: String| {
        ReportError::table(
            path,
            row + 1,
            format!("non-numeric value in {:?}: {}", col.name(), found),
        )
    };
    match col.get(row) {
        Ok(AnyValue::Int64(v)) => Ok(v as f64),
        Ok(AnyValue::Int32(v)) => Ok(v as f64),
        Ok(AnyValue::UInt64(v)) => Ok(v as f64),
        Ok(AnyValue::Float64(v)) => Ok(v),
        Ok(AnyValue::Float32(v)) => Ok(v as f64),
        // A single bad cell makes polars infer the whole column as strings;
        // recover the numeric cells and pin the error on the bad row.
        Ok(AnyValue::String(s)) => s.trim().parse::<f64>().map_err(|_| bad(s.to_string())),
        Ok(AnyValue::StringOwned(s)) => s.trim().parse::<f64>().map_err(|_| bad(s.to_string())),
        Ok(other) => Err(bad(other.to_string())),
        Err(e) => Err(ReportError::table(path, row + 1, e.to_string())),
    }
}

/// Parse every row of the identified table into a typed `CleavageSite`,
/// partition on mismatch count, and sum read support per partition. The
/// first malformed row fails the whole file.
pub fn classify(path: &Path) -> Result<ClassifiedSites, ReportError> {
    let df = load_identified_table(path)?;

    let locations = require_column(&df, LOCATION_COL, path)?;
    let names = require_column(&df, NAME_COL, path)?;
    let mismatches = require_column(&df, MISMATCH_COL, path)?;
    let support = require_column(&df, SUPPORT_COL, path)?;

    let mut sites = Vec::with_capacity(df.height());
    let mut on_target_support = 0.0;
    let mut off_target_support = 0.0;

    for i in 0..df.height() {
        let locus = string_cell(locations, i, path)?.parse()?;
        let name = string_cell(names, i, path)?;
        let mm = numeric_cell(mismatches, i, path)?;
        if mm < 0.0 || mm.fract() != 0.0 {
            return Err(ReportError::table(
                path,
                i + 1,
                format!("mismatch count must be a non-negative integer, got {}", mm),
            ));
        }
        let read_support = numeric_cell(support, i, path)?;

        let site = CleavageSite {
            name,
            locus,
            mismatches: mm as u32,
            read_support,
        };
        if site.is_on_target() {
            on_target_support += read_support;
        } else {
            off_target_support += read_support;
        }
        sites.push(site);
    }

    debug!(
        "classified {} sites from {} (on-target support {}, off-target support {})",
        sites.len(),
        path.display(),
        on_target_support,
        off_target_support
    );

    Ok(ClassifiedSites {
        sites,
        on_target_support,
        off_target_support,
    })
}
