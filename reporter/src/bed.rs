use std::path::Path;

use tracing::debug;

use crate::classification::{
    load_identified_table, numeric_cell, require_column, string_cell, LOCATION_COL, NAME_COL,
    SUPPORT_COL,
};
use crate::intervals::Locus;
use crate::models::ReportError;

/// Convert an identified-cleavage-site table into the minimal 4-column BED
/// consumed by the nearest-feature join. Rows with zero read support carry no
/// evidence and are dropped. Returns the number of rows written.
pub fn convert_to_bed(table_path: &Path, bed_path: &Path) -> Result<usize, ReportError> {
    let df = load_identified_table(table_path)?;

    let locations = require_column(&df, LOCATION_COL, table_path)?;
    let names = require_column(&df, NAME_COL, table_path)?;
    let support = require_column(&df, SUPPORT_COL, table_path)?;

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(bed_path)
        .map_err(|e| ReportError::io(bed_path, std::io::Error::other(e)))?;

    let mut written = 0usize;
    for i in 0..df.height() {
        let support_val = numeric_cell(support, i, table_path)?;
        if support_val <= 0.0 {
            continue;
        }
        let locus: Locus = string_cell(locations, i, table_path)?.parse()?;
        let name = string_cell(names, i, table_path)?;
        let start = locus.start.to_string();
        let end = locus.end.to_string();
        writer
            .write_record([locus.chrom.as_str(), start.as_str(), end.as_str(), name.as_str()])
            .map_err(|e| ReportError::io(bed_path, std::io::Error::other(e)))?;
        written += 1;
    }
    writer.flush().map_err(|e| ReportError::io(bed_path, e))?;

    debug!(
        "wrote {} intervals from {} to {}",
        written,
        table_path.display(),
        bed_path.display()
    );
    Ok(written)
}
