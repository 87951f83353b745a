use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tracing::debug;

use crate::helper_functions::run_with_timeout;
use crate::intervals::{distance_to_gene, Locus};
use crate::models::{
    CleavageAnnotation, CleavageSite, GeneInterval, ReportError, TargetingStatus,
};

/// Nearest-feature join collaborator. Takes a 4-column BED of query intervals
/// and a gene-annotation source, writes the joined rows to `out`.
pub trait NearestFeatureJoiner {
    fn closest(&self, bed: &Path, annotation: &Path, out: &Path) -> Result<(), ReportError>;
}

/// `bedtools closest -a <bed> -b <gtf> -d`, stdout captured into the output
/// file.
#[derive(Debug)]
pub struct BedtoolsClosest {
    pub bedtools: PathBuf,
    pub timeout: Duration,
}

impl BedtoolsClosest {
    pub fn new(bedtools: PathBuf) -> Self {
        BedtoolsClosest {
            bedtools,
            timeout: Duration::from_secs(120),
        }
    }
}

impl NearestFeatureJoiner for BedtoolsClosest {
    fn closest(&self, bed: &Path, annotation: &Path, out: &Path) -> Result<(), ReportError> {
        let mut cmd = Command::new(&self.bedtools);
        cmd.arg("closest")
            .arg("-a")
            .arg(bed)
            .arg("-b")
            .arg(annotation)
            .arg("-d");
        let stdout = run_with_timeout(cmd, "bedtools closest", self.timeout)?;
        std::fs::write(out, stdout).map_err(|e| ReportError::io(out, e))?;
        Ok(())
    }
}

/// One joined row: the query interval plus the nearest feature's span. The
/// tool's own distance column is not kept; distances are recomputed locally.
#[derive(Debug, Clone)]
pub struct ClosestRow {
    pub locus: Locus,
    pub name: String,
    pub gene: GeneInterval,
}

/// Parse `bedtools closest` output against a GTF annotation: query BED columns
/// 0-3, feature seqname/start/end at columns 4/7/8. Rows where the tool found
/// no feature on the chromosome (seqname `.`) are skipped so the affected site
/// surfaces as a lookup failure instead of a bogus distance.
pub fn parse_closest_output(path: &Path) -> Result<Vec<ClosestRow>, ReportError> {
    let file = File::open(path).map_err(|e| ReportError::io(path, e))?;
    let reader = BufReader::new(file);

    let mut rows = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| ReportError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 9 {
            return Err(ReportError::table(
                path,
                i + 1,
                format!("expected at least 9 columns, found {}", fields.len()),
            ));
        }
        if fields[4] == "." {
            debug!("no feature joined for {} (row {})", fields[3], i + 1);
            continue;
        }

        let numeric = |field: &str, what: &str| {
            field.parse::<u64>().map_err(|_| {
                ReportError::table(path, i + 1, format!("non-numeric {}: {:?}", what, field))
            })
        };

        rows.push(ClosestRow {
            locus: Locus {
                chrom: fields[0].to_string(),
                start: numeric(fields[1], "interval start")?,
                end: numeric(fields[2], "interval end")?,
            },
            name: fields[3].to_string(),
            gene: GeneInterval {
                chrom: fields[4].to_string(),
                start: numeric(fields[7], "feature start")?,
                end: numeric(fields[8], "feature end")?,
            },
        });
    }
    Ok(rows)
}

/// Join each positive-support cleavage site to its nearest gene and compute
/// the gene distance from the site's and the feature's own coordinates. The
/// first matching row (lowest row index) wins when duplicates exist; a site
/// with no matching row is a data-integrity error, never a silent zero.
pub fn annotate(
    sites: &[CleavageSite],
    rows: &[ClosestRow],
    join_output: &Path,
) -> Result<Vec<CleavageAnnotation>, ReportError> {
    let mut annotations = Vec::new();
    for site in sites.iter().filter(|s| s.read_support > 0.0) {
        let row = rows
            .iter()
            .find(|r| r.locus == site.locus)
            .ok_or_else(|| ReportError::AnnotationLookup {
                site: site.locus.to_string(),
                path: join_output.to_path_buf(),
            })?;

        let distance = distance_to_gene(
            (site.locus.start, site.locus.end),
            (row.gene.start, row.gene.end),
        );

        annotations.push(CleavageAnnotation {
            site: site.name.clone(),
            locus: site.locus.to_string(),
            targeting_status: if site.is_on_target() {
                TargetingStatus::OnTarget
            } else {
                TargetingStatus::OffTarget
            },
            distance_to_gene: distance,
        });
    }
    Ok(annotations)
}
