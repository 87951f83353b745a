use std::fmt;
use std::str::FromStr;

use crate::models::ReportError;

/// A genomic locus in the `chrom:start-end` form used by the identified
/// tables and by BED-adjacent tooling.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locus {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
}

impl fmt::Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chrom, self.start, self.end)
    }
}

impl FromStr for Locus {
    type Err = ReportError;

    /// Chromosome is everything before the first colon; the remainder must be
    /// exactly `start-end` with integer bounds.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_err = |detail: &str| ReportError::Parse {
            value: s.to_string(),
            detail: detail.to_string(),
        };

        let (chrom, range) = s
            .split_once(':')
            .ok_or_else(|| parse_err("expected chrom:start-end"))?;
        if chrom.is_empty() {
            return Err(parse_err("empty chromosome"));
        }
        if range.contains(':') {
            return Err(parse_err("more than one ':'"));
        }

        let (start, end) = range
            .split_once('-')
            .ok_or_else(|| parse_err("expected start-end after ':'"))?;
        if end.contains('-') {
            return Err(parse_err("more than one '-' after ':'"));
        }

        let start = start
            .parse::<u64>()
            .map_err(|_| parse_err("non-numeric start"))?;
        let end = end
            .parse::<u64>()
            .map_err(|_| parse_err("non-numeric end"))?;

        Ok(Locus {
            chrom: chrom.to_string(),
            start,
            end,
        })
    }
}

/// Gap between two closed intervals on the same chromosome (chromosome
/// equality is the caller's responsibility). Overlapping, touching, and equal
/// intervals all give 0; otherwise the positive gap between the earlier end
/// and the later start.
pub fn distance_to_gene(a: (u64, u64), b: (u64, u64)) -> u64 {
    // Order by start; the first argument wins ties.
    let (x, y) = if b.0 < a.0 { (b, a) } else { (a, b) };
    if x.1 < y.0 {
        y.0 - x.1
    } else {
        0
    }
}
