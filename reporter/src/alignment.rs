use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::helper_functions::run_with_timeout;
use crate::models::ReportError;

/// Read-count collaborator over a sample's alignment output. The core only
/// consumes the two integer results.
pub trait AlignmentCounter {
    fn total_reads(&self, alignment: &Path) -> Result<u64, ReportError>;
    fn high_quality_reads(&self, alignment: &Path) -> Result<u64, ReportError>;
}

/// `samtools view`, counting emitted records. High-quality counts apply a
/// mapping-quality floor and a flag exclusion mask (secondary/supplementary/
/// duplicate, the GUIDE-Seq convention: `-q 50 -F 2176`).
#[derive(Debug)]
pub struct SamtoolsCounter {
    pub samtools: PathBuf,
    pub min_quality: u32,
    pub exclude_flags: u32,
    pub timeout: Duration,
}

impl SamtoolsCounter {
    pub fn new(samtools: PathBuf) -> Self {
        SamtoolsCounter {
            samtools,
            min_quality: 50,
            exclude_flags: 2176,
            timeout: Duration::from_secs(120),
        }
    }

    fn count_view(&self, alignment: &Path, filtered: bool) -> Result<u64, ReportError> {
        let mut cmd = Command::new(&self.samtools);
        cmd.arg("view");
        if filtered {
            cmd.arg("-q")
                .arg(self.min_quality.to_string())
                .arg("-F")
                .arg(self.exclude_flags.to_string());
        }
        cmd.arg(alignment);
        let stdout = run_with_timeout(cmd, "samtools view", self.timeout)?;
        Ok(stdout.iter().filter(|&&b| b == b'\n').count() as u64)
    }
}

impl AlignmentCounter for SamtoolsCounter {
    fn total_reads(&self, alignment: &Path) -> Result<u64, ReportError> {
        self.count_view(alignment, false)
    }

    fn high_quality_reads(&self, alignment: &Path) -> Result<u64, ReportError> {
        self.count_view(alignment, true)
    }
}
