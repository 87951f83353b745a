use std::path::Path;

use tracing::{error, info};

use crate::alignment::AlignmentCounter;
use crate::annotation::{annotate, parse_closest_output, NearestFeatureJoiner};
use crate::bed::convert_to_bed;
use crate::classification::classify;
use crate::helper_functions::{count_lines, count_lines_in_folder};
use crate::manifest::{Manifest, ManifestSample};
use crate::models::{ConditionCount, GlobalStats, ReportError, ReportStats, Sample};

/// Extension of the consolidated read files counted into the global total.
const CONSOLIDATED_EXTENSION: &str = "fastq";

/// Per-run orchestrator: processes each non-control sample, normalizes the
/// global cleavage total against the control, and folds everything into the
/// statistics object the renderer consumes.
pub struct SampleAggregator<'a, C, J> {
    manifest: &'a Manifest,
    counter: &'a C,
    joiner: &'a J,
}

impl<'a, C, J> SampleAggregator<'a, C, J>
where
    C: AlignmentCounter,
    J: NearestFeatureJoiner,
{
    pub fn new(manifest: &'a Manifest, counter: &'a C, joiner: &'a J) -> Self {
        SampleAggregator {
            manifest,
            counter,
            joiner,
        }
    }

    /// Run the whole pipeline. Any sample failure fails the run: the control
    /// normalization is not well-defined over partial data.
    pub fn run(&self) -> Result<ReportStats, ReportError> {
        self.manifest.validate()?;

        let global = self.global_stats()?;
        info!(
            "global stats: {} reads, {} cleavage sites after control normalization",
            global.total_reads, global.total_cleaved
        );

        // Per-sample BED and join files are name-keyed inside a run-scoped
        // temp dir, so the loop stays parallelizable.
        let temp = tempfile::tempdir().map_err(|e| ReportError::io(std::env::temp_dir(), e))?;

        let mut samples = Vec::new();
        for entry in self.manifest.non_control_samples() {
            match self.process_sample(entry, temp.path()) {
                Ok(sample) => samples.push(sample),
                Err(e) => {
                    error!("sample {} failed: {}", entry.name, e);
                    return Err(e);
                }
            }
        }

        let conditions = self.condition_counts();

        Ok(ReportStats {
            global,
            conditions,
            samples,
        })
    }

    fn global_stats(&self) -> Result<GlobalStats, ReportError> {
        let total_reads =
            count_lines_in_folder(&self.manifest.consolidated_folder(), CONSOLIDATED_EXTENSION)?;

        let mut raw_total = 0i64;
        for sample in self.manifest.non_control_samples() {
            raw_total += count_lines(&self.manifest.identified_path(&sample.name))? as i64;
        }
        let control_count =
            count_lines(&self.manifest.identified_path(self.manifest.control_sample()))? as i64;

        // Normalization carried over unchanged from the original pipeline:
        // subtract the control's raw count, then one per additional sample.
        let non_control = self.manifest.non_control_samples().count() as i64;
        let total_cleaved = raw_total - control_count - (non_control - 1);

        Ok(GlobalStats {
            total_reads,
            total_cleaved,
        })
    }

    fn process_sample(&self, entry: &ManifestSample, temp: &Path) -> Result<Sample, ReportError> {
        info!("processing sample {}", entry.name);

        let aligned = self.manifest.aligned_path(&entry.name);
        let total_reads = self.counter.total_reads(&aligned)?;
        let high_quality_reads = self.counter.high_quality_reads(&aligned)?;

        let identified = self.manifest.identified_path(&entry.name);
        let classified = classify(&identified)?;

        let bed = temp.join(format!("{}.bed", entry.name));
        let written = convert_to_bed(&identified, &bed)?;

        let cleavage_annotations = if written > 0 {
            let join_output = temp.join(format!("{}_annotation.bed", entry.name));
            self.joiner
                .closest(&bed, &self.manifest.gene_annotation, &join_output)?;
            let rows = parse_closest_output(&join_output)?;
            annotate(&classified.sites, &rows, &join_output)?
        } else {
            Vec::new()
        };

        Ok(Sample {
            name: entry.name.clone(),
            condition: entry.condition.clone(),
            total_reads,
            high_quality_reads,
            on_target_support: classified.on_target_support,
            off_target_support: classified.off_target_support,
            identified_sites: classified.sites.len(),
            cleavage_annotations,
        })
    }

    fn condition_counts(&self) -> Vec<ConditionCount> {
        self.manifest
            .condition_names()
            .into_iter()
            .map(|condition| {
                let count = self
                    .manifest
                    .non_control_samples()
                    .filter(|s| s.condition == condition)
                    .count();
                ConditionCount { condition, count }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::{LOCATION_COL, MISMATCH_COL, NAME_COL, SUPPORT_COL};
    use crate::manifest::ManifestSample;
    use std::collections::HashMap;
    use std::io::Write;
    use std::path::PathBuf;

    struct FakeCounter {
        counts: HashMap<String, (u64, u64)>,
    }

    impl AlignmentCounter for FakeCounter {
        fn total_reads(&self, alignment: &Path) -> Result<u64, ReportError> {
            let stem = alignment.file_stem().unwrap().to_str().unwrap();
            Ok(self.counts[stem].0)
        }

        fn high_quality_reads(&self, alignment: &Path) -> Result<u64, ReportError> {
            let stem = alignment.file_stem().unwrap().to_str().unwrap();
            Ok(self.counts[stem].1)
        }
    }

    /// Joins every BED interval to a fixed per-chromosome gene, with a bogus
    /// tool distance to prove it is ignored.
    struct FakeJoiner {
        genes: HashMap<String, (u64, u64)>,
    }

    impl NearestFeatureJoiner for FakeJoiner {
        fn closest(&self, bed: &Path, _annotation: &Path, out: &Path) -> Result<(), ReportError> {
            let mut lines = String::new();
            for line in std::fs::read_to_string(bed).unwrap().lines() {
                let f: Vec<&str> = line.split('\t').collect();
                if let Some(&(gstart, gend)) = self.genes.get(f[0]) {
                    lines.push_str(&format!(
                        "{}\t{}\t{}\t{}\t{}\tsource\tgene\t{}\t{}\t.\t+\t.\tattrs\t9999\n",
                        f[0], f[1], f[2], f[3], f[0], gstart, gend
                    ));
                }
            }
            std::fs::write(out, lines).unwrap();
            Ok(())
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        manifest: Manifest,
    }

    fn write_lines(path: &Path, n: usize) {
        let mut f = std::fs::File::create(path).unwrap();
        for i in 0..n {
            writeln!(f, "line{}", i).unwrap();
        }
    }

    fn write_identified(path: &Path, rows: &[(String, String, i64, f64)]) {
        let mut f = std::fs::File::create(path).unwrap();
        writeln!(
            f,
            "{}\t{}\t{}\t{}",
            LOCATION_COL, NAME_COL, MISMATCH_COL, SUPPORT_COL
        )
        .unwrap();
        for (locus, name, mm, support) in rows {
            writeln!(f, "{}\t{}\t{}\t{}", locus, name, mm, support).unwrap();
        }
    }

    /// Output tree with two treated samples and a control. Identified tables
    /// have raw line counts 50 / 40 / 10 (headers included).
    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().to_path_buf();
        std::fs::create_dir_all(out.join("identified")).unwrap();
        std::fs::create_dir_all(out.join("aligned")).unwrap();
        std::fs::create_dir_all(out.join("consolidated")).unwrap();

        write_identified(
            &out.join("identified/EMX1_identifiedOfftargets.txt"),
            &pad_rows(49),
        );
        write_identified(
            &out.join("identified/VEGFA_identifiedOfftargets.txt"),
            &pad_rows(39),
        );
        write_identified(
            &out.join("identified/control_identifiedOfftargets.txt"),
            &pad_rows(9),
        );

        write_lines(&out.join("consolidated/EMX1.fastq"), 400);
        write_lines(&out.join("consolidated/VEGFA.fastq"), 200);
        write_lines(&out.join("consolidated/notes.txt"), 7);

        let manifest = Manifest {
            output_folder: out,
            gene_annotation: PathBuf::from("/data/gencode.gtf"),
            control: "control".to_string(),
            samples: vec![
                ManifestSample {
                    name: "EMX1".to_string(),
                    condition: "treated".to_string(),
                },
                ManifestSample {
                    name: "VEGFA".to_string(),
                    condition: "treated".to_string(),
                },
                ManifestSample {
                    name: "control".to_string(),
                    condition: "untreated".to_string(),
                },
            ],
            conditions: vec![],
        };

        Fixture { _dir: dir, manifest }
    }

    /// `n` data rows, all on chr1 with positive support, distinct coordinates.
    fn pad_rows(n: usize) -> Vec<(String, String, i64, f64)> {
        (0..n)
            .map(|i| {
                (
                    format!("chr1:{}-{}", 1000 + i * 100, 1010 + i * 100),
                    format!("SITE{}", i),
                    (i % 3) as i64,
                    2.0,
                )
            })
            .collect()
    }

    fn counter() -> FakeCounter {
        let mut counts = HashMap::new();
        counts.insert("EMX1".to_string(), (1000u64, 800u64));
        counts.insert("VEGFA".to_string(), (500u64, 450u64));
        FakeCounter { counts }
    }

    fn joiner() -> FakeJoiner {
        let mut genes = HashMap::new();
        genes.insert("chr1".to_string(), (0u64, 500u64));
        FakeJoiner { genes }
    }

    #[test]
    fn normalizes_total_cleaved_against_the_control() {
        let fx = fixture();
        let counter = counter();
        let joiner = joiner();
        let stats = SampleAggregator::new(&fx.manifest, &counter, &joiner)
            .run()
            .unwrap();

        // 50 + 40 raw lines, minus the control's 10, minus (2 - 1).
        assert_eq!(stats.global.total_cleaved, 79);
        assert_eq!(stats.global.total_reads, 600);
    }

    #[test]
    fn control_is_excluded_from_the_sample_list() {
        let fx = fixture();
        let counter = counter();
        let joiner = joiner();
        let stats = SampleAggregator::new(&fx.manifest, &counter, &joiner)
            .run()
            .unwrap();

        let names: Vec<&str> = stats.samples.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["EMX1", "VEGFA"]);
        assert_eq!(stats.conditions.len(), 1);
        assert_eq!(stats.conditions[0].condition, "treated");
        assert_eq!(stats.conditions[0].count, 2);
    }

    #[test]
    fn populates_per_sample_statistics() {
        let fx = fixture();
        let counter = counter();
        let joiner = joiner();
        let stats = SampleAggregator::new(&fx.manifest, &counter, &joiner)
            .run()
            .unwrap();

        let emx1 = &stats.samples[0];
        assert_eq!(emx1.total_reads, 1000);
        assert_eq!(emx1.high_quality_reads, 800);
        assert_eq!(emx1.identified_sites, 49);
        assert_eq!(emx1.cleavage_annotations.len(), 49);
        assert_eq!(
            emx1.on_target_support + emx1.off_target_support,
            49.0 * 2.0
        );

        // First site spans 1000-1010 against the 0-500 gene: gap of 500.
        assert_eq!(emx1.cleavage_annotations[0].distance_to_gene, 500);
    }

    #[test]
    fn missing_control_table_fails_the_run() {
        let fx = fixture();
        std::fs::remove_file(
            fx.manifest
                .output_folder
                .join("identified/control_identifiedOfftargets.txt"),
        )
        .unwrap();
        let counter = counter();
        let joiner = joiner();
        let err = SampleAggregator::new(&fx.manifest, &counter, &joiner)
            .run()
            .unwrap_err();
        assert!(matches!(err, ReportError::Io { .. }));
    }

    #[test]
    fn unjoined_site_fails_the_run_with_a_lookup_error() {
        let fx = fixture();
        let counter = counter();
        // Joiner knows no chromosome at all, so every interval goes unmatched.
        let joiner = FakeJoiner {
            genes: HashMap::new(),
        };
        let err = SampleAggregator::new(&fx.manifest, &counter, &joiner)
            .run()
            .unwrap_err();
        assert!(matches!(err, ReportError::AnnotationLookup { .. }));
    }
}
