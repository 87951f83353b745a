use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::models::ReportError;

fn default_control() -> String {
    "control".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestSample {
    pub name: String,
    pub condition: String,
}

/// Run manifest: output tree, gene annotation, samples, and the designated
/// control sample.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub output_folder: PathBuf,
    pub gene_annotation: PathBuf,
    #[serde(default = "default_control")]
    pub control: String,
    pub samples: Vec<ManifestSample>,
    /// Experimental conditions to tally; defaults to the distinct conditions
    /// declared by the non-control samples.
    #[serde(default)]
    pub conditions: Vec<String>,
}

impl Manifest {
    pub fn from_yaml(path: &Path) -> Result<Self, ReportError> {
        let text = std::fs::read_to_string(path).map_err(|e| ReportError::io(path, e))?;
        let manifest: Manifest = serde_yaml::from_str(&text).map_err(|e| {
            ReportError::Configuration(format!("invalid manifest {}: {}", path.display(), e))
        })?;
        manifest.validate()?;
        info!(
            "parsed manifest: {} samples, control {:?}",
            manifest.samples.len(),
            manifest.control
        );
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<(), ReportError> {
        if self.samples.is_empty() {
            return Err(ReportError::Configuration(
                "manifest lists no samples".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for sample in &self.samples {
            if sample.name.is_empty() {
                return Err(ReportError::Configuration(
                    "sample with empty name".to_string(),
                ));
            }
            if !seen.insert(sample.name.as_str()) {
                return Err(ReportError::Configuration(format!(
                    "duplicate sample name {:?}",
                    sample.name
                )));
            }
        }

        if !seen.contains(self.control.as_str()) {
            return Err(ReportError::Configuration(format!(
                "control sample {:?} is missing from the sample list; it is required for normalization",
                self.control
            )));
        }
        if self.samples.len() < 2 {
            return Err(ReportError::Configuration(
                "manifest lists only the control sample".to_string(),
            ));
        }
        Ok(())
    }

    pub fn non_control_samples(&self) -> impl Iterator<Item = &ManifestSample> {
        self.samples.iter().filter(|s| s.name != self.control)
    }

    pub fn control_sample(&self) -> &str {
        &self.control
    }

    /// Conditions to tally, manifest-declared or derived from the samples.
    pub fn condition_names(&self) -> Vec<String> {
        if !self.conditions.is_empty() {
            return self.conditions.clone();
        }
        let mut names = Vec::new();
        for sample in self.non_control_samples() {
            if !names.contains(&sample.condition) {
                names.push(sample.condition.clone());
            }
        }
        names
    }

    pub fn aligned_path(&self, sample: &str) -> PathBuf {
        self.output_folder.join("aligned").join(format!("{}.sam", sample))
    }

    pub fn identified_path(&self, sample: &str) -> PathBuf {
        self.output_folder
            .join("identified")
            .join(format!("{}_identifiedOfftargets.txt", sample))
    }

    pub fn consolidated_folder(&self) -> PathBuf {
        self.output_folder.join("consolidated")
    }
}
