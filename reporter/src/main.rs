use std::path::Path;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::aggregate::SampleAggregator;
use crate::alignment::SamtoolsCounter;
use crate::annotation::BedtoolsClosest;
use crate::manifest::Manifest;

mod aggregate;
mod alignment;
mod annotation;
mod bed;
mod classification;
mod helper_functions;
mod intervals;
mod manifest;
mod models;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let manifest_path = std::env::args()
        .nth(1)
        .context("usage: reporter <manifest.yaml>")?;

    info!("loading manifest {}", manifest_path);
    let manifest = Manifest::from_yaml(Path::new(&manifest_path))?;

    let samtools = which::which("samtools").context("samtools not found on PATH")?;
    let bedtools = which::which("bedtools").context("bedtools not found on PATH")?;

    let counter = SamtoolsCounter::new(samtools);
    let joiner = BedtoolsClosest::new(bedtools);

    let stats = SampleAggregator::new(&manifest, &counter, &joiner).run()?;

    let out_path = manifest.output_folder.join("report_stats.json");
    let json = serde_json::to_string_pretty(&stats)?;
    std::fs::write(&out_path, json)
        .with_context(|| format!("failed to write {}", out_path.display()))?;
    info!("wrote report statistics to {}", out_path.display());

    Ok(())
}
