//! Output writing for cleaned batches and their reports.

use crate::error::Result;
use crate::report::CleaningReport;
use polars::prelude::*;
use std::fs::{self, File};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

/// Default output file name (without extension).
pub const DEFAULT_OUTPUT_NAME: &str = "cleaned_trips";

/// Writes the cleaned table and the audit report to the output directory.
pub struct OutputWriter {
    output_dir: PathBuf,
    output_name: Option<String>,
}

impl OutputWriter {
    pub fn new(output_dir: PathBuf, output_name: Option<String>) -> Self {
        Self {
            output_dir,
            output_name,
        }
    }

    fn file_stem(&self) -> &str {
        self.output_name.as_deref().unwrap_or(DEFAULT_OUTPUT_NAME)
    }

    fn ensure_output_dir(&self) -> Result<()> {
        if !self.output_dir.exists() {
            fs::create_dir_all(&self.output_dir)?;
            info!("Created output directory: {}", self.output_dir.display());
        }
        Ok(())
    }

    /// Write the cleaned table as Parquet. Returns the written path.
    pub fn write_data(&self, df: &mut DataFrame) -> Result<PathBuf> {
        self.ensure_output_dir()?;
        let path = self.output_dir.join(format!("{}.parquet", self.file_stem()));
        let file = File::create(&path)?;
        ParquetWriter::new(file).finish(df)?;
        info!(rows = df.height(), "Cleaned data written to: {}", path.display());
        Ok(path)
    }

    /// Write the audit report as pretty-printed JSON. Returns the written path.
    pub fn write_report(&self, report: &CleaningReport) -> Result<PathBuf> {
        self.ensure_output_dir()?;
        let path = self
            .output_dir
            .join(format!("{}_report.json", self.file_stem()));
        let json = serde_json::to_string_pretty(report)?;
        let mut file = File::create(&path)?;
        file.write_all(json.as_bytes())?;
        info!("Report written to: {}", path.display());
        Ok(path)
    }

    /// The output directory this writer targets.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}
