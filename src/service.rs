use crate::aggregator::summarize;
use crate::assembler::ReportAssembler;
use crate::error::Error;
use crate::output::{persist, to_csv};
use crate::table::{Table, ACCOUNT_COLUMN, PLATFORM_COLUMN};
use log::{info, warn};
use std::path::PathBuf;

/// The four CSV reports offered to callers.
///
/// Every report is recomputed from a full upstream query, and a copy of the
/// CSV is saved to `output_dir` on a best-effort basis.
pub struct ReportService {
    assembler: ReportAssembler,
    output_dir: PathBuf,
}

impl ReportService {
    pub fn new(assembler: ReportAssembler, output_dir: impl Into<PathBuf>) -> Self {
        ReportService {
            assembler,
            output_dir: output_dir.into(),
        }
    }

    /// Full report across all platforms.
    pub async fn general_report(&self) -> Result<String, Error> {
        let table = self.assembler.assemble_all().await?;
        self.render(&table, "report_general")
    }

    /// All platforms, one row per platform.
    pub async fn general_summary(&self) -> Result<String, Error> {
        let table = self.assembler.assemble_all().await?;
        let summary = summarize(&table, PLATFORM_COLUMN, false).await?;
        self.render(&summary, "report_general_summary")
    }

    /// Full report for the platform with machine key `platform`.
    pub async fn platform_report(&self, platform: &str) -> Result<String, Error> {
        let table = self.assembler.assemble_for(platform).await?;
        self.render(&table, &format!("report_{}", platform))
    }

    /// One platform, one row per account.
    pub async fn platform_summary(&self, platform: &str) -> Result<String, Error> {
        let table = self.assembler.assemble_for(platform).await?;
        let summary = summarize(&table, ACCOUNT_COLUMN, true).await?;
        self.render(&summary, &format!("report_{}_summary", platform))
    }

    fn render(&self, table: &Table, name: &str) -> Result<String, Error> {
        let csv = to_csv(table)?;

        match persist(&self.output_dir, name, &csv) {
            Ok(path) => info!("Report saved to {}", path.display()),
            Err(err) => warn!("Could not save report {}: {}", name, err),
        }

        Ok(csv)
    }
}
