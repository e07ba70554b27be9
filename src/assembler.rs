use crate::error::Error;
use crate::extractor::{Platform, ReportSource};
use crate::normalizer::normalize;
use crate::table::{Table, ACCOUNT_COLUMN, PLATFORM_COLUMN};
use log::{debug, info};
use std::sync::Arc;

const LEADING_COLUMNS: [&str; 2] = [PLATFORM_COLUMN, ACCOUNT_COLUMN];

/// Builds report tables from the data source, one account at a time.
#[derive(Clone)]
pub struct ReportAssembler {
    source: Arc<dyn ReportSource>,
}

impl ReportAssembler {
    pub fn new(source: Arc<dyn ReportSource>) -> Self {
        ReportAssembler { source }
    }

    pub fn source(&self) -> &dyn ReportSource {
        self.source.as_ref()
    }

    /// Concatenates the normalized insights of every account of `platform`,
    /// in account listing order. Accounts without data are skipped.
    pub async fn assemble_platform(&self, platform: &Platform) -> Result<Table, Error> {
        let accounts = self.source.list_accounts(&platform.value).await?;
        let fields = self.source.list_fields(&platform.value).await?;
        info!(
            "Assembling {}: {} accounts, {} fields",
            platform.value,
            accounts.len(),
            fields.len()
        );

        let mut tables = Vec::with_capacity(accounts.len());
        for account in &accounts {
            let insights = self
                .source
                .list_insights(&platform.value, account, &fields)
                .await?;

            match normalize(&insights, &fields, &account.name, Some(&platform.text)) {
                Some(table) => tables.push(table),
                None => debug!("Account {} contributed no rows", account.id),
            }
        }

        Ok(with_leading_columns(Table::concat(&tables)))
    }

    /// Concatenates the tables of every platform, in platform listing order.
    pub async fn assemble_all(&self) -> Result<Table, Error> {
        let platforms = self.source.list_platforms().await?;

        let mut tables = Vec::with_capacity(platforms.len());
        for platform in &platforms {
            tables.push(self.assemble_platform(platform).await?);
        }

        Ok(with_leading_columns(Table::concat(&tables)))
    }

    /// Assembles the platform whose machine key is `platform_value`.
    pub async fn assemble_for(&self, platform_value: &str) -> Result<Table, Error> {
        let platform = self
            .source
            .list_platforms()
            .await?
            .into_iter()
            .find(|platform| platform.value == platform_value)
            .ok_or_else(|| Error::UnknownPlatform {
                platform: platform_value.to_string(),
            })?;

        self.assemble_platform(&platform).await
    }
}

fn with_leading_columns(table: Table) -> Table {
    if table.is_empty() {
        return table;
    }
    table.with_leading_columns(&LEADING_COLUMNS)
}
