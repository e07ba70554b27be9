use crate::extractor::Field;
use crate::table::{Cell, InsightRecord, Table, ACCOUNT_COLUMN, PLATFORM_COLUMN};
use std::collections::HashMap;

pub const COST_PER_CLICK: &str = "Cost Per Click";
const SPEND: &str = "Spend";
const CLICKS: &str = "Clicks";

/// Turns one account's insight rows into a table with display column names.
///
/// # Arguments
/// * `insights` - Raw insight rows of the account
/// * `fields` - Field definitions of the platform, used to rename columns
/// * `account_name` - Written to the `Account` column of every row
/// * `platform_name` - When given, written to the `Platform` column of every row
///
/// # Returns
/// `None` when there are no insight rows, so the account contributes neither
/// rows nor columns.
pub fn normalize(
    insights: &[InsightRecord],
    fields: &[Field],
    account_name: &str,
    platform_name: Option<&str>,
) -> Option<Table> {
    if insights.is_empty() {
        return None;
    }

    let display_names: HashMap<&str, &str> = fields
        .iter()
        .filter_map(|field| Some((field.value.as_deref()?, field.text.as_deref()?)))
        .collect();

    let mut table = Table::from_records(insights, |key| {
        display_names.get(key).copied().unwrap_or(key)
    });

    for row in 0..table.len() {
        if let Some(platform_name) = platform_name {
            table.set(row, PLATFORM_COLUMN, Cell::Text(platform_name.to_string()));
        }
        table.set(row, ACCOUNT_COLUMN, Cell::Text(account_name.to_string()));
    }

    // A source column already named "Cost Per Click" is kept as is.
    if !table.has_column(COST_PER_CLICK) && table.has_column(SPEND) && table.has_column(CLICKS) {
        for row in 0..table.len() {
            let derived = cost_per_click(table.cell(row, SPEND), table.cell(row, CLICKS));
            table.set(row, COST_PER_CLICK, derived);
        }
    }

    Some(table)
}

fn cost_per_click(spend: Option<&Cell>, clicks: Option<&Cell>) -> Cell {
    match (
        spend.and_then(Cell::as_number),
        clicks.and_then(Cell::as_number),
    ) {
        (Some(_), Some(clicks)) if clicks == 0.0 => Cell::Number(0.0),
        (Some(spend), Some(clicks)) => Cell::Number(spend / clicks),
        _ => Cell::Missing,
    }
}
