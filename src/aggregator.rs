use crate::error::Error;
use crate::table::{Cell, ColumnType, Table, PLATFORM_COLUMN};
use datafusion::arrow::array::{
    Array, ArrayRef, Float64Array, Float64Builder, RecordBatch, StringArray, StringBuilder,
};
use datafusion::arrow::compute::{cast_with_options, CastOptions};
use datafusion::arrow::datatypes::{DataType, Field, Schema};
use datafusion::arrow::error::ArrowError;
use datafusion::common::Column;
use datafusion::functions_aggregate::sum::sum;
use datafusion::prelude::{Expr, SessionContext};
use std::sync::Arc;

/// Groups a report by `group_key` (and `Platform` when `include_platform` is
/// set) and sums every numeric column per group.
///
/// # Arguments
/// * `table` - The assembled report to reduce
/// * `group_key` - Column whose values define the groups
/// * `include_platform` - Also group by the `Platform` column
///
/// # Returns
/// A table with the same columns as `table`, one row per group in ascending
/// key order. Columns that are neither numeric nor grouping keys are blank.
/// Rows with a missing grouping key are dropped.
pub async fn summarize(
    table: &Table,
    group_key: &str,
    include_platform: bool,
) -> Result<Table, Error> {
    if table.is_empty() {
        return Ok(Table::with_columns(&[group_key]));
    }

    let mut group_columns = vec![group_key];
    if include_platform && group_key != PLATFORM_COLUMN {
        group_columns.push(PLATFORM_COLUMN);
    }
    if let Some(column) = group_columns.iter().find(|name| table.column(name).is_none()) {
        return Err(Error::UnknownColumn {
            column: column.to_string(),
        });
    }

    let numeric_columns: Vec<&str> = table
        .columns()
        .iter()
        .filter(|column| column.kind() == ColumnType::Numeric)
        .map(|column| column.name())
        .filter(|name| !group_columns.contains(name))
        .collect();

    let batch = to_record_batch(table, &group_columns, &numeric_columns)?;

    let ctx = SessionContext::new();
    let mut df = ctx.read_batch(batch)?;
    for name in &group_columns {
        df = df.filter(column(name).is_not_null())?;
    }

    let batches = df
        .aggregate(
            group_columns.iter().map(|name| column(name)).collect(),
            numeric_columns
                .iter()
                .map(|name| sum(column(name)).alias(*name))
                .collect(),
        )?
        .sort(
            group_columns
                .iter()
                .map(|name| column(name).sort(true, false))
                .collect(),
        )?
        .collect()
        .await?;

    from_batches(table, &group_columns, &numeric_columns, &batches)
}

/// Unqualified column reference that keeps the name as is (spaces, case).
fn column(name: &str) -> Expr {
    Expr::Column(Column::from_name(name))
}

fn to_record_batch(
    table: &Table,
    group_columns: &[&str],
    numeric_columns: &[&str],
) -> Result<RecordBatch, Error> {
    let num_rows = table.len();
    let mut fields = Vec::with_capacity(group_columns.len() + numeric_columns.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(fields.capacity());

    for name in group_columns {
        let mut builder = StringBuilder::with_capacity(num_rows, num_rows * 16);
        for row in 0..num_rows {
            match table.cell(row, name) {
                Some(Cell::Missing) | None => builder.append_null(),
                Some(cell) => builder.append_value(cell.to_string()),
            }
        }
        fields.push(Field::new(*name, DataType::Utf8, true));
        arrays.push(Arc::new(builder.finish()));
    }

    for name in numeric_columns {
        let mut builder = Float64Builder::with_capacity(num_rows);
        for row in 0..num_rows {
            builder.append_option(table.cell(row, name).and_then(Cell::as_number));
        }
        fields.push(Field::new(*name, DataType::Float64, true));
        arrays.push(Arc::new(builder.finish()));
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

fn from_batches(
    source: &Table,
    group_columns: &[&str],
    numeric_columns: &[&str],
    batches: &[RecordBatch],
) -> Result<Table, Error> {
    let mut summary = Table::with_columns(&source.column_names());

    for batch in batches {
        let keys = group_columns
            .iter()
            .map(|name| Ok((*name, string_column(batch, name)?)))
            .collect::<Result<Vec<_>, Error>>()?;
        let sums = numeric_columns
            .iter()
            .map(|name| Ok((*name, float_column(batch, name)?)))
            .collect::<Result<Vec<_>, Error>>()?;

        for i in 0..batch.num_rows() {
            summary.push_row(source.columns().iter().map(|column| {
                let name = column.name();
                let cell = if let Some((_, array)) = keys.iter().find(|(key, _)| *key == name) {
                    Cell::Text(array.value(i).to_string())
                } else if let Some((_, array)) = sums.iter().find(|(key, _)| *key == name) {
                    // A group whose cells were all missing sums to zero.
                    Cell::Number(if array.is_valid(i) { array.value(i) } else { 0.0 })
                } else {
                    Cell::Text(String::new())
                };
                (name, cell)
            }));
        }
    }

    Ok(summary)
}

fn cast_column(batch: &RecordBatch, name: &str, data_type: &DataType) -> Result<ArrayRef, Error> {
    let array = batch
        .column_by_name(name)
        .ok_or_else(|| Error::UnknownColumn {
            column: name.to_string(),
        })?;

    if array.data_type() == data_type {
        return Ok(array.clone());
    }
    Ok(cast_with_options(
        array.as_ref(),
        data_type,
        &CastOptions::default(),
    )?)
}

fn string_column(batch: &RecordBatch, name: &str) -> Result<StringArray, Error> {
    let array = cast_column(batch, name, &DataType::Utf8)?;
    array
        .as_any()
        .downcast_ref::<StringArray>()
        .cloned()
        .ok_or_else(|| ArrowError::CastError(format!("column '{}' is not Utf8", name)).into())
}

fn float_column(batch: &RecordBatch, name: &str) -> Result<Float64Array, Error> {
    let array = cast_column(batch, name, &DataType::Float64)?;
    array
        .as_any()
        .downcast_ref::<Float64Array>()
        .cloned()
        .ok_or_else(|| ArrowError::CastError(format!("column '{}' is not Float64", name)).into())
}
