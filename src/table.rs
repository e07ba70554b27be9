use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

pub const PLATFORM_COLUMN: &str = "Platform";
pub const ACCOUNT_COLUMN: &str = "Account";

/// One upstream insight row: field key to raw JSON value.
pub type InsightRecord = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Missing,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Missing,
            Value::Number(number) => number
                .as_f64()
                .map(Cell::Number)
                .unwrap_or_else(|| Cell::Text(number.to_string())),
            Value::String(text) => Cell::Text(text.clone()),
            other => Cell::Text(other.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(value) => Some(*value),
            _ => None,
        }
    }

    fn kind(&self) -> ColumnType {
        match self {
            Cell::Missing => ColumnType::Empty,
            Cell::Number(_) => ColumnType::Numeric,
            Cell::Text(_) => ColumnType::Text,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Missing => Ok(()),
            Cell::Number(value) => write!(f, "{}", value),
            Cell::Text(text) => f.write_str(text),
        }
    }
}

/// Semantic type of a column, fixed from the values observed at ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// No value observed yet, only missing cells.
    Empty,
    Numeric,
    Text,
}

impl ColumnType {
    fn observe(self, other: ColumnType) -> ColumnType {
        match (self, other) {
            (ColumnType::Empty, kind) | (kind, ColumnType::Empty) => kind,
            (ColumnType::Numeric, ColumnType::Numeric) => ColumnType::Numeric,
            _ => ColumnType::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    kind: ColumnType,
}

impl Column {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ColumnType {
        self.kind
    }
}

/// Rows sharing one ordered, typed column set.
///
/// Every row always holds one cell per column; cells absent from a source
/// row are stored as [`Cell::Missing`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table with the given columns and no rows.
    pub fn with_columns(names: &[&str]) -> Self {
        let mut table = Table::new();
        for name in names {
            table.add_column(name, ColumnType::Empty);
        }
        table
    }

    /// Builds a table from raw insight rows, columns in first-seen order.
    /// `column_name` maps each record key to the column it is stored under.
    pub fn from_records<'a, F>(records: &'a [InsightRecord], column_name: F) -> Self
    where
        F: Fn(&'a str) -> &'a str,
    {
        let mut table = Table::new();
        for record in records {
            table.push_row(
                record
                    .iter()
                    .map(|(key, value)| (column_name(key.as_str()), Cell::from_json(value))),
            );
        }
        table
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.index.get(name).map(|&idx| &self.columns[idx])
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name()).collect()
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn cell(&self, row: usize, name: &str) -> Option<&Cell> {
        let idx = *self.index.get(name)?;
        self.rows.get(row).map(|cells| &cells[idx])
    }

    /// Appends a row. Later cells for the same column overwrite earlier ones.
    pub fn push_row<'a, I>(&mut self, cells: I)
    where
        I: IntoIterator<Item = (&'a str, Cell)>,
    {
        self.rows.push(vec![Cell::Missing; self.columns.len()]);
        let row = self.rows.len() - 1;
        for (name, cell) in cells {
            self.set(row, name, cell);
        }
    }

    /// Writes a cell, adding the column (missing for every other row) if needed.
    pub fn set(&mut self, row: usize, name: &str, cell: Cell) {
        let idx = self.add_column(name, cell.kind());
        self.rows[row][idx] = cell;
    }

    fn add_column(&mut self, name: &str, kind: ColumnType) -> usize {
        if let Some(&idx) = self.index.get(name) {
            let column = &mut self.columns[idx];
            column.kind = column.kind.observe(kind);
            return idx;
        }

        let idx = self.columns.len();
        self.columns.push(Column {
            name: name.to_string(),
            kind,
        });
        self.index.insert(name.to_string(), idx);
        for row in &mut self.rows {
            row.push(Cell::Missing);
        }
        idx
    }

    /// Stacks tables row-wise over the union of their column sets.
    pub fn concat<'a, I>(tables: I) -> Table
    where
        I: IntoIterator<Item = &'a Table>,
    {
        let mut out = Table::new();
        for table in tables {
            let mapping: Vec<usize> = table
                .columns
                .iter()
                .map(|column| out.add_column(&column.name, column.kind))
                .collect();

            for row in &table.rows {
                let mut cells = vec![Cell::Missing; out.columns.len()];
                for (cell, &target) in row.iter().zip(&mapping) {
                    cells[target] = cell.clone();
                }
                out.rows.push(cells);
            }
        }
        out
    }

    /// A copy with the given columns first (those that exist), then the rest
    /// in their current order.
    pub fn with_leading_columns(&self, leading: &[&str]) -> Table {
        let first: Vec<usize> = leading
            .iter()
            .filter_map(|name| self.index.get(*name).copied())
            .collect();
        let order: Vec<usize> = first
            .iter()
            .copied()
            .chain((0..self.columns.len()).filter(|idx| !first.contains(idx)))
            .collect();
        self.project(&order)
    }

    /// A copy without the named column; unchanged if it is absent.
    pub fn without_column(&self, name: &str) -> Table {
        let order: Vec<usize> = (0..self.columns.len())
            .filter(|&idx| self.columns[idx].name != name)
            .collect();
        self.project(&order)
    }

    fn project(&self, order: &[usize]) -> Table {
        let columns: Vec<Column> = order.iter().map(|&idx| self.columns[idx].clone()).collect();
        let index = columns
            .iter()
            .enumerate()
            .map(|(idx, column)| (column.name.clone(), idx))
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| order.iter().map(|&idx| row[idx].clone()).collect())
            .collect();

        Table {
            columns,
            index,
            rows,
        }
    }
}
