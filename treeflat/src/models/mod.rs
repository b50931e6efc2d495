//! In-memory table model.
//!
//! A [`Table`] is a header plus rows of optional string cells. Every row has
//! exactly one cell per header column; missing and whitespace-only values are
//! stored as `None`.

use serde::Serialize;

/// A single cell. `None` means empty.
pub type Cell = Option<String>;

/// One table row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    cells: Vec<Cell>,
}

impl Row {
    /// Build a row, normalizing blank strings to `None`.
    pub fn new(cells: Vec<Cell>) -> Self {
        Self {
            cells: cells.into_iter().map(normalize_cell).collect(),
        }
    }

    /// Build a row from raw field text; blank fields become empty cells.
    pub fn from_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(fields.into_iter().map(|f| Some(f.into())).collect())
    }

    pub fn get(&self, col: usize) -> Option<&str> {
        self.cells.get(col).and_then(|c| c.as_deref())
    }

    pub fn is_empty_at(&self, col: usize) -> bool {
        self.get(col).is_none()
    }

    pub fn set(&mut self, col: usize, value: Cell) {
        if let Some(cell) = self.cells.get_mut(col) {
            *cell = normalize_cell(value);
        }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Copy of this row with one cell replaced.
    pub fn with_cell(&self, col: usize, value: impl Into<String>) -> Self {
        let mut row = self.clone();
        row.set(col, Some(value.into()));
        row
    }

    fn resize(&mut self, width: usize) {
        self.cells.resize(width, None);
    }

    fn push(&mut self, value: Cell) {
        self.cells.push(normalize_cell(value));
    }
}

fn normalize_cell(cell: Cell) -> Cell {
    cell.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == v.len() {
            Some(v)
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// A rectangular table with named columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Build a table; rows are padded or truncated to the header width.
    pub fn with_rows(headers: Vec<String>, rows: Vec<Row>) -> Self {
        let mut table = Self::new(headers);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, idx: usize) -> Option<&Row> {
        self.rows.get(idx)
    }

    pub fn row_mut(&mut self, idx: usize) -> Option<&mut Row> {
        self.rows.get_mut(idx)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    /// Index of a column by exact header name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    pub fn push_row(&mut self, mut row: Row) {
        row.resize(self.headers.len());
        self.rows.push(row);
    }

    pub fn reserve(&mut self, additional: usize) {
        self.rows.reserve(additional);
    }

    /// Append a column, computing each row's value from its index and contents.
    pub fn push_column<F>(&mut self, name: impl Into<String>, mut value: F)
    where
        F: FnMut(usize, &Row) -> Cell,
    {
        self.headers.push(name.into());
        for (idx, row) in self.rows.iter_mut().enumerate() {
            let cell = value(idx, row);
            row.push(cell);
        }
    }

    /// Empty table with the same columns
    pub fn empty_like(&self) -> Self {
        Self::new(self.headers.clone())
    }
}
