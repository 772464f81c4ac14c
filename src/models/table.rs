use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A grid of string cells. Row 0 is the header row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Table(Vec<Vec<String>>);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TableError {
    #[error("Table has no header row")]
    Empty,
    #[error("Header row has no columns")]
    NoColumns,
    #[error("Row {row} has {actual} cells, header has {expected}")]
    Ragged { row: usize, expected: usize, actual: usize },
    #[error("Cell ({row}, {col}) is outside the table")]
    CellOutOfBounds { row: usize, col: usize },
    #[error("Row index {0} is outside the table")]
    RowOutOfBounds(usize),
    #[error("Column index {0} is outside the table")]
    ColumnOutOfBounds(usize),
}

impl Table {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self(rows)
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.0
    }

    pub fn into_rows(self) -> Vec<Vec<String>> {
        self.0
    }

    pub fn header(&self) -> Option<&[String]> {
        self.0.first().map(Vec::as_slice)
    }

    /// Number of columns as defined by the header row.
    pub fn width(&self) -> usize {
        self.header().map_or(0, <[String]>::len)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_rectangular(&self) -> bool {
        let width = self.width();
        self.0.iter().all(|row| row.len() == width)
    }

    /// Pads short rows with empty cells and truncates long rows so every row
    /// matches the header width.
    pub fn rectangularize(mut self) -> Self {
        let width = self.width();
        for row in self.0.iter_mut().skip(1) {
            row.resize(width, String::new());
        }
        self
    }

    /// Strict check used for reviewer-supplied tables: nothing is padded.
    pub fn validate(&self) -> Result<(), TableError> {
        let width = match self.header() {
            None => return Err(TableError::Empty),
            Some([]) => return Err(TableError::NoColumns),
            Some(header) => header.len(),
        };

        for (index, row) in self.0.iter().enumerate() {
            if row.len() != width {
                return Err(TableError::Ragged { row: index, expected: width, actual: row.len() });
            }
        }

        Ok(())
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.0.get(row).and_then(|r| r.get(col)).map(String::as_str)
    }

    /// Returns `Ok(true)` when the stored value changed.
    pub fn set_cell(&mut self, row: usize, col: usize, value: String) -> Result<bool, TableError> {
        let cell = self
            .0
            .get_mut(row)
            .and_then(|r| r.get_mut(col))
            .ok_or(TableError::CellOutOfBounds { row, col })?;

        if *cell == value {
            return Ok(false);
        }

        *cell = value;
        Ok(true)
    }

    /// Inserts a blank data row before `at`. Row 0 stays the header.
    pub fn insert_row(&mut self, at: usize) -> Result<(), TableError> {
        if at == 0 || at > self.0.len() {
            return Err(TableError::RowOutOfBounds(at));
        }

        let width = self.width();
        self.0.insert(at, vec![String::new(); width]);
        Ok(())
    }

    /// Inserts a column before `at` with `header` as its label.
    pub fn insert_column(&mut self, at: usize, header: String) -> Result<(), TableError> {
        if self.0.is_empty() {
            return Err(TableError::Empty);
        }
        if at > self.width() {
            return Err(TableError::ColumnOutOfBounds(at));
        }

        for (index, row) in self.0.iter_mut().enumerate() {
            let value = if index == 0 { header.clone() } else { String::new() };
            let position = at.min(row.len());
            row.insert(position, value);
        }

        Ok(())
    }

    /// Renders the table as CSV, quoting cells that contain a comma, a quote
    /// or a newline.
    pub fn to_csv(&self) -> String {
        self.0
            .iter()
            .map(|row| row.iter().map(|cell| csv_escape(cell)).collect::<Vec<_>>().join(","))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl From<Vec<Vec<String>>> for Table {
    fn from(rows: Vec<Vec<String>>) -> Self {
        Self(rows)
    }
}

impl From<Vec<Vec<&str>>> for Table {
    fn from(rows: Vec<Vec<&str>>) -> Self {
        Self(
            rows.into_iter()
                .map(|row| row.into_iter().map(str::to_string).collect())
                .collect(),
        )
    }
}

fn csv_escape(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') || cell.contains('\n') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangularize_pads_and_truncates() {
        let table = Table::from(vec![vec!["a", "b", "c"], vec!["1"], vec!["1", "2", "3", "4"]]);
        let table = table.rectangularize();

        assert!(table.is_rectangular());
        assert_eq!(table.rows()[1], vec!["1", "", ""]);
        assert_eq!(table.rows()[2], vec!["1", "2", "3"]);
    }

    #[test]
    fn test_validate_rejects_ragged_rows() {
        let table = Table::from(vec![vec!["a", "b"], vec!["1"]]);
        assert_eq!(
            table.validate(),
            Err(TableError::Ragged { row: 1, expected: 2, actual: 1 })
        );
        assert_eq!(Table::default().validate(), Err(TableError::Empty));
        assert_eq!(Table::new(vec![vec![]]).validate(), Err(TableError::NoColumns));
    }

    #[test]
    fn test_set_cell_reports_change() {
        let mut table = Table::from(vec![vec!["h"], vec!["x"]]);

        assert_eq!(table.set_cell(1, 0, "y".to_string()), Ok(true));
        assert_eq!(table.set_cell(1, 0, "y".to_string()), Ok(false));
        assert_eq!(
            table.set_cell(5, 0, "z".to_string()),
            Err(TableError::CellOutOfBounds { row: 5, col: 0 })
        );
        assert_eq!(table.cell(1, 0), Some("y"));
    }

    #[test]
    fn test_insert_row_keeps_header_first() {
        let mut table = Table::from(vec![vec!["a", "b"], vec!["1", "2"]]);

        assert_eq!(table.insert_row(0), Err(TableError::RowOutOfBounds(0)));
        table.insert_row(1).unwrap();
        table.insert_row(3).unwrap();

        assert_eq!(table.len(), 4);
        assert_eq!(table.rows()[1], vec!["", ""]);
        assert_eq!(table.rows()[2], vec!["1", "2"]);
        assert_eq!(table.rows()[3], vec!["", ""]);
    }

    #[test]
    fn test_insert_column() {
        let mut table = Table::from(vec![vec!["a", "b"], vec!["1", "2"]]);
        table.insert_column(1, "Column 2".to_string()).unwrap();

        assert_eq!(table.rows()[0], vec!["a", "Column 2", "b"]);
        assert_eq!(table.rows()[1], vec!["1", "", "2"]);
        assert_eq!(
            table.insert_column(9, "x".to_string()),
            Err(TableError::ColumnOutOfBounds(9))
        );
    }

    #[test]
    fn test_to_csv_quotes_special_cells() {
        let table = Table::from(vec![vec!["name", "note"], vec!["Acme, Inc", "say \"hi\""]]);
        assert_eq!(table.to_csv(), "name,note\n\"Acme, Inc\",\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_serializes_as_plain_grid() {
        let table = Table::from(vec![vec!["a"], vec!["1"]]);
        assert_eq!(serde_json::to_string(&table).unwrap(), r#"[["a"],["1"]]"#);
    }
}
