use std::io::Read;
#[cfg(feature = "xlsx")]
use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[cfg(feature = "xlsx")]
    #[error("Spreadsheet error: {0}")]
    Workbook(#[from] calamine::Error),
    #[error("No header row")]
    NoHeader,
}

/// An already-parsed grid: one header row and any number of data rows.
/// Rows may be ragged; missing cells read as empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Treats the first row of a spreadsheet-like grid as the header row.
    pub fn from_grid(grid: Vec<Vec<String>>) -> Result<Self, TableError> {
        let mut rows = grid.into_iter();
        let headers = rows.next().ok_or(TableError::NoHeader)?;
        Ok(Self {
            headers: headers.into_iter().map(|h| h.trim().to_string()).collect(),
            rows: rows.filter(|r| r.iter().any(|c| !c.trim().is_empty())).collect(),
        })
    }

    /// Reads comma-separated text with a header row, from a file or pasted input.
    pub fn from_csv_reader<R: Read>(data: R) -> Result<Self, TableError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(data);

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(TableError::NoHeader);
        }

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            if record.iter().all(str::is_empty) {
                continue;
            }
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self { headers, rows })
    }

    pub fn from_csv_str(text: &str) -> Result<Self, TableError> {
        Self::from_csv_reader(text.as_bytes())
    }

    /// Reads the first worksheet of an .xlsx/.xls/.ods workbook.
    #[cfg(feature = "xlsx")]
    pub fn from_workbook(path: &Path) -> Result<Self, TableError> {
        use calamine::{Data, DataType, Reader};

        let mut workbook = calamine::open_workbook_auto(path)?;
        let range = match workbook.worksheet_range_at(0) {
            Some(range) => range?,
            None => return Err(TableError::NoHeader),
        };
        let grid = range
            .rows()
            .map(|row| {
                row.iter()
                    .map(|cell| match cell {
                        Data::Empty => String::new(),
                        Data::DateTime(_) | Data::DateTimeIso(_) => cell
                            .as_date()
                            .map(|d| d.to_string())
                            .unwrap_or_else(|| cell.to_string()),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .collect();
        Self::from_grid(grid)
    }

    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or_default()
    }
}
