use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, InputKind, Result};

/// Descriptive statistics of an uploaded CSV table.
///
/// The summary is what gets sent to the model, never the raw rows.  Its
/// text rendering is stable so the same upload always produces the same
/// request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularSummary {
    /// Number of data rows, excluding the header.
    pub rows: usize,
    /// One entry per column, in header order.
    pub columns: Vec<ColumnSummary>,
}

/// Statistics for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    /// Header name.
    pub name: String,
    /// Number of non-empty cells.
    pub count: usize,
    /// Kind-specific statistics.
    pub stats: ColumnStats,
}

/// Statistics that depend on whether a column is numeric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnStats {
    /// Every non-empty cell parsed as a number.
    Numeric {
        mean: f64,
        /// Sample standard deviation; `None` with fewer than two values.
        std: Option<f64>,
        min: f64,
        max: f64,
    },
    /// At least one cell was not a number, or the column is empty.
    Text {
        unique: usize,
        /// Most frequent value and its frequency; first seen wins ties.
        top: Option<(String, usize)>,
    },
}

impl TabularSummary {
    /// Summarize a CSV document with a header row.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv
            .headers()
            .map_err(decode_error)?
            .iter()
            .map(str::to_string)
            .collect();
        if headers.is_empty() || headers.iter().all(String::is_empty) {
            return Err(Error::input_decode(InputKind::Table, "missing header row"));
        }

        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        let mut rows = 0;
        for record in csv.records() {
            let record = record.map_err(decode_error)?;
            for (column, value) in cells.iter_mut().zip(record.iter()) {
                if !value.is_empty() {
                    column.push(value.to_string());
                }
            }
            rows += 1;
        }
        if rows == 0 {
            return Err(Error::input_decode(InputKind::Table, "no data rows"));
        }

        let columns = headers
            .into_iter()
            .zip(cells)
            .map(|(name, values)| ColumnSummary::new(name, &values))
            .collect();
        Ok(Self { rows, columns })
    }

    /// Summarize a CSV file on disk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| {
            Error::input_decode(
                InputKind::Table,
                format!("cannot read {}: {err}", path.display()),
            )
        })?;
        Self::from_reader(file)
    }

    /// Looks up a column by header name.
    pub fn column(&self, name: &str) -> Option<&ColumnSummary> {
        self.columns.iter().find(|c| c.name == name)
    }
}

impl ColumnSummary {
    fn new(name: String, values: &[String]) -> Self {
        let count = values.len();
        let numbers: Option<Vec<f64>> = values.iter().map(|v| v.parse::<f64>().ok()).collect();
        let stats = match numbers {
            Some(numbers) if !numbers.is_empty() && numbers.iter().all(|n| n.is_finite()) => {
                numeric_stats(&numbers)
            }
            _ => text_stats(values),
        };
        Self { name, count, stats }
    }
}

fn numeric_stats(numbers: &[f64]) -> ColumnStats {
    let n = numbers.len() as f64;
    let mean = numbers.iter().sum::<f64>() / n;
    let std = if numbers.len() > 1 {
        let var = numbers.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
        Some(var.sqrt())
    } else {
        None
    };
    let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
    let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    ColumnStats::Numeric {
        mean,
        std,
        min,
        max,
    }
}

fn text_stats(values: &[String]) -> ColumnStats {
    let mut frequency: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for value in values {
        let seen = frequency.entry(value.as_str()).or_insert(0);
        if *seen == 0 {
            order.push(value.as_str());
        }
        *seen += 1;
    }
    let mut top: Option<(String, usize)> = None;
    for value in &order {
        let freq = frequency[value];
        if top.as_ref().is_none_or(|(_, best)| freq > *best) {
            top = Some((value.to_string(), freq));
        }
    }
    ColumnStats::Text {
        unique: order.len(),
        top,
    }
}

fn decode_error(err: csv::Error) -> Error {
    Error::input_decode(InputKind::Table, format!("invalid CSV: {err}"))
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let s = format!("{value:.4}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

impl fmt::Display for TabularSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Table summary: {} rows, {} columns",
            self.rows,
            self.columns.len()
        )?;
        for column in &self.columns {
            write!(f, "- {}: count={}", column.name, column.count)?;
            match &column.stats {
                ColumnStats::Numeric {
                    mean,
                    std,
                    min,
                    max,
                } => {
                    write!(f, ", mean={}", format_number(*mean))?;
                    match std {
                        Some(std) => write!(f, ", std={}", format_number(*std))?,
                        None => write!(f, ", std=n/a")?,
                    }
                    writeln!(
                        f,
                        ", min={}, max={}",
                        format_number(*min),
                        format_number(*max)
                    )?;
                }
                ColumnStats::Text { unique, top } => {
                    write!(f, ", unique={unique}")?;
                    match top {
                        Some((value, freq)) => writeln!(f, ", top={value} ({freq})")?,
                        None => writeln!(f)?,
                    }
                }
            }
        }
        Ok(())
    }
}
