#![forbid(unsafe_code)]

use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use rill_table::{Column, ColumnData, Table, TableError};
use rill_types::{DType, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("csv input has no headers")]
    MissingHeaders,
    #[error("cannot open {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot write {path}: {source}")]
    Create {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot parse '{value}' as {dtype} for column '{column}'")]
    FieldParse {
        column: String,
        value: String,
        dtype: DType,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error(transparent)]
    Table(#[from] TableError),
}

/// Read a comma-separated file into a table.
///
/// The first line is the header; every record must match its field count.
/// Column types are inferred from all non-empty cells: `int64` if every
/// one parses entirely as a signed integer, otherwise `float64` if every
/// one parses as a double, otherwise `utf8`. Empty cells are NULL.
pub fn read_csv(path: impl AsRef<Path>) -> Result<Table, IoError> {
    let path = path.as_ref();
    let input = fs::read_to_string(path).map_err(|source| IoError::Open {
        path: path.display().to_string(),
        source,
    })?;
    read_csv_str(&input)
}

pub fn read_csv_str(input: &str) -> Result<Table, IoError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(input.as_bytes());

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(IoError::MissingHeaders);
    }

    let mut records = Vec::new();
    for record in reader.records() {
        records.push(record?);
    }

    let columns = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| build_column(name, idx, &records))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Table::new(columns)?)
}

fn build_column(name: &str, idx: usize, records: &[StringRecord]) -> Result<Column, IoError> {
    let cells = records
        .iter()
        .map(|record| record.get(idx).unwrap_or_default());

    let dtype = infer_dtype(cells.clone());
    let parse_failure = |value: &str| IoError::FieldParse {
        column: name.to_owned(),
        value: value.to_owned(),
        dtype,
    };

    let data = match dtype {
        DType::Int64 => ColumnData::Int64(
            cells
                .map(|cell| {
                    if cell.is_empty() {
                        Ok(None)
                    } else {
                        cell.parse::<i64>().map(Some).map_err(|_| parse_failure(cell))
                    }
                })
                .collect::<Result<_, _>>()?,
        ),
        DType::Float64 => ColumnData::Float64(
            cells
                .map(|cell| {
                    if cell.is_empty() {
                        Ok(None)
                    } else {
                        cell.parse::<f64>().map(Some).map_err(|_| parse_failure(cell))
                    }
                })
                .collect::<Result<_, _>>()?,
        ),
        DType::Utf8 | DType::Bool => ColumnData::Utf8(
            cells
                .map(|cell| {
                    if cell.is_empty() {
                        None
                    } else {
                        Some(cell.to_owned())
                    }
                })
                .collect(),
        ),
    };

    Ok(Column::new(name, data))
}

fn infer_dtype<'a>(cells: impl Iterator<Item = &'a str> + Clone) -> DType {
    let mut non_empty = cells.filter(|cell| !cell.is_empty()).peekable();
    if non_empty.peek().is_none() {
        return DType::Utf8;
    }
    if non_empty.clone().all(|cell| cell.parse::<i64>().is_ok()) {
        return DType::Int64;
    }
    if non_empty.clone().all(|cell| cell.parse::<f64>().is_ok()) {
        return DType::Float64;
    }
    DType::Utf8
}

/// Write a table as comma-separated text: header names in order, one
/// record per row, LF terminators, NULL as an empty field. Values are
/// never quoted or escaped.
pub fn write_csv(path: impl AsRef<Path>, table: &Table) -> Result<(), IoError> {
    let path = path.as_ref();
    let output = write_csv_string(table)?;
    fs::write(path, output).map_err(|source| IoError::Create {
        path: path.display().to_string(),
        source,
    })
}

pub fn write_csv_string(table: &Table) -> Result<String, IoError> {
    let mut writer = WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(Vec::new());

    let headers = table
        .columns()
        .iter()
        .map(Column::name)
        .collect::<Vec<_>>();
    writer.write_record(&headers)?;

    for row in 0..table.num_rows() {
        let record = table
            .columns()
            .iter()
            .map(|column| cell_text(column, row))
            .collect::<Vec<_>>();
        writer.write_record(&record)?;
    }

    let bytes = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

fn cell_text(column: &Column, row: usize) -> String {
    match column.value(row) {
        Value::Null => String::new(),
        value => value.to_string(),
    }
}
