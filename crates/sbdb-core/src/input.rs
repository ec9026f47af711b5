use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};
use crate::table::Table;
use crate::value::parse_cell;

/// Load a CSV file into a [`Table`], inferring cell types.
///
/// `skip_rows` drops that many records after the header (unit rows in
/// published reference libraries).
pub fn read_table_csv(path: &Path, skip_rows: usize) -> Result<Table> {
    read_csv(File::open(path)?, skip_rows)
}

/// Load CSV from any reader into a [`Table`].
pub fn read_csv<R: Read>(reader: R, skip_rows: usize) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);

    let headers = reader
        .headers()?
        .iter()
        .map(|header| header.trim().to_string())
        .collect::<Vec<_>>();
    let mut table = Table::new(headers)?;

    for (idx, result) in reader.records().enumerate() {
        let record = result?;
        if idx < skip_rows {
            continue;
        }
        let row = record.iter().map(parse_cell).collect::<Vec<_>>();
        table.push_row(row).map_err(|err| match err {
            Error::MalformedTable(message) => {
                Error::MalformedTable(format!("csv record {}: {message}", idx + 1))
            }
            other => other,
        })?;
    }

    Ok(table)
}
