use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::table::Table;
use crate::value::render_cell;

/// Write a table as CSV with a header row. Returns bytes written.
pub fn write_table_csv(path: &Path, table: &Table) -> Result<u64> {
    let writer = BufWriter::new(File::create(path)?);
    write_csv(writer, table)
}

/// Write a table as CSV into any writer. Returns bytes written.
pub fn write_csv<W: Write>(writer: W, table: &Table) -> Result<u64> {
    let counting = CountingWriter::new(writer);
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(counting);

    writer.write_record(table.columns())?;
    for row in table.rows() {
        let record: Vec<String> = row.iter().map(render_cell).collect();
        writer.write_record(&record)?;
    }

    writer.flush()?;
    let mut counting = writer.into_inner().map_err(|err| err.into_error())?;
    counting.flush()?;
    Ok(counting.bytes_written())
}

/// Write a table as a JSON array of row objects. Returns bytes written.
pub fn write_table_json_records(path: &Path, table: &Table) -> Result<u64> {
    let data = serde_json::to_vec(&table.records())?;
    std::fs::write(path, &data)?;
    Ok(data.len() as u64)
}

/// Write a table as a column-oriented JSON object. Returns bytes written.
pub fn write_table_json_columns(path: &Path, table: &Table) -> Result<u64> {
    let data = serde_json::to_vec_pretty(&table.to_columns_json())?;
    std::fs::write(path, &data)?;
    Ok(data.len() as u64)
}

struct CountingWriter<W: Write> {
    inner: W,
    bytes: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, bytes: 0 }
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let size = self.inner.write(buf)?;
        self.bytes = self.bytes.saturating_add(size as u64);
        Ok(size)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
