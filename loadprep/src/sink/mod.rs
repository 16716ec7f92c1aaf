//! Persistence sinks for finished tables.
//!
//! A sink receives a table together with the `schema.table` it belongs to.
//! [`CsvDirectorySink`] writes the exact payload a bulk
//! `COPY ... FROM STDIN WITH (FORMAT CSV, HEADER FALSE)` expects, one file
//! per destination, so the load itself can happen with any client.
//! [`MemorySink`] keeps tables in memory for tests and dry runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{SinkError, SinkResult};
use crate::models::Table;

/// Target relation of a load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    pub schema: String,
    pub table: String,
}

impl Destination {
    /// Build a destination, rejecting names that are not plain identifiers.
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> SinkResult<Self> {
        let destination = Self {
            schema: schema.into(),
            table: table.into(),
        };
        destination.check()?;
        Ok(destination)
    }

    fn check(&self) -> SinkResult<()> {
        for part in [&self.schema, &self.table] {
            let plain = !part.is_empty()
                && !part.starts_with(|c: char| c.is_ascii_digit())
                && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !plain {
                return Err(SinkError::InvalidDestination(format!(
                    "'{}' is not a valid identifier in {}",
                    part, self
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

impl FromStr for Destination {
    type Err = SinkError;

    /// Parse `schema.table`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((schema, table)) => Destination::new(schema.trim(), table.trim()),
            None => Err(SinkError::InvalidDestination(format!(
                "expected schema.table, got '{}'",
                s
            ))),
        }
    }
}

/// Something that can persist a finished table.
pub trait TableSink {
    /// Write `table` to `destination`, returning the number of rows written.
    fn write(&mut self, table: &Table, destination: &Destination) -> SinkResult<usize>;
}

/// Bulk-load statement matching the payload written by [`write_copy_payload`].
pub fn copy_statement(destination: &Destination) -> String {
    format!(
        "COPY {}.{} FROM STDIN WITH (FORMAT CSV, HEADER FALSE)",
        destination.schema, destination.table
    )
}

/// Serialize `table` as comma-separated rows; nulls become empty fields.
pub fn write_copy_payload<W: Write>(table: &Table, writer: W, header: bool) -> SinkResult<()> {
    let mut out = csv::WriterBuilder::new().has_headers(false).from_writer(writer);

    if header {
        out.write_record(table.column_names())?;
    }
    for row in table.rows() {
        out.write_record(row.iter().map(|v| v.to_string()))?;
    }
    out.flush()?;
    Ok(())
}

/// Writes `<root>/<schema>/<table>.csv` per destination.
#[derive(Debug, Clone)]
pub struct CsvDirectorySink {
    root: PathBuf,
    header: bool,
}

impl CsvDirectorySink {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            header: false,
        }
    }

    /// Also write a header line (not accepted by `HEADER FALSE` loads).
    pub fn with_header(mut self, header: bool) -> Self {
        self.header = header;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, destination: &Destination) -> PathBuf {
        self.root
            .join(&destination.schema)
            .join(format!("{}.csv", destination.table))
    }
}

impl TableSink for CsvDirectorySink {
    fn write(&mut self, table: &Table, destination: &Destination) -> SinkResult<usize> {
        destination.check()?;
        let path = self.path_for(destination);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(&path)?;
        write_copy_payload(table, std::io::BufWriter::new(file), self.header)?;
        Ok(table.row_count())
    }
}

/// Keeps every written table in memory, in write order.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    written: Vec<(Destination, Table)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn written(&self) -> &[(Destination, Table)] {
        &self.written
    }

    /// Latest table written to `destination`.
    pub fn get(&self, destination: &Destination) -> Option<&Table> {
        self.written
            .iter()
            .rev()
            .find(|(d, _)| d == destination)
            .map(|(_, t)| t)
    }
}

impl TableSink for MemorySink {
    fn write(&mut self, table: &Table, destination: &Destination) -> SinkResult<usize> {
        self.written.push((destination.clone(), table.clone()));
        Ok(table.row_count())
    }
}
