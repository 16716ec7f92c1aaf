//! Referential filtering between tables.

use std::collections::HashSet;

use crate::error::TableResult;
use crate::logs::PipelineLog;
use crate::models::{Table, ValueKey};

/// Keep the rows of `table` whose `column` value also appears in
/// `reference[column]`.
///
/// Membership is by value: duplicates in `table` are all retained and
/// missing keys never match.
pub fn filter_by_reference(
    table: &Table,
    reference: &Table,
    column: &str,
    log: &dyn PipelineLog,
) -> TableResult<Table> {
    let keys = table.column(column, "filtered table")?;
    let allowed: HashSet<ValueKey> = reference
        .column(column, "reference table")?
        .values
        .iter()
        .filter(|v| !v.is_null())
        .map(|v| v.key())
        .collect();

    let keep: Vec<bool> = keys
        .values
        .iter()
        .map(|v| !v.is_null() && allowed.contains(&v.key()))
        .collect();
    let out = table.filter(&keep);

    log.info(&format!(
        "{} rows without a matching {} in the reference dropped.",
        table.row_count() - out.row_count(),
        column
    ));
    Ok(out)
}
