//! Replacing natural keys with surrogate ids.

use std::collections::HashMap;

use crate::error::{StageError, StageResult, TableResult};
use crate::logs::PipelineLog;
use crate::models::{Column, Table, Value, ValueKey};

/// Swap `target[target_key]` for the matching `reference[ref_id]`.
///
/// The reference is deduplicated on `ref_key` with the first row winning.
/// The new column is named `ref_id` and carries the reference id type. It
/// overwrites a same-named target column in place, otherwise it is appended
/// last; `target_key` is removed. Keys without a match map to null.
pub fn map_to_id(
    reference: &Table,
    ref_key: &str,
    ref_id: &str,
    target: &Table,
    target_key: &str,
    log: &dyn PipelineLog,
) -> StageResult<Table> {
    log.info(&format!("Mapping {}...", ref_id));

    match map_columns(reference, ref_key, ref_id, target, target_key) {
        Ok((table, unmatched)) => {
            if unmatched > 0 {
                log.warning(&format!("{} {} values have no {}.", unmatched, target_key, ref_id));
            }
            log.success("Column mapping completed.");
            Ok(table)
        }
        Err(reason) => {
            log.error(&format!("Could not map {}: {}", ref_id, reason));
            Err(StageError::new(format!("map {}", ref_id), reason))
        }
    }
}

fn map_columns(
    reference: &Table,
    ref_key: &str,
    ref_id: &str,
    target: &Table,
    target_key: &str,
) -> TableResult<(Table, usize)> {
    let keys = reference.column(ref_key, "mapping reference")?;
    let ids = reference.column(ref_id, "mapping reference")?;
    let lookup_keys = target.column(target_key, "mapping target")?;

    let mut mapping: HashMap<ValueKey, &Value> = HashMap::new();
    for (key, id) in keys.values.iter().zip(&ids.values) {
        if !key.is_null() {
            mapping.entry(key.key()).or_insert(id);
        }
    }

    let mut unmatched = 0;
    let mapped: Vec<Value> = lookup_keys
        .values
        .iter()
        .map(|key| match mapping.get(&key.key()) {
            Some(id) => (*id).clone(),
            None => {
                if !key.is_null() {
                    unmatched += 1;
                }
                Value::Null
            }
        })
        .collect();

    let mut out = target.clone();
    out.drop_column(target_key);
    out.set_column(Column::new(ref_id, ids.dtype, mapped))?;
    Ok((out, unmatched))
}
