//! Shared machinery for every CSV-backed table step: full-mode reset plus
//! bulk insert, or incremental delete-then-insert, with error accumulation
//! and cancellation checked at each record boundary (§5).

use crate::paths::{delete_csv, full_csv, insert_csv};
use kbo_codes::CodeCache;
use kbo_csv::Record;
use kbo_mapper::MapResult;
use kbo_pipeline::CancellationToken;
use kbo_store::schema::TableDef;
use kbo_store::Store;
use std::path::Path;

/// One table step's full configuration: where its rows come from, how a
/// raw CSV row becomes a target row, and how a target row is bound into
/// the single reused prepared insert statement.
pub struct FactStepConfig<'a, T> {
    pub table: &'a TableDef,
    pub stem: &'a str,
    pub key_column: &'a str,
    pub delete_key_csv_column: &'a str,
    pub insert_sql: &'a str,
    pub map_row: Box<dyn Fn(&Record, &CodeCache) -> MapResult<T> + 'a>,
    pub bind: Box<dyn Fn(&mut rusqlite::Statement, &T) -> rusqlite::Result<()> + 'a>,
}

/// Estimates the step's row count ahead of execution: the full file in
/// full mode, the `_insert.csv` file in incremental mode (§4.3).
pub fn prepare_estimate(folder: &Path, stem: &str, incremental: bool) -> anyhow::Result<Option<u64>> {
    let path = if incremental {
        insert_csv(folder, stem)
    } else {
        full_csv(folder, stem)
    };
    Ok(Some(kbo_csv::estimate_row_count(&path)?))
}

pub struct FactStepResult {
    pub imported: u64,
    pub deleted: u64,
    pub errors: u64,
}

pub fn execute<T>(
    store: &mut Store,
    folder: &Path,
    incremental: bool,
    codes: &CodeCache,
    ct: &CancellationToken,
    config: &FactStepConfig<T>,
    progress: &mut dyn FnMut(u64),
) -> anyhow::Result<FactStepResult> {
    let mut imported = 0u64;
    let mut errors = 0u64;

    if !incremental {
        store.reset_table(config.table)?;
        let path = full_csv(folder, config.stem);
        if !path.exists() {
            tracing::warn!(step = config.stem, path = %path.display(), "required csv file missing");
            errors += 1;
        }
        let rows = kbo_csv::read_records(&path)?;
        let mut stmt = store.connection().prepare(config.insert_sql)?;
        for (i, row) in rows.enumerate() {
            if ct.is_cancelled() {
                break;
            }
            let row = row?;
            match (config.map_row)(&row, codes) {
                MapResult { success: true, target: Some(target), .. } => {
                    (config.bind)(&mut stmt, &target)?;
                    imported += 1;
                }
                MapResult { errors: row_errors, .. } => {
                    for message in row_errors {
                        tracing::debug!(step = config.stem, error = %message, "row mapping error");
                    }
                    errors += 1;
                }
            }
            if i % 1000 == 0 {
                progress(i as u64);
            }
        }
        progress(imported);
        return Ok(FactStepResult { imported, deleted: 0, errors });
    }

    // Incremental: delete-by-key first, then insert.
    let delete_path = delete_csv(folder, config.stem);
    if !delete_path.exists() {
        tracing::warn!(step = config.stem, path = %delete_path.display(), "required csv file missing");
        errors += 1;
    }
    let delete_keys: Vec<String> = kbo_csv::read_records(&delete_path)?
        .filter_map(|r| r.ok())
        .map(|r| r.get(config.delete_key_csv_column).to_string())
        .filter(|k| !k.is_empty())
        .collect();
    let deleted = if !delete_keys.is_empty() {
        store.delete_by_keys(config.table.name, config.key_column, delete_keys.into_iter())? as u64
    } else {
        0
    };

    let insert_path = insert_csv(folder, config.stem);
    if !insert_path.exists() {
        tracing::warn!(step = config.stem, path = %insert_path.display(), "required csv file missing");
        errors += 1;
    }
    let rows = kbo_csv::read_records(&insert_path)?;
    let mut stmt = store.connection().prepare(config.insert_sql)?;
    for (i, row) in rows.enumerate() {
        if ct.is_cancelled() {
            break;
        }
        let row = row?;
        match (config.map_row)(&row, codes) {
            MapResult { success: true, target: Some(target), .. } => {
                (config.bind)(&mut stmt, &target)?;
                imported += 1;
            }
            MapResult { errors: row_errors, .. } => {
                for message in row_errors {
                    tracing::debug!(step = config.stem, error = %message, "row mapping error");
                }
                errors += 1;
            }
        }
        if i % 1000 == 0 {
            progress(i as u64);
        }
    }
    progress(imported);

    Ok(FactStepResult { imported, deleted, errors })
}
