//! The Meta step (§6.1): `meta.csv` is always supplied in full, so this
//! step resets and reloads `meta` on every run regardless of pipeline mode.

use kbo_pipeline::{CancellationToken, Step, StepCounters};
use kbo_store::schema;
use kbo_store::Store;
use std::path::{Path, PathBuf};

pub struct ImportMeta {
    folder: PathBuf,
}

impl ImportMeta {
    pub fn new(folder: &Path) -> Self {
        Self {
            folder: folder.to_path_buf(),
        }
    }
}

impl Step for ImportMeta {
    fn name(&self) -> &str {
        "Meta"
    }

    fn prepare(&mut self, _store: &Store, _ct: &CancellationToken) -> anyhow::Result<Option<u64>> {
        Ok(Some(kbo_csv::estimate_row_count(&self.folder.join("meta.csv"))?))
    }

    fn execute(
        &mut self,
        store: &mut Store,
        ct: &CancellationToken,
        progress: &mut dyn FnMut(u64),
    ) -> anyhow::Result<StepCounters> {
        store.reset_table(&schema::META)?;

        let path = self.folder.join("meta.csv");
        let mut imported = 0u64;
        let mut errors = 0u64;
        if !path.exists() {
            tracing::warn!(path = %path.display(), "required csv file missing");
            errors += 1;
        }
        let rows = kbo_csv::read_records(&path)?;
        let mut stmt = store
            .connection()
            .prepare("INSERT INTO meta (variable, value) VALUES (?1, ?2)")?;
        for (i, row) in rows.enumerate() {
            if ct.is_cancelled() {
                break;
            }
            let row = row?;
            let variable = row.get("Variable");
            if variable.is_empty() {
                errors += 1;
                continue;
            }
            stmt.execute(rusqlite::params![variable, row.get("Value")])?;
            imported += 1;
            if i % 1000 == 0 {
                progress(i as u64);
            }
        }
        progress(imported);

        Ok(StepCounters {
            imported,
            deleted: 0,
            errors,
        })
    }
}
