//! The Branches step (§3.2, §4.13).

use crate::fact_step::{self, FactStepConfig};
use kbo_codes::CodeCache;
use kbo_pipeline::{CancellationToken, Step, StepCounters};
use kbo_store::schema;
use kbo_store::Store;
use std::path::{Path, PathBuf};

pub struct ImportBranches {
    folder: PathBuf,
    incremental: bool,
}

impl ImportBranches {
    pub fn new(folder: &Path, incremental: bool) -> Self {
        Self {
            folder: folder.to_path_buf(),
            incremental,
        }
    }
}

impl Step for ImportBranches {
    fn name(&self) -> &str {
        "Branches"
    }

    fn prepare(&mut self, _store: &Store, _ct: &CancellationToken) -> anyhow::Result<Option<u64>> {
        fact_step::prepare_estimate(&self.folder, "branch", self.incremental)
    }

    fn execute(
        &mut self,
        store: &mut Store,
        ct: &CancellationToken,
        progress: &mut dyn FnMut(u64),
    ) -> anyhow::Result<StepCounters> {
        let codes = CodeCache::load(store)?;
        let config = FactStepConfig {
            table: &schema::BRANCH,
            stem: "branch",
            key_column: "id",
            delete_key_csv_column: "Id",
            insert_sql: "INSERT INTO branch (id, start_date, enterprise_number) VALUES (?1, ?2, ?3)",
            map_row: Box::new(|row, _codes| kbo_mapper::map_branch(row)),
            bind: Box::new(|stmt, target: &kbo_mapper::Branch| {
                stmt.execute(rusqlite::params![
                    target.id,
                    target.start_date.format("%Y-%m-%d").to_string(),
                    target.enterprise_number,
                ])?;
                Ok(())
            }),
        };

        let result = fact_step::execute(store, &self.folder, self.incremental, &codes, ct, &config, progress)?;
        Ok(StepCounters {
            imported: result.imported,
            deleted: result.deleted,
            errors: result.errors,
        })
    }
}
