//! The Denominations step (§3.2, §4.13). Surrogate-keyed (`id`); incremental
//! deletes are applied coarse-grained against `entity_number`, the same
//! convention used by `address`, `contact`, and `activity`.

use crate::fact_step::{self, FactStepConfig};
use kbo_codes::CodeCache;
use kbo_pipeline::{CancellationToken, Step, StepCounters};
use kbo_store::schema;
use kbo_store::Store;
use std::path::{Path, PathBuf};

pub struct ImportDenominations {
    folder: PathBuf,
    incremental: bool,
}

impl ImportDenominations {
    pub fn new(folder: &Path, incremental: bool) -> Self {
        Self {
            folder: folder.to_path_buf(),
            incremental,
        }
    }
}

impl Step for ImportDenominations {
    fn name(&self) -> &str {
        "Denominations"
    }

    fn prepare(&mut self, _store: &Store, _ct: &CancellationToken) -> anyhow::Result<Option<u64>> {
        fact_step::prepare_estimate(&self.folder, "denomination", self.incremental)
    }

    fn execute(
        &mut self,
        store: &mut Store,
        ct: &CancellationToken,
        progress: &mut dyn FnMut(u64),
    ) -> anyhow::Result<StepCounters> {
        let codes = CodeCache::load(store)?;
        let config = FactStepConfig {
            table: &schema::DENOMINATION,
            stem: "denomination",
            key_column: "entity_number",
            delete_key_csv_column: "EntityNumber",
            insert_sql: "INSERT INTO denomination (entity_number, language_id, type_of_denomination_id, value) \
                VALUES (?1, ?2, ?3, ?4)",
            map_row: Box::new(kbo_mapper::map_denomination),
            bind: Box::new(|stmt, target: &kbo_mapper::Denomination| {
                stmt.execute(rusqlite::params![
                    target.entity_number,
                    target.language_id,
                    target.type_of_denomination_id,
                    target.value,
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
