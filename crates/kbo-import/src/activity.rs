//! The Activities step (§3.2, §4.13). Surrogate-keyed; see `denomination`
//! for the coarse-grained incremental delete convention.

use crate::fact_step::{self, FactStepConfig};
use kbo_codes::CodeCache;
use kbo_pipeline::{CancellationToken, Step, StepCounters};
use kbo_store::schema;
use kbo_store::Store;
use std::path::{Path, PathBuf};

pub struct ImportActivities {
    folder: PathBuf,
    incremental: bool,
}

impl ImportActivities {
    pub fn new(folder: &Path, incremental: bool) -> Self {
        Self {
            folder: folder.to_path_buf(),
            incremental,
        }
    }
}

impl Step for ImportActivities {
    fn name(&self) -> &str {
        "Activities"
    }

    fn prepare(&mut self, _store: &Store, _ct: &CancellationToken) -> anyhow::Result<Option<u64>> {
        fact_step::prepare_estimate(&self.folder, "activity", self.incremental)
    }

    fn execute(
        &mut self,
        store: &mut Store,
        ct: &CancellationToken,
        progress: &mut dyn FnMut(u64),
    ) -> anyhow::Result<StepCounters> {
        let codes = CodeCache::load(store)?;
        let config = FactStepConfig {
            table: &schema::ACTIVITY,
            stem: "activity",
            key_column: "entity_number",
            delete_key_csv_column: "EntityNumber",
            insert_sql: "INSERT INTO activity (entity_number, activity_group_id, classification_id, nace_code_id) \
                VALUES (?1, ?2, ?3, ?4)",
            map_row: Box::new(kbo_mapper::map_activity),
            bind: Box::new(|stmt, target: &kbo_mapper::Activity| {
                stmt.execute(rusqlite::params![
                    target.entity_number,
                    target.activity_group_id,
                    target.classification_id,
                    target.nace_code_id,
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
