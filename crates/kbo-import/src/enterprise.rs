//! The Enterprises step (§3.2, §4.13).

use crate::fact_step::{self, FactStepConfig};
use kbo_codes::CodeCache;
use kbo_pipeline::{CancellationToken, Step, StepCounters};
use kbo_store::schema;
use kbo_store::Store;
use std::path::{Path, PathBuf};

pub struct ImportEnterprises {
    folder: PathBuf,
    incremental: bool,
}

impl ImportEnterprises {
    pub fn new(folder: &Path, incremental: bool) -> Self {
        Self {
            folder: folder.to_path_buf(),
            incremental,
        }
    }
}

impl Step for ImportEnterprises {
    fn name(&self) -> &str {
        "Enterprises"
    }

    fn prepare(&mut self, _store: &Store, _ct: &CancellationToken) -> anyhow::Result<Option<u64>> {
        fact_step::prepare_estimate(&self.folder, "enterprise", self.incremental)
    }

    fn execute(
        &mut self,
        store: &mut Store,
        ct: &CancellationToken,
        progress: &mut dyn FnMut(u64),
    ) -> anyhow::Result<StepCounters> {
        let codes = CodeCache::load(store)?;
        let config = FactStepConfig {
            table: &schema::ENTERPRISE,
            stem: "enterprise",
            key_column: "enterprise_number",
            delete_key_csv_column: "EnterpriseNumber",
            insert_sql: "INSERT INTO enterprise \
                (enterprise_number, juridical_situation_id, type_of_enterprise_id, \
                 juridical_form_id, juridical_form_cac_id, start_date) \
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            map_row: Box::new(kbo_mapper::map_enterprise),
            bind: Box::new(|stmt, target: &kbo_mapper::Enterprise| {
                stmt.execute(rusqlite::params![
                    target.enterprise_number.to_string(),
                    target.juridical_situation_id,
                    target.type_of_enterprise_id,
                    target.juridical_form_id,
                    target.juridical_form_cac_id,
                    target.start_date.format("%Y-%m-%d").to_string(),
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
