//! The Contacts step (§3.2, §4.13). Surrogate-keyed; see `denomination` for
//! the coarse-grained incremental delete convention shared by fact tables
//! without a natural key.

use crate::fact_step::{self, FactStepConfig};
use kbo_codes::CodeCache;
use kbo_pipeline::{CancellationToken, Step, StepCounters};
use kbo_store::schema;
use kbo_store::Store;
use std::path::{Path, PathBuf};

pub struct ImportContacts {
    folder: PathBuf,
    incremental: bool,
}

impl ImportContacts {
    pub fn new(folder: &Path, incremental: bool) -> Self {
        Self {
            folder: folder.to_path_buf(),
            incremental,
        }
    }
}

impl Step for ImportContacts {
    fn name(&self) -> &str {
        "Contacts"
    }

    fn prepare(&mut self, _store: &Store, _ct: &CancellationToken) -> anyhow::Result<Option<u64>> {
        fact_step::prepare_estimate(&self.folder, "contact", self.incremental)
    }

    fn execute(
        &mut self,
        store: &mut Store,
        ct: &CancellationToken,
        progress: &mut dyn FnMut(u64),
    ) -> anyhow::Result<StepCounters> {
        let codes = CodeCache::load(store)?;
        let config = FactStepConfig {
            table: &schema::CONTACT,
            stem: "contact",
            key_column: "entity_number",
            delete_key_csv_column: "EntityNumber",
            insert_sql: "INSERT INTO contact (entity_number, entity_contact_id, contact_type_id, value) \
                VALUES (?1, ?2, ?3, ?4)",
            map_row: Box::new(kbo_mapper::map_contact),
            bind: Box::new(|stmt, target: &kbo_mapper::Contact| {
                stmt.execute(rusqlite::params![
                    target.entity_number,
                    target.entity_contact_id,
                    target.contact_type_id,
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
