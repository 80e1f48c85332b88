//! The Establishments step (§3.2, §4.13).

use crate::fact_step::{self, FactStepConfig};
use kbo_codes::CodeCache;
use kbo_pipeline::{CancellationToken, Step, StepCounters};
use kbo_store::schema;
use kbo_store::Store;
use std::path::{Path, PathBuf};

pub struct ImportEstablishments {
    folder: PathBuf,
    incremental: bool,
}

impl ImportEstablishments {
    pub fn new(folder: &Path, incremental: bool) -> Self {
        Self {
            folder: folder.to_path_buf(),
            incremental,
        }
    }
}

impl Step for ImportEstablishments {
    fn name(&self) -> &str {
        "Establishments"
    }

    fn prepare(&mut self, _store: &Store, _ct: &CancellationToken) -> anyhow::Result<Option<u64>> {
        fact_step::prepare_estimate(&self.folder, "establishment", self.incremental)
    }

    fn execute(
        &mut self,
        store: &mut Store,
        ct: &CancellationToken,
        progress: &mut dyn FnMut(u64),
    ) -> anyhow::Result<StepCounters> {
        let codes = CodeCache::load(store)?;
        let config = FactStepConfig {
            table: &schema::ESTABLISHMENT,
            stem: "establishment",
            key_column: "establishment_number",
            delete_key_csv_column: "EstablishmentNumber",
            insert_sql: "INSERT INTO establishment (establishment_number, start_date, enterprise_number) \
                VALUES (?1, ?2, ?3)",
            map_row: Box::new(|row, _codes| kbo_mapper::map_establishment(row)),
            bind: Box::new(|stmt, target: &kbo_mapper::Establishment| {
                stmt.execute(rusqlite::params![
                    target.establishment_number,
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
