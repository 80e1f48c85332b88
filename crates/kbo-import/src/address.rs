//! The Addresses step (§3.2, §4.13).
//!
//! `address` has no surrogate key; its natural key is the composite
//! `(entity_number, type_of_address_id)`. Incremental deletes are applied
//! coarse-grained against `entity_number`: every address owned by a
//! mentioned entity is removed, then the file's insert rows are reloaded
//! (an Open Question resolution, see repository design notes).

use crate::fact_step::{self, FactStepConfig};
use kbo_codes::CodeCache;
use kbo_pipeline::{CancellationToken, Step, StepCounters};
use kbo_store::schema;
use kbo_store::Store;
use std::path::{Path, PathBuf};

pub struct ImportAddresses {
    folder: PathBuf,
    incremental: bool,
}

impl ImportAddresses {
    pub fn new(folder: &Path, incremental: bool) -> Self {
        Self {
            folder: folder.to_path_buf(),
            incremental,
        }
    }
}

impl Step for ImportAddresses {
    fn name(&self) -> &str {
        "Addresses"
    }

    fn prepare(&mut self, _store: &Store, _ct: &CancellationToken) -> anyhow::Result<Option<u64>> {
        fact_step::prepare_estimate(&self.folder, "address", self.incremental)
    }

    fn execute(
        &mut self,
        store: &mut Store,
        ct: &CancellationToken,
        progress: &mut dyn FnMut(u64),
    ) -> anyhow::Result<StepCounters> {
        let codes = CodeCache::load(store)?;
        let config = FactStepConfig {
            table: &schema::ADDRESS,
            stem: "address",
            key_column: "entity_number",
            delete_key_csv_column: "EntityNumber",
            insert_sql: "INSERT INTO address \
                (entity_number, type_of_address_id, country_nl, country_fr, zipcode, \
                 municipality_nl, municipality_fr, street_nl, street_fr, house_number, box, \
                 extra_info, date_striking_off) \
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            map_row: Box::new(kbo_mapper::map_address),
            bind: Box::new(|stmt, target: &kbo_mapper::Address| {
                stmt.execute(rusqlite::params![
                    target.entity_number,
                    target.type_of_address_id,
                    target.country_nl,
                    target.country_fr,
                    target.zipcode,
                    target.municipality_nl,
                    target.municipality_fr,
                    target.street_nl,
                    target.street_fr,
                    target.house_number,
                    target.box_number,
                    target.extra_info,
                    target.date_striking_off.map(|d| d.format("%Y-%m-%d").to_string()),
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
