//! The derivation step (§4.9, §4.13, §3.5): rebuilds the nested JSON
//! document, the flattened locations projection, and the FTS index from
//! the relational facts the preceding steps just loaded.
//!
//! §3.5 requires "FTS rows are always rebuilt in the same transaction that
//! rebuilt the documents they reflect." The engine commits one transaction
//! per `Step::execute`, so the three rebuilds named in §4.13's fixed order
//! (`RebuildCompanyDocuments`, `RebuildCompanyLocationsDoc`,
//! `RebuildFtsIndex`) are implemented as a single `Step` running all three
//! in sequence inside that one transaction, rather than as three separate
//! steps that would each commit independently.

use crate::impacted;
use kbo_pipeline::{CancellationToken, Step, StepCounters};
use kbo_store::Store;
use std::path::{Path, PathBuf};

pub struct RebuildDerivedProjections {
    folder: PathBuf,
    incremental: bool,
}

impl RebuildDerivedProjections {
    pub fn new(folder: &Path, incremental: bool) -> Self {
        Self {
            folder: folder.to_path_buf(),
            incremental,
        }
    }
}

impl Step for RebuildDerivedProjections {
    fn name(&self) -> &str {
        "RebuildCompanyDocuments"
    }

    fn prepare(&mut self, store: &Store, _ct: &CancellationToken) -> anyhow::Result<Option<u64>> {
        kbo_docs::ensure_schema(store)?;
        let count: i64 = store
            .connection()
            .query_row("SELECT count(*) FROM enterprise", [], |row| row.get(0))?;
        Ok(Some(count as u64))
    }

    fn execute(
        &mut self,
        store: &mut Store,
        _ct: &CancellationToken,
        progress: &mut dyn FnMut(u64),
    ) -> anyhow::Result<StepCounters> {
        kbo_docs::ensure_schema(store)?;

        let impacted = if self.incremental {
            Some(impacted::compute_impacted_set(&self.folder, store)?)
        } else {
            None
        };

        let document_stats = match &impacted {
            Some(set) => kbo_docs::rebuild_for(store, set)?,
            None => kbo_docs::rebuild_all(store)?,
        };
        progress(document_stats.documents_written);

        let location_stats = match &impacted {
            Some(set) => kbo_docs::rebuild_locations_for(store, set)?,
            None => kbo_docs::rebuild_locations_all(store)?,
        };
        progress(document_stats.documents_written + location_stats.rows_written);

        let fts_stats = kbo_fts::rebuild(store)?;
        progress(document_stats.documents_written + location_stats.rows_written + fts_stats.rows_written);

        Ok(StepCounters {
            imported: document_stats.documents_written + location_stats.rows_written + fts_stats.rows_written,
            deleted: 0,
            errors: 0,
        })
    }
}
