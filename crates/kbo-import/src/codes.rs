//! The specialized two-phase codes step (§4.13): stage `code.csv` into temp
//! tables, then upsert distinct codes and descriptions, update changed
//! descriptions, and prune rows that disappeared from the source file.
//! `code.csv` is always supplied in full, so this step runs the same way
//! regardless of the pipeline's own full/incremental mode.

use kbo_pipeline::{CancellationToken, Step, StepCounters};
use kbo_store::Store;
use std::path::{Path, PathBuf};

pub struct ImportCodes {
    folder: PathBuf,
}

impl ImportCodes {
    pub fn new(folder: &Path) -> Self {
        Self {
            folder: folder.to_path_buf(),
        }
    }

    fn csv_path(&self) -> PathBuf {
        self.folder.join("code.csv")
    }
}

impl Step for ImportCodes {
    fn name(&self) -> &str {
        "Codes"
    }

    fn prepare(&mut self, _store: &Store, _ct: &CancellationToken) -> anyhow::Result<Option<u64>> {
        Ok(Some(kbo_csv::estimate_row_count(&self.csv_path())?))
    }

    fn execute(
        &mut self,
        store: &mut Store,
        ct: &CancellationToken,
        progress: &mut dyn FnMut(u64),
    ) -> anyhow::Result<StepCounters> {
        let conn = store.connection();
        conn.execute_batch(
            "CREATE TEMP TABLE IF NOT EXISTS codes_stage (category TEXT NOT NULL, code TEXT NOT NULL); \
             DELETE FROM codes_stage; \
             CREATE TEMP TABLE IF NOT EXISTS code_description_stage (\
                category TEXT NOT NULL, code TEXT NOT NULL, language TEXT NOT NULL, description TEXT NOT NULL); \
             DELETE FROM code_description_stage;",
        )?;

        let mut imported = 0u64;
        let mut errors = 0u64;
        if !self.csv_path().exists() {
            tracing::warn!(path = %self.csv_path().display(), "required csv file missing");
            errors += 1;
        }
        {
            let mut stage_stmt = conn.prepare(
                "INSERT INTO codes_stage (category, code) SELECT ?1, ?2 \
                 WHERE NOT EXISTS (SELECT 1 FROM codes_stage WHERE category = ?1 AND code = ?2)",
            )?;
            let mut desc_stmt = conn.prepare(
                "INSERT INTO code_description_stage (category, code, language, description) \
                 VALUES (?1, ?2, ?3, ?4)",
            )?;

            let rows = kbo_csv::read_records(&self.csv_path())?;
            for (i, row) in rows.enumerate() {
                if ct.is_cancelled() {
                    break;
                }
                let row = row?;
                let category = row.get("Category");
                let code = row.get("Code");
                let language = row.get("Language");
                if category.is_empty() || code.is_empty() {
                    errors += 1;
                    tracing::debug!("code row missing Category or Code");
                    continue;
                }
                stage_stmt.execute(rusqlite::params![category, code])?;
                if !language.is_empty() {
                    desc_stmt.execute(rusqlite::params![category, code, language, row.get("Description")])?;
                }
                imported += 1;
                if i % 1000 == 0 {
                    progress(i as u64);
                }
            }
        }
        progress(imported);

        conn.execute_batch(
            "INSERT OR IGNORE INTO code (category, code_value) SELECT category, code FROM codes_stage;",
        )?;

        conn.execute(
            "INSERT INTO code_description (code_id, language, description) \
             SELECT c.id, s.language, s.description FROM code_description_stage s \
             JOIN code c ON c.category = s.category AND c.code_value = s.code \
             WHERE NOT EXISTS (\
                SELECT 1 FROM code_description cd WHERE cd.code_id = c.id AND cd.language = s.language\
             )",
            [],
        )?;

        conn.execute(
            "UPDATE code_description SET description = (\
                SELECT s.description FROM code_description_stage s \
                JOIN code c ON c.category = s.category AND c.code_value = s.code \
                WHERE c.id = code_description.code_id AND s.language = code_description.language\
             ) WHERE EXISTS (\
                SELECT 1 FROM code_description_stage s \
                JOIN code c ON c.category = s.category AND c.code_value = s.code \
                WHERE c.id = code_description.code_id AND s.language = code_description.language \
                AND s.description != code_description.description\
             )",
            [],
        )?;

        let deleted_descriptions = conn.execute(
            "DELETE FROM code_description WHERE NOT EXISTS (\
                SELECT 1 FROM code_description_stage s \
                JOIN code c ON c.category = s.category AND c.code_value = s.code \
                WHERE c.id = code_description.code_id AND s.language = code_description.language\
             )",
            [],
        )?;

        let deleted_codes = conn.execute(
            "DELETE FROM code WHERE NOT EXISTS (\
                SELECT 1 FROM codes_stage s WHERE s.category = code.category AND s.code = code.code_value\
             )",
            [],
        )?;

        conn.execute_batch("DROP TABLE codes_stage; DROP TABLE code_description_stage;")?;

        Ok(StepCounters {
            imported,
            deleted: (deleted_descriptions + deleted_codes) as u64,
            errors,
        })
    }
}
