//! The FTS index builder (C10): rebuilds the contentless inverted index
//! `company_fts` and its sidecar `company_fts_map`, and exposes the
//! tokenizer contract shared with the free-text query planner (C12).

use kbo_store::schema::{COMPANY_FTS_COLUMNS, FTS_PREFIX_LENGTHS};
use kbo_store::Store;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("sqlite error")]
    Sqlite(#[from] rusqlite::Error),
    #[error("json error")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default)]
pub struct FtsBuildStats {
    pub rows_written: u64,
}

/// The on-disk tokenizer spec: `unicode61` with diacritics removed, `. - /`
/// treated as word characters, and prefix indexes of length 2, 3, 4. This
/// string is part of the schema and must never drift from what the query
/// planner assumes it does (no normalization beyond what's declared here).
fn tokenizer_clause() -> String {
    let prefixes = FTS_PREFIX_LENGTHS
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "tokenize = \"unicode61 remove_diacritics 2 tokenchars '.-/'\", prefix = '{prefixes}'"
    )
}

fn create_virtual_table_ddl() -> String {
    format!(
        "CREATE VIRTUAL TABLE company_fts USING fts5({}, content='', {})",
        COMPANY_FTS_COLUMNS.join(", "),
        tokenizer_clause()
    )
}

const MAP_DDL: &str =
    "CREATE TABLE company_fts_map (rowid INTEGER PRIMARY KEY, enterprise_number TEXT UNIQUE NOT NULL)";

/// Drops and recreates both tables, then repopulates them from
/// `company_document` ordered by `enterprise_number`, in one pass so that
/// `company_fts_map.rowid` stays aligned with `company_fts`'s row ids (P5).
pub fn rebuild(store: &Store) -> Result<FtsBuildStats, Error> {
    let conn = store.connection();
    conn.execute_batch("DROP TABLE IF EXISTS company_fts")?;
    conn.execute_batch("DROP TABLE IF EXISTS company_fts_map")?;
    conn.execute_batch(&create_virtual_table_ddl())?;
    conn.execute_batch(MAP_DDL)?;

    let mut select_stmt =
        conn.prepare("SELECT enterprise_number, payload FROM company_document ORDER BY enterprise_number")?;
    let rows = select_stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut map_stmt = conn.prepare("INSERT INTO company_fts_map (enterprise_number) VALUES (?1)")?;
    let fts_insert_sql = format!(
        "INSERT INTO company_fts (rowid, {cols}) VALUES (?1, {placeholders})",
        cols = COMPANY_FTS_COLUMNS.join(", "),
        placeholders = (2..=COMPANY_FTS_COLUMNS.len() + 1)
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ")
    );
    let mut fts_stmt = conn.prepare(&fts_insert_sql)?;

    let mut stats = FtsBuildStats::default();
    for row in rows {
        let (enterprise_number, payload_raw) = row?;
        let payload: Value = serde_json::from_str(&payload_raw)?;
        let fts = &payload["fts"];

        map_stmt.execute([&enterprise_number])?;
        let rowid = conn.last_insert_rowid();

        let values = [
            text(fts, "companyName"),
            text(fts, "commercialName"),
            text(&fts["street"], "nl"),
            text(&fts["street"], "fr"),
            text(&fts["city"], "nl"),
            text(&fts["city"], "fr"),
            text(fts, "postalCode"),
            text(&fts["activity"], "nl"),
            text(&fts["activity"], "fr"),
            text(&fts["activity"], "de"),
            text(&fts["activity"], "en"),
        ];
        fts_stmt.execute(rusqlite::params![
            rowid, values[0], values[1], values[2], values[3], values[4], values[5], values[6],
            values[7], values[8], values[9], values[10],
        ])?;
        stats.rows_written += 1;
    }

    Ok(stats)
}

fn text(value: &Value, field: &str) -> String {
    value
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;

    fn store_with_document(enterprise_number: &str, company_name: &str) -> Store {
        let store = Store::open_in_memory().unwrap();
        store
            .connection()
            .execute_batch(
                "CREATE TABLE company_document (enterprise_number TEXT PRIMARY KEY, payload TEXT NOT NULL, \
                 json_version INTEGER NOT NULL, etag TEXT NOT NULL, updated_at TEXT NOT NULL, source_import_id TEXT)",
            )
            .unwrap();
        let payload = serde_json::json!({
            "fts": {
                "companyName": company_name,
                "commercialName": "",
                "street": {"nl": "", "fr": ""},
                "city": {"nl": "Hasselt", "fr": ""},
                "postalCode": "3500",
                "activity": {"nl": "", "fr": "", "de": "", "en": ""},
            }
        });
        store
            .connection()
            .execute(
                "INSERT INTO company_document (enterprise_number, payload, json_version, etag, updated_at) VALUES (?1,?2,1,'x',datetime('now'))",
                params![enterprise_number, payload.to_string()],
            )
            .unwrap();
        store
    }

    #[test]
    fn rebuild_keeps_map_and_fts_row_counts_aligned() {
        let store = store_with_document("0403.199.702", "ALBERT HEIJN");
        let stats = rebuild(&store).unwrap();
        assert_eq!(stats.rows_written, 1);

        let map_count: i64 = store
            .connection()
            .query_row("SELECT count(*) FROM company_fts_map", [], |r| r.get(0))
            .unwrap();
        let fts_count: i64 = store
            .connection()
            .query_row("SELECT count(*) FROM company_fts", [], |r| r.get(0))
            .unwrap();
        assert_eq!(map_count, fts_count);
        assert_eq!(map_count, 1);
    }

    #[test]
    fn match_finds_prefix_token() {
        let store = store_with_document("0403.199.702", "ALBERT HEIJN");
        rebuild(&store).unwrap();
        let found: i64 = store
            .connection()
            .query_row(
                "SELECT count(*) FROM company_fts WHERE company_fts MATCH 'albe*'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(found, 1);
    }
}
