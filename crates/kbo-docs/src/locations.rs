//! The locations projection (`RebuildCompanyLocationsDoc`): a flat,
//! query-friendly table of every address fact, tagged with its owning
//! enterprise, kept alongside `company_document` for location-oriented
//! reads that don't need the nested payload.
//!
//! Not otherwise specified by name; treated here as a denormalized sibling
//! derivation built from the same address facts `build_document` reads
//! (see the repository's design notes for the open-question rationale).

use kbo_store::Store;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("sqlite error")]
    Sqlite(#[from] rusqlite::Error),
}

#[derive(Debug, Default)]
pub struct LocationBuildStats {
    pub rows_written: u64,
}

const LOCATIONS_DDL: &str = "CREATE TABLE company_locations (\
    enterprise_number TEXT NOT NULL, \
    entity_number TEXT NOT NULL, \
    type_of_address TEXT NOT NULL, \
    street_nl TEXT NOT NULL, \
    street_fr TEXT NOT NULL, \
    house_number TEXT NOT NULL, \
    zipcode TEXT NOT NULL, \
    municipality_nl TEXT NOT NULL, \
    municipality_fr TEXT NOT NULL, \
    PRIMARY KEY (entity_number, type_of_address)\
)";

pub fn ensure_schema(store: &Store) -> Result<(), Error> {
    store
        .connection()
        .execute_batch(&format!("{LOCATIONS_DDL};"))?;
    store.connection().execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_company_locations_enterprise ON company_locations(enterprise_number)",
    )?;
    Ok(())
}

/// Every entity belonging to `enterprise_number`: itself, its establishments,
/// its branches (the same ownership closure `build_document` walks).
fn owned_entity_numbers(store: &Store, enterprise_number: &str) -> Result<Vec<String>, Error> {
    let mut entities = vec![enterprise_number.to_string()];
    let conn = store.connection();
    {
        let mut stmt =
            conn.prepare("SELECT establishment_number FROM establishment WHERE enterprise_number = ?1")?;
        let rows = stmt.query_map([enterprise_number], |row| row.get::<_, String>(0))?;
        for row in rows {
            entities.push(row?);
        }
    }
    {
        let mut stmt = conn.prepare("SELECT id FROM branch WHERE enterprise_number = ?1")?;
        let rows = stmt.query_map([enterprise_number], |row| row.get::<_, i64>(0))?;
        for row in rows {
            entities.push(row?.to_string());
        }
    }
    Ok(entities)
}

fn rebuild_one(store: &Store, enterprise_number: &str) -> Result<u64, Error> {
    let conn = store.connection();
    let entities = owned_entity_numbers(store, enterprise_number)?;

    for entity_number in &entities {
        conn.execute(
            "DELETE FROM company_locations WHERE entity_number = ?1",
            [entity_number],
        )?;
    }

    let mut written = 0u64;
    let mut select_stmt = conn.prepare(
        "SELECT type_of_address_id, street_nl, street_fr, house_number, zipcode, municipality_nl, municipality_fr \
         FROM address WHERE entity_number = ?1",
    )?;
    let mut insert_stmt = conn.prepare(
        "INSERT INTO company_locations (enterprise_number, entity_number, type_of_address, street_nl, \
         street_fr, house_number, zipcode, municipality_nl, municipality_fr) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;
    for entity_number in &entities {
        let rows = select_stmt.query_map([entity_number], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;
        for row in rows {
            let (type_id, street_nl, street_fr, house_number, zipcode, municipality_nl, municipality_fr) =
                row?;
            insert_stmt.execute(rusqlite::params![
                enterprise_number,
                entity_number,
                type_id.to_string(),
                street_nl,
                street_fr,
                house_number,
                zipcode,
                municipality_nl,
                municipality_fr,
            ])?;
            written += 1;
        }
    }
    Ok(written)
}

/// Rebuilds `company_locations` for every enterprise (full mode).
pub fn rebuild_all(store: &Store) -> Result<LocationBuildStats, Error> {
    store
        .connection()
        .execute_batch("DROP TABLE IF EXISTS company_locations")?;
    ensure_schema(store)?;

    let numbers: Vec<String> = {
        let mut stmt = store
            .connection()
            .prepare("SELECT enterprise_number FROM enterprise ORDER BY enterprise_number")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    let mut stats = LocationBuildStats::default();
    for number in &numbers {
        stats.rows_written += rebuild_one(store, number)?;
    }
    Ok(stats)
}

/// Rebuilds `company_locations` rows for the impacted set *S* only.
pub fn rebuild_for(store: &Store, enterprise_numbers: &[String]) -> Result<LocationBuildStats, Error> {
    ensure_schema(store)?;
    let mut stats = LocationBuildStats::default();
    for number in enterprise_numbers {
        stats.rows_written += rebuild_one(store, number)?;
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(store: &Store) -> String {
        store.init_schema().unwrap();
        let conn = store.connection();
        conn.execute(
            "INSERT INTO code (category, code_value) VALUES ('JuridicalSituation','000')",
            [],
        )
        .unwrap();
        let jsid: i64 = conn
            .query_row("SELECT id FROM code WHERE category='JuridicalSituation'", [], |r| r.get(0))
            .unwrap();
        conn.execute(
            "INSERT INTO code (category, code_value) VALUES ('TypeOfEnterprise','1')",
            [],
        )
        .unwrap();
        let toeid: i64 = conn
            .query_row("SELECT id FROM code WHERE category='TypeOfEnterprise'", [], |r| r.get(0))
            .unwrap();
        conn.execute(
            "INSERT INTO code (category, code_value) VALUES ('TypeOfAddress','1')",
            [],
        )
        .unwrap();
        let toaid: i64 = conn
            .query_row("SELECT id FROM code WHERE category='TypeOfAddress'", [], |r| r.get(0))
            .unwrap();

        let enterprise_number = "0403.199.702".to_string();
        conn.execute(
            "INSERT INTO enterprise (enterprise_number, juridical_situation_id, type_of_enterprise_id, start_date) VALUES (?1,?2,?3,'2000-01-01')",
            rusqlite::params![enterprise_number, jsid, toeid],
        ).unwrap();
        conn.execute(
            "INSERT INTO address (entity_number, type_of_address_id, country_nl, country_fr, zipcode, \
             municipality_nl, municipality_fr, street_nl, street_fr, house_number, box, extra_info) \
             VALUES (?1, ?2, 'BE', 'BE', '3500', 'Hasselt', 'Hasselt', 'Kolonel Dusartplein', 'Kolonel Dusartplein', '1', '', '')",
            rusqlite::params![enterprise_number, toaid],
        ).unwrap();
        enterprise_number
    }

    #[test]
    fn rebuild_all_writes_one_row_per_address() {
        let store = Store::open_in_memory().unwrap();
        let number = seed(&store);
        let stats = rebuild_all(&store).unwrap();
        assert_eq!(stats.rows_written, 1);
        let zipcode: String = store
            .connection()
            .query_row(
                "SELECT zipcode FROM company_locations WHERE enterprise_number = ?1",
                [&number],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(zipcode, "3500");
    }

    #[test]
    fn rebuild_for_is_scoped_to_requested_enterprises() {
        let store = Store::open_in_memory().unwrap();
        let number = seed(&store);
        rebuild_all(&store).unwrap();
        let stats = rebuild_for(&store, &[number]).unwrap();
        assert_eq!(stats.rows_written, 1);
    }
}
