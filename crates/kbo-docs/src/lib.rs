//! The document builder (C9): one JSON `company_document` row per
//! enterprise, with a deterministic ETag and a flattened `fts.*` subtree
//! consumed by the FTS index builder (C10).

pub mod locations;

pub use locations::{
    ensure_schema as ensure_locations_schema, rebuild_all as rebuild_locations_all,
    rebuild_for as rebuild_locations_for, LocationBuildStats,
};

use kbo_store::Store;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("sqlite error")]
    Sqlite(#[from] rusqlite::Error),
}

#[derive(Debug, Default)]
pub struct DocBuildStats {
    pub documents_written: u64,
}

/// Languages tried, in fallback order, when resolving a code's description
/// for a caller-requested language (P8). `NL` is the base of the chain.
const FALLBACK_CHAIN: &[&str] = &["NL", "FR", "EN", "DE"];

/// Resolves `code_id`'s descriptions across all languages present, used to
/// build the `descriptions` map embedded for every code reference.
fn descriptions_for_code(store: &Store, code_id: i64) -> Result<BTreeMap<String, String>, Error> {
    let mut stmt = store
        .connection()
        .prepare("SELECT language, description FROM code_description WHERE code_id = ?1")?;
    let rows = stmt.query_map([code_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut map = BTreeMap::new();
    for row in rows {
        let (lang, desc) = row?;
        map.insert(lang, desc);
    }
    Ok(map)
}

/// `first_non_empty(desc[L], desc["NL"], desc["FR"], desc["EN"], desc["DE"])` (P8).
pub fn resolve_description(descriptions: &BTreeMap<String, String>, language: &str) -> String {
    let upper = language.to_uppercase();
    let mut chain = vec![upper.as_str()];
    chain.extend(FALLBACK_CHAIN.iter().copied());
    for lang in chain {
        if let Some(value) = descriptions.get(lang) {
            if !value.is_empty() {
                return value.clone();
            }
        }
    }
    String::new()
}

fn code_value(store: &Store, code_id: i64) -> Result<String, Error> {
    store
        .connection()
        .query_row("SELECT code_value FROM code WHERE id = ?1", [code_id], |row| row.get(0))
        .map_err(Error::from)
}

fn code_json(store: &Store, code_id: i64) -> Result<Value, Error> {
    let value = code_value(store, code_id)?;
    let descriptions = descriptions_for_code(store, code_id)?;
    Ok(json!({ "code": value, "descriptions": descriptions }))
}

struct FactRows {
    denominations: Vec<Value>,
    addresses: Vec<Value>,
    contacts: Vec<Value>,
    activities: Vec<Value>,
    fts_name: Vec<String>,
    fts_commercial: Vec<String>,
    fts_address: Option<(String, String, String, String, String)>, // street_nl, street_fr, city_nl, city_fr, postal_code
    fts_activity: BTreeMap<String, Vec<String>>,
}

/// Loads every fact row (denomination/address/contact/activity) for a
/// single `entity_number`, sorted by each table's stable key (§4.9 step 3).
fn fact_rows_for_entity(store: &Store, entity_number: &str) -> Result<FactRows, Error> {
    let conn = store.connection();

    let mut denominations = Vec::new();
    let mut fts_name = Vec::new();
    let mut fts_commercial = Vec::new();
    {
        let mut stmt = conn.prepare(
            "SELECT d.language_id, d.type_of_denomination_id, d.value \
             FROM denomination d WHERE d.entity_number = ?1 \
             ORDER BY d.language_id",
        )?;
        let rows = stmt.query_map([entity_number], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        for row in rows {
            let (language_id, type_id, value) = row?;
            let type_code = code_value(store, type_id)?;
            if type_code == "001" {
                fts_name.push(value.clone());
            } else if type_code == "003" {
                fts_commercial.push(value.clone());
            }
            denominations.push(json!({
                "language": code_json(store, language_id)?,
                "type": denomination_type_label(&type_code),
                "value": value,
            }));
        }
    }

    let mut addresses = Vec::new();
    let mut fts_address = None;
    {
        let mut stmt = conn.prepare(
            "SELECT type_of_address_id, country_nl, country_fr, zipcode, municipality_nl, \
             municipality_fr, street_nl, street_fr, house_number, box, extra_info, date_striking_off \
             FROM address WHERE entity_number = ?1 ORDER BY type_of_address_id",
        )?;
        let rows = stmt.query_map([entity_number], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
                row.get::<_, String>(9)?,
                row.get::<_, String>(10)?,
                row.get::<_, Option<String>>(11)?,
            ))
        })?;
        for row in rows {
            let (
                type_id, country_nl, country_fr, zipcode, municipality_nl, municipality_fr,
                street_nl, street_fr, house_number, box_number, extra_info, date_striking_off,
            ) = row?;
            if fts_address.is_none() {
                fts_address = Some((
                    street_nl.clone(),
                    street_fr.clone(),
                    municipality_nl.clone(),
                    municipality_fr.clone(),
                    zipcode.clone(),
                ));
            }
            addresses.push(json!({
                "typeOfAddress": code_json(store, type_id)?,
                "countryNl": country_nl,
                "countryFr": country_fr,
                "zipcode": zipcode,
                "municipalityNl": municipality_nl,
                "municipalityFr": municipality_fr,
                "streetNl": street_nl,
                "streetFr": street_fr,
                "houseNumber": house_number,
                "box": box_number,
                "extraInfo": extra_info,
                "dateStrikingOff": date_striking_off,
            }));
        }
    }

    let mut contacts = Vec::new();
    {
        let mut stmt = conn.prepare(
            "SELECT id, entity_contact_id, contact_type_id, value FROM contact \
             WHERE entity_number = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([entity_number], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        for row in rows {
            let (_id, entity_contact_id, contact_type_id, value) = row?;
            contacts.push(json!({
                "entityContact": code_json(store, entity_contact_id)?,
                "contactType": code_json(store, contact_type_id)?,
                "value": value,
            }));
        }
    }

    let mut activities = Vec::new();
    let mut fts_activity: BTreeMap<String, Vec<String>> = BTreeMap::new();
    {
        let mut stmt = conn.prepare(
            "SELECT id, activity_group_id, classification_id, nace_code_id FROM activity \
             WHERE entity_number = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([entity_number], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;
        for row in rows {
            let (_id, activity_group_id, classification_id, nace_code_id) = row?;
            let nace_descriptions = descriptions_for_code(store, nace_code_id)?;
            for lang in FALLBACK_CHAIN {
                if let Some(desc) = nace_descriptions.get(*lang) {
                    fts_activity
                        .entry(lang.to_lowercase())
                        .or_default()
                        .push(desc.clone());
                }
            }
            activities.push(json!({
                "activityGroup": code_json(store, activity_group_id)?,
                "classification": code_json(store, classification_id)?,
                "naceCode": code_json(store, nace_code_id)?,
            }));
        }
    }

    Ok(FactRows {
        denominations,
        addresses,
        contacts,
        activities,
        fts_name,
        fts_commercial,
        fts_address,
        fts_activity,
    })
}

fn denomination_type_label(code: &str) -> &'static str {
    match code {
        "001" => "name",
        "002" => "abbreviation",
        "003" => "commercialName",
        "004" => "branchName",
        _ => "unknown",
    }
}

/// Assembles and writes one `company_document` row. Returns the computed
/// ETag hex string.
fn build_document(store: &Store, enterprise_number: &str, source_import_id: Option<&str>) -> Result<String, Error> {
    let conn = store.connection();
    let (
        juridical_situation_id,
        type_of_enterprise_id,
        juridical_form_id,
        juridical_form_cac_id,
        start_date,
    ): (i64, i64, Option<i64>, Option<i64>, String) = conn.query_row(
        "SELECT juridical_situation_id, type_of_enterprise_id, juridical_form_id, \
         juridical_form_cac_id, start_date FROM enterprise WHERE enterprise_number = ?1",
        [enterprise_number],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
    )?;

    let own = fact_rows_for_entity(store, enterprise_number)?;

    let mut establishments = Vec::new();
    {
        let mut stmt = conn.prepare(
            "SELECT establishment_number, start_date FROM establishment \
             WHERE enterprise_number = ?1 ORDER BY establishment_number",
        )?;
        let rows = stmt.query_map([enterprise_number], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (establishment_number, establishment_start_date) = row?;
            let facts = fact_rows_for_entity(store, &establishment_number)?;
            establishments.push(json!({
                "establishmentNumber": establishment_number,
                "startDate": establishment_start_date,
                "denominations": facts.denominations,
                "addresses": facts.addresses,
                "contacts": facts.contacts,
                "activities": facts.activities,
            }));
        }
    }

    let mut branches = Vec::new();
    {
        let mut stmt = conn.prepare(
            "SELECT id, start_date FROM branch WHERE enterprise_number = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([enterprise_number], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (branch_id, branch_start_date) = row?;
            let entity_number = branch_id.to_string();
            let facts = fact_rows_for_entity(store, &entity_number)?;
            branches.push(json!({
                "id": branch_id,
                "startDate": branch_start_date,
                "denominations": facts.denominations,
                "addresses": facts.addresses,
                "contacts": facts.contacts,
                "activities": facts.activities,
            }));
        }
    }

    let juridical_form = match juridical_form_id {
        Some(id) => code_json(store, id)?,
        None => Value::Null,
    };
    let juridical_form_cac = match juridical_form_cac_id {
        Some(id) => code_json(store, id)?,
        None => Value::Null,
    };

    let (street_nl, street_fr, city_nl, city_fr, postal_code) = own
        .fts_address
        .clone()
        .unwrap_or_else(|| (String::new(), String::new(), String::new(), String::new(), String::new()));

    let fts = json!({
        "companyName": own.fts_name.join(" "),
        "commercialName": own.fts_commercial.join(" "),
        "street": { "nl": street_nl, "fr": street_fr },
        "city": { "nl": city_nl, "fr": city_fr },
        "postalCode": postal_code,
        "activity": {
            "nl": own.fts_activity.get("nl").cloned().unwrap_or_default().join(" "),
            "fr": own.fts_activity.get("fr").cloned().unwrap_or_default().join(" "),
            "de": own.fts_activity.get("de").cloned().unwrap_or_default().join(" "),
            "en": own.fts_activity.get("en").cloned().unwrap_or_default().join(" "),
        },
    });

    let payload = json!({
        "enterpriseNumber": enterprise_number,
        "startDate": start_date,
        "juridicalSituation": code_json(store, juridical_situation_id)?,
        "typeOfEnterprise": code_json(store, type_of_enterprise_id)?,
        "juridicalForm": juridical_form,
        "juridicalFormCac": juridical_form_cac,
        "denominations": own.denominations,
        "addresses": own.addresses,
        "contacts": own.contacts,
        "activities": own.activities,
        "establishments": establishments,
        "branches": branches,
        "fts": fts,
    });

    let etag = hex::encode(Sha256::digest(
        serde_json::to_vec(&payload).expect("payload always serializable"),
    ));

    conn.execute(
        "INSERT INTO company_document (enterprise_number, payload, json_version, etag, updated_at, source_import_id) \
         VALUES (?1, ?2, 1, ?3, datetime('now'), ?4) \
         ON CONFLICT(enterprise_number) DO UPDATE SET \
         payload = excluded.payload, etag = excluded.etag, updated_at = excluded.updated_at, \
         source_import_id = excluded.source_import_id",
        rusqlite::params![
            enterprise_number,
            payload.to_string(),
            etag,
            source_import_id,
        ],
    )?;

    Ok(etag)
}

/// Ensures the `company_document` table exists.
pub fn ensure_schema(store: &Store) -> Result<(), Error> {
    store
        .connection()
        .execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS company_document (\
                enterprise_number TEXT PRIMARY KEY, \
                payload TEXT NOT NULL CHECK (json_valid(payload)), \
                json_version INTEGER NOT NULL, \
                etag TEXT NOT NULL, \
                updated_at TEXT NOT NULL, \
                source_import_id TEXT\
            );"
        ))?;
    Ok(())
}

/// Rebuilds `company_document` for every enterprise (full mode): drops and
/// recreates the table, then assembles one row per `enterprise` row.
pub fn rebuild_all(store: &Store) -> Result<DocBuildStats, Error> {
    store.connection().execute_batch("DROP TABLE IF EXISTS company_document")?;
    ensure_schema(store)?;

    let numbers: Vec<String> = {
        let mut stmt = store
            .connection()
            .prepare("SELECT enterprise_number FROM enterprise ORDER BY enterprise_number")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    let mut stats = DocBuildStats::default();
    for number in &numbers {
        build_document(store, number, None)?;
        stats.documents_written += 1;
    }
    Ok(stats)
}

/// Rebuilds `company_document` rows for the impacted set *S* only
/// (incremental mode); does not touch unrelated rows.
pub fn rebuild_for(store: &Store, enterprise_numbers: &[String]) -> Result<DocBuildStats, Error> {
    ensure_schema(store)?;
    let mut stats = DocBuildStats::default();
    for number in enterprise_numbers {
        build_document(store, number, None)?;
        stats.documents_written += 1;
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(store: &Store) -> String {
        store.init_schema().unwrap();
        let conn = store.connection();
        conn.execute("INSERT INTO code (category, code_value) VALUES ('JuridicalSituation','000')", []).unwrap();
        let jsid: i64 = conn.query_row("SELECT id FROM code WHERE category='JuridicalSituation'", [], |r| r.get(0)).unwrap();
        conn.execute("INSERT INTO code_description (code_id, language, description) VALUES (?1,'NL','Actief')", [jsid]).unwrap();

        conn.execute("INSERT INTO code (category, code_value) VALUES ('TypeOfEnterprise','1')", []).unwrap();
        let toeid: i64 = conn.query_row("SELECT id FROM code WHERE category='TypeOfEnterprise'", [], |r| r.get(0)).unwrap();

        conn.execute("INSERT INTO code (category, code_value) VALUES ('Language','NL')", []).unwrap();
        let langid: i64 = conn.query_row("SELECT id FROM code WHERE category='Language'", [], |r| r.get(0)).unwrap();

        conn.execute("INSERT INTO code (category, code_value) VALUES ('TypeOfDenomination','001')", []).unwrap();
        let tdid: i64 = conn.query_row("SELECT id FROM code WHERE category='TypeOfDenomination'", [], |r| r.get(0)).unwrap();

        let enterprise_number = "0403.199.702".to_string();
        conn.execute(
            "INSERT INTO enterprise (enterprise_number, juridical_situation_id, type_of_enterprise_id, start_date) VALUES (?1,?2,?3,'2000-01-01')",
            rusqlite::params![enterprise_number, jsid, toeid],
        ).unwrap();
        conn.execute(
            "INSERT INTO denomination (entity_number, language_id, type_of_denomination_id, value) VALUES (?1,?2,?3,'KBC GROEP')",
            rusqlite::params![enterprise_number, langid, tdid],
        ).unwrap();
        enterprise_number
    }

    #[test]
    fn builds_one_document_per_enterprise() {
        let store = Store::open_in_memory().unwrap();
        let number = seed(&store);
        let stats = rebuild_all(&store).unwrap();
        assert_eq!(stats.documents_written, 1);
        let payload: String = store
            .connection()
            .query_row("SELECT payload FROM company_document WHERE enterprise_number=?1", [&number], |r| r.get(0))
            .unwrap();
        let value: Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["denominations"][0]["value"], "KBC GROEP");
        assert_eq!(value["fts"]["companyName"], "KBC GROEP");
    }

    #[test]
    fn etag_is_stable_across_rebuilds() {
        let store = Store::open_in_memory().unwrap();
        seed(&store);
        rebuild_all(&store).unwrap();
        let etag1: String = store
            .connection()
            .query_row("SELECT etag FROM company_document LIMIT 1", [], |r| r.get(0))
            .unwrap();
        rebuild_all(&store).unwrap();
        let etag2: String = store
            .connection()
            .query_row("SELECT etag FROM company_document LIMIT 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(etag1, etag2);
    }
}
