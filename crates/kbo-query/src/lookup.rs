//! The lookup planner (C11): resolve an enterprise by number, hydrate it
//! from its `company_document`, and project for the requested language.

use crate::{AddressView, ChildEntity, CodeDescription, Company, Name};
use kbo_ident::EnterpriseNumber;
use kbo_store::Store;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("sqlite error")]
    Sqlite(#[from] rusqlite::Error),
    #[error("json error")]
    Json(#[from] serde_json::Error),
}

const FALLBACK_CHAIN: &[&str] = &["NL", "FR", "EN", "DE"];

/// `first_non_empty(desc[L], desc["NL"], desc["FR"], desc["EN"], desc["DE"])` (P8).
fn resolve_description(code_with_descriptions: &Value, language: &str) -> CodeDescription {
    let code = code_with_descriptions
        .get("code")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let descriptions = &code_with_descriptions["descriptions"];

    let upper = language.to_uppercase();
    let mut chain = vec![upper.as_str()];
    chain.extend(FALLBACK_CHAIN.iter().copied());

    for lang in chain {
        if let Some(value) = descriptions.get(lang).and_then(Value::as_str) {
            if !value.is_empty() {
                return CodeDescription {
                    code,
                    description: value.to_string(),
                };
            }
        }
    }
    CodeDescription {
        code,
        description: String::new(),
    }
}

fn project_names(denominations: &Value) -> Vec<Name> {
    denominations
        .as_array()
        .into_iter()
        .flatten()
        .map(|d| Name {
            kind: d["type"].as_str().unwrap_or("unknown").to_string(),
            name: d["value"].as_str().unwrap_or_default().to_string(),
        })
        .collect()
}

/// The first address wins; an entity without any address projects to the
/// empty-address sentinel rather than `None`.
fn project_address(addresses: &Value, language: &str) -> AddressView {
    let first = match addresses.as_array().and_then(|a| a.first()) {
        Some(a) => a,
        None => return AddressView::empty(),
    };

    let street = if language.eq_ignore_ascii_case("fr") {
        first["streetFr"].as_str().unwrap_or_default()
    } else {
        first["streetNl"].as_str().unwrap_or_default()
    };
    let city = if language.eq_ignore_ascii_case("fr") {
        first["municipalityFr"].as_str().unwrap_or_default()
    } else {
        first["municipalityNl"].as_str().unwrap_or_default()
    };

    AddressView {
        street: street.to_string(),
        house_number: first["houseNumber"].as_str().unwrap_or_default().to_string(),
        box_number: first["box"].as_str().unwrap_or_default().to_string(),
        zipcode: first["zipcode"].as_str().unwrap_or_default().to_string(),
        city: city.to_string(),
        country: first["countryNl"].as_str().unwrap_or_default().to_string(),
    }
}

fn project_children(children: &Value, language: &str) -> Vec<ChildEntity> {
    children
        .as_array()
        .into_iter()
        .flatten()
        .map(|child| ChildEntity {
            number: child
                .get("establishmentNumber")
                .or_else(|| child.get("id"))
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .unwrap_or_default(),
            start_date: child["startDate"].as_str().unwrap_or_default().to_string(),
            names: project_names(&child["denominations"]),
            address: project_address(&child["addresses"], language),
        })
        .collect()
}

/// Fetches `enterprise_number`'s document and projects it for `language`
/// (defaulting to `"NL"` when absent). Returns `None` if no document exists.
pub fn get_company(
    store: &Store,
    enterprise_number: EnterpriseNumber,
    language: Option<&str>,
) -> Result<Option<Company>, Error> {
    let language = language.unwrap_or("NL");
    let row: Option<(String, String)> = store
        .connection()
        .query_row(
            "SELECT payload, etag FROM company_document WHERE enterprise_number = ?1",
            [enterprise_number.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map(Some)
        .or_else(|err| match err {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    let Some((payload_raw, etag)) = row else {
        return Ok(None);
    };
    let payload: Value = serde_json::from_str(&payload_raw)?;

    let juridical_form = if payload["juridicalForm"].is_null() {
        None
    } else {
        Some(resolve_description(&payload["juridicalForm"], language))
    };

    Ok(Some(Company {
        enterprise_number: payload["enterpriseNumber"].as_str().unwrap_or_default().to_string(),
        start_date: payload["startDate"].as_str().unwrap_or_default().to_string(),
        juridical_situation: resolve_description(&payload["juridicalSituation"], language),
        type_of_enterprise: resolve_description(&payload["typeOfEnterprise"], language),
        juridical_form,
        names: project_names(&payload["denominations"]),
        address: project_address(&payload["addresses"], language),
        establishments: project_children(&payload["establishments"], language),
        branches: project_children(&payload["branches"], language),
        etag,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbo_store::Store;
    use rusqlite::params;

    fn store_with(payload: Value) -> Store {
        let store = Store::open_in_memory().unwrap();
        store
            .connection()
            .execute_batch(
                "CREATE TABLE company_document (enterprise_number TEXT PRIMARY KEY, payload TEXT NOT NULL, \
                 json_version INTEGER NOT NULL, etag TEXT NOT NULL, updated_at TEXT NOT NULL, source_import_id TEXT)",
            )
            .unwrap();
        store
            .connection()
            .execute(
                "INSERT INTO company_document (enterprise_number, payload, json_version, etag, updated_at) VALUES (?1,?2,1,'etag-1',datetime('now'))",
                params![payload["enterpriseNumber"].as_str().unwrap(), payload.to_string()],
            )
            .unwrap();
        store
    }

    fn base_payload(denominations: Value) -> Value {
        serde_json::json!({
            "enterpriseNumber": "0403199702",
            "startDate": "2000-01-01",
            "juridicalSituation": {"code": "000", "descriptions": {"NL": "Actief"}},
            "typeOfEnterprise": {"code": "1", "descriptions": {"NL": "Rechtspersoon"}},
            "juridicalForm": Value::Null,
            "denominations": denominations,
            "addresses": [],
            "establishments": [],
            "branches": [],
        })
    }

    #[test]
    fn basic_lookup_returns_dutch_name() {
        let payload = base_payload(serde_json::json!([
            {"type": "name", "value": "KBC GROEP"}
        ]));
        let store = store_with(payload);
        let company = get_company(&store, EnterpriseNumber::parse("0403199702").unwrap(), Some("NL"))
            .unwrap()
            .unwrap();
        assert_eq!(
            company.names,
            vec![Name { kind: "name".to_string(), name: "KBC GROEP".to_string() }]
        );
    }

    #[test]
    fn description_fallback_chain_resolves_french_for_english_request() {
        let payload = serde_json::json!({
            "enterpriseNumber": "0403199702",
            "startDate": "2000-01-01",
            "juridicalSituation": {"code": "000", "descriptions": {"FR": "Actif"}},
            "typeOfEnterprise": {"code": "1", "descriptions": {"NL": "Rechtspersoon"}},
            "juridicalForm": Value::Null,
            "denominations": [],
            "addresses": [],
            "establishments": [],
            "branches": [],
        });
        let store = store_with(payload);
        let company = get_company(&store, EnterpriseNumber::parse("0403199702").unwrap(), Some("EN"))
            .unwrap()
            .unwrap();
        assert_eq!(company.juridical_situation.description, "Actif");
    }

    #[test]
    fn missing_document_is_none() {
        let store = Store::open_in_memory().unwrap();
        store
            .connection()
            .execute_batch(
                "CREATE TABLE company_document (enterprise_number TEXT PRIMARY KEY, payload TEXT NOT NULL, \
                 json_version INTEGER NOT NULL, etag TEXT NOT NULL, updated_at TEXT NOT NULL, source_import_id TEXT)",
            )
            .unwrap();
        let result = get_company(&store, EnterpriseNumber::parse("0403199702").unwrap(), None).unwrap();
        assert!(result.is_none());
    }
}
