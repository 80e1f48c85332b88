//! Per-entity mappers (C5): transform a CSV row into a target table row,
//! resolving code references through the code cache and accumulating
//! per-row error messages instead of failing the whole step.

use chrono::NaiveDate;
use kbo_codes::{Category, CodeCache};
use kbo_csv::Record;
use kbo_ident::EnterpriseNumber;

/// The outcome of mapping a single row: either a target row plus zero
/// errors, or no target plus one-or-more human-readable error strings.
/// The row is always skipped on failure; the step itself still succeeds.
pub struct MapResult<T> {
    pub success: bool,
    pub target: Option<T>,
    pub errors: Vec<String>,
}

impl<T> MapResult<T> {
    fn ok(target: T) -> Self {
        Self {
            success: true,
            target: Some(target),
            errors: Vec::new(),
        }
    }

    fn err(errors: Vec<String>) -> Self {
        Self {
            success: false,
            target: None,
            errors,
        }
    }
}

pub struct Enterprise {
    pub enterprise_number: EnterpriseNumber,
    pub juridical_situation_id: i64,
    pub type_of_enterprise_id: i64,
    pub juridical_form_id: Option<i64>,
    pub juridical_form_cac_id: Option<i64>,
    pub start_date: NaiveDate,
}

pub fn map_enterprise(row: &Record, codes: &CodeCache) -> MapResult<Enterprise> {
    let mut errors = Vec::new();

    let enterprise_number = match EnterpriseNumber::parse(row.get("EnterpriseNumber")) {
        Ok(n) => Some(n),
        Err(e) => {
            errors.push(format!("invalid enterprise number: {e}"));
            None
        }
    };

    let juridical_situation_id = codes.try_get(Category::JuridicalSituation, row.get("JuridicalSituation"));
    if juridical_situation_id.is_none() {
        errors.push(format!(
            "unresolved JuridicalSituation code {:?}",
            row.get("JuridicalSituation")
        ));
    }

    let type_of_enterprise_id = codes.try_get(Category::TypeOfEnterprise, row.get("TypeOfEnterprise"));
    if type_of_enterprise_id.is_none() {
        errors.push(format!(
            "unresolved TypeOfEnterprise code {:?}",
            row.get("TypeOfEnterprise")
        ));
    }

    let juridical_form_raw = row.get("JuridicalForm");
    let juridical_form_id = if juridical_form_raw.is_empty() {
        None
    } else {
        let id = codes.try_get(Category::JuridicalForm, juridical_form_raw);
        if id.is_none() {
            errors.push(format!("unresolved JuridicalForm code {juridical_form_raw:?}"));
        }
        id
    };

    let juridical_form_cac_raw = row.get("JuridicalFormCAC");
    let juridical_form_cac_id = if juridical_form_cac_raw.is_empty() {
        None
    } else {
        let id = codes.try_get(Category::JuridicalForm, juridical_form_cac_raw);
        if id.is_none() {
            errors.push(format!(
                "unresolved JuridicalFormCAC code {juridical_form_cac_raw:?}"
            ));
        }
        id
    };

    let start_date = row.get_date("StartDate");
    if start_date.is_none() {
        errors.push("missing StartDate".to_string());
    }

    if !errors.is_empty() {
        return MapResult::err(errors);
    }

    MapResult::ok(Enterprise {
        enterprise_number: enterprise_number.unwrap(),
        juridical_situation_id: juridical_situation_id.unwrap(),
        type_of_enterprise_id: type_of_enterprise_id.unwrap(),
        juridical_form_id,
        juridical_form_cac_id,
        start_date: start_date.unwrap(),
    })
}

pub struct Establishment {
    pub establishment_number: String,
    pub start_date: NaiveDate,
    pub enterprise_number: String,
}

pub fn map_establishment(row: &Record) -> MapResult<Establishment> {
    let establishment_number = row.get("EstablishmentNumber").to_string();
    let enterprise_number = row.get("EnterpriseNumber").to_string();
    let start_date = row.get_date("StartDate");

    let mut errors = Vec::new();
    if establishment_number.is_empty() {
        errors.push("missing EstablishmentNumber".to_string());
    }
    if enterprise_number.is_empty() {
        errors.push("missing EnterpriseNumber".to_string());
    }
    if start_date.is_none() {
        errors.push("missing StartDate".to_string());
    }
    if !errors.is_empty() {
        return MapResult::err(errors);
    }

    MapResult::ok(Establishment {
        establishment_number,
        start_date: start_date.unwrap(),
        enterprise_number,
    })
}

pub struct Branch {
    pub id: i64,
    pub start_date: NaiveDate,
    pub enterprise_number: String,
}

pub fn map_branch(row: &Record) -> MapResult<Branch> {
    let id: Option<i64> = row.get("Id").parse().ok();
    let enterprise_number = row.get("EnterpriseNumber").to_string();
    let start_date = row.get_date("StartDate");

    let mut errors = Vec::new();
    if id.is_none() {
        errors.push(format!("invalid branch id {:?}", row.get("Id")));
    }
    if enterprise_number.is_empty() {
        errors.push("missing EnterpriseNumber".to_string());
    }
    if start_date.is_none() {
        errors.push("missing StartDate".to_string());
    }
    if !errors.is_empty() {
        return MapResult::err(errors);
    }

    MapResult::ok(Branch {
        id: id.unwrap(),
        start_date: start_date.unwrap(),
        enterprise_number,
    })
}

pub struct Address {
    pub entity_number: String,
    pub type_of_address_id: i64,
    pub country_nl: String,
    pub country_fr: String,
    pub zipcode: String,
    pub municipality_nl: String,
    pub municipality_fr: String,
    pub street_nl: String,
    pub street_fr: String,
    pub house_number: String,
    pub box_number: String,
    pub extra_info: String,
    pub date_striking_off: Option<NaiveDate>,
}

pub fn map_address(row: &Record, codes: &CodeCache) -> MapResult<Address> {
    let entity_number = row.get("EntityNumber").to_string();
    let type_raw = row.get("TypeOfAddress");
    let type_of_address_id = codes.try_get(Category::TypeOfAddress, type_raw);

    let mut errors = Vec::new();
    if entity_number.is_empty() {
        errors.push("missing EntityNumber".to_string());
    }
    if type_of_address_id.is_none() {
        errors.push(format!("unresolved TypeOfAddress code {type_raw:?}"));
    }
    if !errors.is_empty() {
        return MapResult::err(errors);
    }

    MapResult::ok(Address {
        entity_number,
        type_of_address_id: type_of_address_id.unwrap(),
        country_nl: row.get("CountryNL").to_string(),
        country_fr: row.get("CountryFR").to_string(),
        zipcode: row.get("Zipcode").to_string(),
        municipality_nl: row.get("MunicipalityNL").to_string(),
        municipality_fr: row.get("MunicipalityFR").to_string(),
        street_nl: row.get("StreetNL").to_string(),
        street_fr: row.get("StreetFR").to_string(),
        house_number: row.get("HouseNumber").to_string(),
        box_number: row.get("Box").to_string(),
        extra_info: row.get("ExtraInfo").to_string(),
        date_striking_off: row.get_date("DateStrikingOff"),
    })
}

pub struct Denomination {
    pub entity_number: String,
    pub language_id: i64,
    pub type_of_denomination_id: i64,
    pub value: String,
}

pub fn map_denomination(row: &Record, codes: &CodeCache) -> MapResult<Denomination> {
    let entity_number = row.get("EntityNumber").to_string();
    let language_raw = row.get("Language");
    let type_raw = row.get("TypeOfDenomination");
    let language_id = codes.try_get_language(language_raw);
    let type_of_denomination_id = codes.try_get(Category::TypeOfDenomination, type_raw);

    let mut errors = Vec::new();
    if entity_number.is_empty() {
        errors.push("missing EntityNumber".to_string());
    }
    if language_id.is_none() {
        errors.push(format!("unresolved Language code {language_raw:?}"));
    }
    if type_of_denomination_id.is_none() {
        errors.push(format!("unresolved TypeOfDenomination code {type_raw:?}"));
    }
    if !errors.is_empty() {
        return MapResult::err(errors);
    }

    MapResult::ok(Denomination {
        entity_number,
        language_id: language_id.unwrap(),
        type_of_denomination_id: type_of_denomination_id.unwrap(),
        value: row.get("Denomination").to_string(),
    })
}

pub struct Contact {
    pub entity_number: String,
    pub entity_contact_id: i64,
    pub contact_type_id: i64,
    pub value: String,
}

pub fn map_contact(row: &Record, codes: &CodeCache) -> MapResult<Contact> {
    let entity_number = row.get("EntityNumber").to_string();
    let entity_contact_raw = row.get("EntityContact");
    let contact_type_raw = row.get("ContactType");
    let entity_contact_id = codes.try_get(Category::EntityContact, entity_contact_raw);
    let contact_type_id = codes.try_get(Category::ContactType, contact_type_raw);

    let mut errors = Vec::new();
    if entity_number.is_empty() {
        errors.push("missing EntityNumber".to_string());
    }
    if entity_contact_id.is_none() {
        errors.push(format!("unresolved EntityContact code {entity_contact_raw:?}"));
    }
    if contact_type_id.is_none() {
        errors.push(format!("unresolved ContactType code {contact_type_raw:?}"));
    }
    if !errors.is_empty() {
        return MapResult::err(errors);
    }

    MapResult::ok(Contact {
        entity_number,
        entity_contact_id: entity_contact_id.unwrap(),
        contact_type_id: contact_type_id.unwrap(),
        value: row.get("Value").to_string(),
    })
}

pub struct Activity {
    pub entity_number: String,
    pub activity_group_id: i64,
    pub classification_id: i64,
    pub nace_code_id: i64,
}

pub fn map_activity(row: &Record, codes: &CodeCache) -> MapResult<Activity> {
    let entity_number = row.get("EntityNumber").to_string();
    let nace_version = row.get("NaceVersion");
    let nace_code_raw = row.get("NaceCode");
    let activity_group_raw = row.get("ActivityGroup");
    let classification_raw = row.get("Classification");

    let mut errors = Vec::new();

    if !matches!(nace_version, "2003" | "2008" | "2025") {
        errors.push(format!("unsupported NaceVersion {nace_version:?}"));
    }
    let nace_code_id = if errors.is_empty() {
        let id = codes.try_get_nace(nace_version, nace_code_raw);
        if id.is_none() {
            errors.push(format!("unresolved NaceCode {nace_code_raw:?} for version {nace_version}"));
        }
        id
    } else {
        None
    };

    let activity_group_id = codes.try_get(Category::ActivityGroup, activity_group_raw);
    if activity_group_id.is_none() {
        errors.push(format!("unresolved ActivityGroup code {activity_group_raw:?}"));
    }
    let classification_id = codes.try_get(Category::Classification, classification_raw);
    if classification_id.is_none() {
        errors.push(format!("unresolved Classification code {classification_raw:?}"));
    }

    if entity_number.is_empty() {
        errors.push("missing EntityNumber".to_string());
    }

    if !errors.is_empty() {
        return MapResult::err(errors);
    }

    MapResult::ok(Activity {
        entity_number,
        activity_group_id: activity_group_id.unwrap(),
        classification_id: classification_id.unwrap(),
        nace_code_id: nace_code_id.unwrap(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbo_store::Store;

    fn cache_with(categories: &[(&str, &str)]) -> CodeCache {
        let store = Store::open_in_memory().unwrap();
        store.init_schema().unwrap();
        for (category, value) in categories {
            store
                .connection()
                .execute(
                    "INSERT INTO code (category, code_value) VALUES (?1, ?2)",
                    rusqlite::params![category, value],
                )
                .unwrap();
        }
        CodeCache::load(&store).unwrap()
    }

    fn row(pairs: &[(&str, &str)]) -> Record {
        let headers: Vec<&str> = pairs.iter().map(|(h, _)| *h).collect();
        let values: Vec<&str> = pairs.iter().map(|(_, v)| *v).collect();
        let mut data = String::new();
        data.push_str(&headers.join(","));
        data.push('\n');
        data.push_str(&values.join(","));
        data.push('\n');

        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        use std::io::Write;
        tmp.write_all(data.as_bytes()).unwrap();
        kbo_csv::read_records(tmp.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
    }

    #[test]
    fn activity_rejects_unknown_nace_version() {
        let codes = cache_with(&[("ActivityGroup", "001"), ("Classification", "MAIN")]);
        let r = row(&[
            ("EntityNumber", "0403.199.702"),
            ("NaceVersion", "1999"),
            ("NaceCode", "01110"),
            ("ActivityGroup", "001"),
            ("Classification", "MAIN"),
        ]);
        let result = map_activity(&r, &codes);
        assert!(!result.success);
        assert!(result.errors.iter().any(|e| e.contains("NaceVersion")));
    }

    #[test]
    fn denomination_requires_both_codes() {
        let codes = cache_with(&[("Language", "NL")]);
        let r = row(&[
            ("EntityNumber", "0403.199.702"),
            ("Language", "NL"),
            ("TypeOfDenomination", "001"),
            ("Denomination", "KBC GROEP"),
        ]);
        let result = map_denomination(&r, &codes);
        assert!(!result.success);
        assert!(result.errors.iter().any(|e| e.contains("TypeOfDenomination")));
    }

    #[test]
    fn denomination_succeeds_when_resolvable() {
        let codes = cache_with(&[("Language", "NL"), ("TypeOfDenomination", "001")]);
        let r = row(&[
            ("EntityNumber", "0403.199.702"),
            ("Language", "NL"),
            ("TypeOfDenomination", "001"),
            ("Denomination", "KBC GROEP"),
        ]);
        let result = map_denomination(&r, &codes);
        assert!(result.success);
        assert_eq!(result.target.unwrap().value, "KBC GROEP");
    }
}
