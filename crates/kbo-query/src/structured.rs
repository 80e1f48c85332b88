//! The structured search (§6.3): conjunctive `LIKE` predicates over
//! upper-cased values, built without reflection per the "expression
//! builder" design note of §9. This is the simpler degenerate path; the
//! hard engineering is in `fulltext`.

use crate::{lookup, Company};
use kbo_ident::EnterpriseNumber;
use kbo_store::Store;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("sqlite error")]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Lookup(#[from] lookup::Error),
}

#[derive(Debug, Default, Clone)]
pub struct StructuredCriteria {
    pub name: Option<String>,
    pub street: Option<String>,
    pub house_number: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
}

struct PredicateBuilder {
    clauses: Vec<String>,
    params: Vec<String>,
}

impl PredicateBuilder {
    fn new() -> Self {
        Self {
            clauses: Vec::new(),
            params: Vec::new(),
        }
    }

    fn add_like(&mut self, column: &str, value: &Option<String>) {
        if let Some(value) = value {
            if !value.is_empty() {
                self.clauses.push(format!("UPPER({column}) LIKE UPPER(?)"));
                self.params.push(format!("%{value}%"));
            }
        }
    }
}

pub fn search_company_structured(
    store: &Store,
    criteria: &StructuredCriteria,
    language: Option<&str>,
    skip: i64,
    take: i64,
) -> Result<Vec<Company>, Error> {
    let take = take.clamp(0, 25);
    let skip = skip.max(0);
    if take == 0 {
        return Ok(Vec::new());
    }

    let mut builder = PredicateBuilder::new();
    builder.add_like("d.value", &criteria.name);
    builder.add_like("a.street_nl", &criteria.street);
    builder.add_like("a.house_number", &criteria.house_number);
    builder.add_like("a.zipcode", &criteria.postal_code);
    builder.add_like("a.municipality_nl", &criteria.city);

    let where_clause = if builder.clauses.is_empty() {
        "1 = 1".to_string()
    } else {
        builder.clauses.join(" AND ")
    };

    let sql = format!(
        "SELECT DISTINCT e.enterprise_number FROM enterprise e \
         LEFT JOIN denomination d ON d.entity_number = e.enterprise_number \
         LEFT JOIN address a ON a.entity_number = e.enterprise_number \
         WHERE {where_clause} \
         ORDER BY e.enterprise_number ASC \
         LIMIT ?{limit_idx} OFFSET ?{offset_idx}",
        limit_idx = builder.params.len() + 1,
        offset_idx = builder.params.len() + 2,
    );

    let mut stmt = store.connection().prepare(&sql)?;
    let mut bound_params: Vec<Box<dyn rusqlite::ToSql>> = builder
        .params
        .iter()
        .map(|p| Box::new(p.clone()) as Box<dyn rusqlite::ToSql>)
        .collect();
    bound_params.push(Box::new(take));
    bound_params.push(Box::new(skip));

    let param_refs: Vec<&dyn rusqlite::ToSql> = bound_params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(param_refs.as_slice(), |row| row.get::<_, String>(0))?;

    let mut companies = Vec::new();
    for row in rows {
        let enterprise_number_raw = row?;
        let Ok(enterprise_number) = EnterpriseNumber::parse(&enterprise_number_raw) else {
            continue;
        };
        if let Some(company) = lookup::get_company(store, enterprise_number, language)? {
            companies.push(company);
        }
    }
    Ok(companies)
}
