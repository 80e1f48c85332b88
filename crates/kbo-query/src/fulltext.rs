//! Phase C of the free-text planner (C12): execute the synthesized MATCH
//! expression against `company_fts`, rank with weighted BM25, and hydrate
//! the top-K enterprise numbers via the lookup planner (C11).

use crate::tokenize::{synthesize_match_expression, tokenize_query};
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

/// Fixed column weights, in `company_fts`'s column order (§4.12 Phase C).
const BM25_WEIGHTS: [f64; 11] = [5.0, 3.0, 1.0, 1.0, 4.0, 4.0, 2.5, 0.5, 0.5, 0.5, 0.5];

fn clamp_take(take: i64) -> i64 {
    take.clamp(0, 25)
}

fn clamp_skip(skip: i64) -> i64 {
    skip.max(0)
}

/// Tokenizes `text`, synthesizes the MATCH expression, ranks matches by
/// weighted BM25 (ties broken by `enterprise_number` ascending), and
/// hydrates the resulting enterprise numbers in rank order.
pub fn search_company_fulltext(
    store: &Store,
    text: &str,
    language: Option<&str>,
    skip: i64,
    take: i64,
) -> Result<Vec<Company>, Error> {
    let tokens = tokenize_query(text);
    let expression = synthesize_match_expression(&tokens);
    if expression.is_empty() {
        return Ok(Vec::new());
    }

    let take = clamp_take(take);
    let skip = clamp_skip(skip);
    if take == 0 {
        return Ok(Vec::new());
    }

    let weights_sql = BM25_WEIGHTS
        .iter()
        .map(|w| w.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!(
        "SELECT m.enterprise_number FROM company_fts f \
         JOIN company_fts_map m ON m.rowid = f.rowid \
         WHERE company_fts MATCH ?1 \
         ORDER BY bm25(company_fts, {weights_sql}), m.enterprise_number ASC \
         LIMIT ?2 OFFSET ?3"
    );

    let mut stmt = store.connection().prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params![expression, take, skip], |row| {
        row.get::<_, String>(0)
    })?;

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_take_to_twenty_five() {
        assert_eq!(clamp_take(1000), 25);
        assert_eq!(clamp_take(-5), 0);
    }

    #[test]
    fn clamps_skip_to_non_negative() {
        assert_eq!(clamp_skip(-5), 0);
        assert_eq!(clamp_skip(10), 10);
    }

    #[test]
    fn empty_query_after_tokenization_returns_empty() {
        let store = Store::open_in_memory().unwrap();
        let result = search_company_fulltext(&store, "12 a !!", None, 0, 10).unwrap();
        assert!(result.is_empty());
    }
}
