//! The code cache (C4): an immutable, in-memory `(category, code_value) ->
//! surrogate_id` map loaded once at the start of an import run.

use kbo_store::Store;
use std::collections::{HashMap, HashSet};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("sqlite error")]
    Sqlite(#[from] rusqlite::Error),
}

/// The closed vocabulary of §3.2. A sum type over categories, per the
/// "inheritance hierarchy for codes" design note: the underlying store
/// still tags rows with a plain string category, but call sites work with
/// this enum instead of stringly-typed category names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Language,
    TypeOfEnterprise,
    JuridicalSituation,
    JuridicalForm,
    ActivityGroup,
    TypeOfDenomination,
    Nace2003,
    Nace2008,
    Nace2025,
    TypeOfAddress,
    Classification,
    EntityContact,
    ContactType,
}

impl Category {
    pub const ALL: &'static [Category] = &[
        Category::Language,
        Category::TypeOfEnterprise,
        Category::JuridicalSituation,
        Category::JuridicalForm,
        Category::ActivityGroup,
        Category::TypeOfDenomination,
        Category::Nace2003,
        Category::Nace2008,
        Category::Nace2025,
        Category::TypeOfAddress,
        Category::Classification,
        Category::EntityContact,
        Category::ContactType,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Language => "Language",
            Category::TypeOfEnterprise => "TypeOfEnterprise",
            Category::JuridicalSituation => "JuridicalSituation",
            Category::JuridicalForm => "JuridicalForm",
            Category::ActivityGroup => "ActivityGroup",
            Category::TypeOfDenomination => "TypeOfDenomination",
            Category::Nace2003 => "Nace2003",
            Category::Nace2008 => "Nace2008",
            Category::Nace2025 => "Nace2025",
            Category::TypeOfAddress => "TypeOfAddress",
            Category::Classification => "Classification",
            Category::EntityContact => "EntityContact",
            Category::ContactType => "ContactType",
        }
    }

    pub fn nace(version: &str) -> Option<Category> {
        match version {
            "2003" => Some(Category::Nace2003),
            "2008" => Some(Category::Nace2008),
            "2025" => Some(Category::Nace2025),
            _ => None,
        }
    }
}

/// Immutable once constructed; a run loads it exactly once and never
/// mutates it afterward.
pub struct CodeCache {
    map: HashMap<(Category, String), i64>,
    seen_categories: HashSet<Category>,
}

impl CodeCache {
    /// Loads every row of the `code` table into memory.
    pub fn load(store: &Store) -> Result<Self, Error> {
        let mut map = HashMap::new();
        let mut seen_categories = HashSet::new();
        let mut stmt = store
            .connection()
            .prepare("SELECT id, category, code_value FROM code")?;
        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            let category: String = row.get(1)?;
            let code_value: String = row.get(2)?;
            Ok((id, category, code_value))
        })?;
        for row in rows {
            let (id, category_str, code_value) = row?;
            if let Some(category) = Category::ALL.iter().find(|c| c.as_str() == category_str) {
                map.insert((*category, code_value), id);
                seen_categories.insert(*category);
            }
        }
        Ok(Self { map, seen_categories })
    }

    pub fn try_get(&self, category: Category, code_value: &str) -> Option<i64> {
        self.map.get(&(category, code_value.to_string())).copied()
    }

    pub fn try_get_language(&self, code_value: &str) -> Option<i64> {
        self.try_get(Category::Language, code_value)
    }

    pub fn try_get_nace(&self, version: &str, code_value: &str) -> Option<i64> {
        Category::nace(version).and_then(|cat| self.try_get(cat, code_value))
    }

    /// Categories named in `code.csv` for this run; used by `rebuild_cache`
    /// runs to flag categories that never appeared in the source data
    /// (diagnostic only, does not affect ingest control flow).
    pub fn categories_seen(&self) -> impl Iterator<Item = &Category> {
        self.seen_categories.iter()
    }

    pub fn categories_missing(&self) -> Vec<Category> {
        Category::ALL
            .iter()
            .copied()
            .filter(|c| !self.seen_categories.contains(c))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_store() -> Store {
        let store = Store::open_in_memory().unwrap();
        store.init_schema().unwrap();
        store
            .connection()
            .execute(
                "INSERT INTO code (category, code_value) VALUES ('Language', 'NL')",
                [],
            )
            .unwrap();
        store
            .connection()
            .execute(
                "INSERT INTO code (category, code_value) VALUES ('Nace2008', '01110')",
                [],
            )
            .unwrap();
        store
    }

    #[test]
    fn resolves_known_codes() {
        let store = seeded_store();
        let cache = CodeCache::load(&store).unwrap();
        assert!(cache.try_get_language("NL").is_some());
        assert!(cache.try_get_nace("2008", "01110").is_some());
        assert!(cache.try_get_nace("2025", "01110").is_none());
    }

    #[test]
    fn unknown_code_is_none() {
        let store = seeded_store();
        let cache = CodeCache::load(&store).unwrap();
        assert!(cache.try_get_language("XX").is_none());
    }

    #[test]
    fn tracks_missing_categories() {
        let store = seeded_store();
        let cache = CodeCache::load(&store).unwrap();
        assert!(cache.categories_missing().contains(&Category::TypeOfAddress));
        assert!(!cache.categories_missing().contains(&Category::Language));
    }
}
