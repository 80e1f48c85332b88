//! The read APIs (C11, C12, §6.3): lookup by enterprise number, ranked
//! free-text search, and the simpler structured `LIKE` search.

mod fulltext;
mod lookup;
mod structured;
mod tokenize;

pub use fulltext::search_company_fulltext;
pub use lookup::get_company;
pub use structured::{search_company_structured, StructuredCriteria};
pub use tokenize::{synthesize_match_expression, tokenize_query};

use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CodeDescription {
    pub code: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Name {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AddressView {
    pub street: String,
    pub house_number: String,
    pub box_number: String,
    pub zipcode: String,
    pub city: String,
    pub country: String,
}

impl AddressView {
    fn empty() -> Self {
        Self {
            street: String::new(),
            house_number: String::new(),
            box_number: String::new(),
            zipcode: String::new(),
            city: String::new(),
            country: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChildEntity {
    pub number: String,
    pub start_date: String,
    pub names: Vec<Name>,
    pub address: AddressView,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Company {
    pub enterprise_number: String,
    pub start_date: String,
    pub juridical_situation: CodeDescription,
    pub type_of_enterprise: CodeDescription,
    pub juridical_form: Option<CodeDescription>,
    pub names: Vec<Name>,
    pub address: AddressView,
    pub establishments: Vec<ChildEntity>,
    pub branches: Vec<ChildEntity>,
    pub etag: String,
}
