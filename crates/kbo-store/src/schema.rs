//! DDL for the relational tables of §3.2. Each table's `CREATE` text is
//! captured here so a full-mode reset can drop and faithfully recreate it
//! (§4.6): capture, drop, re-execute.

/// A table the pipeline can reset wholesale in full-import mode.
pub struct TableDef {
    pub name: &'static str,
    pub create_ddl: &'static str,
    pub index_ddl: &'static [&'static str],
}

pub const META: TableDef = TableDef {
    name: "meta",
    create_ddl: "CREATE TABLE meta (variable TEXT PRIMARY KEY, value TEXT NOT NULL)",
    index_ddl: &[],
};

pub const CODE: TableDef = TableDef {
    name: "code",
    create_ddl: "CREATE TABLE code (\
        id INTEGER PRIMARY KEY, \
        category TEXT NOT NULL, \
        code_value TEXT NOT NULL\
    )",
    index_ddl: &["CREATE UNIQUE INDEX idx_code_category_value ON code(category, code_value)"],
};

pub const CODE_DESCRIPTION: TableDef = TableDef {
    name: "code_description",
    create_ddl: "CREATE TABLE code_description (\
        id INTEGER PRIMARY KEY, \
        code_id INTEGER NOT NULL REFERENCES code(id), \
        language TEXT NOT NULL, \
        description TEXT NOT NULL\
    )",
    index_ddl: &["CREATE UNIQUE INDEX idx_code_description_code_lang ON code_description(code_id, language)"],
};

pub const ENTERPRISE: TableDef = TableDef {
    name: "enterprise",
    create_ddl: "CREATE TABLE enterprise (\
        enterprise_number TEXT PRIMARY KEY, \
        juridical_situation_id INTEGER NOT NULL REFERENCES code(id), \
        type_of_enterprise_id INTEGER NOT NULL REFERENCES code(id), \
        juridical_form_id INTEGER REFERENCES code(id), \
        juridical_form_cac_id INTEGER REFERENCES code(id), \
        start_date TEXT NOT NULL\
    )",
    index_ddl: &[],
};

pub const ESTABLISHMENT: TableDef = TableDef {
    name: "establishment",
    create_ddl: "CREATE TABLE establishment (\
        establishment_number TEXT PRIMARY KEY, \
        start_date TEXT NOT NULL, \
        enterprise_number TEXT NOT NULL REFERENCES enterprise(enterprise_number)\
    )",
    index_ddl: &["CREATE INDEX idx_establishment_enterprise ON establishment(enterprise_number)"],
};

pub const BRANCH: TableDef = TableDef {
    name: "branch",
    create_ddl: "CREATE TABLE branch (\
        id INTEGER PRIMARY KEY, \
        start_date TEXT NOT NULL, \
        enterprise_number TEXT NOT NULL REFERENCES enterprise(enterprise_number)\
    )",
    index_ddl: &["CREATE INDEX idx_branch_enterprise ON branch(enterprise_number)"],
};

pub const ADDRESS: TableDef = TableDef {
    name: "address",
    create_ddl: "CREATE TABLE address (\
        entity_number TEXT NOT NULL, \
        type_of_address_id INTEGER NOT NULL REFERENCES code(id), \
        country_nl TEXT NOT NULL, \
        country_fr TEXT NOT NULL, \
        zipcode TEXT NOT NULL, \
        municipality_nl TEXT NOT NULL, \
        municipality_fr TEXT NOT NULL, \
        street_nl TEXT NOT NULL, \
        street_fr TEXT NOT NULL, \
        house_number TEXT NOT NULL, \
        box TEXT NOT NULL, \
        extra_info TEXT NOT NULL, \
        date_striking_off TEXT, \
        PRIMARY KEY (entity_number, type_of_address_id)\
    )",
    index_ddl: &["CREATE INDEX idx_address_entity ON address(entity_number)"],
};

pub const DENOMINATION: TableDef = TableDef {
    name: "denomination",
    create_ddl: "CREATE TABLE denomination (\
        id INTEGER PRIMARY KEY, \
        entity_number TEXT NOT NULL, \
        language_id INTEGER NOT NULL REFERENCES code(id), \
        type_of_denomination_id INTEGER NOT NULL REFERENCES code(id), \
        value TEXT NOT NULL\
    )",
    index_ddl: &["CREATE INDEX idx_denomination_entity ON denomination(entity_number)"],
};

pub const CONTACT: TableDef = TableDef {
    name: "contact",
    create_ddl: "CREATE TABLE contact (\
        id INTEGER PRIMARY KEY, \
        entity_number TEXT NOT NULL, \
        entity_contact_id INTEGER NOT NULL REFERENCES code(id), \
        contact_type_id INTEGER NOT NULL REFERENCES code(id), \
        value TEXT NOT NULL\
    )",
    index_ddl: &["CREATE INDEX idx_contact_entity ON contact(entity_number)"],
};

pub const ACTIVITY: TableDef = TableDef {
    name: "activity",
    create_ddl: "CREATE TABLE activity (\
        id INTEGER PRIMARY KEY, \
        entity_number TEXT NOT NULL, \
        activity_group_id INTEGER NOT NULL REFERENCES code(id), \
        classification_id INTEGER NOT NULL REFERENCES code(id), \
        nace_code_id INTEGER NOT NULL REFERENCES code(id)\
    )",
    index_ddl: &["CREATE INDEX idx_activity_entity ON activity(entity_number)"],
};

/// All base tables, in an order safe for `CREATE TABLE` (referenced tables first).
pub const ALL_TABLES: &[TableDef] = &[
    META,
    CODE,
    CODE_DESCRIPTION,
    ENTERPRISE,
    ESTABLISHMENT,
    BRANCH,
    ADDRESS,
    DENOMINATION,
    CONTACT,
    ACTIVITY,
];

pub const COMPANY_DOCUMENT_DDL: &str = "CREATE TABLE company_document (\
    enterprise_number TEXT PRIMARY KEY, \
    payload TEXT NOT NULL CHECK (json_valid(payload)), \
    json_version INTEGER NOT NULL, \
    etag TEXT NOT NULL, \
    updated_at TEXT NOT NULL, \
    source_import_id TEXT\
)";

/// Column order is frozen; it is part of the on-disk FTS schema and must
/// match the query planner's BM25 weight vector (§4.12).
pub const COMPANY_FTS_COLUMNS: &[&str] = &[
    "company_name",
    "commercial_name",
    "street_nl",
    "street_fr",
    "city_nl",
    "city_fr",
    "postal_code",
    "activity_desc_nl",
    "activity_desc_fr",
    "activity_desc_de",
    "activity_desc_en",
];

/// Prefix token lengths, frozen as part of the on-disk tokenizer contract.
pub const FTS_PREFIX_LENGTHS: &[u32] = &[2, 3, 4];
