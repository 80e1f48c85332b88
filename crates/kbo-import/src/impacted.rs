//! Derives the impacted enterprise-number set *S* for incremental mode
//! (§9 design notes, open question): the union of (a) enterprises named
//! directly by `enterprise_insert.csv`/`enterprise_delete.csv`, (b)
//! enterprises owning any establishment/branch named by their own
//! insert/delete files, and (c) enterprises owning any `entity_number`
//! appearing in the fact files' insert/delete rows.
//!
//! Entities that are themselves deleted by `establishment_delete.csv` or
//! `branch_delete.csv` in the same run can no longer be resolved back to
//! their enterprise once that step's delete has applied; such rows widen
//! *S* only through their own direct `EnterpriseNumber` column when present.

use crate::paths::{delete_csv, insert_csv};
use kbo_ident::{classify_entity_number, EntityKind};
use kbo_store::Store;
use std::collections::BTreeSet;
use std::path::Path;

fn collect_column(folder: &Path, stem: &str, column: &str, out: &mut BTreeSet<String>) -> anyhow::Result<()> {
    for path in [insert_csv(folder, stem), delete_csv(folder, stem)] {
        for row in kbo_csv::read_records(&path)? {
            let row = row?;
            let value = row.get(column);
            if !value.is_empty() {
                out.insert(value.to_string());
            }
        }
    }
    Ok(())
}

fn owning_enterprise(store: &Store, entity_number: &str) -> anyhow::Result<Option<String>> {
    if let EntityKind::Enterprise = classify_entity_number(entity_number) {
        return Ok(Some(entity_number.to_string()));
    }

    let conn = store.connection();
    let from_establishment: Option<String> = conn
        .query_row(
            "SELECT enterprise_number FROM establishment WHERE establishment_number = ?1",
            [entity_number],
            |row| row.get(0),
        )
        .ok();
    if from_establishment.is_some() {
        return Ok(from_establishment);
    }

    let branch_id: Option<i64> = entity_number.parse().ok();
    if let Some(branch_id) = branch_id {
        let from_branch: Option<String> = conn
            .query_row(
                "SELECT enterprise_number FROM branch WHERE id = ?1",
                [branch_id],
                |row| row.get(0),
            )
            .ok();
        if from_branch.is_some() {
            return Ok(from_branch);
        }
    }

    Ok(None)
}

pub fn compute_impacted_set(folder: &Path, store: &Store) -> anyhow::Result<Vec<String>> {
    let mut impacted = BTreeSet::new();
    collect_column(folder, "enterprise", "EnterpriseNumber", &mut impacted)?;
    collect_column(folder, "establishment", "EnterpriseNumber", &mut impacted)?;
    collect_column(folder, "branch", "EnterpriseNumber", &mut impacted)?;

    let mut establishment_numbers = BTreeSet::new();
    collect_column(folder, "establishment", "EstablishmentNumber", &mut establishment_numbers)?;
    let mut branch_ids = BTreeSet::new();
    collect_column(folder, "branch", "Id", &mut branch_ids)?;

    let mut entity_numbers = BTreeSet::new();
    collect_column(folder, "address", "EntityNumber", &mut entity_numbers)?;
    collect_column(folder, "denomination", "EntityNumber", &mut entity_numbers)?;
    collect_column(folder, "contact", "EntityNumber", &mut entity_numbers)?;
    collect_column(folder, "activity", "EntityNumber", &mut entity_numbers)?;

    for establishment_number in &establishment_numbers {
        if let Some(enterprise_number) = owning_enterprise(store, establishment_number)? {
            impacted.insert(enterprise_number);
        }
    }
    for branch_id in &branch_ids {
        if let Some(enterprise_number) = owning_enterprise(store, branch_id)? {
            impacted.insert(enterprise_number);
        }
    }
    for entity_number in &entity_numbers {
        if let Some(enterprise_number) = owning_enterprise(store, entity_number)? {
            impacted.insert(enterprise_number);
        }
    }

    Ok(impacted.into_iter().collect())
}
