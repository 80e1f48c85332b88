//! The orchestrator (C13): assembles the fixed step order of §4.13,
//! enforces the full-import emptiness invariant, and exposes the three
//! entry points of the orchestrator's public surface.

use crate::derive::RebuildDerivedProjections;
use crate::{activity, address, branch, codes, contact, denomination, enterprise, establishment, meta};
use kbo_pipeline::{CancellationToken, Engine, EventSink, RunSummary, Step};
use kbo_store::Store;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] kbo_store::Error),
    #[error(transparent)]
    Pipeline(#[from] anyhow::Error),
}

/// Baseline row estimate reported in `Plan` when a full import starts
/// (§4.13); the enterprises-file estimate refines it once `prepare` runs.
const FULL_BASELINE_ROWS: u64 = 2_000_000;
const INCREMENTAL_BASELINE_ROWS: u64 = 100_000;

/// The fixed step order: `Meta, Codes, Enterprises, Establishments,
/// Branches, Addresses, Denominations, Contacts, Activities,
/// RebuildCompanyDocuments`. The last step also performs the
/// `RebuildCompanyLocationsDoc` and `RebuildFtsIndex` work named by §4.13,
/// in the same transaction (§3.5) — see `derive::RebuildDerivedProjections`.
fn full_step_list(folder: &Path, incremental: bool) -> Vec<Box<dyn Step>> {
    vec![
        Box::new(meta::ImportMeta::new(folder)),
        Box::new(codes::ImportCodes::new(folder)),
        Box::new(enterprise::ImportEnterprises::new(folder, incremental)),
        Box::new(establishment::ImportEstablishments::new(folder, incremental)),
        Box::new(branch::ImportBranches::new(folder, incremental)),
        Box::new(address::ImportAddresses::new(folder, incremental)),
        Box::new(denomination::ImportDenominations::new(folder, incremental)),
        Box::new(contact::ImportContacts::new(folder, incremental)),
        Box::new(activity::ImportActivities::new(folder, incremental)),
        Box::new(RebuildDerivedProjections::new(folder, incremental)),
    ]
}

/// Runs every step of §4.13 in order. In full mode every base table must
/// be empty before the first step runs, or the run fails with `NotEmpty`.
pub fn full_import(
    store: &mut Store,
    folder: &Path,
    incremental: bool,
    ct: &CancellationToken,
    sink: &mut dyn EventSink,
) -> Result<RunSummary, Error> {
    if !incremental && !store.is_empty()? {
        return Err(Error::Store(kbo_store::Error::NotEmpty));
    }

    let steps = full_step_list(folder, incremental);
    let baseline = if incremental {
        INCREMENTAL_BASELINE_ROWS
    } else {
        FULL_BASELINE_ROWS
    };
    let mut engine = Engine::new(steps);
    engine
        .run(store, ct, sink, &folder.display().to_string(), incremental, Some(baseline))
        .map_err(Error::Pipeline)
}

/// Runs only the named subset of steps (by their `Step::name()`), keeping
/// the fixed relative order of §4.13.
pub fn import_files(
    store: &mut Store,
    folder: &Path,
    files: &[&str],
    incremental: bool,
    ct: &CancellationToken,
    sink: &mut dyn EventSink,
) -> Result<RunSummary, Error> {
    let steps: Vec<Box<dyn Step>> = full_step_list(folder, incremental)
        .into_iter()
        .filter(|step| files.contains(&step.name()))
        .collect();
    let mut engine = Engine::new(steps);
    engine
        .run(store, ct, sink, &folder.display().to_string(), incremental, None)
        .map_err(Error::Pipeline)
}

/// Runs only the derivation step (document, locations, FTS); no CSV reads.
pub fn rebuild_cache(store: &mut Store, ct: &CancellationToken, sink: &mut dyn EventSink) -> Result<RunSummary, Error> {
    let steps: Vec<Box<dyn Step>> = vec![Box::new(RebuildDerivedProjections::new(Path::new("."), false))];
    let mut engine = Engine::new(steps);
    engine
        .run(store, ct, sink, "", false, None)
        .map_err(Error::Pipeline)
}
