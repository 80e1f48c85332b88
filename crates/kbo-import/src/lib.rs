//! Per-entity ingest steps (C13) and the orchestrator tying them to the
//! pipeline engine in the fixed order of §4.13.

mod activity;
mod address;
mod branch;
mod codes;
mod contact;
mod denomination;
mod derive;
mod enterprise;
mod establishment;
mod fact_step;
mod impacted;
mod meta;
mod paths;

pub mod orchestrator;

pub use orchestrator::{full_import, import_files, rebuild_cache, Error};
