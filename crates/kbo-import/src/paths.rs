//! File naming conventions for the input file set (§6.1).

use std::path::{Path, PathBuf};

pub fn full_csv(folder: &Path, stem: &str) -> PathBuf {
    folder.join(format!("{stem}.csv"))
}

pub fn insert_csv(folder: &Path, stem: &str) -> PathBuf {
    folder.join(format!("{stem}_insert.csv"))
}

pub fn delete_csv(folder: &Path, stem: &str) -> PathBuf {
    folder.join(format!("{stem}_delete.csv"))
}
