//! Merge per-strategy candidate files into one combined universe.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::model::Candidate;

use super::sort_by_gross_desc;

/// Concatenate candidate arrays, best gross edge first. Missing inputs are
/// skipped; structurally invalid ones terminate.
pub fn merge_files(inputs: &[PathBuf]) -> Result<Vec<Candidate>> {
    let mut merged: Vec<Candidate> = Vec::new();
    for path in inputs {
        if !path.exists() {
            continue;
        }
        let candidates: Vec<Candidate> = crate::io::read_json_array(path)?;
        merged.extend(candidates);
    }
    sort_by_gross_desc(&mut merged);
    Ok(merged)
}

pub fn run(inputs: &[PathBuf], output: &Path) -> Result<()> {
    let merged = merge_files(inputs)?;
    crate::io::write_json_pretty(output, &merged)?;

    println!("Merged files: {}", inputs.len());
    println!("Total candidates: {}", merged.len());
    println!("Wrote: {}", output.display());
    Ok(())
}
