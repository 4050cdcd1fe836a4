//! Print the JSON schema of a persisted file format.

use anyhow::{Result, bail};
use schemars::schema_for;

pub fn run(kind: &str) -> Result<()> {
    let schema = match kind {
        "candidate" => schema_for!(crate::model::Candidate),
        "shortlist" => schema_for!(crate::scan::score::ScoredOpportunity),
        "summary" => schema_for!(crate::scan::summary::ScanSummary),
        "fee-table" => schema_for!(crate::overlay::fee_table::FeeTableFile),
        "constraints" => schema_for!(crate::overlay::constraints::ConstraintFile),
        "network-friction" => schema_for!(crate::friction::NetworkFrictionFile),
        other => bail!(
            "Unknown schema kind `{other}`. Valid kinds: candidate, shortlist, summary, \
             fee-table, constraints, network-friction"
        ),
    };
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
