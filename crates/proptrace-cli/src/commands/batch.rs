// Command handler for: Batch
//
// One generation per `*.sol` contract. A contract without a property file
// is skipped; a contract that fails is recorded and the batch continues.

use std::path::{Path, PathBuf};

use miette::IntoDiagnostic;
use serde::Serialize;
use tracing::{info, warn};

use super::generate::generate_for_contract;
use super::helpers::{print_json, resolve_config, sha256_hex_file, write_json, REPORT_SCHEMA_VERSION};
use crate::{GenerationArgs, OutputFormat};

const PROPERTY_FILE: &str = "temporal_properties.txt";
const TRACE_FILE: &str = "example_traces.txt";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum EntryStatus {
    Generated,
    /// Fewer records than requested: the retry budget ran out.
    Partial,
    Skipped,
    Failed,
}

#[derive(Debug, Serialize)]
struct BatchEntry {
    name: String,
    contract: String,
    contract_sha256: Option<String>,
    properties: String,
    trace: String,
    status: EntryStatus,
    operations: usize,
    property_count: usize,
    records: usize,
    blocks: usize,
    active_rules: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Default, Serialize)]
struct BatchTotals {
    contracts: usize,
    generated: usize,
    partial: usize,
    skipped: usize,
    failed: usize,
    records: usize,
}

#[derive(Debug, Serialize)]
struct BatchReport {
    schema_version: u32,
    trace_length: usize,
    seed: Option<u64>,
    entries: Vec<BatchEntry>,
    totals: BatchTotals,
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// `*.sol` files directly inside `dir`, sorted by path.
fn list_contracts(dir: &Path) -> miette::Result<Vec<PathBuf>> {
    let mut contracts = Vec::new();
    for entry in std::fs::read_dir(dir).into_diagnostic()? {
        let path = entry.into_diagnostic()?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "sol") {
            contracts.push(path);
        }
    }
    contracts.sort();
    Ok(contracts)
}

pub(crate) fn run_batch_command(
    contracts_dir: PathBuf,
    benchmarks: PathBuf,
    out: PathBuf,
    report_out: Option<PathBuf>,
    generation: GenerationArgs,
    format: OutputFormat,
) -> miette::Result<()> {
    let base = resolve_config(&generation)?;
    if !contracts_dir.is_dir() {
        miette::bail!(
            "contracts directory {} does not exist",
            contracts_dir.display()
        );
    }
    let contracts = list_contracts(&contracts_dir)?;
    info!(count = contracts.len(), dir = %contracts_dir.display(), "batch started");

    let mut entries = Vec::with_capacity(contracts.len());
    let mut totals = BatchTotals::default();

    for (i, contract) in contracts.iter().enumerate() {
        let name = contract
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let properties = benchmarks.join(&name).join(PROPERTY_FILE);
        let trace_path = out.join(&name).join(TRACE_FILE);
        totals.contracts += 1;

        let mut entry = BatchEntry {
            name: name.clone(),
            contract: contract.display().to_string(),
            contract_sha256: sha256_hex_file(contract).ok(),
            properties: properties.display().to_string(),
            trace: trace_path.display().to_string(),
            status: EntryStatus::Skipped,
            operations: 0,
            property_count: 0,
            records: 0,
            blocks: 0,
            active_rules: Vec::new(),
            error: None,
        };

        if !properties.is_file() {
            warn!(contract = %name, properties = %properties.display(), "property file missing; skipping");
            totals.skipped += 1;
            entries.push(entry);
            continue;
        }

        info!(contract = %name, "processing");
        let mut config = base.clone();
        // Distinct but reproducible per-contract streams under a fixed seed.
        config.seed = base.seed.map(|s| s.wrapping_add(i as u64));
        let target = config.trace_length;

        match generate_for_contract(contract, Some(&properties), &trace_path, config) {
            Ok(run) => {
                entry.operations = run.operations;
                entry.property_count = run.properties;
                entry.records = run.trace.record_count();
                entry.blocks = run.trace.blocks.len();
                entry.active_rules = run.trace.active_rules.clone();
                entry.status = if entry.records < target {
                    totals.partial += 1;
                    EntryStatus::Partial
                } else {
                    totals.generated += 1;
                    EntryStatus::Generated
                };
                totals.records += entry.records;
                info!(contract = %name, records = entry.records, "generated");
            }
            Err(err) => {
                warn!(contract = %name, error = %err, "generation failed");
                entry.status = EntryStatus::Failed;
                entry.error = Some(err.to_string());
                totals.failed += 1;
            }
        }
        entries.push(entry);
    }

    let report = BatchReport {
        schema_version: REPORT_SCHEMA_VERSION,
        trace_length: base.trace_length,
        seed: base.seed,
        entries,
        totals,
    };

    if let Some(path) = &report_out {
        write_json(path, &report)?;
        info!(report = %path.display(), "batch report written");
    }

    match format {
        OutputFormat::Text => {
            for entry in &report.entries {
                match entry.status {
                    EntryStatus::Skipped => {
                        println!("{}: skipped (no {})", entry.name, entry.properties)
                    }
                    EntryStatus::Failed => println!(
                        "{}: failed: {}",
                        entry.name,
                        entry.error.as_deref().unwrap_or("unknown error")
                    ),
                    EntryStatus::Generated | EntryStatus::Partial => println!(
                        "{}: {} records in {} blocks -> {}",
                        entry.name, entry.records, entry.blocks, entry.trace
                    ),
                }
            }
            let t = &report.totals;
            println!(
                "{} contracts: {} generated, {} partial, {} skipped, {} failed ({} records)",
                t.contracts, t.generated, t.partial, t.skipped, t.failed, t.records
            );
        }
        OutputFormat::Json => print_json(&report)?,
    }

    if report.totals.failed > 0 {
        miette::bail!("{} contract(s) failed", report.totals.failed);
    }
    Ok(())
}
