// Command handler for: Generate

use std::path::{Path, PathBuf};

use miette::IntoDiagnostic;
use proptrace_engine::{write_trace, GenerationStats, GeneratorConfig, Trace, TraceGenerator};
use proptrace_model::{RuleRegistry, RuleSet};
use proptrace_replay::{replay, Violation};
use proptrace_spec::{extract_operations_from_path, parse_properties_from_path, PropertySet};
use serde::Serialize;
use tracing::{info, warn};

use super::helpers::{print_json, resolve_config, REPORT_SCHEMA_VERSION};
use crate::{GenerationArgs, OutputFormat};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Everything one contract's generation produced.
pub(crate) struct ContractRun {
    pub(crate) operations: usize,
    pub(crate) properties: usize,
    pub(crate) rules: RuleSet,
    pub(crate) trace: Trace,
}

#[derive(Debug, Serialize)]
struct GenerateReport {
    schema_version: u32,
    contract: String,
    properties: Option<String>,
    output: String,
    operations: usize,
    records: usize,
    blocks: usize,
    active_rules: Vec<String>,
    unrecognized_properties: Vec<String>,
    stats: GenerationStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    violations: Option<Vec<Violation>>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Extract, parse, resolve rules, generate and write one trace.
pub(crate) fn generate_for_contract(
    contract: &Path,
    properties: Option<&Path>,
    out: &Path,
    config: GeneratorConfig,
) -> miette::Result<ContractRun> {
    let operations = extract_operations_from_path(contract).into_diagnostic()?;
    if operations.is_empty() {
        miette::bail!(
            "no public or external functions found in {}",
            contract.display()
        );
    }
    let property_set = match properties {
        Some(path) => parse_properties_from_path(path).into_diagnostic()?,
        None => PropertySet::default(),
    };
    let rules = RuleRegistry::standard().resolve(&property_set);
    for property in rules.unrecognized() {
        warn!(property = %property, "no rule recognizes property; treating it as satisfied");
    }

    let operation_count = operations.len();
    let mut generator =
        TraceGenerator::from_config(operations, rules.clone(), config).into_diagnostic()?;
    let trace = generator.generate();
    write_trace(out, &trace).into_diagnostic()?;
    info!(
        records = trace.record_count(),
        blocks = trace.blocks.len(),
        out = %out.display(),
        "trace written"
    );

    Ok(ContractRun {
        operations: operation_count,
        properties: property_set.len(),
        rules,
        trace,
    })
}

pub(crate) fn run_generate_command(
    contract: PathBuf,
    properties: Option<PathBuf>,
    out: PathBuf,
    check: bool,
    generation: GenerationArgs,
    format: OutputFormat,
) -> miette::Result<()> {
    let config = resolve_config(&generation)?;
    let run = generate_for_contract(&contract, properties.as_deref(), &out, config)?;

    let violations = if check {
        let report = replay(&run.trace, &run.rules);
        Some(report.violations)
    } else {
        None
    };

    match format {
        OutputFormat::Text => {
            println!(
                "Generated {} records in {} blocks from {} operations, saved to {}",
                run.trace.record_count(),
                run.trace.blocks.len(),
                run.operations,
                out.display()
            );
            if !run.trace.active_rules.is_empty() {
                println!("Active rules: {}", run.trace.active_rules.join(", "));
            }
            if run.trace.stats.budget_exhausted {
                println!("Retry budget exhausted before reaching the target length");
            }
            if let Some(violations) = &violations {
                for v in violations {
                    println!(
                        "  violation [{}] trace {} record {} ({}): {}",
                        v.kind, v.block, v.index, v.operation, v.message
                    );
                }
                if violations.is_empty() {
                    println!("Replay check passed");
                }
            }
        }
        OutputFormat::Json => {
            print_json(&GenerateReport {
                schema_version: REPORT_SCHEMA_VERSION,
                contract: contract.display().to_string(),
                properties: properties.as_ref().map(|p| p.display().to_string()),
                output: out.display().to_string(),
                operations: run.operations,
                records: run.trace.record_count(),
                blocks: run.trace.blocks.len(),
                active_rules: run.trace.active_rules.clone(),
                unrecognized_properties: run.trace.unrecognized_properties.clone(),
                stats: run.trace.stats.clone(),
                violations: violations.clone(),
            })?;
        }
    }

    if let Some(violations) = violations {
        if !violations.is_empty() {
            miette::bail!("replay found {} violation(s)", violations.len());
        }
    }
    Ok(())
}
