// Command handler for: Inspect

use std::path::PathBuf;

use indexmap::IndexMap;
use miette::IntoDiagnostic;
use proptrace_replay::{read_trace_file, ParsedBlock};
use serde::Serialize;

use super::helpers::{print_json, REPORT_SCHEMA_VERSION};
use crate::OutputFormat;

#[derive(Debug, Serialize)]
struct BlockSummary {
    number: usize,
    label: String,
    records: usize,
    separated: bool,
    sequential_timesteps: bool,
    operations: IndexMap<String, usize>,
}

#[derive(Debug, Serialize)]
struct InspectReport {
    schema_version: u32,
    file: String,
    blocks: Vec<BlockSummary>,
    total_records: usize,
    operations: IndexMap<String, usize>,
}

fn summarize(block: &ParsedBlock) -> BlockSummary {
    BlockSummary {
        number: block.number,
        label: block.label.clone(),
        records: block.records.len(),
        separated: block.separated,
        sequential_timesteps: block.timesteps_are_sequential(),
        operations: block
            .operation_counts()
            .into_iter()
            .map(|(name, count)| (name.to_string(), count))
            .collect(),
    }
}

pub(crate) fn run_inspect_command(trace: PathBuf, format: OutputFormat) -> miette::Result<()> {
    let text = std::fs::read_to_string(&trace).into_diagnostic()?;
    let blocks = read_trace_file(&trace.display().to_string(), &text).map_err(miette::Report::new)?;

    let summaries: Vec<BlockSummary> = blocks.iter().map(summarize).collect();
    let mut operations: IndexMap<String, usize> = IndexMap::new();
    for summary in &summaries {
        for (name, count) in &summary.operations {
            *operations.entry(name.clone()).or_insert(0) += count;
        }
    }
    let report = InspectReport {
        schema_version: REPORT_SCHEMA_VERSION,
        file: trace.display().to_string(),
        total_records: summaries.iter().map(|s| s.records).sum(),
        blocks: summaries,
        operations,
    };

    match format {
        OutputFormat::Text => {
            for block in &report.blocks {
                let ops: Vec<String> = block
                    .operations
                    .iter()
                    .map(|(name, count)| format!("{name} x{count}"))
                    .collect();
                println!(
                    "Trace {}: {} records ({})",
                    block.number,
                    block.records,
                    ops.join(", ")
                );
                if !block.sequential_timesteps {
                    println!("  warning: timesteps are not 0..{}", block.records);
                }
            }
            println!(
                "{} blocks, {} records, {} operation kinds",
                report.blocks.len(),
                report.total_records,
                report.operations.len()
            );
        }
        OutputFormat::Json => print_json(&report)?,
    }
    Ok(())
}
