use std::collections::BTreeMap;
use std::path::Path;

use proptrace_model::{Call, ContractState};
use serde::{Deserialize, Serialize};

use crate::errors::GenerateError;
use crate::format::format_record;

/// Distinct-operation count above which a block label stops listing names.
const LABEL_LIST_LIMIT: usize = 3;

/// One accepted call and its position inside its block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub call: Call,
    pub timestep: usize,
}

impl TraceRecord {
    pub fn line(&self) -> String {
        format_record(&self.call, self.timestep)
    }
}

/// A labelled run of records with timesteps restarting at 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceBlock {
    /// 1-based block number, as shown in the label.
    pub index: usize,
    pub records: Vec<TraceRecord>,
    /// Whether a blank separator line follows the block.
    pub separated: bool,
}

impl TraceBlock {
    /// Operation names in first-occurrence order.
    pub fn distinct_operations(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for record in &self.records {
            let name = record.call.operation.as_str();
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
        seen
    }

    pub fn label(&self) -> String {
        let distinct = self.distinct_operations();
        let summary = if distinct.len() <= LABEL_LIST_LIMIT {
            distinct.join(", ")
        } else {
            format!("{} different operations", distinct.len())
        };
        format!("// Trace {}: {summary}", self.index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Counters describing how a run went.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationStats {
    /// Every selection that reached synthesis, accepted or not.
    pub attempts: u64,
    pub accepted: u64,
    /// Records contributed by pattern steps (included in `accepted`).
    pub pattern_records: u64,
    pub patterns_injected: u64,
    /// Attempts where no argument list fit the state.
    pub parameter_misses: u64,
    /// Rejections by label.
    pub rejections: BTreeMap<String, u64>,
    pub budget_exhausted: bool,
}

impl GenerationStats {
    pub fn record_rejection(&mut self, label: &str) {
        *self.rejections.entry(label.to_string()).or_insert(0) += 1;
    }

    pub fn total_rejections(&self) -> u64 {
        self.rejections.values().sum()
    }
}

/// Result of one generation run.
///
/// `initial_state` is the state the first record was validated against,
/// so replaying `blocks` from it reproduces `final_state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    pub initial_state: ContractState,
    pub final_state: ContractState,
    pub active_rules: Vec<String>,
    pub unrecognized_properties: Vec<String>,
    pub blocks: Vec<TraceBlock>,
    pub stats: GenerationStats,
}

impl Trace {
    /// A run that emitted nothing.
    pub fn empty(state: ContractState) -> Self {
        Self {
            initial_state: state.clone(),
            final_state: state,
            active_rules: Vec::new(),
            unrecognized_properties: Vec::new(),
            blocks: Vec::new(),
            stats: GenerationStats::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn record_count(&self) -> usize {
        self.blocks.iter().map(TraceBlock::len).sum()
    }

    pub fn records(&self) -> impl Iterator<Item = &TraceRecord> {
        self.blocks.iter().flat_map(|b| b.records.iter())
    }

    /// Output lines: label, records, then a blank line for separated blocks.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.record_count() + 2 * self.blocks.len());
        for block in &self.blocks {
            lines.push(block.label());
            lines.extend(block.records.iter().map(TraceRecord::line));
            if block.separated {
                lines.push(String::new());
            }
        }
        lines
    }

    /// The trace file text, one `\n`-terminated line per entry.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in self.lines() {
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}

/// Write `trace` to `path`, creating parent directories.
pub fn write_trace(path: impl AsRef<Path>, trace: &Trace) -> Result<(), GenerateError> {
    let path = path.as_ref();
    let write_err = |source| GenerateError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    std::fs::write(path, trace.render()).map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptrace_model::DEFAULT_ACCOUNTS;

    fn record(op: &str, args: &[&str], timestep: usize) -> TraceRecord {
        TraceRecord {
            call: Call::new(op, args.iter().map(|a| a.parse().unwrap()).collect()),
            timestep,
        }
    }

    fn block(index: usize, ops: &[&str], separated: bool) -> TraceBlock {
        TraceBlock {
            index,
            records: ops
                .iter()
                .enumerate()
                .map(|(t, op)| record(op, &[], t))
                .collect(),
            separated,
        }
    }

    fn trace(blocks: Vec<TraceBlock>) -> Trace {
        Trace {
            blocks,
            ..Trace::empty(ContractState::new(&DEFAULT_ACCOUNTS, 0))
        }
    }

    #[test]
    fn labels_list_up_to_three_kinds_in_first_seen_order() {
        let b = block(2, &["mint", "burn", "mint", "approve"], true);
        assert_eq!(b.label(), "// Trace 2: mint, burn, approve");
        let wide = block(1, &["a", "b", "c", "d", "a"], true);
        assert_eq!(wide.label(), "// Trace 1: 4 different operations");
    }

    #[test]
    fn render_separates_closed_blocks_only() {
        let t = trace(vec![
            TraceBlock {
                index: 1,
                records: vec![record("transfer", &["0xA1", "0xB2", "5"], 0)],
                separated: true,
            },
            TraceBlock {
                index: 2,
                records: vec![record("totalSupply", &[], 0)],
                separated: false,
            },
        ]);
        assert_eq!(
            t.render(),
            "// Trace 1: transfer\ntransfer(from=0xA1, to=0xB2, value=5)@0;\n\n\
             // Trace 2: totalSupply\ntotalSupply()@0;\n"
        );
        assert_eq!(t.record_count(), 2);
    }

    #[test]
    fn empty_trace_renders_nothing() {
        let t = trace(Vec::new());
        assert!(t.is_empty());
        assert_eq!(t.render(), "");
    }

    #[test]
    fn write_trace_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_trace/erc20/example_traces.txt");
        let t = trace(vec![block(1, &["totalSupply"], true)]);
        write_trace(&path, &t).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "// Trace 1: totalSupply\ntotalSupply()@0;\n\n");
    }

    #[test]
    fn rejection_counts_accumulate_by_label() {
        let mut stats = GenerationStats::default();
        stats.record_rejection("self_transfer");
        stats.record_rejection("self_transfer");
        stats.record_rejection("vote-once");
        assert_eq!(stats.rejections["self_transfer"], 2);
        assert_eq!(stats.total_rejections(), 3);
    }
}
