//! The guided random search loop.
//!
//! Each iteration picks an operation (forcing kinds missing from the
//! current block first, weighted choice otherwise), synthesizes arguments,
//! validates the call against the live state and, on acceptance, applies
//! it and records it. Consecutive misses are bounded by the retry budget;
//! running out ends the search early with whatever was emitted.

use std::collections::{BTreeSet, VecDeque};

use proptrace_model::{Call, ContractState, RuleSet};
use proptrace_spec::Operation;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::GeneratorConfig;
use crate::errors::GenerateError;
use crate::patterns::{BusinessPattern, PatternLibrary};
use crate::synth::synthesize;
use crate::trace::{GenerationStats, Trace, TraceBlock, TraceRecord};

/// Operations that get the configured transfer weight.
const TRANSFER_LIKE: [&str; 2] = ["transfer", "transferFrom"];

pub struct TraceGenerator<R: Rng = StdRng> {
    operations: Vec<Operation>,
    rules: RuleSet,
    patterns: PatternLibrary,
    config: GeneratorConfig,
    rng: R,
}

impl TraceGenerator<StdRng> {
    /// Generator driven by the config's own random source.
    pub fn from_config(
        operations: Vec<Operation>,
        rules: RuleSet,
        config: GeneratorConfig,
    ) -> Result<Self, GenerateError> {
        config.validate()?;
        let rng = config.rng();
        Ok(Self::new(operations, rules, config, rng))
    }
}

impl<R: Rng> TraceGenerator<R> {
    pub fn new(operations: Vec<Operation>, rules: RuleSet, config: GeneratorConfig, rng: R) -> Self {
        Self {
            operations,
            rules,
            patterns: PatternLibrary::standard(),
            config,
            rng,
        }
    }

    pub fn with_patterns(mut self, patterns: PatternLibrary) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Fresh state with a random starting balance for every account.
    pub fn seed_state(&mut self) -> ContractState {
        ContractState::seeded(
            &self.config.accounts,
            self.config.initial_supply,
            self.config.balance_range(),
            &mut self.rng,
        )
    }

    /// Seed a state and run one generation.
    pub fn generate(&mut self) -> Trace {
        let state = self.seed_state();
        self.generate_from(state)
    }

    /// Run one generation starting from `state`.
    pub fn generate_from(&mut self, state: ContractState) -> Trace {
        let mut trace = Trace::empty(state.snapshot());
        trace.active_rules = self.rules.names().iter().map(|n| n.to_string()).collect();
        trace.unrecognized_properties = self.rules.unrecognized().to_vec();

        let target = self.config.trace_length;
        if target == 0 {
            return trace;
        }
        if self.operations.is_empty() {
            warn!("no operations to generate from; returning an empty trace");
            return trace;
        }

        info!(
            operations = self.operations.len(),
            target,
            rules = trace.active_rules.len(),
            "generating trace"
        );

        let patterns = self.patterns.applicable(&self.operations);
        let mut run = Run {
            state,
            target,
            budget: self.config.retry_budget(),
            window: self.config.recent_window,
            pattern_probability: clamp_probability(self.config.pattern_probability),
            blocks: Vec::new(),
            emitted: 0,
            current: Vec::new(),
            timestep: 0,
            block_size: 0,
            deferred: BTreeSet::new(),
            recent: VecDeque::new(),
            failures: 0,
            stats: GenerationStats::default(),
        };
        run.block_size = self.draw_block_size();

        while run.emitted < run.target {
            if run.failures >= run.budget {
                run.stats.budget_exhausted = true;
                warn!(
                    failures = run.failures,
                    emitted = run.emitted + run.current.len(),
                    target,
                    "retry budget exhausted; stopping early"
                );
                break;
            }

            let (idx, forced) = self.select(&run);
            let operation = &self.operations[idx];
            run.stats.attempts += 1;

            let Some(args) = synthesize(operation, &run.state, &mut self.rng) else {
                run.stats.parameter_misses += 1;
                run.miss(operation, forced);
                continue;
            };
            let call = Call::new(operation.name.clone(), args);
            if let Err(rejection) = self.rules.validate(&run.state, &call) {
                run.stats.record_rejection(rejection.label());
                run.miss(operation, forced);
                continue;
            }

            run.accept(call, true);
            run.failures = 0;

            if !patterns.is_empty()
                && run.has_headroom()
                && self.rng.gen_bool(run.pattern_probability)
            {
                if let Some(pattern) = patterns.choose(&mut self.rng) {
                    self.inject(&mut run, pattern);
                }
            }

            if run.current.len() >= run.block_size || run.emitted + run.current.len() >= target {
                run.close_block(true);
                run.block_size = self.draw_block_size();
            }
        }

        if !run.current.is_empty() {
            run.close_block(false);
        }

        info!(
            records = run.emitted,
            blocks = run.blocks.len(),
            attempts = run.stats.attempts,
            rejections = run.stats.total_rejections(),
            "trace generated"
        );

        trace.final_state = run.state;
        trace.blocks = run.blocks;
        trace.stats = run.stats;
        trace
    }

    /// Pick the next operation. The flag is set when the pick was forced
    /// because the operation has not yet appeared in the current block.
    fn select(&mut self, run: &Run) -> (usize, bool) {
        let present: BTreeSet<&str> = run
            .current
            .iter()
            .map(|r| r.call.operation.as_str())
            .collect();
        let missing: Vec<usize> = self
            .operations
            .iter()
            .enumerate()
            .filter(|(_, op)| {
                !present.contains(op.name.as_str()) && !run.deferred.contains(&op.name)
            })
            .map(|(i, _)| i)
            .collect();
        if let Some(&idx) = missing.choose(&mut self.rng) {
            return (idx, true);
        }

        let weights = selection_weights(&self.operations, &run.recent, self.config.transfer_weight);
        match WeightedIndex::new(&weights) {
            Ok(dist) => (dist.sample(&mut self.rng), false),
            Err(_) => (self.rng.gen_range(0..self.operations.len()), false),
        }
    }

    /// Splice in every step of the pattern that validates, in order, while
    /// headroom remains. A rejected step is skipped.
    fn inject(&mut self, run: &mut Run, pattern: &BusinessPattern) {
        let mut spliced = 0;
        for step in &pattern.steps {
            if !run.has_headroom() {
                break;
            }
            let Some(call) = step.instantiate(&self.config.accounts, &mut self.rng) else {
                continue;
            };
            if let Err(rejection) = self.rules.validate(&run.state, &call) {
                debug!(
                    pattern = %pattern.name,
                    step = %step.operation,
                    reason = %rejection,
                    "pattern step rejected"
                );
                continue;
            }
            run.accept(call, false);
            spliced += 1;
        }
        if spliced > 0 {
            run.stats.patterns_injected += 1;
            run.stats.pattern_records += spliced;
            debug!(pattern = %pattern.name, steps = spliced, "pattern injected");
        }
    }

    fn draw_block_size(&mut self) -> usize {
        let lo = self.config.block_size_min.max(1);
        let hi = self.config.block_size_max.max(lo);
        self.rng.gen_range(lo..=hi)
    }
}

/// Mutable bookkeeping of one run.
struct Run {
    state: ContractState,
    target: usize,
    budget: usize,
    window: usize,
    pattern_probability: f64,
    blocks: Vec<TraceBlock>,
    /// Records in closed blocks.
    emitted: usize,
    current: Vec<TraceRecord>,
    timestep: usize,
    block_size: usize,
    /// Operations whose forced attempt failed in this block.
    deferred: BTreeSet<String>,
    recent: VecDeque<String>,
    failures: usize,
    stats: GenerationStats,
}

impl Run {
    fn has_headroom(&self) -> bool {
        self.emitted + self.current.len() < self.target
    }

    fn miss(&mut self, operation: &Operation, forced: bool) {
        self.failures += 1;
        if forced {
            self.deferred.insert(operation.name.clone());
        }
    }

    /// Apply a validated call and append it to the current block. Only
    /// selected calls enter the recent window.
    fn accept(&mut self, call: Call, selected: bool) {
        self.state.update(&call);
        if selected && self.window > 0 {
            self.recent.push_back(call.operation.clone());
            while self.recent.len() > self.window {
                self.recent.pop_front();
            }
        }
        self.current.push(TraceRecord {
            call,
            timestep: self.timestep,
        });
        self.timestep += 1;
        self.stats.accepted += 1;
    }

    fn close_block(&mut self, separated: bool) {
        let records = std::mem::take(&mut self.current);
        self.emitted += records.len();
        let block = TraceBlock {
            index: self.blocks.len() + 1,
            records,
            separated,
        };
        debug!(block = block.index, records = block.len(), label = %block.label(), "block closed");
        self.blocks.push(block);
        self.timestep = 0;
        self.deferred.clear();
    }
}

/// Selection weight per operation: the transfer weight for transfer-like
/// operations, 1 otherwise, less each occurrence in the recent window,
/// never below 1.
pub(crate) fn selection_weights(
    operations: &[Operation],
    recent: &VecDeque<String>,
    transfer_weight: u32,
) -> Vec<u32> {
    operations
        .iter()
        .map(|op| {
            let base = if TRANSFER_LIKE.contains(&op.name.as_str()) {
                transfer_weight
            } else {
                1
            };
            let seen = recent.iter().filter(|n| **n == op.name).count();
            let seen = u32::try_from(seen).unwrap_or(u32::MAX);
            base.saturating_sub(seen).max(1)
        })
        .collect()
}

fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptrace_model::RuleRegistry;
    use proptrace_spec::parse_properties;
    use rand::SeedableRng;

    fn config(length: usize) -> GeneratorConfig {
        GeneratorConfig::default().with_length(length).with_seed(42)
    }

    fn erc20() -> Vec<Operation> {
        vec![
            Operation::new("transfer", &["address", "uint256"]),
            Operation::new("approve", &["address", "uint256"]),
            Operation::new("transferFrom", &["address", "address", "uint256"]),
            Operation::new("balanceOf", &["address"]),
            Operation::new("mint", &["address", "uint256"]),
            Operation::new("burn", &["uint256"]),
        ]
    }

    #[test]
    fn same_seed_same_trace() {
        let rules = RuleRegistry::standard().resolve(&parse_properties("□(balanceOf(a) >= 0)"));
        let a = TraceGenerator::from_config(erc20(), rules.clone(), config(120))
            .unwrap()
            .generate();
        let b = TraceGenerator::from_config(erc20(), rules, config(120))
            .unwrap()
            .generate();
        assert_eq!(a.render(), b.render());
        assert_eq!(a.record_count(), 120);
    }

    #[test]
    fn blocks_are_bounded_and_timesteps_restart() {
        let trace = TraceGenerator::from_config(erc20(), RuleSet::empty(), config(300))
            .unwrap()
            .generate();
        let (last, closed) = trace.blocks.split_last().unwrap();
        for block in closed {
            assert!(block.separated);
            assert!(block.len() >= 10, "block {} has {}", block.index, block.len());
            // A pattern spliced at the size boundary may overshoot by its length.
            assert!(block.len() <= 20 + 3, "block {} has {}", block.index, block.len());
        }
        assert!(last.separated);
        for block in &trace.blocks {
            let steps: Vec<usize> = block.records.iter().map(|r| r.timestep).collect();
            assert_eq!(steps, (0..block.len()).collect::<Vec<_>>());
        }
    }

    #[test]
    fn every_operation_is_tried_per_block() {
        let ops = vec![
            Operation::new("transfer", &["address", "uint256"]),
            Operation::bare("totalSupply"),
            Operation::new("balanceOf", &["address"]),
        ];
        let trace = TraceGenerator::from_config(ops, RuleSet::empty(), config(60))
            .unwrap()
            .with_patterns(PatternLibrary::empty())
            .generate();
        for block in trace.blocks.iter().filter(|b| b.len() >= 3) {
            let mut kinds = block.distinct_operations();
            kinds.sort_unstable();
            assert_eq!(kinds, vec!["balanceOf", "totalSupply", "transfer"]);
        }
    }

    #[test]
    fn unsatisfiable_forced_operation_does_not_stall() {
        let ops = vec![
            Operation::new("transferFrom", &["address", "address", "uint256"]),
            Operation::bare("totalSupply"),
        ];
        let trace = TraceGenerator::from_config(ops, RuleSet::empty(), config(25))
            .unwrap()
            .with_patterns(PatternLibrary::empty())
            .generate();
        assert_eq!(trace.record_count(), 25);
        assert!(trace.records().all(|r| r.call.is("totalSupply")));
        assert!(trace.stats.parameter_misses > 0);
        assert!(!trace.stats.budget_exhausted);
    }

    #[test]
    fn patterns_respect_headroom() {
        let cfg = config(7).with_pattern_probability(1.0);
        let trace = TraceGenerator::from_config(erc20(), RuleSet::empty(), cfg)
            .unwrap()
            .generate();
        assert_eq!(trace.record_count(), 7);
        assert!(trace.stats.patterns_injected > 0);
    }

    #[test]
    fn injectable_rng_drives_generation() {
        let cfg = GeneratorConfig::default().with_length(30);
        let mut generator = TraceGenerator::new(
            erc20(),
            RuleSet::empty(),
            cfg,
            rand::rngs::StdRng::seed_from_u64(9),
        );
        let state = ContractState::new(&["0xA1", "0xB2"], 1_000_000).with_balance("0xA1", 500);
        let trace = generator.generate_from(state.clone());
        assert_eq!(trace.initial_state, state);
        assert_eq!(trace.record_count(), 30);
    }

    #[test]
    fn rejected_pattern_step_is_skipped_not_fatal() {
        use crate::patterns::{ArgTemplate, PatternStep};

        let ops = vec![
            Operation::new("transfer", &["address", "uint256"]),
            Operation::bare("totalSupply"),
        ];
        let mut library = PatternLibrary::empty();
        library.push(BusinessPattern::new(
            "zero-transfer-then-supply",
            vec![
                PatternStep::new(
                    "transfer",
                    vec![ArgTemplate::AnyAccount, ArgTemplate::AnyAccount, ArgTemplate::Amount(0)],
                ),
                PatternStep::new("totalSupply", vec![]),
            ],
        ));
        let cfg = config(200).with_pattern_probability(1.0);
        let trace = TraceGenerator::from_config(ops, RuleSet::empty(), cfg)
            .unwrap()
            .with_patterns(library)
            .generate();
        assert_eq!(trace.record_count(), 200);
        assert!(trace.stats.patterns_injected > 0);
        assert_eq!(trace.stats.pattern_records, trace.stats.patterns_injected);
        assert!(trace
            .records()
            .all(|r| !(r.call.is("transfer") && r.call.int_arg(2) == Some(0))));
    }

    #[test]
    fn weights_favor_transfers_and_decay_with_recency() {
        let ops = vec![
            Operation::bare("transfer"),
            Operation::bare("transferFrom"),
            Operation::bare("approve"),
        ];
        fn window(names: &[&str]) -> VecDeque<String> {
            names.iter().map(|n| n.to_string()).collect()
        }

        assert_eq!(selection_weights(&ops, &window(&[]), 5), vec![5, 5, 1]);
        assert_eq!(
            selection_weights(&ops, &window(&["transfer", "approve", "transfer"]), 5),
            vec![3, 5, 1]
        );
        let flooded = window(&["transfer"; 10]);
        assert_eq!(selection_weights(&ops, &flooded, 5), vec![1, 5, 1]);
        assert_eq!(selection_weights(&ops, &window(&[]), 0), vec![1, 1, 1]);
    }

    #[test]
    fn nan_probability_disables_patterns() {
        assert_eq!(clamp_probability(f64::NAN), 0.0);
        assert_eq!(clamp_probability(2.0), 1.0);
        assert_eq!(clamp_probability(-1.0), 0.0);
    }
}
