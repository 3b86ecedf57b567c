use std::path::PathBuf;

use proptest::prelude::*;
use proptrace_engine::{write_trace, GeneratorConfig, Trace, TraceGenerator};
use proptrace_model::{ContractState, RuleRegistry, RuleSet, DEFAULT_ACCOUNTS};
use proptrace_spec::{extract_operations_from_path, parse_properties_from_path, Operation};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn erc20_setup() -> (Vec<Operation>, RuleSet) {
    let operations = extract_operations_from_path(fixture("erc20.sol")).unwrap();
    let properties = parse_properties_from_path(fixture("temporal_properties.txt")).unwrap();
    (operations, RuleRegistry::standard().resolve(&properties))
}

fn transfer_only() -> Vec<Operation> {
    vec![Operation::new("transfer", &["address", "address", "uint256"])]
}

/// Re-validate every record against the state right before it and apply it.
/// Returns the states observed after each step.
fn replay(trace: &Trace, rules: &RuleSet) -> Vec<ContractState> {
    let mut state = trace.initial_state.clone();
    let mut states = Vec::new();
    for record in trace.records() {
        if let Err(rejection) = rules.validate(&state, &record.call) {
            panic!("replayed {:?} was rejected: {rejection}", record.call);
        }
        state.update(&record.call);
        states.push(state.clone());
    }
    states
}

#[test]
fn fixture_contract_resolves_expected_rules() {
    let (operations, rules) = erc20_setup();
    let names: Vec<&str> = operations.iter().map(|op| op.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "totalSupply",
            "balanceOf",
            "transfer",
            "allowance",
            "approve",
            "transferFrom",
            "mint",
            "burn"
        ]
    );
    assert_eq!(
        rules.names(),
        vec![
            "allowance-bounds-transfer-from",
            "non-negative-balances",
            "supply-covers-balances"
        ]
    );
    assert_eq!(rules.unrecognized(), ["approve(o, s, v) → allowance(o, s) = v"]);
}

#[test]
fn zero_length_yields_no_blocks() {
    let (operations, rules) = erc20_setup();
    let cfg = GeneratorConfig::default().with_length(0).with_seed(1);
    let trace = TraceGenerator::from_config(operations, rules, cfg)
        .unwrap()
        .generate();
    assert!(trace.is_empty());
    assert_eq!(trace.render(), "");
}

#[test]
fn short_target_is_one_unpadded_block() {
    let (operations, rules) = erc20_setup();
    let cfg = GeneratorConfig::default().with_length(7).with_seed(2);
    let trace = TraceGenerator::from_config(operations, rules, cfg)
        .unwrap()
        .generate();
    assert_eq!(trace.blocks.len(), 1);
    assert_eq!(trace.blocks[0].len(), 7);
    assert!(trace.blocks[0].separated);
}

#[test]
fn transfer_only_trace_keeps_balances_valid() {
    let cfg = GeneratorConfig::default().with_length(5).with_seed(3);
    let state = ContractState::new(&DEFAULT_ACCOUNTS, 1_000_000).with_balance("0xA1", 1000);
    let mut generator = TraceGenerator::from_config(transfer_only(), RuleSet::empty(), cfg).unwrap();
    let trace = generator.generate_from(state);

    assert_eq!(trace.record_count(), 5);
    let mut running = trace.initial_state.clone();
    for record in trace.records() {
        assert!(record.call.is("transfer"));
        let sender = record.call.key_arg(0).unwrap();
        let value = record.call.int_arg(2).unwrap();
        let available = running.balance(&sender);
        assert!(value >= 1 && value <= available, "{value} from {available}");
        running.update(&record.call);
        assert!(running.balances.values().all(|b| *b >= 0));
    }
    assert_eq!(running.balances, trace.final_state.balances);
}

#[test]
fn unfunded_transfer_only_contract_exhausts_budget() {
    let cfg = GeneratorConfig::default().with_length(5).with_seed(4);
    let state = ContractState::new(&DEFAULT_ACCOUNTS, 1_000_000);
    let mut generator = TraceGenerator::from_config(transfer_only(), RuleSet::empty(), cfg).unwrap();
    let trace = generator.generate_from(state);

    assert!(trace.is_empty());
    assert!(trace.stats.budget_exhausted);
    assert_eq!(trace.stats.attempts, 500);
    assert_eq!(trace.stats.parameter_misses, 500);
}

#[test]
fn balance_property_holds_at_every_prefix() {
    let operations = vec![
        Operation::new("transfer", &["address", "address", "uint256"]),
        Operation::new("burn", &["address", "uint256"]),
        Operation::new("mint", &["address", "uint256"]),
    ];
    let rules = RuleRegistry::standard().resolve(&proptrace_spec::parse_properties(
        "□(balanceOf(a) >= 0)",
    ));
    let cfg = GeneratorConfig::default().with_length(400).with_seed(5);
    let trace = TraceGenerator::from_config(operations, rules.clone(), cfg)
        .unwrap()
        .generate();
    for state in replay(&trace, &rules) {
        assert!(state.balances.values().all(|b| *b >= 0));
    }
}

#[test]
fn rendered_lines_follow_the_trace_file_shape() {
    let (operations, rules) = erc20_setup();
    let cfg = GeneratorConfig::default().with_length(150).with_seed(6);
    let trace = TraceGenerator::from_config(operations, rules, cfg)
        .unwrap()
        .generate();

    let mut block = 0;
    let mut expected_step = 0;
    for line in trace.lines() {
        if let Some(rest) = line.strip_prefix("// Trace ") {
            block += 1;
            expected_step = 0;
            assert!(rest.starts_with(&format!("{block}: ")), "{line}");
        } else if line.is_empty() {
            continue;
        } else {
            let (head, step) = line.rsplit_once('@').unwrap();
            assert!(head.ends_with(')') && head.contains('('), "{line}");
            assert_eq!(step, format!("{expected_step};"));
            expected_step += 1;
        }
    }
    assert_eq!(block, trace.blocks.len());
}

#[test]
fn trace_file_round_trips_through_disk() {
    let (operations, rules) = erc20_setup();
    let cfg = GeneratorConfig::default().with_length(40).with_seed(7);
    let trace = TraceGenerator::from_config(operations, rules, cfg)
        .unwrap()
        .generate();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test_trace").join("erc20").join("example_traces.txt");
    write_trace(&path, &trace).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text, trace.render());
    assert!(text.ends_with(";\n\n"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn generated_traces_replay_cleanly(seed in any::<u64>(), length in 1usize..120) {
        let (operations, rules) = erc20_setup();
        let cfg = GeneratorConfig::default().with_length(length).with_seed(seed);
        let trace = TraceGenerator::from_config(operations, rules.clone(), cfg)
            .unwrap()
            .generate();
        prop_assert_eq!(trace.record_count(), length);
        for state in replay(&trace, &rules) {
            prop_assert!(state.total_balances() <= state.total_supply);
            prop_assert!(state.balances.values().all(|b| *b >= 0));
        }
    }

    #[test]
    fn block_timesteps_restart_at_zero(seed in any::<u64>()) {
        let (operations, rules) = erc20_setup();
        let cfg = GeneratorConfig::default().with_length(80).with_seed(seed);
        let trace = TraceGenerator::from_config(operations, rules, cfg)
            .unwrap()
            .generate();
        for block in &trace.blocks {
            prop_assert_eq!(block.records[0].timestep, 0);
            prop_assert_eq!(block.records.last().map(|r| r.timestep), Some(block.len() - 1));
        }
    }
}
