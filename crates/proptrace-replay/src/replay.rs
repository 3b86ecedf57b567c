use std::collections::BTreeMap;
use std::fmt;

use proptrace_engine::Trace;
use proptrace_model::{ContractState, RuleSet};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Basic or property validation rejected the record.
    Rejected,
    SupplyExceeded,
    NegativeBalance,
    RepeatedWithdrawal,
    RepeatedVote,
    /// Replaying every record did not reproduce the recorded final state.
    FinalStateMismatch,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::Rejected => "rejected",
            ViolationKind::SupplyExceeded => "supply_exceeded",
            ViolationKind::NegativeBalance => "negative_balance",
            ViolationKind::RepeatedWithdrawal => "repeated_withdrawal",
            ViolationKind::RepeatedVote => "repeated_vote",
            ViolationKind::FinalStateMismatch => "final_state_mismatch",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finding at a given record. `block` is the 1-based block number and
/// `index` the record's position inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub block: usize,
    pub index: usize,
    pub operation: String,
    pub kind: ViolationKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub records: usize,
    pub violations: Vec<Violation>,
    #[serde(skip)]
    pub final_state: ContractState,
}

impl ReplayReport {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn count(&self, kind: ViolationKind) -> usize {
        self.violations.iter().filter(|v| v.kind == kind).count()
    }
}

/// Replay `trace` from its initial state under `rules`.
///
/// Every record is validated against the state right before it, then
/// applied regardless of the outcome so later findings stay meaningful.
/// After each step the invariants of the active rules are checked over the
/// whole state; a breach is reported on the record that caused it, not on
/// every record that follows.
pub fn replay(trace: &Trace, rules: &RuleSet) -> ReplayReport {
    let mut state = trace.initial_state.clone();
    let mut violations = Vec::new();
    let mut votes_cast: BTreeMap<String, u32> = BTreeMap::new();
    let mut records = 0;

    let supply_active = rules.is_active("supply-covers-balances");
    let non_negative_active = rules.is_active("non-negative-balances");
    let withdraw_active = rules.is_active("withdraw-once");
    let vote_active = rules.is_active("vote-once");

    for block in &trace.blocks {
        for (index, record) in block.records.iter().enumerate() {
            records += 1;
            let call = &record.call;
            let mut report = |kind: ViolationKind, message: String| {
                violations.push(Violation {
                    block: block.index,
                    index,
                    operation: call.operation.clone(),
                    kind,
                    message,
                });
            };

            if let Err(rejection) = rules.validate(&state, call) {
                report(ViolationKind::Rejected, rejection.to_string());
            }
            let before = state.clone();
            state.update(call);

            // Only a record that opens or worsens a breach is blamed for it.
            let excess = |s: &ContractState| s.total_balances().saturating_sub(s.total_supply).max(0);
            if supply_active && excess(&state) > excess(&before) {
                report(
                    ViolationKind::SupplyExceeded,
                    format!(
                        "balances sum to {} but supply is {}",
                        state.total_balances(),
                        state.total_supply
                    ),
                );
            }
            if non_negative_active {
                for (account, balance) in state
                    .balances
                    .iter()
                    .filter(|(a, b)| **b < 0 && **b < before.balance(a))
                {
                    report(
                        ViolationKind::NegativeBalance,
                        format!("{account} holds {balance}"),
                    );
                }
            }
            if withdraw_active {
                for (account, count) in state
                    .withdraw_counts
                    .iter()
                    .filter(|(a, c)| **c > 1 && **c > before.withdraw_count(a))
                {
                    report(
                        ViolationKind::RepeatedWithdrawal,
                        format!("{account} withdrew {count} times"),
                    );
                }
            }
            if call.is("vote") {
                if let Some(voter) = call.key_arg(0) {
                    let cast = votes_cast.entry(voter.clone()).or_insert(0);
                    *cast += 1;
                    if vote_active && *cast > 1 {
                        report(
                            ViolationKind::RepeatedVote,
                            format!("{voter} voted {cast} times"),
                        );
                    }
                }
            }
        }
    }

    if !trace.is_empty() && !same_ledger(&state, &trace.final_state) {
        let (block, index, operation) = trace
            .blocks
            .last()
            .and_then(|b| b.records.last().map(|r| (b.index, b.len() - 1, r.call.operation.clone())))
            .unwrap_or_default();
        violations.push(Violation {
            block,
            index,
            operation,
            kind: ViolationKind::FinalStateMismatch,
            message: "replayed ledger differs from the recorded final state".into(),
        });
    }

    debug!(records, violations = violations.len(), "trace replayed");
    ReplayReport {
        records,
        violations,
        final_state: state,
    }
}

fn same_ledger(a: &ContractState, b: &ContractState) -> bool {
    a.balances == b.balances
        && a.allowances == b.allowances
        && a.total_supply == b.total_supply
        && a.withdraw_counts == b.withdraw_counts
        && a.votes == b.votes
        && a.highest_bid == b.highest_bid
}
