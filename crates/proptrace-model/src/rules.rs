//! Property rule registry.
//!
//! Properties are not evaluated as logic. Each [`PropertyRule`] pairs a
//! detector over the raw property text with a checker over a proposed
//! transition. A property that no detector recognizes is kept on record as
//! unrecognized and otherwise ignored, so unknown vocabulary never blocks
//! generation.

use std::fmt;

use proptrace_spec::PropertySet;
use tracing::debug;

use crate::args::Call;
use crate::state::ContractState;
use crate::validation::{basic_validation, Rejection};

/// Which property bucket a rule is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleScope {
    Invariant,
    Safety,
}

/// A proposed call together with the state before and after it.
pub struct Transition<'a> {
    pub before: &'a ContractState,
    pub after: &'a ContractState,
    pub call: &'a Call,
}

/// A named detector/checker pair.
#[derive(Clone, Copy)]
pub struct PropertyRule {
    pub name: &'static str,
    pub scope: RuleScope,
    /// Does this property text ask for the rule?
    pub detect: fn(&str) -> bool,
    /// Does the transition satisfy the rule?
    pub check: fn(&Transition<'_>) -> bool,
}

impl fmt::Debug for PropertyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyRule")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// An active rule and the property text that activated it.
#[derive(Debug, Clone)]
pub struct RuleBinding {
    pub rule: PropertyRule,
    pub property: String,
}

/// Library of known rules.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: Vec<PropertyRule>,
}

impl RuleRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in rule library.
    pub fn standard() -> Self {
        Self {
            rules: vec![
                SUPPLY_COVERS_BALANCES,
                NON_NEGATIVE_BALANCES,
                ALLOWANCE_BOUNDS_TRANSFER_FROM,
                WITHDRAW_ONCE,
                VOTE_ONCE,
                BID_EXCEEDS_HIGHEST,
            ],
        }
    }

    pub fn register(&mut self, rule: PropertyRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[PropertyRule] {
        &self.rules
    }

    pub fn get(&self, name: &str) -> Option<&PropertyRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// Activate every rule whose detector fires on a property of its scope.
    ///
    /// Each rule is bound at most once, to the first property that asked
    /// for it. Liveness properties never activate rules.
    pub fn resolve(&self, properties: &PropertySet) -> RuleSet {
        let mut set = RuleSet::default();
        let scoped = properties
            .invariants
            .iter()
            .map(|p| (RuleScope::Invariant, p))
            .chain(properties.safety.iter().map(|p| (RuleScope::Safety, p)));
        for (scope, property) in scoped {
            let mut recognized = false;
            for rule in self.rules.iter().filter(|r| r.scope == scope) {
                if !(rule.detect)(property) {
                    continue;
                }
                recognized = true;
                if !set.is_active(rule.name) {
                    debug!(rule = rule.name, property = %property, "property rule activated");
                    set.bindings.push(RuleBinding {
                        rule: *rule,
                        property: property.clone(),
                    });
                }
            }
            if !recognized {
                set.unrecognized.push(property.clone());
            }
        }
        set
    }
}

/// Rules active for one run, plus the properties nothing recognized.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    bindings: Vec<RuleBinding>,
    unrecognized: Vec<String>,
}

impl RuleSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn bindings(&self) -> &[RuleBinding] {
        &self.bindings
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.bindings.iter().map(|b| b.rule.name).collect()
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.bindings.iter().any(|b| b.rule.name == name)
    }

    /// Properties treated as satisfied because no rule understands them.
    pub fn unrecognized(&self) -> &[String] {
        &self.unrecognized
    }

    /// Basic validation, then every active rule against the projected state.
    pub fn validate(&self, state: &ContractState, call: &Call) -> Result<(), Rejection> {
        basic_validation(state, call)?;
        if self.bindings.is_empty() {
            return Ok(());
        }
        let mut after = state.clone();
        after.update(call);
        let transition = Transition {
            before: state,
            after: &after,
            call,
        };
        for binding in &self.bindings {
            if !(binding.rule.check)(&transition) {
                return Err(Rejection::Property {
                    rule: binding.rule.name,
                    property: binding.property.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn is_valid(&self, state: &ContractState, call: &Call) -> bool {
        self.validate(state, call).is_ok()
    }
}

fn has_le(text: &str) -> bool {
    text.contains('≤') || text.contains("<=")
}

fn has_ge(text: &str) -> bool {
    text.contains('≥') || text.contains(">=")
}

/// Σ balances ≤ total supply.
pub const SUPPLY_COVERS_BALANCES: PropertyRule = PropertyRule {
    name: "supply-covers-balances",
    scope: RuleScope::Invariant,
    detect: |text| text.contains("totalSupply") && text.contains("totalBalances"),
    check: |t| t.after.total_balances() <= t.after.total_supply,
};

/// Every balance stays ≥ 0.
pub const NON_NEGATIVE_BALANCES: PropertyRule = PropertyRule {
    name: "non-negative-balances",
    scope: RuleScope::Invariant,
    detect: |text| text.contains("balanceOf") && has_ge(text),
    check: |t| t.after.balances.values().all(|b| *b >= 0),
};

/// `transferFrom` never moves more than the recorded allowance.
pub const ALLOWANCE_BOUNDS_TRANSFER_FROM: PropertyRule = PropertyRule {
    name: "allowance-bounds-transfer-from",
    scope: RuleScope::Invariant,
    detect: |text| text.contains("allowance") && text.contains("transferFrom"),
    check: |t| {
        if !t.call.is("transferFrom") || t.call.args.len() < 3 {
            return true;
        }
        let (owner, spender) = (t.call.args[0].key(), t.call.args[1].key());
        match t.call.int_arg(2) {
            Some(value) => value <= t.before.allowance(&owner, &spender),
            None => false,
        }
    },
};

/// Each account withdraws at most once.
pub const WITHDRAW_ONCE: PropertyRule = PropertyRule {
    name: "withdraw-once",
    scope: RuleScope::Safety,
    detect: |text| text.contains("withdrawCount") && has_le(text),
    check: |t| match (t.call.is("withdraw"), t.call.key_arg(0)) {
        (true, Some(account)) => t.before.withdraw_count(&account) < 1,
        _ => true,
    },
};

/// Each account votes at most once.
pub const VOTE_ONCE: PropertyRule = PropertyRule {
    name: "vote-once",
    scope: RuleScope::Safety,
    detect: |text| text.contains("vote") && text.contains('='),
    check: |t| match (t.call.is("vote"), t.call.key_arg(0)) {
        (true, Some(voter)) => !t.before.has_voted(&voter),
        _ => true,
    },
};

/// A bid from anyone but the current leader must beat the highest bid.
pub const BID_EXCEEDS_HIGHEST: PropertyRule = PropertyRule {
    name: "bid-exceeds-highest",
    scope: RuleScope::Safety,
    detect: |text| text.contains("highestBid") && text.contains("bid"),
    check: |t| {
        if !t.call.is("bid") || t.call.args.is_empty() {
            return true;
        }
        let bidder = t.call.args[0].key();
        let amount = match t.call.args.get(1) {
            Some(raw) => raw.as_int(),
            None => Some(0),
        };
        match amount {
            Some(amount) => {
                amount > t.before.highest_bid
                    || t.before.highest_bidder.as_deref() == Some(bidder.as_str())
            }
            None => false,
        }
    },
};
