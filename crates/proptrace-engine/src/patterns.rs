//! Canonical multi-step call sequences spliced into traces.
//!
//! Patterns are data: a named list of steps, each an operation name and a
//! template per argument. Extra patterns can be pushed at runtime or loaded
//! from JSON.

use std::collections::BTreeSet;

use proptrace_model::{ArgValue, Call};
use proptrace_spec::Operation;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// How one argument of a pattern step is produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgTemplate {
    /// A uniformly drawn account from the pool.
    AnyAccount,
    /// A fixed amount.
    Amount(i64),
}

impl ArgTemplate {
    fn instantiate<R: Rng + ?Sized>(&self, accounts: &[String], rng: &mut R) -> Option<ArgValue> {
        match self {
            ArgTemplate::AnyAccount => accounts.choose(rng).map(|a| ArgValue::address(a.as_str())),
            ArgTemplate::Amount(n) => Some(ArgValue::Int(*n)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternStep {
    pub operation: String,
    pub args: Vec<ArgTemplate>,
}

impl PatternStep {
    pub fn new(operation: impl Into<String>, args: Vec<ArgTemplate>) -> Self {
        Self {
            operation: operation.into(),
            args,
        }
    }

    /// Concrete call for this step, `None` if the account pool is empty.
    pub fn instantiate<R: Rng + ?Sized>(&self, accounts: &[String], rng: &mut R) -> Option<Call> {
        let args = self
            .args
            .iter()
            .map(|t| t.instantiate(accounts, rng))
            .collect::<Option<Vec<_>>>()?;
        Some(Call::new(self.operation.clone(), args))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessPattern {
    pub name: String,
    pub steps: Vec<PatternStep>,
}

impl BusinessPattern {
    pub fn new(name: impl Into<String>, steps: Vec<PatternStep>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Every step names one of `known`.
    pub fn is_applicable(&self, known: &BTreeSet<&str>) -> bool {
        !self.steps.is_empty()
            && self
                .steps
                .iter()
                .all(|s| known.contains(s.operation.as_str()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternLibrary {
    patterns: Vec<BusinessPattern>,
}

impl PatternLibrary {
    pub fn empty() -> Self {
        Self::default()
    }

    /// approve→transferFrom, a three-hop transfer chain, and
    /// mint→transfer→burn.
    pub fn standard() -> Self {
        use ArgTemplate::{Amount, AnyAccount};
        Self {
            patterns: vec![
                BusinessPattern::new(
                    "approve-then-transfer-from",
                    vec![
                        PatternStep::new("approve", vec![AnyAccount, AnyAccount, Amount(100)]),
                        PatternStep::new("transferFrom", vec![AnyAccount, AnyAccount, Amount(50)]),
                    ],
                ),
                BusinessPattern::new(
                    "transfer-chain",
                    vec![
                        PatternStep::new("transfer", vec![AnyAccount, AnyAccount, Amount(30)]),
                        PatternStep::new("transfer", vec![AnyAccount, AnyAccount, Amount(20)]),
                        PatternStep::new("transfer", vec![AnyAccount, AnyAccount, Amount(10)]),
                    ],
                ),
                BusinessPattern::new(
                    "mint-transfer-burn",
                    vec![
                        PatternStep::new("mint", vec![AnyAccount, Amount(500)]),
                        PatternStep::new("transfer", vec![AnyAccount, AnyAccount, Amount(200)]),
                        PatternStep::new("burn", vec![AnyAccount, Amount(100)]),
                    ],
                ),
            ],
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn push(&mut self, pattern: BusinessPattern) {
        self.patterns.push(pattern);
    }

    pub fn patterns(&self) -> &[BusinessPattern] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Patterns whose every step is an operation the contract exposes.
    pub fn applicable(&self, operations: &[Operation]) -> PatternLibrary {
        let known: BTreeSet<&str> = operations.iter().map(|op| op.name.as_str()).collect();
        PatternLibrary {
            patterns: self
                .patterns
                .iter()
                .filter(|p| p.is_applicable(&known))
                .cloned()
                .collect(),
        }
    }

    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&BusinessPattern> {
        self.patterns.choose(rng)
    }
}
