//! In-memory contract simulation.
//!
//! [`ContractState`] tracks balances, allowances, supply and the auxiliary
//! bookkeeping (withdrawals, votes, bids) that sample contracts expose.
//! [`RuleSet`] decides whether a proposed [`Call`] may be applied: a fixed
//! basic check followed by every property rule the property set activated.

pub mod args;
pub mod rules;
pub mod state;
pub mod validation;

pub use args::{ArgValue, Call};
pub use rules::{PropertyRule, RuleBinding, RuleRegistry, RuleScope, RuleSet, Transition};
pub use state::{ContractState, DEFAULT_ACCOUNTS, DEFAULT_TOTAL_SUPPLY};
pub use validation::{basic_validation, Rejection};
