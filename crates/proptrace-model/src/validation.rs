use thiserror::Error;

use crate::args::Call;
use crate::state::ContractState;

/// Why a proposed call was not accepted.
///
/// Rejections are retryable misses for the generator and findings for
/// the replay checker; they never abort a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("{operation} needs at least {needed} arguments, got {got}")]
    MissingArguments {
        operation: String,
        needed: usize,
        got: usize,
    },
    #[error("argument {position} of {operation} is not an integer")]
    NotAnInteger { operation: String, position: usize },
    #[error("transfer value must be strictly positive, got {value}")]
    NonPositiveValue { value: i64 },
    #[error("{account} holds {balance}, cannot send {value}")]
    InsufficientBalance {
        account: String,
        balance: i64,
        value: i64,
    },
    #[error("sender and recipient are both {account}")]
    SelfTransfer { account: String },
    #[error("rule '{rule}' rejects the call (from property `{property}`)")]
    Property { rule: &'static str, property: String },
}

impl Rejection {
    /// Stable short label, used for rejection statistics.
    pub fn label(&self) -> &'static str {
        match self {
            Rejection::MissingArguments { .. } => "missing_arguments",
            Rejection::NotAnInteger { .. } => "not_an_integer",
            Rejection::NonPositiveValue { .. } => "non_positive_value",
            Rejection::InsufficientBalance { .. } => "insufficient_balance",
            Rejection::SelfTransfer { .. } => "self_transfer",
            Rejection::Property { rule, .. } => *rule,
        }
    }
}

/// Operation-specific structural checks.
///
/// Only `transfer` has any; every other operation passes.
pub fn basic_validation(state: &ContractState, call: &Call) -> Result<(), Rejection> {
    if !call.is("transfer") {
        return Ok(());
    }
    if call.args.len() < 3 {
        return Err(Rejection::MissingArguments {
            operation: call.operation.clone(),
            needed: 3,
            got: call.args.len(),
        });
    }
    let sender = call.args[0].key();
    let recipient = call.args[1].key();
    let value = call.int_arg(2).ok_or_else(|| Rejection::NotAnInteger {
        operation: call.operation.clone(),
        position: 2,
    })?;
    if value <= 0 {
        return Err(Rejection::NonPositiveValue { value });
    }
    let balance = state.balance(&sender);
    if balance < value {
        return Err(Rejection::InsufficientBalance {
            account: sender,
            balance,
            value,
        });
    }
    if sender == recipient {
        return Err(Rejection::SelfTransfer { account: sender });
    }
    Ok(())
}
