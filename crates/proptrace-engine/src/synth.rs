//! State-aware argument synthesis.
//!
//! Dedicated rules never propose an argument list that is structurally
//! invalid by construction. When the current state offers no valid choice
//! (no funded sender, no outstanding allowance) they return `None` and the
//! caller counts a retryable miss.

use proptrace_model::{ArgValue, ContractState};
use proptrace_spec::Operation;
use rand::seq::SliceRandom;
use rand::Rng;

/// Arguments for `operation` under `state`, or `None` if nothing fits.
pub fn synthesize<R: Rng + ?Sized>(
    operation: &Operation,
    state: &ContractState,
    rng: &mut R,
) -> Option<Vec<ArgValue>> {
    match operation.name.as_str() {
        "transfer" => {
            let funded = state.funded_accounts();
            let sender = *funded.choose(rng)?;
            let recipient = other_account(state, sender, rng)?;
            let value = rng.gen_range(1..=half_or_one(state.balance(sender)));
            Some(vec![sender.into(), recipient.into(), value.into()])
        }
        "transferFrom" => {
            let pairs: Vec<(&str, &str)> = state
                .accounts
                .iter()
                .flat_map(|from| state.accounts.iter().map(move |to| (from.as_str(), to.as_str())))
                .filter(|(from, to)| {
                    from != to && state.balance(from) > 0 && state.allowance(from, to) > 0
                })
                .collect();
            let (from, to) = *pairs.choose(rng)?;
            let cap = state.balance(from).min(state.allowance(from, to));
            let value = rng.gen_range(1..=half_or_one(cap));
            Some(vec![from.into(), to.into(), value.into()])
        }
        "approve" | "allowance" => {
            let owner = any_account(state, rng)?;
            let spender = other_account(state, owner, rng)?;
            let mut args: Vec<ArgValue> = vec![owner.into(), spender.into()];
            if operation.name == "approve" {
                args.push(rng.gen_range(10..=200i64).into());
            }
            Some(args)
        }
        "mint" => {
            let account = any_account(state, rng)?;
            Some(vec![account.into(), rng.gen_range(100..=1000i64).into()])
        }
        "burn" => {
            let funded = state.funded_accounts();
            let account = *funded.choose(rng)?;
            let amount = rng.gen_range(1..=(state.balance(account) / 3).max(1));
            Some(vec![account.into(), amount.into()])
        }
        "balanceOf" => Some(vec![any_account(state, rng)?.into()]),
        "totalSupply" => Some(Vec::new()),
        _ => operation
            .parameter_type_hints
            .iter()
            .map(|hint| random_param(hint, &state.accounts, rng))
            .collect(),
    }
}

/// Generic value for a parameter type hint.
///
/// Matching is by substring: `uint256` is an integer, `address payable` an
/// address. Unknown types get the zero value. Only address hints can fail,
/// and only with an empty account pool.
pub fn random_param<R: Rng + ?Sized>(
    hint: &str,
    accounts: &[String],
    rng: &mut R,
) -> Option<ArgValue> {
    if hint.contains("address") {
        accounts.choose(rng).map(|a| ArgValue::address(a.as_str()))
    } else if hint.contains("int") {
        Some(ArgValue::Int(rng.gen_range(1..=100)))
    } else if hint.contains("bool") {
        Some(ArgValue::Bool(rng.gen()))
    } else {
        Some(ArgValue::Zero)
    }
}

fn half_or_one(amount: i64) -> i64 {
    (amount / 2).max(1)
}

fn any_account<'s, R: Rng + ?Sized>(state: &'s ContractState, rng: &mut R) -> Option<&'s str> {
    state.accounts.choose(rng).map(String::as_str)
}

fn other_account<'s, R: Rng + ?Sized>(
    state: &'s ContractState,
    not: &str,
    rng: &mut R,
) -> Option<&'s str> {
    let others: Vec<&str> = state
        .accounts
        .iter()
        .map(String::as_str)
        .filter(|a| *a != not)
        .collect();
    others.choose(rng).copied()
}
