use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;

use indexmap::IndexMap;
use rand::Rng;

use crate::args::Call;

/// Account pool used when nothing else is configured.
pub const DEFAULT_ACCOUNTS: [&str; 4] = ["0xA1", "0xB2", "0xC3", "0xD4"];
/// Supply every run starts with.
pub const DEFAULT_TOTAL_SUPPLY: i64 = 1_000_000;
/// Funding goal for crowdfunding-shaped contracts.
pub const DEFAULT_TARGET_FUNDS: i64 = 1_000_000;

/// Simulated contract state for one generation run.
///
/// Single owner, mutated exactly once per accepted call via
/// [`ContractState::update`]. Validated paths keep every balance
/// non-negative and the balance sum within `total_supply`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ContractState {
    /// Accounts parameters are drawn from, in a stable order.
    pub accounts: Vec<String>,
    pub balances: BTreeMap<String, i64>,
    /// owner -> spender -> remaining allowance.
    pub allowances: BTreeMap<String, BTreeMap<String, i64>>,
    pub total_supply: i64,
    pub withdraw_counts: BTreeMap<String, u32>,
    pub votes: BTreeSet<String>,
    pub bids: BTreeMap<String, i64>,
    pub highest_bid: i64,
    pub highest_bidder: Option<String>,
    pub auction_ended: bool,
    pub crowdfunding_closed: bool,
    pub raised_funds: i64,
    pub target_funds: i64,
    /// Accepted calls per operation name, in first-seen order.
    pub operation_counts: IndexMap<String, u64>,
}

impl ContractState {
    /// Empty state: no balances, no allowances.
    pub fn new<S: AsRef<str>>(accounts: &[S], total_supply: i64) -> Self {
        Self {
            accounts: accounts.iter().map(|a| a.as_ref().to_string()).collect(),
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
            total_supply,
            withdraw_counts: BTreeMap::new(),
            votes: BTreeSet::new(),
            bids: BTreeMap::new(),
            highest_bid: 0,
            highest_bidder: None,
            auction_ended: false,
            crowdfunding_closed: false,
            raised_funds: 0,
            target_funds: DEFAULT_TARGET_FUNDS,
            operation_counts: IndexMap::new(),
        }
    }

    /// State with a uniformly drawn starting balance for every account.
    pub fn seeded<S: AsRef<str>, R: Rng + ?Sized>(
        accounts: &[S],
        total_supply: i64,
        balance_range: RangeInclusive<i64>,
        rng: &mut R,
    ) -> Self {
        let mut state = Self::new(accounts, total_supply);
        for account in &state.accounts {
            let balance = rng.gen_range(balance_range.clone());
            state.balances.insert(account.clone(), balance);
        }
        state
    }

    pub fn with_balance(mut self, account: &str, balance: i64) -> Self {
        self.set_balance(account, balance);
        self
    }

    pub fn set_balance(&mut self, account: &str, balance: i64) {
        self.balances.insert(account.to_string(), balance);
    }

    pub fn balance(&self, account: &str) -> i64 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn set_allowance(&mut self, owner: &str, spender: &str, amount: i64) {
        self.allowances
            .entry(owner.to_string())
            .or_default()
            .insert(spender.to_string(), amount);
    }

    pub fn allowance(&self, owner: &str, spender: &str) -> i64 {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    pub fn withdraw_count(&self, account: &str) -> u32 {
        self.withdraw_counts.get(account).copied().unwrap_or(0)
    }

    pub fn has_voted(&self, account: &str) -> bool {
        self.votes.contains(account)
    }

    /// Sum of all recorded balances, saturating at the `i64` bounds.
    pub fn total_balances(&self) -> i64 {
        self.balances
            .values()
            .fold(0i64, |acc, b| acc.saturating_add(*b))
    }

    /// Accounts from the pool with a strictly positive balance.
    pub fn funded_accounts(&self) -> Vec<&str> {
        self.accounts
            .iter()
            .map(String::as_str)
            .filter(|a| self.balance(a) > 0)
            .collect()
    }

    pub fn operation_count(&self, operation: &str) -> u64 {
        self.operation_counts.get(operation).copied().unwrap_or(0)
    }

    /// Copy of the state with per-operation counters cleared, used as
    /// the replay starting point.
    pub fn snapshot(&self) -> Self {
        Self {
            operation_counts: IndexMap::new(),
            ..self.clone()
        }
    }

    /// Apply an already-validated call.
    ///
    /// Unknown operations and calls whose arguments do not fit the
    /// operation leave the state alone but are still counted.
    pub fn update(&mut self, call: &Call) {
        match call.operation.as_str() {
            "transfer" => {
                if let (Some(from), Some(to), Some(value)) =
                    (call.key_arg(0), call.key_arg(1), call.int_arg(2))
                {
                    self.move_balance(&from, &to, value);
                }
            }
            "transferFrom" => {
                if let (Some(from), Some(to), Some(value)) =
                    (call.key_arg(0), call.key_arg(1), call.int_arg(2))
                {
                    self.move_balance(&from, &to, value);
                    let remaining = self.allowance(&from, &to) - value;
                    self.set_allowance(&from, &to, remaining);
                }
            }
            "approve" => {
                if let (Some(owner), Some(spender), Some(amount)) =
                    (call.key_arg(0), call.key_arg(1), call.int_arg(2))
                {
                    self.set_allowance(&owner, &spender, amount);
                }
            }
            "mint" => {
                if let (Some(account), Some(amount)) = (call.key_arg(0), call.int_arg(1)) {
                    *self.balances.entry(account).or_insert(0) += amount;
                    self.total_supply += amount;
                }
            }
            "burn" => {
                if let (Some(account), Some(amount)) = (call.key_arg(0), call.int_arg(1)) {
                    *self.balances.entry(account).or_insert(0) -= amount;
                    self.total_supply -= amount;
                }
            }
            "withdraw" => {
                if let Some(account) = call.key_arg(0) {
                    *self.withdraw_counts.entry(account).or_insert(0) += 1;
                }
            }
            "vote" => {
                if let Some(voter) = call.key_arg(0) {
                    self.votes.insert(voter);
                }
            }
            "bid" => {
                if let (Some(bidder), Some(amount)) = (call.key_arg(0), call.int_arg(1)) {
                    if amount > self.highest_bid {
                        self.highest_bid = amount;
                        self.highest_bidder = Some(bidder.clone());
                    }
                    self.bids.insert(bidder, amount);
                }
            }
            "endAuction" | "auctionEnd" => {
                self.auction_ended = true;
            }
            "contribute" => {
                if let Some(amount) = call.args.iter().find_map(|a| a.as_int()) {
                    self.raised_funds += amount;
                    if self.raised_funds >= self.target_funds {
                        self.crowdfunding_closed = true;
                    }
                }
            }
            _ => {}
        }
        *self
            .operation_counts
            .entry(call.operation.clone())
            .or_insert(0) += 1;
    }

    fn move_balance(&mut self, from: &str, to: &str, value: i64) {
        *self.balances.entry(from.to_string()).or_insert(0) -= value;
        *self.balances.entry(to.to_string()).or_insert(0) += value;
    }
}
