//! Trace record formatting.
//!
//! Downstream replayers key on the exact `name(key=value, ...)@t;` text,
//! so each operation has a fixed key schema. Missing positional arguments
//! render as the schema's default for that slot.

use proptrace_model::{ArgValue, Call};

/// Key schema for an operation's positional arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSchema {
    /// `from, to, value`
    Transfer,
    /// `sender, from, to, value`
    TransferFrom,
    /// `owner, spender, amount`
    Approve,
    /// `account, amount` (mint, burn)
    AccountAmount,
    /// `account`
    BalanceOf,
    /// `owner, spender`
    Allowance,
    /// No arguments rendered at all.
    NoArgs,
    /// `voter, proposal`
    Vote,
    /// `bidder, amount` (bid, withdraw)
    Bidder,
    /// `ansfer`: transfer keys with address defaults.
    LegacyTransfer,
    /// `ansferFrom`: transferFrom keys, sender doubling as from.
    LegacyTransferFrom,
    /// `param1` .. `param5`; later arguments are dropped.
    Positional,
}

const POSITIONAL_KEYS: [&str; 5] = ["param1", "param2", "param3", "param4", "param5"];

impl RecordSchema {
    pub fn for_operation(name: &str) -> Self {
        match name {
            "transfer" => RecordSchema::Transfer,
            "transferFrom" => RecordSchema::TransferFrom,
            "approve" => RecordSchema::Approve,
            "mint" | "burn" => RecordSchema::AccountAmount,
            "balanceOf" => RecordSchema::BalanceOf,
            "allowance" => RecordSchema::Allowance,
            "totalSupply" | "endAuction" | "auctionEnd" => RecordSchema::NoArgs,
            "vote" => RecordSchema::Vote,
            "bid" | "withdraw" => RecordSchema::Bidder,
            "ansfer" => RecordSchema::LegacyTransfer,
            "ansferFrom" => RecordSchema::LegacyTransferFrom,
            _ => RecordSchema::Positional,
        }
    }

    /// `(key, value)` pairs in output order.
    pub fn fields(self, args: &[ArgValue]) -> Vec<(&'static str, String)> {
        let at = |i: usize, default: &str| -> String {
            args.get(i)
                .map(ArgValue::to_string)
                .unwrap_or_else(|| default.to_string())
        };
        match self {
            RecordSchema::Transfer => vec![
                ("from", at(0, "0")),
                ("to", at(1, "0")),
                ("value", at(2, "0")),
            ],
            RecordSchema::TransferFrom if args.len() >= 3 => vec![
                ("sender", at(0, "0")),
                ("from", at(1, "0")),
                ("to", at(2, "0")),
                ("value", at(3, "50")),
            ],
            RecordSchema::TransferFrom | RecordSchema::LegacyTransferFrom => {
                let value = if self == RecordSchema::LegacyTransferFrom {
                    at(2, "50")
                } else {
                    "50".to_string()
                };
                vec![
                    ("sender", at(0, "0xA1")),
                    ("from", at(0, "0xA1")),
                    ("to", at(1, "0xB2")),
                    ("value", value),
                ]
            }
            RecordSchema::Approve => vec![
                ("owner", at(0, "0")),
                ("spender", at(1, "0")),
                ("amount", at(2, "0")),
            ],
            RecordSchema::AccountAmount => vec![("account", at(0, "0")), ("amount", at(1, "0"))],
            RecordSchema::BalanceOf => vec![("account", at(0, "0"))],
            RecordSchema::Allowance => vec![("owner", at(0, "0")), ("spender", at(1, "0"))],
            RecordSchema::NoArgs => Vec::new(),
            RecordSchema::Vote => vec![("voter", at(0, "0xA1")), ("proposal", at(1, "1"))],
            RecordSchema::Bidder => vec![("bidder", at(0, "0xA1")), ("amount", at(1, "100"))],
            RecordSchema::LegacyTransfer => vec![
                ("from", at(0, "0xA1")),
                ("to", at(1, "0xB2")),
                ("value", at(2, "100")),
            ],
            RecordSchema::Positional => POSITIONAL_KEYS
                .iter()
                .zip(args)
                .map(|(key, value)| (*key, value.to_string()))
                .collect(),
        }
    }

    pub fn render(self, args: &[ArgValue]) -> String {
        self.fields(args)
            .into_iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// One record line: `name(key=value, ...)@timestep;`.
pub fn format_record(call: &Call, timestep: usize) -> String {
    let body = RecordSchema::for_operation(&call.operation).render(&call.args);
    format!("{}({body})@{timestep};", call.operation)
}
