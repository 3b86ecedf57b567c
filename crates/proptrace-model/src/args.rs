use std::fmt;
use std::str::FromStr;

/// A concrete argument value.
///
/// Values render exactly as they appear in trace records: accounts as
/// their address text, integers in decimal, booleans as `true`/`false`,
/// and the untyped fallback as `0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "snake_case"))]
pub enum ArgValue {
    Address(String),
    Int(i64),
    Bool(bool),
    Zero,
}

impl ArgValue {
    pub fn address(account: impl Into<String>) -> Self {
        ArgValue::Address(account.into())
    }

    /// Integer view of the value, if it has one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ArgValue::Int(n) => Some(*n),
            ArgValue::Zero => Some(0),
            ArgValue::Address(_) | ArgValue::Bool(_) => None,
        }
    }

    /// Key used when the value indexes per-account bookkeeping.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Address(a) => f.write_str(a),
            ArgValue::Int(n) => write!(f, "{n}"),
            ArgValue::Bool(b) => write!(f, "{b}"),
            ArgValue::Zero => f.write_str("0"),
        }
    }
}

impl FromStr for ArgValue {
    type Err = std::convert::Infallible;

    /// Recover a value from its rendered text. Decimal text becomes an
    /// integer, `true`/`false` a boolean, anything else an address.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if let Ok(n) = raw.parse::<i64>() {
            return Ok(ArgValue::Int(n));
        }
        Ok(match raw {
            "true" => ArgValue::Bool(true),
            "false" => ArgValue::Bool(false),
            other => ArgValue::Address(other.to_string()),
        })
    }
}

impl From<i64> for ArgValue {
    fn from(n: i64) -> Self {
        ArgValue::Int(n)
    }
}

impl From<&str> for ArgValue {
    fn from(account: &str) -> Self {
        ArgValue::Address(account.to_string())
    }
}

/// A proposed operation invocation: name plus positional arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Call {
    pub operation: String,
    pub args: Vec<ArgValue>,
}

impl Call {
    pub fn new(operation: impl Into<String>, args: Vec<ArgValue>) -> Self {
        Self {
            operation: operation.into(),
            args,
        }
    }

    pub fn arg(&self, idx: usize) -> Option<&ArgValue> {
        self.args.get(idx)
    }

    pub fn int_arg(&self, idx: usize) -> Option<i64> {
        self.arg(idx).and_then(ArgValue::as_int)
    }

    pub fn key_arg(&self, idx: usize) -> Option<String> {
        self.arg(idx).map(ArgValue::key)
    }

    pub fn is(&self, operation: &str) -> bool {
        self.operation == operation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_render_like_trace_text() {
        assert_eq!(ArgValue::address("0xA1").to_string(), "0xA1");
        assert_eq!(ArgValue::Int(42).to_string(), "42");
        assert_eq!(ArgValue::Bool(false).to_string(), "false");
        assert_eq!(ArgValue::Zero.to_string(), "0");
    }

    #[test]
    fn rendered_text_parses_back() {
        for raw in ["0xB2", "17", "true", "-3"] {
            let value: ArgValue = raw.parse().unwrap();
            assert_eq!(value.to_string(), raw);
        }
        assert_eq!("0".parse::<ArgValue>().unwrap().as_int(), Some(0));
    }

    #[test]
    fn only_numeric_values_have_an_integer_view() {
        assert_eq!(ArgValue::Zero.as_int(), Some(0));
        assert_eq!(ArgValue::address("0xA1").as_int(), None);
        assert_eq!(ArgValue::Bool(true).as_int(), None);
    }
}
