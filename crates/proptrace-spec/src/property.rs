//! Temporal property scanning.
//!
//! The input is line oriented. Each usable line is either an "always"
//! statement of the form `□( … )` (ASCII `[]( … )` and `always( … )` are
//! accepted too) or a statement containing a logical connective. Matching
//! lines are bucketed by their strongest temporal operator and then mined
//! for identifiers, constraint kinds and temporal operators.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::SpecError;

static CALL_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\s*\(([^)]*)\)").expect("call pattern compiles")
});

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Za-z_][A-Za-z0-9_]*\b").expect("identifier pattern compiles"));

/// Words that never name a variable.
const LOGICAL_KEYWORDS: [&str; 5] = ["true", "false", "and", "or", "not"];

/// Word-shaped temporal operators.
const TEMPORAL_KEYWORDS: [&str; 6] = ["always", "eventually", "next", "until", "U", "X"];

const ALWAYS_OPENERS: [&str; 3] = ["□(", "[](", "always("];

/// Kind of constraint a property line expresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "snake_case"))]
pub enum ConstraintKind {
    Comparison,
    Equality,
    Inequality,
    Conjunction,
    Disjunction,
    Negation,
    Implication,
}

impl ConstraintKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintKind::Comparison => "comparison",
            ConstraintKind::Equality => "equality",
            ConstraintKind::Inequality => "inequality",
            ConstraintKind::Conjunction => "conjunction",
            ConstraintKind::Disjunction => "disjunction",
            ConstraintKind::Negation => "negation",
            ConstraintKind::Implication => "implication",
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Linear temporal logic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "snake_case"))]
pub enum TemporalOp {
    Always,
    Eventually,
    Next,
    Until,
}

impl TemporalOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemporalOp::Always => "always",
            TemporalOp::Eventually => "eventually",
            TemporalOp::Next => "next",
            TemporalOp::Until => "until",
        }
    }
}

impl fmt::Display for TemporalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything recovered from one property specification.
///
/// Built once per generation run and read-only afterwards. The buckets are
/// sets; constraint and temporal tags keep their order and multiplicity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct PropertySet {
    pub invariants: BTreeSet<String>,
    pub safety: BTreeSet<String>,
    pub liveness: BTreeSet<String>,
    pub variables: BTreeSet<String>,
    pub predicates: BTreeSet<String>,
    pub constraints: Vec<ConstraintKind>,
    pub temporal_ops: Vec<TemporalOp>,
}

impl PropertySet {
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty() && self.safety.is_empty() && self.liveness.is_empty()
    }

    /// Number of bucketed properties across all three classes.
    pub fn len(&self) -> usize {
        self.invariants.len() + self.safety.len() + self.liveness.len()
    }
}

/// Parse a property specification. Never fails.
pub fn parse_properties(text: &str) -> PropertySet {
    let mut set = PropertySet::default();
    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        if let Some(expr) = extract_expression(line) {
            analyze(expr, &mut set);
        }
    }
    set
}

/// Read a property file. A missing file yields an empty set.
pub fn parse_properties_from_path(path: impl AsRef<Path>) -> Result<PropertySet, SpecError> {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(parse_properties(&text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PropertySet::default()),
        Err(e) => Err(SpecError::io(path, e)),
    }
}

fn extract_expression(line: &str) -> Option<&str> {
    let line = match line.find("//") {
        Some(idx) => line[..idx].trim(),
        None => line,
    };
    if line.is_empty() {
        return None;
    }
    if is_bracketed_always(line) || has_connective(line) {
        return Some(line);
    }
    None
}

fn is_bracketed_always(line: &str) -> bool {
    if !line.ends_with(')') {
        return false;
    }
    ALWAYS_OPENERS.iter().any(|opener| match line.find(opener) {
        Some(start) => start + opener.len() < line.len() - 1,
        None => false,
    })
}

fn has_connective(line: &str) -> bool {
    has_implication(line)
        || line.contains('∧')
        || line.contains("&&")
        || line.contains('∨')
        || line.contains("||")
        || has_negation_symbol(line)
}

fn has_implication(expr: &str) -> bool {
    expr.contains('→') || expr.contains("->")
}

/// `¬`, or a `!` that is not the start of `!=`.
fn has_negation_symbol(expr: &str) -> bool {
    if expr.contains('¬') {
        return true;
    }
    let mut chars = expr.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '!' && chars.peek() != Some(&'=') {
            return true;
        }
    }
    false
}

fn has_word(expr: &str, word: &str) -> bool {
    IDENTIFIER.find_iter(expr).any(|m| m.as_str() == word)
}

fn has_always(expr: &str) -> bool {
    expr.contains('□') || expr.contains("[]") || has_word(expr, "always")
}

fn has_eventually(expr: &str) -> bool {
    expr.contains('♦') || expr.contains('◇') || expr.contains("<>") || has_word(expr, "eventually")
}

fn has_next(expr: &str) -> bool {
    expr.contains('○') || has_word(expr, "next") || has_word(expr, "X")
}

fn has_until(expr: &str) -> bool {
    has_word(expr, "U") || has_word(expr, "until")
}

fn analyze(expr: &str, set: &mut PropertySet) {
    collect_identifiers(expr, set);

    if has_always(expr) {
        set.invariants.insert(expr.to_string());
    } else if has_eventually(expr) {
        set.liveness.insert(expr.to_string());
    } else if has_implication(expr) {
        set.safety.insert(expr.to_string());
    }

    collect_constraints(expr, &mut set.constraints);
    collect_temporal_ops(expr, &mut set.temporal_ops);
}

fn is_reserved(word: &str) -> bool {
    LOGICAL_KEYWORDS.contains(&word) || TEMPORAL_KEYWORDS.contains(&word)
}

fn collect_identifiers(expr: &str, set: &mut PropertySet) {
    for caps in CALL_SHAPE.captures_iter(expr) {
        set.predicates.insert(caps[1].to_string());
        for arg in caps[2].split(',').map(str::trim) {
            if !arg.is_empty() && arg.chars().all(char::is_alphabetic) && !is_reserved(arg) {
                set.variables.insert(arg.to_string());
            }
        }
    }
    for m in IDENTIFIER.find_iter(expr) {
        let word = m.as_str();
        if !is_reserved(word) {
            set.variables.insert(word.to_string());
        }
    }
}

fn collect_constraints(expr: &str, out: &mut Vec<ConstraintKind>) {
    if expr.contains('≤') || expr.contains("<=") {
        out.push(ConstraintKind::Comparison);
    }
    if expr.contains('≥') || expr.contains(">=") {
        out.push(ConstraintKind::Comparison);
    }
    if expr.contains('=') {
        out.push(ConstraintKind::Equality);
    }
    if expr.contains("!=") || expr.contains('≠') {
        out.push(ConstraintKind::Inequality);
    }
    if expr.contains('∧') || expr.contains("&&") || has_word(expr, "and") {
        out.push(ConstraintKind::Conjunction);
    }
    if expr.contains('∨') || expr.contains("||") || has_word(expr, "or") {
        out.push(ConstraintKind::Disjunction);
    }
    if has_negation_symbol(expr) || has_word(expr, "not") {
        out.push(ConstraintKind::Negation);
    }
    if has_implication(expr) {
        out.push(ConstraintKind::Implication);
    }
}

fn collect_temporal_ops(expr: &str, out: &mut Vec<TemporalOp>) {
    if has_always(expr) {
        out.push(TemporalOp::Always);
    }
    if has_eventually(expr) {
        out.push(TemporalOp::Eventually);
    }
    if has_next(expr) {
        out.push(TemporalOp::Next);
    }
    if has_until(expr) {
        out.push(TemporalOp::Until);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ERC20_PROPERTIES: &str = "\
// ERC20 temporal properties
□(balanceOf(a) >= 0)
□(totalSupply() >= totalBalances())
□(allowance(o, s) >= 0 ∧ transferFrom(o, r, v) → v <= allowance(o, s))

transfer(a, b, v) → ♦(balanceOf(b) > 0)
withdraw(a) → withdrawCount(a) <= 1 // at most once
just a sentence with nothing temporal
";

    #[test]
    fn always_line_lands_in_invariants_verbatim() {
        let set = parse_properties("□(balanceOf(a) >= 0)");
        assert!(set.invariants.contains("□(balanceOf(a) >= 0)"));
        assert!(set.variables.contains("a"));
        assert!(set.variables.contains("balanceOf"));
        assert!(set.predicates.contains("balanceOf"));
        assert_eq!(set.temporal_ops, vec![TemporalOp::Always]);
    }

    #[test]
    fn buckets_follow_operator_precedence() {
        let set = parse_properties(ERC20_PROPERTIES);
        assert_eq!(set.invariants.len(), 3);
        assert_eq!(set.liveness.len(), 1);
        assert!(set
            .liveness
            .contains("transfer(a, b, v) → ♦(balanceOf(b) > 0)"));
        assert_eq!(set.safety.len(), 1);
        assert!(set.safety.contains("withdraw(a) → withdrawCount(a) <= 1"));
    }

    #[test]
    fn comments_and_plain_text_are_dropped() {
        let set = parse_properties("// □(x >= 0)\n\nplain words only\n");
        assert!(set.is_empty());
        assert!(set.variables.is_empty());
        assert!(set.constraints.is_empty());
    }

    #[test]
    fn ascii_connectives_are_accepted() {
        let set = parse_properties("vote(a) -> voted(a) == true\n[](x >= 0)\na && !b");
        assert!(set.safety.contains("vote(a) -> voted(a) == true"));
        assert!(set.invariants.contains("[](x >= 0)"));
        assert!(set.constraints.contains(&ConstraintKind::Conjunction));
        assert!(set.constraints.contains(&ConstraintKind::Negation));
        assert!(!set.variables.contains("true"));
    }

    #[test]
    fn not_equal_is_not_negation() {
        let set = parse_properties("a != b -> c");
        assert!(set.constraints.contains(&ConstraintKind::Inequality));
        assert!(!set.constraints.contains(&ConstraintKind::Negation));
    }

    #[test]
    fn constraint_tags_keep_multiplicity() {
        let set = parse_properties("□(a <= b ∧ c >= d)");
        let comparisons = set
            .constraints
            .iter()
            .filter(|c| **c == ConstraintKind::Comparison)
            .count();
        assert_eq!(comparisons, 2);
        assert!(set.constraints.contains(&ConstraintKind::Equality));
    }

    #[test]
    fn temporal_words_are_not_variables() {
        let set = parse_properties("request(p) → (pending U granted(p))");
        assert!(set.temporal_ops.contains(&TemporalOp::Until));
        assert!(!set.variables.contains("U"));
        assert!(set.variables.contains("pending"));
        assert!(set.predicates.contains("granted"));
    }

    #[test]
    fn reparsing_is_idempotent() {
        assert_eq!(
            parse_properties(ERC20_PROPERTIES),
            parse_properties(ERC20_PROPERTIES)
        );
    }

    #[test]
    fn missing_property_file_is_empty_not_an_error() {
        let set = parse_properties_from_path("/no/such/temporal_properties.txt").unwrap();
        assert_eq!(set, PropertySet::default());
    }

    #[test]
    fn property_file_is_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temporal_properties.txt");
        std::fs::write(&path, ERC20_PROPERTIES).unwrap();
        let set = parse_properties_from_path(&path).unwrap();
        assert_eq!(set, parse_properties(ERC20_PROPERTIES));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn parser_never_panics_and_is_deterministic(text in "\\PC{0,200}") {
                let first = parse_properties(&text);
                let second = parse_properties(&text);
                prop_assert_eq!(first, second);
            }

            #[test]
            fn every_bucketed_line_came_from_the_input(text in "[a-z()□♦→∧ <>=0-9\n]{0,120}") {
                let set = parse_properties(&text);
                for prop in set.invariants.iter().chain(&set.safety).chain(&set.liveness) {
                    prop_assert!(text.contains(prop.as_str()));
                }
            }
        }
    }
}
