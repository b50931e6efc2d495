//! Leaf range expressions.
//!
//! A terminal cell holds one of:
//!
//! | Text            | Members                          |
//! |-----------------|----------------------------------|
//! | `A01-A05`       | `A01 A02 A03 A04 A05`            |
//! | `[B05 - B02]`   | `B05 B04 B03 B02`                |
//! | `100-103`       | `100 101 102 103`                |
//! | `X9`            | `X9`                             |
//! | (empty)         | none                             |
//!
//! Brackets and whitespace are ignored. Prefixed ranges keep the digit width of
//! their start token; plain numeric ranges render numbers in natural form.
//! Anything with a separator that does not parse degrades to its two raw sides.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::logs::log_warning;

/// Optional letter prefix followed by digits
static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z]*)([0-9]+)$").expect("static regex is valid")
});

/// A parsed range expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeExpr {
    /// Empty cell or text made only of brackets and whitespace
    Empty,
    /// A single member token
    Single(String),
    /// Inclusive numeric sequence, ascending or descending
    Sequence {
        prefix: String,
        start: u64,
        end: u64,
        /// Minimum digit count; 0 renders numbers as-is
        width: usize,
    },
    /// Separator present but the sides do not form a sequence
    Malformed { start: String, end: String },
}

impl RangeExpr {
    pub fn parse(text: &str) -> Self {
        let cleaned: String = text
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '[' && *c != ']')
            .collect();

        if cleaned.is_empty() {
            return RangeExpr::Empty;
        }

        match cleaned.split_once('-') {
            Some((start, end)) => {
                Self::sequence(start, end).unwrap_or_else(|| RangeExpr::Malformed {
                    start: start.to_string(),
                    end: end.to_string(),
                })
            }
            None => RangeExpr::Single(cleaned),
        }
    }

    /// Parse an optional cell; `None` is [`RangeExpr::Empty`].
    pub fn from_cell(cell: Option<&str>) -> Self {
        cell.map(Self::parse).unwrap_or(RangeExpr::Empty)
    }

    fn sequence(start: &str, end: &str) -> Option<Self> {
        let s = TOKEN.captures(start)?;
        let e = TOKEN.captures(end)?;

        let (start_prefix, start_digits) = (&s[1], &s[2]);
        let (end_prefix, end_digits) = (&e[1], &e[2]);

        let start_num: u64 = start_digits.parse().ok()?;
        let end_num: u64 = end_digits.parse().ok()?;
        // Size must fit in u64
        start_num.abs_diff(end_num).checked_add(1)?;

        if !start_prefix.is_empty() && !end_prefix.is_empty() {
            if start_prefix != end_prefix {
                return None;
            }
            return Some(RangeExpr::Sequence {
                prefix: start_prefix.to_string(),
                start: start_num,
                end: end_num,
                width: start_digits.len(),
            });
        }

        Some(RangeExpr::Sequence {
            prefix: String::new(),
            start: start_num,
            end: end_num,
            width: 0,
        })
    }

    /// Number of members this expression yields
    pub fn len(&self) -> u64 {
        match self {
            RangeExpr::Empty => 0,
            RangeExpr::Single(_) => 1,
            RangeExpr::Sequence { start, end, .. } => start.abs_diff(*end) + 1,
            RangeExpr::Malformed { .. } => 2,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, RangeExpr::Malformed { .. })
    }

    /// The `i`-th member, in order
    pub fn member(&self, i: u64) -> Option<String> {
        if i >= self.len() {
            return None;
        }
        match self {
            RangeExpr::Empty => None,
            RangeExpr::Single(token) => Some(token.clone()),
            RangeExpr::Sequence {
                prefix,
                start,
                end,
                width,
            } => {
                let n = if start <= end { start + i } else { start - i };
                Some(format!("{}{:0width$}", prefix, n, width = *width))
            }
            RangeExpr::Malformed { start, end } => {
                Some(if i == 0 { start.clone() } else { end.clone() })
            }
        }
    }

    /// Members in order, generated lazily
    pub fn members(&self) -> impl Iterator<Item = String> + '_ {
        (0..self.len()).filter_map(move |i| self.member(i))
    }
}

/// Parse a range expression into its member tokens.
///
/// Malformed expressions are logged and yield their two raw sides.
pub fn parse_range(text: &str) -> Vec<String> {
    let expr = RangeExpr::parse(text);
    if expr.is_malformed() {
        log_warning(format!("Could not parse range '{}', keeping raw bounds", text));
    }
    expr.members().collect()
}

/// Member count of a range expression without materializing it.
///
/// Returns 0 for empty and for unparseable text.
pub fn range_size(text: &str) -> u64 {
    match RangeExpr::parse(text) {
        RangeExpr::Malformed { .. } => 0,
        expr => expr.len(),
    }
}
