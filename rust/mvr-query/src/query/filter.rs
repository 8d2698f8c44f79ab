//! Compiles individual filter predicates into parameterised WHERE fragments.

use super::{quote_ident, BindParam};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "equals")]
    Equals,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "is one of")]
    IsOneOf,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "is null")]
    IsNull,
    #[serde(rename = "not null")]
    NotNull,
}

impl FilterOp {
    pub const ALL: [FilterOp; 9] = [
        FilterOp::Equals,
        FilterOp::Contains,
        FilterOp::IsOneOf,
        FilterOp::Gt,
        FilterOp::Lt,
        FilterOp::Gte,
        FilterOp::Lte,
        FilterOp::IsNull,
        FilterOp::NotNull,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FilterOp::Equals => "equals",
            FilterOp::Contains => "contains",
            FilterOp::IsOneOf => "is one of",
            FilterOp::Gt => ">",
            FilterOp::Lt => "<",
            FilterOp::Gte => ">=",
            FilterOp::Lte => "<=",
            FilterOp::IsNull => "is null",
            FilterOp::NotNull => "not null",
        }
    }

    pub fn requires_value(self) -> bool {
        !matches!(self, FilterOp::IsNull | FilterOp::NotNull)
    }
}

/// One `(column, operator, value)` condition; all filters of a request are AND-combined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    #[serde(rename = "operator")]
    pub op: FilterOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Filter {
    pub fn new(column: impl Into<String>, op: FilterOp, value: Option<&str>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.map(str::to_string),
        }
    }
}

/// Appends the filter's bind values to `params` and returns the matching fragment.
///
/// Returns `None` when the predicate contributes nothing: a value-taking
/// operator without a value, or an `is one of` list that parses to zero items.
/// The column is assumed to be validated already.
pub fn compile(filter: &Filter, params: &mut Vec<BindParam>) -> Option<String> {
    let column = quote_ident(&filter.column);

    let value = match filter.op {
        FilterOp::IsNull => return Some(format!("{column} IS NULL")),
        FilterOp::NotNull => return Some(format!("{column} IS NOT NULL")),
        _ => match filter.value.as_deref() {
            Some(value) if !value.is_empty() => value,
            _ => {
                debug!(
                    column = %filter.column,
                    op = filter.op.label(),
                    "dropping filter without a value"
                );
                return None;
            }
        },
    };

    let fragment = match filter.op {
        FilterOp::Contains => {
            let slot = push_param(params, BindParam::Text(format!("%{value}%")));
            format!("{} ILIKE {slot}", as_text(&column))
        }
        FilterOp::Equals => {
            let slot = push_param(params, BindParam::Text(value.to_string()));
            format!("{} = {slot}", as_text(&column))
        }
        FilterOp::IsOneOf => {
            let values = split_value_list(value);
            if values.is_empty() {
                debug!(column = %filter.column, "dropping empty 'is one of' filter");
                return None;
            }
            let slots: Vec<String> = values
                .into_iter()
                .map(|item| push_param(params, BindParam::Text(item)))
                .collect();
            format!("{} IN ({})", as_text(&column), slots.join(", "))
        }
        FilterOp::Gt => comparison(&column, ">", value, params),
        FilterOp::Lt => comparison(&column, "<", value, params),
        FilterOp::Gte => comparison(&column, ">=", value, params),
        FilterOp::Lte => comparison(&column, "<=", value, params),
        FilterOp::IsNull | FilterOp::NotNull => unreachable!("null checks return early"),
    };

    Some(fragment)
}

/// Splits an `is one of` value on newlines, then commas, keeping trimmed non-empty items.
pub fn split_value_list(raw: &str) -> Vec<String> {
    raw.lines()
        .flat_map(|line| line.split(','))
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

// Numeric-looking values compare against a best-effort numeric cast; TRY_CAST
// yields NULL for non-numeric cells so those rows drop out instead of erroring.
fn comparison(column: &str, symbol: &str, value: &str, params: &mut Vec<BindParam>) -> String {
    match parse_number(value) {
        Some(number) => {
            let slot = push_param(params, BindParam::Float(number));
            format!("TRY_CAST({column} AS DOUBLE) {symbol} {slot}")
        }
        None => {
            let slot = push_param(params, BindParam::Text(value.to_string()));
            format!("{} {symbol} {slot}", as_text(column))
        }
    }
}

/// Parses a finite number, accepting `_` digit separators such as `1_000`.
///
/// Non-finite results (`inf`, `nan`, overflowing exponents) are rejected since
/// they cannot be carried as a JSON number.
fn parse_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    let bytes = trimmed.as_bytes();
    let mut digits = String::with_capacity(trimmed.len());
    for (index, ch) in trimmed.char_indices() {
        if ch == '_' {
            let before = index.checked_sub(1).map(|at| bytes[at]);
            let after = bytes.get(index + 1).copied();
            match (before, after) {
                (Some(b), Some(a)) if b.is_ascii_digit() && a.is_ascii_digit() => continue,
                _ => return None,
            }
        }
        digits.push(ch);
    }
    digits.parse::<f64>().ok().filter(|number| number.is_finite())
}

fn as_text(column: &str) -> String {
    format!("CAST({column} AS VARCHAR)")
}

fn push_param(params: &mut Vec<BindParam>, value: BindParam) -> String {
    params.push(value);
    format!("${}", params.len())
}
