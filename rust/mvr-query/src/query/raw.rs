use super::{column_list, quote_ident, RawQuery};
use crate::error::{Result, ServiceError};

pub(super) fn to_sql(
    table: &str,
    spec: &RawQuery,
    where_clause: Option<&str>,
    limit: u32,
) -> Result<String> {
    if spec.columns.is_empty() {
        return Err(ServiceError::validation("no columns selected"));
    }

    let mut lines = vec![
        format!("SELECT {}", column_list(&spec.columns)),
        format!("FROM {table}"),
    ];
    if let Some(where_clause) = where_clause {
        lines.push(format!("WHERE {where_clause}"));
    }
    if let Some(sort_column) = spec.sort_column() {
        lines.push(format!(
            "ORDER BY {} {}",
            quote_ident(sort_column),
            spec.sort_order.keyword()
        ));
    }
    lines.push(format!("LIMIT {limit}"));

    Ok(lines.join("\n"))
}
