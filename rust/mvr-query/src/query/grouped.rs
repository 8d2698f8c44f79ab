use super::{column_list, GroupedQuery};
use crate::{
    error::{Result, ServiceError},
    form::MAX_GROUP_COLUMNS,
};
use std::collections::HashSet;

// COUNT(*) keeps rows whose group keys are NULL; those form their own group.
pub(super) fn to_sql(
    table: &str,
    spec: &GroupedQuery,
    where_clause: Option<&str>,
    limit: u32,
) -> Result<String> {
    if spec.group_by.is_empty() {
        return Err(ServiceError::validation(
            "select at least one column to group by",
        ));
    }

    if spec.group_by.len() > MAX_GROUP_COLUMNS {
        return Err(ServiceError::validation(format!(
            "select at most {MAX_GROUP_COLUMNS} columns to group by"
        )));
    }

    let mut seen = HashSet::new();
    if let Some(repeated) = spec.group_by.iter().find(|column| !seen.insert(*column)) {
        return Err(ServiceError::validation(format!(
            "column \"{repeated}\" is grouped more than once"
        )));
    }

    let keys = column_list(&spec.group_by);

    let mut lines = vec![
        "WITH counts AS (".to_string(),
        format!("    SELECT {keys}, COUNT(*) AS count"),
        format!("    FROM {table}"),
    ];
    if let Some(where_clause) = where_clause {
        lines.push(format!("    WHERE {where_clause}"));
    }
    lines.push(format!("    GROUP BY {keys}"));
    lines.push(")".to_string());
    lines.push("SELECT * FROM counts".to_string());
    lines.push(format!("ORDER BY count DESC, {keys}"));
    lines.push(format!("LIMIT {limit}"));

    Ok(lines.join("\n"))
}
