//! Selection defaults and policy constants shared with the query form.

use crate::schema::SchemaSnapshot;
use serde::Serialize;

/// Sort-column sentinel meaning "leave rows in table order".
pub const NO_SORTING: &str = "(no sorting)";

/// Count-column value meaning "count every row in the group".
pub const COUNT_WILDCARD: &str = "*";

pub const MAX_GROUP_COLUMNS: usize = 5;
pub const MAX_FILTERS: usize = 10;
pub const GROUPED_LIMIT_CAP: i64 = 10_000;
pub const RAW_LIMIT_CAP: i64 = 5_000;

const DEFAULT_GROUP_COLUMN: &str = "MOTIVE_POWER";

const DEFAULT_RAW_COLUMNS: [&str; 7] = [
    "MAKE",
    "MODEL",
    "VEHICLE_YEAR",
    "MOTIVE_POWER",
    "VEHICLE_TYPE",
    "BODY_TYPE",
    "TLA",
];

const RAW_FALLBACK_COLUMNS: usize = 7;

/// Initial selections offered for a freshly loaded schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormDefaults {
    pub group_by: Vec<String>,
    pub raw_columns: Vec<String>,
    pub max_group_columns: usize,
    pub max_filters: usize,
}

impl FormDefaults {
    pub fn for_schema(schema: &SchemaSnapshot) -> Self {
        Self {
            group_by: default_group_column(schema).into_iter().collect(),
            raw_columns: default_raw_columns(schema),
            max_group_columns: MAX_GROUP_COLUMNS,
            max_filters: MAX_FILTERS,
        }
    }
}

pub fn default_group_column(schema: &SchemaSnapshot) -> Option<String> {
    if schema.contains(DEFAULT_GROUP_COLUMN) {
        return Some(DEFAULT_GROUP_COLUMN.to_string());
    }
    schema.columns().first().cloned()
}

pub fn default_raw_columns(schema: &SchemaSnapshot) -> Vec<String> {
    let preferred: Vec<String> = DEFAULT_RAW_COLUMNS
        .iter()
        .filter(|column| schema.contains(column))
        .map(|column| column.to_string())
        .collect();

    if !preferred.is_empty() {
        return preferred;
    }

    schema
        .columns()
        .iter()
        .take(RAW_FALLBACK_COLUMNS)
        .cloned()
        .collect()
}
