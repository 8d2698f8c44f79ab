mod filter;
mod grouped;
mod raw;

pub use filter::{compile as compile_filter, split_value_list, Filter, FilterOp};

use crate::{
    config::AppConfig,
    error::{Result, ServiceError},
    form::{FormDefaults, COUNT_WILDCARD, MAX_FILTERS, NO_SORTING},
    schema::{unknown_columns, ConfiguredSchema, SchemaCache, SchemaSnapshot},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "t", content = "v", rename_all = "snake_case")]
pub enum BindParam {
    Text(String),
    Float(f64),
}

/// Column counted per group. `COUNT(*)` is emitted either way; a named column
/// is only validated against the schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CountColumn {
    #[default]
    All,
    Column(String),
}

impl From<String> for CountColumn {
    fn from(value: String) -> Self {
        if value == COUNT_WILDCARD {
            CountColumn::All
        } else {
            CountColumn::Column(value)
        }
    }
}

impl From<CountColumn> for String {
    fn from(value: CountColumn) -> Self {
        match value {
            CountColumn::All => COUNT_WILDCARD.to_string(),
            CountColumn::Column(name) => name,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    #[serde(rename = "Ascending", alias = "ascending", alias = "asc")]
    Ascending,
    #[serde(rename = "Descending", alias = "descending", alias = "desc")]
    Descending,
}

impl SortOrder {
    fn keyword(self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupedQuery {
    pub group_by: Vec<String>,
    #[serde(default)]
    pub count_column: CountColumn,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawQuery {
    pub columns: Vec<String>,
    #[serde(default)]
    pub sort_column: Option<String>,
    #[serde(default)]
    pub sort_order: SortOrder,
}

impl RawQuery {
    /// The chosen sort column, ignoring the "(no sorting)" sentinel.
    pub fn sort_column(&self) -> Option<&str> {
        self.sort_column
            .as_deref()
            .filter(|column| *column != NO_SORTING)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum QueryMode {
    #[serde(alias = "Grouped (summary)")]
    Grouped(GroupedQuery),
    #[serde(alias = "Raw (individual records)")]
    Raw(RawQuery),
}

impl QueryMode {
    pub fn name(&self) -> &'static str {
        match self {
            QueryMode::Grouped(_) => "grouped",
            QueryMode::Raw(_) => "raw",
        }
    }
}

/// Everything needed to assemble one statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(flatten)]
    pub mode: QueryMode,
    #[serde(default)]
    pub filters: Vec<Filter>,
    pub limit: u32,
}

impl QueryRequest {
    /// Every column name the request would place into SQL text.
    pub fn referenced_columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = Vec::new();
        match &self.mode {
            QueryMode::Grouped(grouped) => {
                columns.extend(grouped.group_by.iter().map(String::as_str));
                if let CountColumn::Column(name) = &grouped.count_column {
                    columns.push(name);
                }
            }
            QueryMode::Raw(raw) => {
                columns.extend(raw.columns.iter().map(String::as_str));
                columns.extend(raw.sort_column());
            }
        }
        columns.extend(self.filters.iter().map(|filter| filter.column.as_str()));
        columns
    }
}

/// SQL text with `$n` placeholders and the values bound to them, in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<BindParam>,
}

/// Validates `request` against `schema` and assembles the statement for `table`.
///
/// `table` is trusted and never checked against the snapshot.
pub fn build_query(
    table: &str,
    request: &QueryRequest,
    schema: &SchemaSnapshot,
) -> Result<CompiledQuery> {
    let referenced = request.referenced_columns();
    let unknown = unknown_columns(&referenced, schema.columns());
    if !unknown.is_empty() {
        let names: Vec<String> = unknown.iter().map(|name| quote_ident(name)).collect();
        return Err(ServiceError::validation(format!(
            "invalid column name detected: {}",
            names.join(", ")
        )));
    }

    let mut params = Vec::new();
    let fragments: Vec<String> = request
        .filters
        .iter()
        .filter_map(|filter| filter::compile(filter, &mut params))
        .collect();
    let where_clause = if fragments.is_empty() {
        None
    } else {
        Some(fragments.join(" AND "))
    };

    let table = quote_table(table);
    let sql = match &request.mode {
        QueryMode::Grouped(grouped) => {
            grouped::to_sql(&table, grouped, where_clause.as_deref(), request.limit)?
        }
        QueryMode::Raw(raw) => raw::to_sql(&table, raw, where_clause.as_deref(), request.limit)?,
    };

    debug!(
        mode = request.mode.name(),
        filters = fragments.len(),
        params = params.len(),
        "assembled query"
    );

    Ok(CompiledQuery { sql, params })
}

/// Double-quotes an identifier, doubling any embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quotes each dot-separated segment of a (possibly qualified) table name.
pub fn quote_table(name: &str) -> String {
    name.split('.')
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(".")
}

fn column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|column| quote_ident(column))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Clone)]
pub struct QueryEngine {
    config: Arc<AppConfig>,
    schema: Arc<SchemaCache<ConfiguredSchema>>,
}

impl QueryEngine {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let source = ConfiguredSchema::new(config.schema_columns.clone());
        let schema = Arc::new(SchemaCache::new(source, config.schema_ttl));
        Self { config, schema }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn translate(&self, request: TranslateRequest) -> Result<TranslateResponse> {
        translate_request(&self.config, &self.schema, request)
    }

    pub fn schema_info(&self) -> Result<SchemaInfo> {
        let snapshot = self.schema.snapshot()?;
        Ok(SchemaInfo {
            table: self.config.table.clone(),
            defaults: FormDefaults::for_schema(&snapshot),
            columns: snapshot,
        })
    }
}

fn translate_request(
    config: &AppConfig,
    schema: &SchemaCache<ConfiguredSchema>,
    request: TranslateRequest,
) -> Result<TranslateResponse> {
    if request.filters.len() > MAX_FILTERS {
        return Err(ServiceError::validation(format!(
            "at most {MAX_FILTERS} filters are allowed"
        )));
    }

    let snapshot = schema.snapshot()?;

    let limit = determine_limit(config, &request.mode, request.limit);
    let query = QueryRequest {
        mode: request.mode,
        filters: request.filters,
        limit,
    };

    let compiled = build_query(&config.table, &query, &snapshot)?;
    Ok(TranslateResponse {
        sql: compiled.sql,
        params: compiled.params,
        mode: query.mode.name(),
        limit,
    })
}

fn determine_limit(config: &AppConfig, mode: &QueryMode, candidate: Option<i64>) -> u32 {
    let max = match mode {
        QueryMode::Grouped(_) => config.max_grouped_limit,
        QueryMode::Raw(_) => config.max_raw_limit,
    };
    let limit = candidate
        .unwrap_or(config.default_limit)
        .clamp(1, max.max(1));
    u32::try_from(limit).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranslateRequest {
    #[serde(flatten)]
    pub mode: QueryMode,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranslateResponse {
    pub sql: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub params: Vec<BindParam>,
    pub mode: &'static str,
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchemaInfo {
    pub table: String,
    pub columns: SchemaSnapshot,
    pub defaults: FormDefaults,
}
