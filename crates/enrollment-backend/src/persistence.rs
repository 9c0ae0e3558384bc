use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::auth::{error_from, parse_success};
use crate::config::BackendConfig;
use crate::error::{BackendError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Equality filters plus an optional ordering, as understood by the table API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Option<(String, Direction)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    pub fn order(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order = Some((column.into(), direction));
        self
    }

    fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(
            self.filters
                .iter()
                .map(|filter| (filter.column.clone(), format!("eq.{}", filter.value))),
        );
        if let Some((column, direction)) = &self.order {
            let suffix = match direction {
                Direction::Ascending => "asc",
                Direction::Descending => "desc",
            };
            params.push(("order".to_string(), format!("{column}.{suffix}")));
        }
        params
    }
}

/// Row storage used by submission and the dashboard.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn insert_one(&self, table: &str, row: Value) -> Result<()>;

    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>>;
}

/// Table client speaking the PostgREST dialect under `/rest/v1`.
#[derive(Debug, Clone)]
pub struct RestPersistence {
    http: reqwest::Client,
    config: BackendConfig,
    access_token: Option<String>,
}

impl RestPersistence {
    pub fn new(config: BackendConfig) -> Self {
        Self::with_http(reqwest::Client::new(), config)
    }

    pub fn with_http(http: reqwest::Client, config: BackendConfig) -> Self {
        Self {
            http,
            config,
            access_token: None,
        }
    }

    /// Acts on behalf of a signed-in user instead of the anonymous role.
    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token;
        self
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.config.anon_key);
        builder
            .header("apikey", &self.config.anon_key)
            .bearer_auth(bearer)
    }
}

#[async_trait]
impl Persistence for RestPersistence {
    async fn insert_one(&self, table: &str, row: Value) -> Result<()> {
        debug!(table, "inserting row");
        let response = self
            .request(self.http.post(self.config.rest_url(table)))
            .header("Prefer", "return=minimal")
            .json(&row)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from(response).await);
        }
        info!(table, "row inserted");
        Ok(())
    }

    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>> {
        debug!(table, ?query, "selecting rows");
        let response = self
            .request(self.http.get(self.config.rest_url(table)))
            .query(&query.to_params())
            .send()
            .await?;
        parse_success(response).await
    }
}

/// Process-local table store for tests and offline runs.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    tables: RwLock<BTreeMap<String, Vec<Value>>>,
    failure: Option<String>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(table: &str, rows: Vec<Value>) -> Self {
        let mut tables = BTreeMap::new();
        tables.insert(table.to_string(), rows);
        Self {
            tables: RwLock::new(tables),
            failure: None,
        }
    }

    /// Every call fails with `message`, as a rejecting server would.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .read()
            .map(|tables| tables.get(table).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    fn check_failure(&self) -> Result<()> {
        match &self.failure {
            Some(message) => Err(BackendError::api(500, message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Persistence for MemoryPersistence {
    async fn insert_one(&self, table: &str, row: Value) -> Result<()> {
        self.check_failure()?;
        let mut tables = self
            .tables
            .write()
            .map_err(|err| BackendError::Storage(format!("lock poisoned: {err}")))?;
        let rows = tables.entry(table.to_string()).or_default();
        let mut object: Map<String, Value> = match row {
            Value::Object(object) => object,
            other => {
                return Err(BackendError::api(
                    400,
                    format!("expected a JSON object row, got {other}"),
                ));
            }
        };
        object
            .entry("id")
            .or_insert_with(|| Value::String(format!("row-{}", rows.len() + 1)));
        rows.push(Value::Object(object));
        Ok(())
    }

    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>> {
        self.check_failure()?;
        let mut rows: Vec<Value> = self
            .rows(table)
            .into_iter()
            .filter(|row| {
                query
                    .filters
                    .iter()
                    .all(|filter| column_text(row, &filter.column) == Some(filter.value.clone()))
            })
            .collect();
        if let Some((column, direction)) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = column_text(a, column).cmp(&column_text(b, column));
                match direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }
        Ok(rows)
    }
}

fn column_text(row: &Value, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}
