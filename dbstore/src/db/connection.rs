//! Database connection handling
//!
//! This module provides the sqlx-backed MySQL implementation of
//! [`ConnectionGateway`].

use async_trait::async_trait;
use futures::TryStreamExt;
use indexmap::IndexMap;
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column as _, Either, Executor, MySql, MySqlPool, Row as _, TypeInfo, ValueRef};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::db::gateway::{ConnectionGateway, DriverType, Params, Row};
use crate::error::{Error, Result};
use crate::schema::dialect::{Dialect, MySqlDialect};
use crate::value::FieldValue;

/// Rewrite `:name` markers to positional `?` placeholders
///
/// Returns the rewritten statement and the marker names in bind order.
/// Markers inside quoted strings and identifiers are left alone, as is the
/// `::` cast operator.
pub fn rewrite_named_params(sql: &str) -> (String, Vec<String>) {
    let mut out = String::with_capacity(sql.len());
    let mut names = Vec::new();
    let mut quote: Option<char> = None;
    let mut chars = sql.chars().peekable();
    let mut prev = '\0';

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
            } else if c == '\\' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            prev = c;
            continue;
        }

        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                out.push(c);
            }
            ':' if prev != ':' && chars.peek().map_or(false, |n| n.is_ascii_alphabetic() || *n == '_') => {
                let mut name = String::new();
                while let Some(&n) = chars.peek() {
                    if n.is_ascii_alphanumeric() || n == '_' {
                        name.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push('?');
                names.push(name);
            }
            _ => out.push(c),
        }
        prev = c;
    }

    (out, names)
}

/// Auto-increment id reported by the most recent statement
///
/// MySQL reports 0 when a statement generated no id; that clears the value
/// so an earlier insert's id is never handed out again.
#[derive(Debug, Default)]
struct LastInsertId(Mutex<Option<u64>>);

impl LastInsertId {
    fn record(&self, id: u64) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = (id != 0).then_some(id);
    }

    fn get(&self) -> Option<u64> {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// MySQL gateway backed by a sqlx connection pool
pub struct MySqlGateway {
    pool: MySqlPool,
    last_insert_id: LastInsertId,
    last_error: Mutex<Option<String>>,
}

impl MySqlGateway {
    /// Connect using the database configuration
    ///
    /// Missing connection parameters are a configuration error; a server that
    /// cannot be reached is a connection error.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        config.validate()?;
        if config.driver != DriverType::MySql {
            return Err(Error::ConnectionError(format!(
                "The {} driver has no built-in transport; supply a ConnectionGateway implementation",
                config.driver
            )));
        }

        let mut settings: IndexMap<String, String> = MySqlDialect
            .connection_defaults(&config.character_set)
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        for (key, value) in &config.options {
            settings.insert(key.clone(), value.clone());
        }

        let mut options = MySqlConnectOptions::new()
            .host(config.host.as_deref().unwrap_or_default())
            .port(config.port())
            .username(config.username.as_deref().unwrap_or_default())
            .password(config.password.as_deref().unwrap_or_default())
            .database(config.database_name());

        if let Some(charset) = settings.get("charset") {
            options = options.charset(charset);
        }
        if settings.get("compress").map_or(false, |v| v == "true") {
            tracing::debug!("Protocol compression is not available in this transport; ignoring");
        }

        let init_statements: Vec<String> = settings
            .get("init_command")
            .map(|command| {
                command
                    .split(';')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let pool = MySqlPoolOptions::new()
            .max_connections(config.pool_size.unwrap_or(10))
            .acquire_timeout(Duration::from_secs(config.timeout_seconds.unwrap_or(30)))
            .after_connect(move |conn, _meta| {
                let init_statements = init_statements.clone();
                Box::pin(async move {
                    for statement in &init_statements {
                        (&mut *conn).execute(statement.as_str()).await?;
                    }
                    Ok(())
                })
            })
            .connect_with(options)
            .await
            .map_err(|e| Error::ConnectionError(format!("{}: {}", config.display_url(), e)))?;

        tracing::info!(url = %config.display_url(), "Connected to database");

        Ok(Self {
            pool,
            last_insert_id: LastInsertId::default(),
            last_error: Mutex::new(None),
        })
    }

    /// Underlying pool
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    fn record_error(&self, sql: &str, error: sqlx::Error) -> Error {
        tracing::error!(sql = sql, error = %error, "Statement failed");
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(error.to_string());
        Error::SqlxError(error)
    }
}

#[async_trait]
impl ConnectionGateway for MySqlGateway {
    async fn query(&self, sql: &str, params: &Params) -> Result<Vec<Row>> {
        let (positional, names) = rewrite_named_params(sql);
        tracing::debug!(sql = sql, params = names.len(), "Running query");

        let mut query = sqlx::query(&positional);
        for name in &names {
            query = bind_value(query, params.get(name).cloned().unwrap_or_default());
        }

        let mut rows = Vec::new();
        let mut stream = query.fetch_many(&self.pool);
        while let Some(item) = stream.try_next().await.map_err(|e| self.record_error(sql, e))? {
            match item {
                Either::Left(done) => self.last_insert_id.record(done.last_insert_id()),
                Either::Right(row) => rows.push(decode_row(&row)),
            }
        }
        Ok(rows)
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        tracing::debug!(sql = sql, "Executing statement");
        let done = self
            .pool
            .execute(sql)
            .await
            .map_err(|e| self.record_error(sql, e))?;
        self.last_insert_id.record(done.last_insert_id());
        Ok(done.rows_affected())
    }

    fn last_insert_id(&self, _sequence: Option<&str>) -> Option<String> {
        self.last_insert_id.get().map(|id| id.to_string())
    }

    fn driver_type(&self) -> DriverType {
        DriverType::MySql
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

fn bind_value(query: Query<'_, MySql, MySqlArguments>, value: FieldValue) -> Query<'_, MySql, MySqlArguments> {
    match value {
        FieldValue::Null => query.bind(None::<String>),
        FieldValue::Bool(b) => query.bind(b),
        FieldValue::Int(i) => query.bind(i),
        FieldValue::Float(f) => query.bind(f),
        FieldValue::Text(s) => query.bind(s),
        FieldValue::DateTime(dt) => query.bind(dt),
    }
}

fn decode_row(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .map(|column| {
            let index = column.ordinal();
            let type_name = column.type_info().name().to_uppercase();
            (column.name().to_string(), decode_value(row, index, &type_name))
        })
        .collect()
}

fn decode_value(row: &MySqlRow, index: usize, type_name: &str) -> FieldValue {
    match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return FieldValue::Null,
        Ok(_) => {}
        Err(_) => return FieldValue::Null,
    }

    let decoded = match type_name {
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "BOOLEAN" => {
            row.try_get::<i64, _>(index).map(FieldValue::Int).ok()
        }
        t if t.ends_with("UNSIGNED") => row
            .try_get::<u64, _>(index)
            .ok()
            .map(|v| i64::try_from(v).map_or_else(|_| FieldValue::Text(v.to_string()), FieldValue::Int)),
        "FLOAT" => row.try_get::<f32, _>(index).map(|f| FieldValue::Float(f64::from(f))).ok(),
        "DOUBLE" => row.try_get::<f64, _>(index).map(FieldValue::Float).ok(),
        "DATETIME" | "TIMESTAMP" => row
            .try_get::<chrono::NaiveDateTime, _>(index)
            .map(FieldValue::DateTime)
            .ok(),
        "DATE" => row
            .try_get::<chrono::NaiveDate, _>(index)
            .map(|d| FieldValue::Text(d.format("%Y-%m-%d").to_string()))
            .ok(),
        "TIME" => row
            .try_get::<chrono::NaiveTime, _>(index)
            .map(|t| FieldValue::Text(t.format("%H:%M:%S").to_string()))
            .ok(),
        "YEAR" => row.try_get_unchecked::<i64, _>(index).map(FieldValue::Int).ok(),
        "BIT" => row
            .try_get_unchecked::<Vec<u8>, _>(index)
            .map(|bytes| FieldValue::Int(bytes.iter().fold(0i64, |acc, b| (acc << 8) | i64::from(*b))))
            .ok(),
        _ => None,
    };

    decoded
        .or_else(|| row.try_get_unchecked::<String, _>(index).map(FieldValue::Text).ok())
        .or_else(|| {
            row.try_get_unchecked::<Vec<u8>, _>(index)
                .map(|bytes| FieldValue::Text(String::from_utf8_lossy(&bytes).into_owned()))
                .ok()
        })
        .unwrap_or_else(|| {
            tracing::warn!(column = index, type_name = type_name, "Could not decode column value");
            FieldValue::Null
        })
}
