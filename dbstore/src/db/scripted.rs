//! In-memory gateway
//!
//! [`ScriptedGateway`] answers queries from scripted rules and records every
//! statement it is handed. It backs the test suite and lets callers plan
//! changes without touching a live server.

use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};

use crate::db::gateway::{ConnectionGateway, DriverType, Params, Row};
use crate::error::{Error, Result};

/// A statement seen by the gateway
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedStatement {
    pub sql: String,
    pub params: Params,
    /// `true` for `execute`, `false` for `query`
    pub executed: bool,
}

enum Reply {
    Rows(Vec<Row>),
    Fail(String),
}

struct Rule {
    pattern: String,
    reply: Reply,
}

#[derive(Default)]
struct State {
    rules: Vec<Rule>,
    log: Vec<LoggedStatement>,
    last_insert_id: Option<String>,
    last_error: Option<String>,
}

/// Gateway that replays scripted rows
pub struct ScriptedGateway {
    driver: DriverType,
    state: Mutex<State>,
}

impl ScriptedGateway {
    pub fn new(driver: DriverType) -> Self {
        Self {
            driver,
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer statements containing `pattern` with `rows`
    ///
    /// Rules added later take precedence over earlier ones.
    pub fn on_query(&self, pattern: &str, rows: Vec<Row>) {
        self.state().rules.push(Rule {
            pattern: pattern.to_string(),
            reply: Reply::Rows(rows),
        });
    }

    /// Fail statements containing `pattern` with `message`
    pub fn fail_on(&self, pattern: &str, message: &str) {
        self.state().rules.push(Rule {
            pattern: pattern.to_string(),
            reply: Reply::Fail(message.to_string()),
        });
    }

    pub fn set_last_insert_id(&self, id: Option<&str>) {
        self.state().last_insert_id = id.map(str::to_string);
    }

    /// Every statement in the order it was received
    pub fn log(&self) -> Vec<LoggedStatement> {
        self.state().log.clone()
    }

    /// SQL text of statements run through `execute`
    pub fn executed(&self) -> Vec<String> {
        self.state()
            .log
            .iter()
            .filter(|s| s.executed)
            .map(|s| s.sql.clone())
            .collect()
    }

    /// Statements run through `query`
    pub fn queries(&self) -> Vec<LoggedStatement> {
        self.state().log.iter().filter(|s| !s.executed).cloned().collect()
    }

    pub fn clear_log(&self) {
        self.state().log.clear();
    }

    fn reply(&self, sql: &str, params: &Params, executed: bool) -> Result<Vec<Row>> {
        let mut state = self.state();
        state.log.push(LoggedStatement {
            sql: sql.to_string(),
            params: params.clone(),
            executed,
        });

        let outcome = match state.rules.iter().rev().find(|rule| sql.contains(&rule.pattern)) {
            Some(Rule {
                reply: Reply::Fail(message),
                ..
            }) => Err(message.clone()),
            Some(Rule {
                reply: Reply::Rows(rows),
                ..
            }) => Ok(rows.clone()),
            None => Ok(Vec::new()),
        };

        match outcome {
            Ok(rows) => Ok(rows),
            Err(message) => {
                state.last_error = Some(message.clone());
                Err(Error::DatabaseError(message))
            }
        }
    }
}

#[async_trait]
impl ConnectionGateway for ScriptedGateway {
    async fn query(&self, sql: &str, params: &Params) -> Result<Vec<Row>> {
        tracing::debug!(sql = sql, "Scripted query");
        self.reply(sql, params, false)
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        tracing::debug!(sql = sql, "Scripted execute");
        self.reply(sql, &Params::new(), true).map(|rows| rows.len().max(1) as u64)
    }

    fn last_insert_id(&self, _sequence: Option<&str>) -> Option<String> {
        self.state().last_insert_id.clone()
    }

    fn driver_type(&self) -> DriverType {
        self.driver
    }

    fn last_error(&self) -> Option<String> {
        self.state().last_error.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FieldValue;

    fn row(value: i64) -> Row {
        let mut row = Row::new();
        row.insert("n".to_string(), FieldValue::Int(value));
        row
    }

    #[tokio::test]
    async fn latest_matching_rule_wins() {
        let gateway = ScriptedGateway::new(DriverType::MySql);
        gateway.on_query("FROM t", vec![row(1)]);
        gateway.on_query("FROM t WHERE", vec![row(2), row(3)]);

        let rows = gateway.query("SELECT n FROM t WHERE id=:id", &Params::new()).await.unwrap();
        assert_eq!(rows.len(), 2);
        let rows = gateway.query("SELECT n FROM t", &Params::new()).await.unwrap();
        assert_eq!(rows, vec![row(1)]);
        let rows = gateway.query("SELECT 1", &Params::new()).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn failures_are_remembered() {
        let gateway = ScriptedGateway::new(DriverType::SqlSrv);
        gateway.fail_on("DROP", "permission denied");

        assert!(gateway.execute("DROP TABLE t").await.is_err());
        assert_eq!(gateway.last_error().as_deref(), Some("permission denied"));
        assert_eq!(gateway.executed(), vec!["DROP TABLE t".to_string()]);
        assert!(gateway.driver_type().is_tds());
    }
}
