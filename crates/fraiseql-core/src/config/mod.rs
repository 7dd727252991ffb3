//! Engine configuration: the handful of settings that shape compilation
//! (tenancy mode, traversal depth, timeouts) as opposed to connection or
//! server configuration, which live outside this crate.

use serde::{Deserialize, Serialize};

use crate::relationship::RELATION_MAX_DEPTH;

/// Compilation-time configuration for the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Whether the adapter runs in shared-table (multi-tenant) mode.
    pub shared_tables: bool,
    /// Maximum relationship traversal depth.
    pub relation_max_depth: u32,
    /// Default schema name for physical table qualification.
    pub default_schema: String,
    /// Language used for full-text search (`to_tsvector`/`MATCH`).
    pub fulltext_language: String,
    /// Per-statement timeout, in milliseconds; `None` disables the limit.
    pub statement_timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            shared_tables: false,
            relation_max_depth: RELATION_MAX_DEPTH,
            default_schema: "public".to_string(),
            fulltext_language: "english".to_string(),
            statement_timeout_ms: None,
        }
    }
}

impl EngineConfig {
    /// The `SET LOCAL statement_timeout` (Postgres) fragment, if a timeout
    /// is configured.
    #[must_use]
    pub fn postgres_timeout_statement(&self) -> Option<String> {
        self.statement_timeout_ms.map(|ms| format!("SET LOCAL statement_timeout = {ms}"))
    }

    /// The `SET STATEMENT max_statement_time = {s} FOR {sql}` (MySQL)
    /// wrapper, if a timeout is configured.
    #[must_use]
    pub fn mysql_timeout_wrap(&self, sql: &str) -> Option<String> {
        self.statement_timeout_ms.map(|ms| {
            let seconds = ms.div_ceil(1000);
            format!("SET STATEMENT max_statement_time = {seconds} FOR {sql}")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let config = EngineConfig::default();
        assert!(!config.shared_tables);
        assert_eq!(config.relation_max_depth, 3);
        assert_eq!(config.default_schema, "public");
    }

    #[test]
    fn postgres_timeout_statement_only_when_configured() {
        let mut config = EngineConfig::default();
        assert!(config.postgres_timeout_statement().is_none());
        config.statement_timeout_ms = Some(5000);
        assert_eq!(config.postgres_timeout_statement().unwrap(), "SET LOCAL statement_timeout = 5000");
    }

    #[test]
    fn mysql_timeout_wrap_rounds_up_to_seconds() {
        let config = EngineConfig { statement_timeout_ms: Some(1500), ..EngineConfig::default() };
        assert_eq!(
            config.mysql_timeout_wrap("SELECT 1").unwrap(),
            "SET STATEMENT max_statement_time = 2 FOR SELECT 1"
        );
    }
}
