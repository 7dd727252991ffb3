//! Dialect abstraction (§4.I, §9): one implementation of [`Dialect`] per
//! supported backend, plus the param type and the external boundary
//! traits named in §6.

#[cfg(feature = "mysql")]
pub mod mysql;
pub mod param;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod traits;

pub use param::{Binds, Param};
pub use traits::{Cache, Dialect, RoleProvider, Row, SqlDriver};

#[cfg(feature = "mysql")]
pub use mysql::MySql;
#[cfg(feature = "postgres")]
pub use postgres::Postgres;

/// Truncate a compiled statement to a log-friendly length, the way the
/// teacher's SQL logger bounds query text before emitting a `tracing` event.
const LOG_SQL_MAX_LEN: usize = 200;

#[must_use]
pub fn truncate_for_log(sql: &str) -> std::borrow::Cow<'_, str> {
    if sql.len() <= LOG_SQL_MAX_LEN {
        std::borrow::Cow::Borrowed(sql)
    } else {
        std::borrow::Cow::Owned(format!("{}...", &sql[..LOG_SQL_MAX_LEN]))
    }
}
