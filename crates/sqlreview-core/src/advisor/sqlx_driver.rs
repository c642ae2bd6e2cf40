//! `QueryDriver` backed by a live sqlx connection pool.

use super::driver::QueryDriver;
use crate::error::DriverError;
use sqlx::any::AnyRow;
use sqlx::{AnyPool, Column, Row};
use tokio::runtime::Runtime;
#[cfg(feature = "tracing")]
use tracing::debug;

/// Runs `EXPLAIN` through an `AnyPool` on a private runtime.
pub struct SqlxQueryDriver {
    runtime: Runtime,
    pool: AnyPool,
}

impl SqlxQueryDriver {
    /// Connects to a `postgres://`, `mysql://`, `mariadb://`, or `sqlite:` url.
    pub fn connect(url: &str) -> Result<Self, DriverError> {
        if !is_supported_url(url) {
            return Err(DriverError::UnsupportedUrl(redact_url(url)));
        }

        sqlx::any::install_default_drivers();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DriverError::Connection(e.to_string()))?;

        let pool = runtime
            .block_on(AnyPool::connect(&normalize_url(url)))
            .map_err(|e| DriverError::Connection(e.to_string()))?;

        Ok(Self { runtime, pool })
    }
}

impl QueryDriver for SqlxQueryDriver {
    fn explain(&self, statement: &str) -> Result<Vec<String>, DriverError> {
        let sql = format!("EXPLAIN {statement}");
        let rows = self
            .runtime
            .block_on(sqlx::query(&sql).fetch_all(&self.pool))
            .map_err(|e| DriverError::Query(e.to_string()))?;

        #[cfg(feature = "tracing")]
        debug!(rows = rows.len(), "explain returned plan");

        Ok(rows.iter().map(plan_line).collect())
    }
}

/// One plan row as `column=value` pairs; Postgres returns a single text column.
fn plan_line(row: &AnyRow) -> String {
    row.columns()
        .iter()
        .enumerate()
        .filter_map(|(index, column)| {
            cell_text(row, index).map(|value| format!("{}={value}", column.name()))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn cell_text(row: &AnyRow, index: usize) -> Option<String> {
    row.try_get::<String, _>(index)
        .ok()
        .or_else(|| row.try_get::<i64, _>(index).ok().map(|v| v.to_string()))
        .or_else(|| row.try_get::<f64, _>(index).ok().map(|v| v.to_string()))
}

fn is_supported_url(url: &str) -> bool {
    ["postgres://", "postgresql://", "mysql://", "mariadb://", "sqlite:"]
        .iter()
        .any(|prefix| url.starts_with(prefix))
}

/// sqlx only knows the `mysql` scheme.
fn normalize_url(url: &str) -> String {
    match url.strip_prefix("mariadb://") {
        Some(rest) => format!("mysql://{rest}"),
        None => url.to_string(),
    }
}

/// Drops credentials before a url lands in an error message.
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
