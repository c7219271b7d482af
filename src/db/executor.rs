//! Statement execution.
//!
//! This module runs one planned statement on a leased connection with:
//! - a statement timeout from the instance configuration
//! - an external cancellation signal
//! - row limits enforced on the stream, never by fetching everything
//!
//! A connection whose last statement timed out, was cancelled or lost its
//! socket is discarded rather than returned to the cache.

use crate::db::registry::ConnectionLease;
use crate::db::sql::{Plan, StatementKind};
use crate::error::{DbError, DbResult};
use crate::models::{InstanceConfig, OperationOutput, OperationResult, QueryParam};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Runs planned statements against leased connections.
#[derive(Debug, Clone, Copy)]
pub struct QueryExecutor {
    statement_timeout: Duration,
    max_rows: usize,
}

impl QueryExecutor {
    pub fn for_instance(instance: &InstanceConfig) -> Self {
        Self {
            statement_timeout: instance.statement_timeout,
            max_rows: instance.max_rows,
        }
    }

    /// Run the plan's statement and return its bounded output.
    pub async fn run(
        &self,
        plan: &Plan,
        lease: &mut ConnectionLease,
        cancel: &CancellationToken,
    ) -> DbResult<OperationOutput> {
        let start = Instant::now();
        let statement = &plan.statement;

        debug!(
            sql = %statement.sql,
            param_types = ?statement
                .params
                .iter()
                .map(QueryParam::type_name)
                .collect::<Vec<_>>(),
            timeout_secs = self.statement_timeout.as_secs(),
            "Executing statement"
        );

        let result = {
            let conn = lease.connection()?;
            let work = async {
                match statement.kind {
                    StatementKind::Rows => conn
                        .fetch(&statement.sql, &statement.params, self.max_rows + 1)
                        .await
                        .map(|rows| OperationOutput::Rows(OperationResult::bounded(rows, self.max_rows))),
                    StatementKind::Command => conn
                        .execute(&statement.sql, &statement.params)
                        .await
                        .map(|rows_affected| OperationOutput::Affected { rows_affected }),
                }
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(DbError::cancelled(plan.title.clone())),
                outcome = timeout(self.statement_timeout, work) => match outcome {
                    Ok(result) => result,
                    Err(_) => Err(DbError::timeout(
                        plan.title.clone(),
                        self.statement_timeout.as_secs(),
                    )),
                },
            }
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(OperationOutput::Rows(rows)) => {
                if rows.truncated {
                    warn!(
                        max_rows = self.max_rows,
                        elapsed_ms, "Result truncated at row limit"
                    );
                } else {
                    debug!(rows = rows.row_count_total, elapsed_ms, "Statement returned rows");
                }
            }
            Ok(OperationOutput::Affected { rows_affected }) => {
                debug!(rows_affected, elapsed_ms, "Statement executed");
            }
            Err(e) if e.poisons_connection() => {
                lease.discard();
            }
            Err(_) => {}
        }
        result
    }
}
