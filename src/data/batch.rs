//! Transactional batch execution with failure logging.

use crate::utils::log_if_slow;
use sqlx::PgPool;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query;
use std::time::{Duration, Instant};
use tracing::{debug, error};

pub type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

const SLOW_BATCH: Duration = Duration::from_secs(5);

/// Run `statement` inside one transaction, preceded by `before` if given.
///
/// Returns the rows affected by both statements, or `None` if the transaction
/// was rolled back. Failures are logged with `params` so the batch can be
/// identified; they never abort the run.
pub async fn execute_batch<'q>(
    pool: &PgPool,
    label: &str,
    params: &str,
    before: Option<PgQuery<'q>>,
    statement: PgQuery<'q>,
) -> Option<u64> {
    let start = Instant::now();
    let result = run(pool, before, statement).await;
    log_if_slow(start, SLOW_BATCH, label);

    match result {
        Ok(affected) => {
            debug!(batch = label, affected, "Batch committed");
            Some(affected)
        }
        Err(e) => {
            error!(batch = label, params, error = %e, "Batch rolled back");
            None
        }
    }
}

async fn run<'q>(
    pool: &PgPool,
    before: Option<PgQuery<'q>>,
    statement: PgQuery<'q>,
) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut affected = 0;
    if let Some(before) = before {
        affected += before.execute(&mut *tx).await?.rows_affected();
    }
    affected += statement.execute(&mut *tx).await?.rows_affected();
    tx.commit().await?;
    Ok(affected)
}

/// Compact description of a batch's key column for error logs.
pub fn describe_ids(ids: &[i32]) -> String {
    const SHOWN: usize = 10;
    if ids.len() <= SHOWN {
        format!("{ids:?}")
    } else {
        format!("{:?} and {} more", &ids[..SHOWN], ids.len() - SHOWN)
    }
}
