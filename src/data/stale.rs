//! Mark / assert / sweep reconciliation of "current set" tables.
//!
//! A target table carries a `stale` flag. One run first marks every row in
//! scope stale, then asserts the rows observed this run (inserting them or
//! clearing their flag), and finally deletes whatever is still stale. Mark and
//! assert share one transaction; the sweep only runs once that transaction has
//! committed, so a failed assert never deletes anything.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use std::fmt;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pending,
    Marked,
    Asserted,
    Swept,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Mark,
    Assert,
    Sweep,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Mark => "mark",
            Step::Assert => "assert",
            Step::Sweep => "sweep",
        })
    }
}

impl Phase {
    /// Transition table; assert may repeat, nothing else may.
    pub fn advance(self, step: Step) -> Result<Phase, ReconcileError> {
        match (self, step) {
            (Phase::Pending, Step::Mark) => Ok(Phase::Marked),
            (Phase::Marked | Phase::Asserted, Step::Assert) => Ok(Phase::Asserted),
            (Phase::Asserted, Step::Sweep) => Ok(Phase::Swept),
            (phase, step) => Err(ReconcileError::OutOfOrder { step, phase }),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("cannot {step} while {phase:?}")]
    OutOfOrder { step: Step, phase: Phase },
    #[error("database error during {step}: {source}")]
    Database {
        step: Step,
        #[source]
        source: sqlx::Error,
    },
}

/// A table reconciled with the stale-flag protocol.
#[async_trait]
pub trait StaleTarget: Send + Sync {
    type Row: Send + Sync;

    fn label(&self) -> &'static str;

    async fn mark(&self, conn: &mut PgConnection) -> Result<u64, sqlx::Error>;

    async fn assert(&self, conn: &mut PgConnection, rows: &[Self::Row])
    -> Result<u64, sqlx::Error>;

    async fn sweep(&self, pool: &PgPool) -> Result<u64, sqlx::Error>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepCounts {
    pub marked: u64,
    pub asserted: u64,
    pub swept: u64,
}

/// One reconciliation pass over a [`StaleTarget`], enforcing step order.
pub struct StaleSweep<T: StaleTarget> {
    target: T,
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
    phase: Phase,
    counts: SweepCounts,
}

impl<T: StaleTarget> StaleSweep<T> {
    pub fn new(pool: PgPool, target: T) -> Self {
        Self {
            target,
            pool,
            tx: None,
            phase: Phase::Pending,
            counts: SweepCounts::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn enter(&mut self, step: Step) -> Result<(), ReconcileError> {
        self.phase = self.phase.advance(step)?;
        Ok(())
    }

    fn fail(&mut self, step: Step, source: sqlx::Error) -> ReconcileError {
        self.phase = Phase::Failed;
        self.tx = None;
        ReconcileError::Database { step, source }
    }

    pub async fn mark(&mut self) -> Result<u64, ReconcileError> {
        self.enter(Step::Mark)?;
        let mut tx = match self.pool.begin().await {
            Ok(tx) => tx,
            Err(e) => return Err(self.fail(Step::Mark, e)),
        };
        match self.target.mark(&mut tx).await {
            Ok(marked) => {
                self.tx = Some(tx);
                self.counts.marked = marked;
                Ok(marked)
            }
            Err(e) => Err(self.fail(Step::Mark, e)),
        }
    }

    pub async fn assert(&mut self, rows: &[T::Row]) -> Result<u64, ReconcileError> {
        self.enter(Step::Assert)?;
        let Some(tx) = self.tx.as_mut() else {
            return Err(ReconcileError::OutOfOrder {
                step: Step::Assert,
                phase: Phase::Failed,
            });
        };
        match self.target.assert(tx, rows).await {
            Ok(asserted) => {
                self.counts.asserted += asserted;
                Ok(asserted)
            }
            Err(e) => Err(self.fail(Step::Assert, e)),
        }
    }

    /// Commit the mark/assert transaction, then delete rows left stale.
    pub async fn sweep(mut self) -> Result<SweepCounts, ReconcileError> {
        self.enter(Step::Sweep)?;
        let Some(tx) = self.tx.take() else {
            return Err(ReconcileError::OutOfOrder {
                step: Step::Sweep,
                phase: Phase::Failed,
            });
        };
        if let Err(e) = tx.commit().await {
            return Err(self.fail(Step::Sweep, e));
        }
        match self.target.sweep(&self.pool).await {
            Ok(swept) => {
                self.counts.swept = swept;
                Ok(self.counts)
            }
            Err(e) => Err(self.fail(Step::Sweep, e)),
        }
    }
}

/// Run a full mark, assert, sweep pass.
pub async fn reconcile<T: StaleTarget>(
    pool: &PgPool,
    target: T,
    rows: &[T::Row],
) -> Result<SweepCounts, ReconcileError> {
    let label = target.label();
    let mut sweep = StaleSweep::new(pool.clone(), target);
    sweep.mark().await?;
    sweep.assert(rows).await?;
    let counts = sweep.sweep().await?;
    debug!(
        table = label,
        marked = counts.marked,
        asserted = counts.asserted,
        swept = counts.swept,
        "Stale sweep complete"
    );
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        let phase = Phase::Pending.advance(Step::Mark).unwrap();
        assert_eq!(phase, Phase::Marked);
        let phase = phase.advance(Step::Assert).unwrap();
        let phase = phase.advance(Step::Assert).unwrap();
        assert_eq!(phase, Phase::Asserted);
        assert_eq!(phase.advance(Step::Sweep).unwrap(), Phase::Swept);
    }

    #[test]
    fn sweep_without_assert_is_rejected() {
        let err = Phase::Marked.advance(Step::Sweep).unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::OutOfOrder {
                step: Step::Sweep,
                phase: Phase::Marked
            }
        ));
    }

    #[test]
    fn assert_before_mark_is_rejected() {
        assert!(Phase::Pending.advance(Step::Assert).is_err());
    }

    #[test]
    fn nothing_follows_a_failure_or_a_sweep() {
        for step in [Step::Mark, Step::Assert, Step::Sweep] {
            assert!(Phase::Failed.advance(step).is_err());
            assert!(Phase::Swept.advance(step).is_err());
        }
    }

    #[test]
    fn error_message_names_step_and_phase() {
        let err = Phase::Pending.advance(Step::Sweep).unwrap_err();
        assert_eq!(err.to_string(), "cannot sweep while Pending");
    }
}
