use async_trait::async_trait;

use crate::clock::{Clock, Cutoff};
use crate::EngineError;

/// What one batch reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// More work remains.
    More,
    /// Nothing left to do.
    Finished,
}

/// A bounded batch of work, invoked repeatedly by [`run_until_cutoff`].
#[async_trait]
pub trait UnitOfWork: Send {
    async fn run_batch(&mut self) -> Result<BatchStatus, EngineError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Finished,
    Cutoff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    /// Number of `run_batch` invocations, including the one that reported
    /// `Finished`.
    pub batches: u64,
    pub stopped: StopReason,
}

/// Run `unit` batch by batch until it reports `Finished` or the cutoff
/// expires. The cutoff is checked only between batches; an in-flight batch
/// always runs to completion. Errors from `unit` propagate to the caller.
pub async fn run_until_cutoff<U: UnitOfWork>(
    clock: &dyn Clock,
    cutoff: Cutoff,
    unit: &mut U,
) -> Result<CycleStats, EngineError> {
    let mut batches = 0u64;
    loop {
        if cutoff.expired(clock) {
            return Ok(CycleStats {
                batches,
                stopped: StopReason::Cutoff,
            });
        }
        let status = unit.run_batch().await?;
        batches += 1;
        if status == BatchStatus::Finished {
            return Ok(CycleStats {
                batches,
                stopped: StopReason::Finished,
            });
        }
    }
}
