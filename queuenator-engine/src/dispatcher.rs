use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use log::{error, warn};
use queuenator_models::core::{NewQueueEntry, Progress, QueueEntry};
use queuenator_store::QueueStore;
use uuid::Uuid;

use crate::clock::{Clock, Cutoff};
use crate::handler::{QueueHandler, Step};
use crate::worker::{run_until_cutoff, BatchStatus, StopReason, UnitOfWork};
use crate::EngineError;

/// Startup-time table mapping `(app, key)` to a handler.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<(String, String), Arc<dyn QueueHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, app: &str, key: &str, handler: Arc<dyn QueueHandler>) {
        self.handlers
            .insert((app.to_string(), key.to_string()), handler);
    }

    pub fn resolve(&self, app: &str, key: &str) -> Option<Arc<dyn QueueHandler>> {
        self.handlers
            .get(&(app.to_string(), key.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// What happened to one queue entry during a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleAction {
    /// Handler processed a batch; offset persisted.
    Advanced { id: i64, offset: i64 },
    /// Handler reported completion; entry deleted.
    Drained { id: i64 },
    /// No handler registered for the entry's key; entry left untouched.
    Skipped { id: i64 },
    /// Another runner holds the lease.
    Contended { id: i64 },
    /// Handler failed; claim released, offset left at its last persisted
    /// value for the next scheduled run.
    Failed { id: i64, message: String },
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub actions: Vec<CycleAction>,
    pub hit_cutoff: bool,
}

impl CycleReport {
    pub fn advanced(&self) -> usize {
        self.matching(|a| matches!(a, CycleAction::Advanced { .. }))
    }

    pub fn drained(&self) -> usize {
        self.matching(|a| matches!(a, CycleAction::Drained { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.matching(|a| matches!(a, CycleAction::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.matching(|a| matches!(a, CycleAction::Failed { .. }))
    }

    /// Batches that did real work (advanced or drained an entry).
    pub fn processed(&self) -> usize {
        self.advanced() + self.drained()
    }

    fn matching(&self, pred: impl Fn(&CycleAction) -> bool) -> usize {
        self.actions.iter().filter(|a| pred(a)).count()
    }
}

/// Claims due queue entries, dispatches them to their handlers and persists
/// the resulting offsets, one bounded batch at a time.
pub struct QueueRunner {
    store: Arc<dyn QueueStore>,
    registry: Arc<HandlerRegistry>,
    clock: Arc<dyn Clock>,
    runner_id: Uuid,
    lease: Duration,
    fetch_limit: u32,
}

impl QueueRunner {
    pub fn new(
        store: Arc<dyn QueueStore>,
        registry: Arc<HandlerRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            registry,
            clock,
            runner_id: Uuid::new_v4(),
            lease: Duration::seconds(300),
            fetch_limit: 50,
        }
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    pub fn with_fetch_limit(mut self, limit: u32) -> Self {
        self.fetch_limit = limit;
        self
    }

    pub fn runner_id(&self) -> Uuid {
        self.runner_id
    }

    /// Normalize and insert a queue entry. Returns the new entry id, or
    /// `None` when the handler's `pre_queue` decided there is nothing to do.
    /// Entries whose handler is not currently registered are stored as-is;
    /// they wait until the handler comes back.
    pub async fn enqueue(&self, mut entry: NewQueueEntry) -> Result<Option<i64>, EngineError> {
        if let Some(handler) = self.registry.resolve(&entry.app, &entry.key) {
            match handler.pre_queue(entry.data) {
                Some(normalized) => entry.data = normalized,
                None => return Ok(None),
            }
        }
        let id = self.store.insert(entry).await?;
        Ok(Some(id))
    }

    pub async fn pending(&self) -> Result<u64, EngineError> {
        Ok(self.store.count().await?)
    }

    pub fn progress_for(&self, entry: &QueueEntry) -> Option<Progress> {
        self.registry
            .resolve(&entry.app, &entry.key)
            .map(|handler| handler.progress(&entry.data, entry.offset))
    }

    /// One processing cycle: dispatch due entries batch by batch until the
    /// queue has nothing left for this runner or the cutoff expires.
    pub async fn run_cycle(&self, cutoff: Cutoff) -> Result<CycleReport, EngineError> {
        let mut sweep = Sweep {
            runner: self,
            report: CycleReport::default(),
            set_aside: HashSet::new(),
        };
        let stats = run_until_cutoff(&*self.clock, cutoff, &mut sweep).await?;
        let mut report = sweep.report;
        report.hit_cutoff = stats.stopped == StopReason::Cutoff;
        Ok(report)
    }

    async fn process_entry(&self, entry: &QueueEntry) -> Result<CycleAction, EngineError> {
        let Some(handler) = self.registry.resolve(&entry.app, &entry.key) else {
            warn!(
                "no handler registered for {}/{}, skipping entry {} this cycle",
                entry.app, entry.key, entry.id
            );
            return Ok(CycleAction::Skipped { id: entry.id });
        };

        let now = self.clock.now();
        if !self
            .store
            .claim(entry.id, self.runner_id, now + self.lease, now)
            .await?
        {
            return Ok(CycleAction::Contended { id: entry.id });
        }

        match handler.run(&entry.data, entry.offset).await {
            Ok(Step::Processed(offset)) => {
                self.store.update_offset(entry.id, offset).await?;
                self.store.release(entry.id, self.runner_id).await?;
                Ok(CycleAction::Advanced {
                    id: entry.id,
                    offset,
                })
            }
            Ok(Step::Done) => {
                self.store.delete(entry.id).await?;
                Ok(CycleAction::Drained { id: entry.id })
            }
            Err(err) => {
                error!(
                    "queue handler {}/{} failed on entry {}: {}",
                    entry.app, entry.key, entry.id, err
                );
                self.store.release(entry.id, self.runner_id).await?;
                Ok(CycleAction::Failed {
                    id: entry.id,
                    message: err.to_string(),
                })
            }
        }
    }
}

/// One cycle's sweep over the queue. Each batch dispatches a single entry;
/// entries that were skipped, contended or failed are set aside so the sweep
/// cannot spin on them.
struct Sweep<'a> {
    runner: &'a QueueRunner,
    report: CycleReport,
    set_aside: HashSet<i64>,
}

#[async_trait]
impl UnitOfWork for Sweep<'_> {
    async fn run_batch(&mut self) -> Result<BatchStatus, EngineError> {
        let now = self.runner.clock.now();
        let due = self
            .runner
            .store
            .fetch_due(now, self.runner.fetch_limit)
            .await?;
        let entry = due
            .into_iter()
            .find(|entry| !self.set_aside.contains(&entry.id));
        let Some(entry) = entry else {
            return Ok(BatchStatus::Finished);
        };

        let action = self.runner.process_entry(&entry).await?;
        match action {
            CycleAction::Skipped { id }
            | CycleAction::Contended { id }
            | CycleAction::Failed { id, .. } => {
                self.set_aside.insert(id);
            }
            CycleAction::Advanced { .. } | CycleAction::Drained { .. } => {}
        }
        self.report.actions.push(action);
        Ok(BatchStatus::More)
    }
}
