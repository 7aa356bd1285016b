pub mod clock;
pub mod dispatcher;
mod errors;
pub mod handler;
pub mod worker;

pub use clock::{Clock, Cutoff, ManualClock, SystemClock};
pub use dispatcher::{CycleAction, CycleReport, HandlerRegistry, QueueRunner};
pub use errors::EngineError;
pub use handler::{QueueHandler, Step};
pub use worker::{run_until_cutoff, BatchStatus, CycleStats, StopReason, UnitOfWork};
