//! Offline action queue.
//!
//! Captures user actions while the device is offline and replays them once
//! connectivity returns:
//! - Durable, ordered queue persisted after every mutation
//! - Handler registry keyed by action type
//! - Single-flight drains with exponential backoff
//! - Manual retry and removal of failed actions

pub mod action;
pub mod connectivity;
pub mod offline;
pub mod processor;
pub mod registry;
pub mod scheduler;
pub mod store;

pub use action::{ActionStatus, QueuedAction};
pub use connectivity::{Connectivity, ConnectivityWatch};
pub use offline::{OfflineQueue, QueueStats};
pub use processor::{AttemptOutcome, DrainReport, DrainStatus, ExecutionResult};
pub use registry::{ActionHandler, HandlerError, HandlerRegistry};
pub use scheduler::{ManualScheduler, Scheduler, TimerHandle, TimerTask, TokioScheduler};
pub use store::QueueStore;
