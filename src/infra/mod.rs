//! Collaborator capabilities consumed by the runtime: time, logging,
//! key/value storage and resource measurement.

mod clock;
mod logger;
mod resource;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use logger::{LogEntry, Logger, MemoryLogger, TracingLogger};
pub use resource::{FixedProbe, ResourceProbe};
pub use store::{InMemoryStore, Store};
