//! Scheduler unit tests
//!
//! Registry bookkeeping, lifecycle flag transitions, and tick-level
//! behaviour of the scheduling engine.

mod flushing;
mod registry;
