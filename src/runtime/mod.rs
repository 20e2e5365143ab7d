//! Runtime system
//!
//! The scheduling engine, the runners that drive it, and fan-out over a pool
//! of runner threads.

pub mod parallel;
pub mod runner;
pub mod scheduler;
