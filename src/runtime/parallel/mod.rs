//! Parallel fan-out over a pool of runner threads
//!
//! A [`RunnerPool`] owns a fixed set of [`MultiThreadRunner`]s. Collections
//! spread independent bodies ([`ParallelTaskCollection`]) or slices of one
//! data-parallel job ([`DataParallelCollection`]) across it and hand back a
//! single [`CollectionTask`] that completes once every piece has left its
//! runner.
//!
//! [`MultiThreadRunner`]: crate::runtime::runner::MultiThreadRunner

pub mod collection;
pub mod data_parallel;
pub mod pool;

pub use collection::{CollectionTask, ParallelTaskCollection};
pub use data_parallel::{DataParallelCollection, ParallelJob};
pub use pool::RunnerPool;
