//! Asynchronous, priority-ordered metadata refresh scheduling.

pub mod scheduler;

pub use scheduler::{ItemRefresher, RefreshListener, RefreshScheduler};
