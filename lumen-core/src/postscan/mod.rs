//! Post-scan consistency passes: aggregate validators and dead-item
//! sweeping, run once after a full library traversal.

pub mod collections;
pub mod dead_items;
pub mod names;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

pub use collections::CollectionsValidator;
pub use dead_items::DeadItemsValidator;
pub use names::{ArtistsValidator, GenresValidator, StudiosValidator};

/// Progress sink handed to long-running passes. Reports are percentages in
/// `0..=100`.
#[derive(Clone)]
pub struct Progress(Arc<dyn Fn(f64) + Send + Sync>);

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress").finish()
    }
}

impl Progress {
    pub fn new(report: impl Fn(f64) + Send + Sync + 'static) -> Self {
        Self(Arc::new(report))
    }

    pub fn noop() -> Self {
        Self(Arc::new(|_| {}))
    }

    pub fn report(&self, percent: f64) {
        (self.0)(percent.clamp(0.0, 100.0));
    }

    /// A derived sink that maps `0..=100` onto the `start..=end` slot of
    /// this one. Used to rescale each post-scan task's progress into its
    /// slice of the overall range.
    pub fn rescaled(&self, start: f64, end: f64) -> Progress {
        let inner = Arc::clone(&self.0);
        let span = end - start;
        Progress(Arc::new(move |p: f64| {
            inner(start + span * (p.clamp(0.0, 100.0) / 100.0));
        }))
    }
}

/// A consistency pass run after a full filesystem traversal completes.
#[async_trait]
pub trait PostScanTask: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, progress: &Progress, token: &CancellationToken)
        -> Result<()>;
}
