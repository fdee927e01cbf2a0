use model::core::{category::Category, identifiers::WorkerId};
use std::fmt;

/// Identity of one worker within a category run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerKey {
    category: Category,
    worker_id: WorkerId,
}

impl WorkerKey {
    pub fn new(category: Category, worker_id: WorkerId) -> Self {
        Self {
            category,
            worker_id,
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    /// Name of the mutual-exclusion lock guarding this worker's wakes.
    pub fn lock_name(&self) -> String {
        format!("{}:worker-{}", self.category.slug(), self.worker_id)
    }
}

impl fmt::Display for WorkerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} worker {}", self.category, self.worker_id)
    }
}
