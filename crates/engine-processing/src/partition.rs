use crate::error::PartitionError;
use connectors::store::{FileStore, StoreLayout};
use model::{
    core::category::Category,
    execution::outcome::WorkerPartition,
};
use std::{cmp::Ordering, sync::Arc, time::Duration};
use tracing::{debug, info, warn};

/// Orders names with embedded numbers numerically: `file2` < `file10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_cmp_folded(a, b).then_with(|| a.cmp(b))
}

fn natural_cmp_folded(a: &str, b: &str) -> Ordering {
    let (mut a, mut b) = (a, b);
    loop {
        match (a.is_empty(), b.is_empty()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }

        let (chunk_a, rest_a) = split_chunk(a);
        let (chunk_b, rest_b) = split_chunk(b);

        let ord = match (is_digits(chunk_a), is_digits(chunk_b)) {
            (true, true) => {
                let ta = chunk_a.trim_start_matches('0');
                let tb = chunk_b.trim_start_matches('0');
                ta.len()
                    .cmp(&tb.len())
                    .then_with(|| ta.cmp(tb))
                    .then_with(|| chunk_a.len().cmp(&chunk_b.len()))
            }
            _ => chunk_a.to_lowercase().cmp(&chunk_b.to_lowercase()),
        };
        if ord != Ordering::Equal {
            return ord;
        }
        a = rest_a;
        b = rest_b;
    }
}

fn is_digits(s: &str) -> bool {
    s.bytes().next().is_some_and(|c| c.is_ascii_digit())
}

fn split_chunk(s: &str) -> (&str, &str) {
    let digits = is_digits(s);
    let end = s
        .char_indices()
        .find(|(_, c)| c.is_ascii_digit() != digits)
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s.split_at(end)
}

/// Assigns sorted files to `workers` contiguous, near-equal partitions.
///
/// File `i` (0-based) goes to worker `ceil((i + 1) / ceil(total / workers))`.
/// Every worker gets an entry, possibly empty.
pub fn assign(mut files: Vec<String>, workers: u32) -> Vec<WorkerPartition> {
    let workers = workers.max(1);
    files.sort_by(|a, b| natural_cmp(a, b));

    let mut partitions: Vec<WorkerPartition> = (1..=workers)
        .map(|worker_id| WorkerPartition {
            worker_id,
            files: Vec::new(),
        })
        .collect();

    let total = files.len();
    if total == 0 {
        return partitions;
    }
    let chunk = total.div_ceil(workers as usize);
    for (i, file) in files.into_iter().enumerate() {
        let worker = (i + 1).div_ceil(chunk);
        partitions[worker - 1].files.push(file);
    }
    partitions
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionReport {
    pub files: usize,
    pub passes: usize,
    pub partitions: Vec<WorkerPartition>,
}

/// Moves a category's inbox into its worker queues.
pub struct Partitioner {
    files: Arc<dyn FileStore>,
    workers: u32,
    attempts: usize,
    cooldown: Duration,
}

impl Partitioner {
    pub fn new(files: Arc<dyn FileStore>, workers: u32, attempts: usize, cooldown: Duration) -> Self {
        Self {
            files,
            workers: workers.max(1),
            attempts: attempts.max(1),
            cooldown,
        }
    }

    /// Drains the inbox into worker queues.
    ///
    /// Stores may list files late, so an empty listing right after moving is
    /// not trusted: the inbox is re-read after a cooldown until a pass finds
    /// nothing. An inbox that was empty from the start is a silent success.
    pub async fn partition(&self, category: Category) -> Result<PartitionReport, PartitionError> {
        let inbox = StoreLayout::inbox(category);
        let mut report = PartitionReport {
            partitions: (1..=self.workers)
                .map(|worker_id| WorkerPartition {
                    worker_id,
                    files: Vec::new(),
                })
                .collect(),
            ..Default::default()
        };

        let mut pending = self.files.list(&inbox).await?;
        if pending.is_empty() {
            debug!(category = %category, "Inbox empty, nothing to partition");
            return Ok(report);
        }

        while report.passes < self.attempts {
            report.passes += 1;

            if !pending.is_empty() {
                for part in assign(pending, self.workers) {
                    self.move_partition(category, &part).await?;
                    report.files += part.files.len();
                    report.partitions[part.worker_id as usize - 1]
                        .files
                        .extend(part.files);
                }
            }

            tokio::time::sleep(self.cooldown).await;
            pending = self.files.list(&inbox).await?;
            if pending.is_empty() {
                info!(
                    category = %category,
                    files = report.files,
                    passes = report.passes,
                    "Inbox drained into worker queues"
                );
                return Ok(report);
            }
            warn!(
                category = %category,
                remaining = pending.len(),
                pass = report.passes,
                "Inbox still lists files after partitioning"
            );
        }

        Err(PartitionError::Undrained {
            category,
            remaining: pending.len(),
            attempts: self.attempts,
        })
    }

    async fn move_partition(
        &self,
        category: Category,
        part: &WorkerPartition,
    ) -> Result<(), PartitionError> {
        let inbox = StoreLayout::inbox(category);
        let queue = StoreLayout::queue(category, part.worker_id);
        for file in &part.files {
            self.files.move_file(&inbox, file, &queue).await?;
        }
        debug!(
            category = %category,
            worker = part.worker_id,
            files = part.files.len(),
            "Queued partition"
        );
        Ok(())
    }
}
