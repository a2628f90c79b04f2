use common::{
    MintJob, MintJobItem, MintJobStatusResponse, STATUS_COMPLETED, STATUS_FAILED, STATUS_PENDING,
    STATUS_PROCESSING,
};

/// Per-status item counts of a mint job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusCounts {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Read-only derivation over a polled mint job. No retry logic lives
/// here; failed items are terminal and carry their stored error.
pub struct MintJobView {
    job: MintJob,
    items: Vec<MintJobItem>,
}

impl MintJobView {
    pub fn new(status: MintJobStatusResponse) -> Self {
        MintJobView {
            job: status.job,
            items: status.items,
        }
    }

    pub fn job(&self) -> &MintJob {
        &self.job
    }

    pub fn items(&self) -> &[MintJobItem] {
        &self.items
    }

    /// completed / total * 100, clamped to [0, 100].
    pub fn progress_percentage(&self) -> f64 {
        if self.job.total_quantity <= 0 {
            return 0.0;
        }
        let percentage =
            self.job.completed_quantity as f64 / self.job.total_quantity as f64 * 100.0;
        percentage.clamp(0.0, 100.0)
    }

    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for item in &self.items {
            match item.status.as_str() {
                STATUS_PENDING => counts.pending += 1,
                STATUS_PROCESSING => counts.processing += 1,
                STATUS_COMPLETED => counts.completed += 1,
                STATUS_FAILED => counts.failed += 1,
                other => log::warn!("Unknown mint item status '{}'", other),
            }
        }
        counts
    }

    /// Mint addresses of the items that made it on chain, in item
    /// order.
    pub fn minted_addresses(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter_map(|item| item.nft_mint_address.as_deref())
            .collect()
    }

    pub fn failed_items(&self) -> Vec<&MintJobItem> {
        self.items
            .iter()
            .filter(|item| item.status == STATUS_FAILED)
            .collect()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.job.status.as_str(), STATUS_COMPLETED | STATUS_FAILED)
    }
}
