// ── Alert history page ──

use std::sync::Arc;

use serde::Serialize;

use super::alert::Alert;

/// One page of server-side alert history. Not stored; published to
/// `history` listeners and returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPage {
    pub page: u32,
    pub limit: u32,
    /// Total alerts on the server across all pages.
    pub total: u64,
    pub alerts: Vec<Arc<Alert>>,
}

impl HistoryPage {
    /// Number of pages at this page size.
    pub fn page_count(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.limit))
    }
}
