use std::time::SystemTime;

use async_trait::async_trait;

use crate::error::DriftError;
use crate::report::DriftReport;

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub recorded_at: SystemTime,
    pub report: DriftReport,
}

/// Past drift reports per resource, most recent first.
#[async_trait]
pub trait DriftHistory: Send + Sync {
    async fn history(&self, resource_id: &str, limit: usize)
    -> Result<Vec<HistoryEntry>, DriftError>;
}

/// History backend that stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHistory;

#[async_trait]
impl DriftHistory for NullHistory {
    async fn history(
        &self,
        _resource_id: &str,
        _limit: usize,
    ) -> Result<Vec<HistoryEntry>, DriftError> {
        Ok(Vec::new())
    }
}
