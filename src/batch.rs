//! Concurrent drift detection across many resources.
//!
//! Each resource runs in its own task; a failure, timeout or panic for one
//! resource is recorded against that resource and never aborts the batch.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{Instrument, Span};

use crate::engine::detect_one;
use crate::policy::ComparisonPolicy;
use crate::report::DriftReport;
use crate::sources::{SourceError, StateSource};
use crate::value::ConfigValue;

pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

/// Per-resource result of a batch run, keyed by resource id.
pub type BatchOutcome = BTreeMap<String, Result<DriftReport, ResourceError>>;

type Fetched = (Option<ConfigValue>, Option<ConfigValue>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Observed,
    Declared,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Observed => f.write_str("observed"),
            Side::Declared => f.write_str("declared"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("failed to fetch {side} state: {source}")]
    Source {
        side: Side,
        #[source]
        source: SourceError,
    },

    #[error("timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("cancelled before fetching")]
    Cancelled,

    #[error("no data in either source")]
    NotFound,

    #[error("comparison panicked: {0}")]
    Panicked(String),
}

/// Shared cancellation switch. Resources that have not started fetching when
/// it is set finish with [`ResourceError::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Both sides of one resource, already fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourcePair {
    pub resource_id: String,
    pub observed: Option<ConfigValue>,
    pub declared: Option<ConfigValue>,
}

impl ResourcePair {
    pub fn new(
        resource_id: impl Into<String>,
        observed: Option<ConfigValue>,
        declared: Option<ConfigValue>,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            observed,
            declared,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchCoordinator {
    policy: Arc<ComparisonPolicy>,
    max_in_flight: usize,
    timeout: Option<Duration>,
    cancel: CancelFlag,
    span: Span,
}

impl BatchCoordinator {
    pub fn new(policy: ComparisonPolicy) -> Self {
        Self {
            policy: Arc::new(policy),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            timeout: None,
            cancel: CancelFlag::new(),
            span: Span::none(),
        }
    }

    /// Values below one are raised to one.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Deadline for fetching both sides of a single resource.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Parent span for every per-resource task.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub async fn detect_batch(&self, pairs: Vec<ResourcePair>) -> BatchOutcome {
        let jobs = pairs.into_iter().map(|pair| {
            let ResourcePair {
                resource_id,
                observed,
                declared,
            } = pair;
            let fetch = async move { Ok::<_, ResourceError>((observed, declared)) };
            (resource_id, fetch)
        });
        self.run(jobs).await
    }

    /// Fetches and compares `resource_ids`, or every resource either source
    /// lists when `resource_ids` is empty.
    pub async fn detect_sources(
        &self,
        observed: Arc<dyn StateSource>,
        declared: Arc<dyn StateSource>,
        resource_ids: &[String],
    ) -> Result<BatchOutcome, SourceError> {
        let ids = if resource_ids.is_empty() {
            let mut ids: BTreeSet<String> = observed.list_resources().await?.into_iter().collect();
            ids.extend(declared.list_resources().await?);
            ids.into_iter().collect()
        } else {
            resource_ids.to_vec()
        };

        tracing::info!(
            parent: &self.span,
            count = ids.len(),
            observed = observed.name(),
            declared = declared.name(),
            "detecting drift"
        );

        let jobs = ids.into_iter().map(|resource_id| {
            let observed = Arc::clone(&observed);
            let declared = Arc::clone(&declared);
            let id = resource_id.clone();
            let fetch = async move { fetch_both(observed.as_ref(), declared.as_ref(), &id).await };
            (resource_id, fetch)
        });

        Ok(self.run(jobs).await)
    }

    async fn run<I, Fut>(&self, jobs: I) -> BatchOutcome
    where
        I: IntoIterator<Item = (String, Fut)>,
        Fut: Future<Output = Result<Fetched, ResourceError>> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let mut tasks = JoinSet::new();
        let mut task_ids: HashMap<tokio::task::Id, String> = HashMap::new();
        let mut seen = BTreeSet::new();

        for (resource_id, fetch) in jobs {
            if !seen.insert(resource_id.clone()) {
                tracing::warn!(
                    parent: &self.span,
                    resource_id = %resource_id,
                    "duplicate resource id ignored"
                );
                continue;
            }

            let semaphore = Arc::clone(&semaphore);
            let cancel = self.cancel.clone();
            let policy = Arc::clone(&self.policy);
            let timeout = self.timeout;
            let id = resource_id.clone();
            let span =
                tracing::debug_span!(parent: &self.span, "resource", resource_id = %resource_id);

            let handle = tasks.spawn(
                async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| ResourceError::Cancelled)?;
                    if cancel.is_cancelled() {
                        return Err(ResourceError::Cancelled);
                    }

                    let (observed, declared) = match timeout {
                        Some(limit) => tokio::time::timeout(limit, fetch)
                            .await
                            .map_err(|_| ResourceError::Timeout(limit))??,
                        None => fetch.await?,
                    };

                    if observed.is_none() && declared.is_none() {
                        return Err(ResourceError::NotFound);
                    }
                    Ok(detect_one(&id, observed.as_ref(), declared.as_ref(), &policy))
                }
                .instrument(span),
            );
            task_ids.insert(handle.id(), resource_id);
        }

        let mut outcome = BatchOutcome::new();
        while let Some(joined) = tasks.join_next_with_id().await {
            let (task_id, result) = match joined {
                Ok((task_id, result)) => (task_id, result),
                Err(err) => (err.id(), Err(join_failure(err))),
            };
            let Some(resource_id) = task_ids.remove(&task_id) else {
                continue;
            };

            if let Err(error) = &result {
                tracing::warn!(
                    parent: &self.span,
                    resource_id = %resource_id,
                    error = %error,
                    "resource failed"
                );
            }
            outcome.insert(resource_id, result);
        }

        let failed = outcome.values().filter(|r| r.is_err()).count();
        let drifted = outcome
            .values()
            .filter(|r| matches!(r, Ok(report) if report.has_drift()))
            .count();
        tracing::info!(
            parent: &self.span,
            count = outcome.len(),
            drifted,
            failed,
            "batch complete"
        );

        outcome
    }
}

async fn fetch_both(
    observed: &dyn StateSource,
    declared: &dyn StateSource,
    resource_id: &str,
) -> Result<Fetched, ResourceError> {
    let observed_fetch = async {
        observed
            .fetch(resource_id)
            .await
            .map_err(|source| ResourceError::Source {
                side: Side::Observed,
                source,
            })
    };
    let declared_fetch = async {
        declared
            .fetch(resource_id)
            .await
            .map_err(|source| ResourceError::Source {
                side: Side::Declared,
                source,
            })
    };
    tokio::try_join!(observed_fetch, declared_fetch)
}

fn join_failure(err: JoinError) -> ResourceError {
    if err.is_cancelled() {
        return ResourceError::Cancelled;
    }
    let payload = err.into_panic();
    let message = payload
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic".to_string());
    ResourceError::Panicked(message)
}
