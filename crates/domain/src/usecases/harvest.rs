//! Harvest use case - fans out to every source, merges, persists, repeats

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::model::{Item, SourceQuery};
use crate::ports::{ItemStore, QuotaProbe, SourceAdapter};
use crate::usecases::dedup::merge;
use crate::usecases::retry::{RetryPolicy, with_retry};

/// An adapter plus the queries it runs on every pass
#[derive(Clone)]
pub struct SourceRegistration {
    pub adapter: Arc<dyn SourceAdapter>,
    pub queries: Vec<SourceQuery>,
    /// Checked before the pass; an exhausted quota skips this registration
    pub quota: Option<Arc<dyn QuotaProbe>>,
}

impl SourceRegistration {
    pub fn new(adapter: Arc<dyn SourceAdapter>, queries: Vec<SourceQuery>) -> Self {
        Self {
            adapter,
            queries,
            quota: None,
        }
    }

    /// Registration running the adapter once with an empty query
    pub fn single(adapter: Arc<dyn SourceAdapter>) -> Self {
        Self::new(adapter, vec![SourceQuery::default()])
    }

    pub fn with_quota_probe(mut self, probe: Arc<dyn QuotaProbe>) -> Self {
        self.quota = Some(probe);
        self
    }
}

/// Configuration for the harvest loop
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Sleep between passes when no rate-limit reset is pending
    pub poll_interval: Duration,
    /// Stop looping once the store holds this many items
    pub target_count: Option<usize>,
    pub retry: RetryPolicy,
    /// Delay between launching consecutive calls of one pass
    pub stagger: Duration,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(300),
            target_count: None,
            retry: RetryPolicy::default(),
            stagger: Duration::ZERO,
        }
    }
}

/// Process-wide harvest bookkeeping, owned by a [`Harvester`]
#[derive(Debug, Default)]
pub struct HarvesterState {
    started: AtomicBool,
    seen: Mutex<HashSet<String>>,
    passes: AtomicU64,
}

impl HarvesterState {
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Number of passes begun so far
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::SeqCst)
    }

    /// Distinct item keys observed across all passes
    pub fn seen_count(&self) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn mark_seen(&self, items: &[Item]) -> usize {
        let mut seen = self
            .seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        items
            .iter()
            .filter(|item| seen.insert(item.dedup_key()))
            .count()
    }

    fn try_start(self: &Arc<Self>) -> Option<StartedGuard> {
        self.started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| StartedGuard(Arc::clone(self)))
    }
}

/// Clears the started flag when the loop exits, however it exits
struct StartedGuard(Arc<HarvesterState>);

impl Drop for StartedGuard {
    fn drop(&mut self) {
        self.0.started.store(false, Ordering::SeqCst);
    }
}

/// Report of one harvest pass
#[derive(Debug, Clone)]
pub struct HarvestPass {
    pub pass_id: Uuid,
    /// Merged items fetched during this pass
    pub items: Vec<Item>,
    /// Full store contents after the append, `None` if nothing was persisted
    pub stored: Option<Vec<Item>>,
    /// Items whose key had not been seen by an earlier pass
    pub newly_seen: usize,
    /// Longest outstanding rate-limit reset reported by any source
    pub retry_after: Option<Duration>,
    pub sources_ok: usize,
    pub sources_failed: usize,
    pub sources_skipped: usize,
}

impl HarvestPass {
    pub fn stored_total(&self) -> Option<usize> {
        self.stored.as_ref().map(Vec::len)
    }
}

/// Errors from the harvest loop
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("Harvest loop is already running")]
    AlreadyRunning,
}

/// Harvest orchestrator
pub struct Harvester {
    registrations: Vec<SourceRegistration>,
    store: Arc<dyn ItemStore>,
    config: HarvestConfig,
    state: Arc<HarvesterState>,
}

impl Harvester {
    pub fn new(
        registrations: Vec<SourceRegistration>,
        store: Arc<dyn ItemStore>,
        config: HarvestConfig,
    ) -> Self {
        Self {
            registrations,
            store,
            config,
            state: Arc::new(HarvesterState::default()),
        }
    }

    pub fn state(&self) -> &Arc<HarvesterState> {
        &self.state
    }

    pub fn registrations(&self) -> &[SourceRegistration] {
        &self.registrations
    }

    /// Run a single pass over every registration
    pub async fn harvest_once(&self) -> HarvestPass {
        let pass_id = Uuid::new_v4();
        let pass_number = self.state.passes.fetch_add(1, Ordering::SeqCst) + 1;

        tracing::info!(
            pass_id = %pass_id,
            pass = pass_number,
            sources = self.registrations.len(),
            "Starting harvest pass"
        );

        let mut retry_after = None;
        let mut sources_skipped = 0;
        let mut jobs = Vec::new();

        for registration in &self.registrations {
            if let Some(wait) = self.quota_wait(registration).await {
                sources_skipped += 1;
                retry_after = longest(retry_after, wait);
                continue;
            }
            for query in &registration.queries {
                jobs.push((Arc::clone(&registration.adapter), query.clone()));
            }
        }

        let policy = &self.config.retry;
        let stagger = self.config.stagger;
        let outcomes = join_all(jobs.into_iter().enumerate().map(
            move |(index, (adapter, query))| async move {
                if !stagger.is_zero() {
                    let offset = u32::try_from(index).unwrap_or(u32::MAX);
                    sleep(stagger.saturating_mul(offset)).await;
                }
                with_retry(adapter.as_ref(), &query, policy).await
            },
        ))
        .await;

        let mut sources_ok = 0;
        let mut sources_failed = 0;
        let mut lists = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            if outcome.is_success() {
                sources_ok += 1;
            } else {
                sources_failed += 1;
            }
            if let Some(wait) = outcome.retry_after {
                retry_after = longest(retry_after, wait);
            }
            lists.push(outcome.items);
        }

        let items = merge(lists);
        let newly_seen = self.state.mark_seen(&items);

        let stored = if items.is_empty() {
            None
        } else {
            match self.store.append(&items).await {
                Ok(all) => Some(all),
                Err(e) => {
                    tracing::error!(pass_id = %pass_id, error = %e, "Failed to persist harvested items");
                    None
                }
            }
        };

        tracing::info!(
            pass_id = %pass_id,
            fetched = items.len(),
            newly_seen,
            stored = ?stored.as_ref().map(Vec::len),
            sources_ok,
            sources_failed,
            sources_skipped,
            retry_after_secs = ?retry_after.map(|d| d.as_secs()),
            "Harvest pass complete"
        );

        HarvestPass {
            pass_id,
            items,
            stored,
            newly_seen,
            retry_after,
            sources_ok,
            sources_failed,
            sources_skipped,
        }
    }

    async fn quota_wait(&self, registration: &SourceRegistration) -> Option<Duration> {
        let probe = registration.quota.as_ref()?;
        match probe.check_quota().await {
            Ok(quota) if quota.is_exhausted() => {
                tracing::warn!(
                    source = %registration.adapter.name(),
                    limit = quota.limit,
                    reset_secs = quota.reset_after.as_secs(),
                    "Quota exhausted, skipping source this pass"
                );
                Some(quota.reset_after)
            }
            Ok(quota) => {
                tracing::debug!(
                    source = %registration.adapter.name(),
                    remaining = quota.remaining,
                    limit = quota.limit,
                    "Quota available"
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    source = %registration.adapter.name(),
                    error = %e,
                    "Quota check failed, fetching anyway"
                );
                None
            }
        }
    }

    /// Loop until the target count is reached or `cancel` fires.
    ///
    /// Fails only if a loop owned by this harvester is already running.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), HarvestError> {
        let _guard = self.state.try_start().ok_or(HarvestError::AlreadyRunning)?;
        self.run_loop(&cancel).await;
        Ok(())
    }

    /// Start the loop as a detached task.
    ///
    /// Returns `None` when a loop is already running.
    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        let Some(guard) = self.state.try_start() else {
            tracing::debug!("Harvest loop already running");
            return None;
        };

        let harvester = Arc::clone(self);
        Some(tokio::spawn(async move {
            let _guard = guard;
            harvester.run_loop(&cancel).await;
        }))
    }

    async fn run_loop(&self, cancel: &CancellationToken) {
        tracing::info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            target_count = ?self.config.target_count,
            "Harvest loop started"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            if self.target_reached().await {
                break;
            }

            let pass = tokio::select! {
                _ = cancel.cancelled() => break,
                pass = self.harvest_once() => pass,
            };

            let wait = next_wait(self.config.poll_interval, pass.retry_after);
            tracing::debug!(wait_secs = wait.as_secs(), "Sleeping until next pass");

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(wait) => {}
            }
        }

        tracing::info!(passes = self.state.passes(), "Harvest loop stopped");
    }

    async fn target_reached(&self) -> bool {
        let Some(target) = self.config.target_count else {
            return false;
        };

        match self.store.count().await {
            Ok(count) if count >= target => {
                tracing::info!(count, target, "Target item count reached");
                true
            }
            Ok(_) => false,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to count stored items");
                false
            }
        }
    }
}

fn longest(current: Option<Duration>, candidate: Duration) -> Option<Duration> {
    Some(current.map_or(candidate, |current| current.max(candidate)))
}

/// The poll interval, shortened to a pending rate-limit reset
pub fn next_wait(poll_interval: Duration, retry_after: Option<Duration>) -> Duration {
    match retry_after {
        Some(reset) if !reset.is_zero() => poll_interval.min(reset),
        _ => poll_interval,
    }
}
