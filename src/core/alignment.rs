use crate::core::dataset;
use crate::core::selector::{CandidateSelector, SelectCandidate};
use crate::domain::model::{AlignmentResult, FlowQuery, SearchOutcome, UnmatchedFlow};
use crate::domain::ports::{ConfigProvider, FlowSearch};
use crate::utils::error::{AlignError, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

pub const DEFAULT_CONCURRENCY_PROFILE: usize = 4;
pub const DEFAULT_MAX_PARALLEL_SEARCH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignmentSettings {
    pub concurrency_profile: usize,
    pub max_parallel_search: usize,
    pub search_timeout: Option<Duration>,
}

impl Default for AlignmentSettings {
    fn default() -> Self {
        Self {
            concurrency_profile: DEFAULT_CONCURRENCY_PROFILE,
            max_parallel_search: DEFAULT_MAX_PARALLEL_SEARCH,
            search_timeout: None,
        }
    }
}

impl AlignmentSettings {
    pub fn from_config<C: ConfigProvider + ?Sized>(config: &C) -> Self {
        Self {
            concurrency_profile: config.concurrency_profile(),
            max_parallel_search: config.max_parallel_search(),
            search_timeout: config.search_timeout(),
        }
    }

    /// 同時對遠端目錄發出的搜尋上限，至少為 1
    pub fn pool_size(&self) -> usize {
        self.concurrency_profile.min(self.max_parallel_search).max(1)
    }
}

enum PoolState {
    Idle,
    Open(Arc<Semaphore>),
    Closed,
}

struct PendingExchange {
    name: String,
    comment: Option<String>,
    query: FlowQuery,
    exchange: Value,
}

/// 將 process dataset 的 exchanges 對齊到流目錄。
///
/// 每個 exchange 在工作池上搜尋一次，失敗且可重試時在彙整端同步重試一次。
/// 結果依完成順序彙整。
pub struct FlowAlignmentService {
    search: Arc<dyn FlowSearch>,
    selector: Option<Arc<CandidateSelector>>,
    settings: AlignmentSettings,
    pool: Mutex<PoolState>,
}

impl FlowAlignmentService {
    pub fn new(search: Arc<dyn FlowSearch>, settings: AlignmentSettings) -> Self {
        Self {
            search,
            selector: None,
            settings,
            pool: Mutex::new(PoolState::Idle),
        }
    }

    pub fn with_selector(mut self, selector: impl Into<Arc<CandidateSelector>>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    fn acquire_pool(&self) -> Result<Arc<Semaphore>> {
        let mut state = self.pool.lock().unwrap_or_else(|e| e.into_inner());
        match &*state {
            PoolState::Open(pool) => Ok(Arc::clone(pool)),
            PoolState::Closed => Err(AlignError::ServiceClosed),
            PoolState::Idle => {
                let size = self.settings.pool_size();
                tracing::debug!("Creating search pool with {} workers", size);
                let pool = Arc::new(Semaphore::new(size));
                *state = PoolState::Open(Arc::clone(&pool));
                Ok(pool)
            }
        }
    }

    /// 釋放工作池。之後的對齊呼叫會回傳 `ServiceClosed`。
    pub fn close(&self) {
        let mut state = self.pool.lock().unwrap_or_else(|e| e.into_inner());
        match std::mem::replace(&mut *state, PoolState::Closed) {
            PoolState::Open(pool) => {
                pool.close();
                tracing::debug!("Search pool released");
            }
            PoolState::Idle => tracing::debug!("Alignment service closed before first use"),
            PoolState::Closed => tracing::debug!("Alignment service already closed"),
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(
            *self.pool.lock().unwrap_or_else(|e| e.into_inner()),
            PoolState::Closed
        )
    }

    pub async fn align_exchanges(
        &self,
        process_dataset: &Value,
        paper_md: Option<&str>,
    ) -> Result<AlignmentResult> {
        let exchanges = dataset::extract_exchanges(process_dataset)?;
        let process_name = dataset::process_name(process_dataset);
        let pool = self.acquire_pool()?;
        let paper: Option<Arc<str>> = paper_md.map(Arc::from);

        tracing::info!(
            "🔍 Aligning {} exchanges for '{}' ({} parallel searches)",
            exchanges.len(),
            process_name,
            self.settings.pool_size()
        );

        let mut pending = Vec::with_capacity(exchanges.len());
        let mut in_flight = FuturesUnordered::new();

        for (index, exchange) in exchanges.into_iter().enumerate() {
            let name = dataset::exchange_name(&exchange);
            let comment = dataset::exchange_comment(&exchange);
            let query = FlowQuery::new(name.clone())
                .with_description(comment.clone())
                .with_process_name(Some(process_name.clone()))
                .with_paper(paper.clone());

            let job = Self::search_job(
                Arc::clone(&self.search),
                self.selector.clone(),
                Arc::clone(&pool),
                self.settings.search_timeout,
                query.clone(),
                exchange.clone(),
            );
            let handle = tokio::spawn(job);
            in_flight.push(async move { (index, handle.await) });

            pending.push(PendingExchange {
                name,
                comment,
                query,
                exchange,
            });
        }

        let mut result = AlignmentResult::new(process_name.clone());

        while let Some((index, joined)) = in_flight.next().await {
            let job = &pending[index];

            let outcome = match joined {
                Ok(Ok(outcome)) => Some(outcome),
                Ok(Err(e)) if e.is_retryable() => {
                    tracing::warn!("🔁 Search for '{}' failed, retrying once: {}", job.name, e);
                    match self.search_and_select(&job.query, &job.exchange).await {
                        Ok(outcome) => Some(outcome),
                        Err(e) => {
                            tracing::error!("❌ Retry for '{}' failed: {}", job.name, e);
                            None
                        }
                    }
                }
                Ok(Err(e)) => {
                    tracing::error!("❌ Unexpected error aligning '{}': {}", job.name, e);
                    None
                }
                Err(join_error) => {
                    tracing::error!("❌ Search worker for '{}' aborted: {}", job.name, join_error);
                    None
                }
            };

            let covered = outcome.is_some_and(|outcome| Self::record(&mut result, job, outcome));
            if !covered {
                result.unmatched_flows.push(UnmatchedFlow {
                    base_name: job.name.clone(),
                    general_comment: job.comment.clone(),
                    process_name: Some(process_name.clone()),
                });
            }
        }

        tracing::info!(
            "✅ '{}': {} matched, {} unmatched",
            result.process_name,
            result.matched_count(),
            result.unmatched_count()
        );

        Ok(result)
    }

    /// 彙整單一 exchange 的搜尋結果；回傳此 exchange 是否已出現在任一結果桶
    fn record(result: &mut AlignmentResult, job: &PendingExchange, outcome: SearchOutcome) -> bool {
        let SearchOutcome {
            candidates,
            unmatched,
        } = outcome;

        let matched = !candidates.is_empty();
        let reported = unmatched.iter().any(|flow| flow.base_name == job.name);

        tracing::debug!(
            "'{}': {} candidates, {} unmatched markers",
            job.name,
            candidates.len(),
            unmatched.len()
        );

        result.matched_flows.extend(candidates);
        result.unmatched_flows.extend(unmatched);
        if matched {
            result
                .origin_exchanges
                .entry(job.name.clone())
                .or_default()
                .push(job.exchange.clone());
        }

        matched || reported
    }

    async fn search_job(
        search: Arc<dyn FlowSearch>,
        selector: Option<Arc<CandidateSelector>>,
        pool: Arc<Semaphore>,
        timeout: Option<Duration>,
        query: FlowQuery,
        exchange: Value,
    ) -> Result<SearchOutcome> {
        let _permit = pool
            .acquire_owned()
            .await
            .map_err(|_| AlignError::ServiceClosed)?;

        let outcome = run_search(search.as_ref(), &query, timeout).await?;
        Ok(narrow(selector.as_deref(), &query, &exchange, outcome).await)
    }

    /// 重試路徑：不經過工作池
    async fn search_and_select(&self, query: &FlowQuery, exchange: &Value) -> Result<SearchOutcome> {
        let outcome = run_search(self.search.as_ref(), query, self.settings.search_timeout).await?;
        Ok(narrow(self.selector.as_deref(), query, exchange, outcome).await)
    }
}

impl Drop for FlowAlignmentService {
    fn drop(&mut self) {
        if !self.is_closed() {
            self.close();
        }
    }
}

async fn run_search(
    search: &dyn FlowSearch,
    query: &FlowQuery,
    timeout: Option<Duration>,
) -> Result<SearchOutcome> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, search.search(query))
            .await
            .unwrap_or_else(|_| {
                Err(AlignError::SearchTimeout {
                    millis: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                })
            }),
        None => search.search(query).await,
    }
}

/// 有選擇器時只保留被選中的候選
async fn narrow(
    selector: Option<&CandidateSelector>,
    query: &FlowQuery,
    exchange: &Value,
    outcome: SearchOutcome,
) -> SearchOutcome {
    let Some(selector) = selector else {
        return outcome;
    };
    if outcome.candidates.is_empty() {
        return outcome;
    }

    let decision = selector.select(query, exchange, &outcome.candidates).await;
    match decision.candidate {
        Some(candidate) => {
            tracing::debug!(
                "'{}' → '{}' via {} (score {:?})",
                query.exchange_name,
                candidate.base_name,
                decision.strategy,
                decision.score
            );
            SearchOutcome::new(vec![candidate], outcome.unmatched)
        }
        None => {
            tracing::debug!(
                "'{}': all {} candidates rejected by {}",
                query.exchange_name,
                outcome.candidates.len(),
                decision.strategy
            );
            SearchOutcome::new(Vec::new(), outcome.unmatched)
        }
    }
}

/// 建立服務、對齊、並在所有路徑上釋放工作池
pub async fn align_exchanges(
    search: Arc<dyn FlowSearch>,
    selector: Option<CandidateSelector>,
    settings: AlignmentSettings,
    process_dataset: &Value,
    paper_md: Option<&str>,
) -> Result<AlignmentResult> {
    let mut service = FlowAlignmentService::new(search, settings);
    if let Some(selector) = selector {
        service = service.with_selector(selector);
    }

    let result = service.align_exchanges(process_dataset, paper_md).await;
    service.close();
    result
}
