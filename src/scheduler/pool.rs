use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::task::TaskTracker;
use url::Url;

use crate::bench::Benchmarker;
use crate::config::{PoolConfig, RankingPolicy};
use crate::error::{AdmissionError, BenchmarkError};
use crate::rating::{AvailabilityRater, Tier};
use crate::scheduler::job::{JobTicket, ScoringJob};
use crate::scheduler::queue::AdmissionQueue;
use crate::store::{JobResult, ResultStore, SUCCESS};

/// Bounded pool of scoring workers.
///
/// Every accepted submission spawns one task. A task holds a semaphore
/// permit for the whole job, so at most `worker_limit` jobs run at once.
#[derive(Clone)]
pub struct WorkerPool {
    queue: Arc<AdmissionQueue>,
    permits: Arc<Semaphore>,
    worker_limit: usize,
    benchmarker: Arc<Benchmarker>,
    rater: Arc<AvailabilityRater>,
    store: Arc<dyn ResultStore>,
    ranking: RankingPolicy,
    tasks: TaskTracker,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("worker_limit", &self.worker_limit)
            .field("available_permits", &self.permits.available_permits())
            .field("ranking", &self.ranking)
            .finish_non_exhaustive()
    }
}

impl WorkerPool {
    pub fn new(
        queue: Arc<AdmissionQueue>,
        benchmarker: Arc<Benchmarker>,
        rater: Arc<AvailabilityRater>,
        store: Arc<dyn ResultStore>,
        config: &PoolConfig,
        ranking: RankingPolicy,
    ) -> Self {
        let worker_limit = config.worker_limit();
        tracing::info!(worker_limit, queue_capacity = queue.capacity(), "Worker pool ready");
        Self {
            queue,
            permits: Arc::new(Semaphore::new(worker_limit)),
            worker_limit,
            benchmarker,
            rater,
            store,
            ranking,
            tasks: TaskTracker::new(),
        }
    }

    pub fn queue(&self) -> &Arc<AdmissionQueue> {
        &self.queue
    }

    pub fn store(&self) -> &Arc<dyn ResultStore> {
        &self.store
    }

    pub fn worker_limit(&self) -> usize {
        self.worker_limit
    }

    /// Jobs currently holding a permit.
    pub fn running(&self) -> usize {
        self.worker_limit - self.permits.available_permits()
    }

    /// Admit a job and spawn the worker that will score it.
    pub fn submit(&self, job: ScoringJob) -> Result<JobTicket, AdmissionError> {
        if self.permits.is_closed() {
            return Err(AdmissionError::QueueClosed);
        }
        let ticket = self.queue.submit(job)?;

        let worker = self.clone();
        self.tasks.spawn(async move { worker.work().await });
        Ok(ticket)
    }

    /// Wait until every spawned worker has finished.
    pub async fn wait_idle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    /// Stop starting jobs and wait for running ones. Jobs still queued are
    /// dropped without a result.
    pub async fn shutdown(&self) {
        self.permits.close();
        self.tasks.close();
        tracing::info!(running = self.tasks.len(), "Waiting for running jobs");
        self.tasks.wait().await;
    }

    async fn work(self) {
        let Ok(_permit) = Arc::clone(&self.permits).acquire_owned().await else {
            tracing::debug!("Worker pool closed before a permit was free");
            return;
        };
        let Some(job) = self.queue.dequeue().await else {
            return;
        };
        let _in_flight = self.queue.guard(&job.participant_key);

        let result = self.score(&job).await;
        self.persist(&result).await;

        tracing::info!(
            job_id = %job.id,
            participant = %job.participant_key,
            state = %result.outcome(),
            total = result.total_score,
            "Job finished"
        );
        // Marker then permit are released here, after the write
    }

    /// Benchmark and rate one job concurrently and combine the sub-scores.
    pub async fn score(&self, job: &ScoringJob) -> JobResult {
        let display_name = self.queue.directory().display_name(&job.participant_key);
        tracing::info!(
            job_id = %job.id,
            participant = %job.participant_key,
            endpoint = %job.target_endpoint,
            project = %job.cloud_project_id,
            "Scoring started"
        );

        let (functional, availability) = tokio::join!(self.benchmark(job), self.rate(job));
        JobResult::new(job.id, job.participant_key.clone(), display_name, functional, availability)
    }

    async fn benchmark(&self, job: &ScoringJob) -> (u64, String) {
        let Ok(endpoint) = Url::parse(job.target_endpoint.trim()) else {
            let err = BenchmarkError::InvalidEndpoint(job.target_endpoint.clone());
            tracing::warn!(job_id = %job.id, error = %err, "Benchmark failed");
            return (0, err.to_string());
        };

        if let Err(e) = self.benchmarker.reset(&endpoint).await {
            tracing::warn!(job_id = %job.id, error = %e, "Target reset failed, scoring continues");
        }

        let deadline = Instant::now() + self.benchmarker.config().deadline;
        let outcome = self.benchmarker.run(&endpoint, deadline).await;
        if !outcome.is_success() {
            tracing::warn!(
                job_id = %job.id,
                rounds = outcome.rounds,
                status = %outcome.status(),
                "Benchmark failed"
            );
        }
        (outcome.recorded_score(), outcome.status())
    }

    async fn rate(&self, job: &ScoringJob) -> (Tier, String) {
        match self.rater.rate_project(&job.cloud_project_id).await {
            Ok(tier) => (tier, SUCCESS.to_string()),
            Err(e) => {
                tracing::warn!(job_id = %job.id, project = %job.cloud_project_id, error = %e, "Rating failed");
                (Tier::None, e.to_string())
            }
        }
    }

    async fn persist(&self, result: &JobResult) {
        if let Err(e) = self.store.insert_result(result).await {
            tracing::error!(job_id = %result.job_id, error = %e, "Failed to store job result");
        }
        if let Err(e) = self
            .store
            .upsert_ranking(result.ranking_entry(), self.ranking)
            .await
        {
            tracing::error!(job_id = %result.job_id, error = %e, "Failed to update ranking");
        }
    }
}
