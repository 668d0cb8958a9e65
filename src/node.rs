use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::bench::Benchmarker;
use crate::config::ScorerConfig;
use crate::directory::{MediaCatalog, UserDirectory};
use crate::error::{Result, ScorerError};
use crate::portal::{run_portal, PortalState};
use crate::rating::{AvailabilityRater, InventoryProvider};
use crate::scheduler::{AdmissionQueue, WorkerPool};
use crate::store::{MemoryStore, ResultStore, SqliteStore};

/// Wires the scoring pipeline together and serves the intake portal.
pub struct ScorerNode {
    pub config: ScorerConfig,
    pub pool: WorkerPool,
}

impl ScorerNode {
    /// Load static data from the configured paths and open the result store.
    pub fn build(config: ScorerConfig, inventory: Arc<dyn InventoryProvider>) -> Result<Self> {
        let directory = Arc::new(UserDirectory::load(&config.users_path)?);
        let catalog = Arc::new(MediaCatalog::load(&config.media_path)?);

        let store: Arc<dyn ResultStore> = match &config.database_path {
            Some(path) => Arc::new(SqliteStore::open(path)?),
            None => {
                tracing::warn!("No database configured, results are kept in memory");
                Arc::new(MemoryStore::new())
            }
        };

        Self::from_parts(config, directory, catalog, inventory, store)
    }

    pub fn from_parts(
        config: ScorerConfig,
        directory: Arc<UserDirectory>,
        catalog: Arc<MediaCatalog>,
        inventory: Arc<dyn InventoryProvider>,
        store: Arc<dyn ResultStore>,
    ) -> Result<Self> {
        if directory.is_empty() {
            return Err(ScorerError::Config("participant directory is empty".to_string()));
        }

        // One slot per participant: with one job each, producers never see a full queue
        let capacity = config.pool.queue_capacity.unwrap_or(directory.len());
        let queue = Arc::new(AdmissionQueue::new(
            directory,
            capacity,
            config.admission.allow_local_targets,
        ));

        let benchmarker = Benchmarker::new(config.bench.clone(), catalog)
            .map_err(|e| ScorerError::Config(e.to_string()))?;
        let rater = AvailabilityRater::new(inventory, config.rating.clone());

        let pool = WorkerPool::new(
            queue,
            Arc::new(benchmarker),
            Arc::new(rater),
            store,
            &config.pool,
            config.ranking,
        );

        Ok(Self { config, pool })
    }

    /// Serve submissions until `shutdown` fires, then drain running jobs.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let addr = self.config.listen_addr;
        let state = PortalState {
            pool: self.pool.clone(),
        };

        let served = run_portal(addr, state, shutdown).await;
        self.pool.shutdown().await;
        tracing::info!("Scorer stopped");

        served.map_err(|source| ScorerError::Io {
            path: addr.to_string(),
            source,
        })
    }
}
