use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound on concurrently running jobs, regardless of core count.
pub const DEFAULT_WORKER_CEILING: usize = 2;

/// Weights awarded by each functional check of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckWeights {
    /// Listing page with a verified media reference
    pub listing: u64,
    /// Purchase accepted and mirrored back in the confirmation view
    pub purchase: u64,
    /// Single-item detail page
    pub detail: u64,
    /// Order history contains the purchase just made
    pub history: u64,
}

impl CheckWeights {
    pub fn round_max(&self) -> u64 {
        self.listing + self.purchase + self.detail + self.history
    }
}

impl Default for CheckWeights {
    fn default() -> Self {
        Self {
            listing: 5,
            purchase: 2,
            detail: 1,
            history: 4,
        }
    }
}

/// Functional benchmark settings.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Wall-clock budget for the whole benchmark. No round starts after it.
    pub deadline: Duration,
    /// Timeout applied to each outbound request
    pub request_timeout: Duration,
    /// Path of the target's "reset to known state" action
    pub reset_path: String,
    /// Largest quantity submitted in a purchase
    pub max_quantity: u32,
    pub weights: CheckWeights,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(60),
            request_timeout: Duration::from_secs(10),
            reset_path: "/admin/init".to_string(),
            max_quantity: 10,
            weights: CheckWeights::default(),
        }
    }
}

/// Availability rating settings.
#[derive(Debug, Clone)]
pub struct RatingConfig {
    /// Role label key -> expected value. Every role must be present.
    pub required_roles: BTreeMap<String, String>,
    /// Timeout applied to each inventory request
    pub request_timeout: Duration,
    /// Resource kinds that disqualify a project when present (e.g. "redis")
    pub forbidden_kinds: Vec<String>,
}

impl Default for RatingConfig {
    fn default() -> Self {
        let mut required_roles = BTreeMap::new();
        required_roles.insert("service_role_webapp".to_string(), "true".to_string());
        required_roles.insert("service_role_db".to_string(), "true".to_string());

        Self {
            required_roles,
            request_timeout: Duration::from_secs(10),
            forbidden_kinds: vec!["redis".to_string()],
        }
    }
}

/// Worker pool sizing.
#[derive(Debug, Clone, Default)]
pub struct PoolConfig {
    /// Hard ceiling on concurrent jobs; the effective limit is
    /// `min(available cores, worker_ceiling)`.
    pub worker_ceiling: Option<usize>,
    /// Queue capacity. Defaults to the number of known participants.
    pub queue_capacity: Option<usize>,
}

impl PoolConfig {
    /// Number of jobs allowed to run at once.
    pub fn worker_limit(&self) -> usize {
        let ceiling = self.worker_ceiling.unwrap_or(DEFAULT_WORKER_CEILING);
        num_cpus::get().min(ceiling).max(1)
    }
}

/// Admission checks applied to incoming submissions.
#[derive(Debug, Clone, Default)]
pub struct AdmissionConfig {
    /// Accept loopback/localhost targets. Only meant for local testing.
    pub allow_local_targets: bool,
}

/// Which score the per-participant ranking keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankingPolicy {
    #[default]
    Best,
    Latest,
}

#[derive(Debug, Clone)]
pub struct ScorerConfig {
    /// Address the intake portal listens on
    pub listen_addr: SocketAddr,
    /// Participant directory (`{"users": [...]}`)
    pub users_path: PathBuf,
    /// Known-good media hashes (`{"image_hashes": [...]}`)
    pub media_path: PathBuf,
    /// SQLite database for results. `None` keeps results in memory.
    pub database_path: Option<PathBuf>,
    pub pool: PoolConfig,
    pub bench: BenchConfig,
    pub rating: RatingConfig,
    pub admission: AdmissionConfig,
    pub ranking: RankingPolicy,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            // SAFETY: This is a hardcoded valid address that will always parse
            listen_addr: "0.0.0.0:8080"
                .parse()
                .expect("default listen address is valid"),
            users_path: PathBuf::from("users.json"),
            media_path: PathBuf::from("image_hashes.json"),
            database_path: None,
            pool: PoolConfig::default(),
            bench: BenchConfig::default(),
            rating: RatingConfig::default(),
            admission: AdmissionConfig::default(),
            ranking: RankingPolicy::default(),
        }
    }
}

impl ScorerConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Default::default()
        }
    }

    pub fn with_worker_ceiling(mut self, ceiling: usize) -> Self {
        self.pool.worker_ceiling = Some(ceiling);
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.pool.queue_capacity = Some(capacity);
        self
    }

    pub fn with_bench_deadline(mut self, deadline: Duration) -> Self {
        self.bench.deadline = deadline;
        self
    }

    pub fn with_required_role(mut self, key: &str, value: &str) -> Self {
        self.rating
            .required_roles
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_allow_local_targets(mut self, allow: bool) -> Self {
        self.admission.allow_local_targets = allow;
        self
    }

    pub fn with_ranking(mut self, policy: RankingPolicy) -> Self {
        self.ranking = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_weights_default() {
        let w = CheckWeights::default();
        assert_eq!((w.listing, w.purchase, w.detail, w.history), (5, 2, 1, 4));
        assert_eq!(w.round_max(), 12);
    }

    #[test]
    fn bench_config_default() {
        let cfg = BenchConfig::default();
        assert_eq!(cfg.deadline, Duration::from_secs(60));
        assert_eq!(cfg.reset_path, "/admin/init");
        assert_eq!(cfg.max_quantity, 10);
    }

    #[test]
    fn rating_config_default_roles() {
        let cfg = RatingConfig::default();
        assert_eq!(cfg.required_roles.len(), 2);
        assert_eq!(
            cfg.required_roles.get("service_role_webapp").map(String::as_str),
            Some("true")
        );
        assert_eq!(
            cfg.required_roles.get("service_role_db").map(String::as_str),
            Some("true")
        );
        assert_eq!(cfg.forbidden_kinds, vec!["redis".to_string()]);
    }

    #[test]
    fn worker_limit_is_bounded_by_ceiling() {
        let cfg = PoolConfig {
            worker_ceiling: Some(1),
            queue_capacity: None,
        };
        assert_eq!(cfg.worker_limit(), 1);

        let cfg = PoolConfig::default();
        assert!(cfg.worker_limit() >= 1);
        assert!(cfg.worker_limit() <= DEFAULT_WORKER_CEILING);
    }

    #[test]
    fn worker_limit_never_zero() {
        let cfg = PoolConfig {
            worker_ceiling: Some(0),
            queue_capacity: None,
        };
        assert_eq!(cfg.worker_limit(), 1);
    }

    #[test]
    fn scorer_config_default() {
        let cfg = ScorerConfig::default();
        assert_eq!(cfg.listen_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(cfg.users_path, PathBuf::from("users.json"));
        assert!(cfg.database_path.is_none());
        assert!(!cfg.admission.allow_local_targets);
        assert_eq!(cfg.ranking, RankingPolicy::Best);
    }

    #[test]
    fn scorer_config_builders() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let cfg = ScorerConfig::new(addr)
            .with_worker_ceiling(4)
            .with_queue_capacity(8)
            .with_bench_deadline(Duration::from_secs(3))
            .with_required_role("service_role_cache", "yes")
            .with_allow_local_targets(true)
            .with_ranking(RankingPolicy::Latest);

        assert_eq!(cfg.listen_addr, addr);
        assert_eq!(cfg.pool.worker_ceiling, Some(4));
        assert_eq!(cfg.pool.queue_capacity, Some(8));
        assert_eq!(cfg.bench.deadline, Duration::from_secs(3));
        assert_eq!(cfg.rating.required_roles.len(), 3);
        assert!(cfg.admission.allow_local_targets);
        assert_eq!(cfg.ranking, RankingPolicy::Latest);
    }
}
