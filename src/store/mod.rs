//! Persistence of job results and per-participant rankings.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::RankingPolicy;
use crate::error::StoreError;
use crate::rating::Tier;
use crate::scheduler::JobState;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Status text of a sub-score that completed without error.
pub const SUCCESS: &str = "Success";

/// Outcome of one scoring job. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: Uuid,
    pub participant_key: String,
    pub display_name: String,
    pub functional_score: u64,
    pub functional_status: String,
    pub availability_tier: Tier,
    pub availability_status: String,
    /// `functional_score * availability_tier`
    pub total_score: u64,
    pub executed_at: DateTime<Utc>,
}

impl JobResult {
    pub fn new(
        job_id: Uuid,
        participant_key: impl Into<String>,
        display_name: impl Into<String>,
        functional: (u64, String),
        availability: (Tier, String),
    ) -> Self {
        let (functional_score, functional_status) = functional;
        let (availability_tier, availability_status) = availability;
        Self {
            job_id,
            participant_key: participant_key.into(),
            display_name: display_name.into(),
            functional_score,
            functional_status,
            availability_tier,
            availability_status,
            total_score: functional_score.saturating_mul(availability_tier.value()),
            executed_at: Utc::now(),
        }
    }

    /// Terminal state of the job this result came from.
    pub fn outcome(&self) -> JobState {
        if self.functional_status == SUCCESS && self.availability_status == SUCCESS {
            JobState::Completed
        } else {
            JobState::CompletedWithErrors
        }
    }

    pub fn ranking_entry(&self) -> RankingEntry {
        RankingEntry {
            display_name: self.display_name.clone(),
            score: self.total_score,
            executed_at: self.executed_at,
        }
    }
}

/// One row per participant, keyed by display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub display_name: String,
    pub score: u64,
    pub executed_at: DateTime<Utc>,
}

/// Entry to keep after `candidate` arrives for a participant that may
/// already be ranked.
pub fn merge_ranking(
    existing: Option<&RankingEntry>,
    candidate: RankingEntry,
    policy: RankingPolicy,
) -> RankingEntry {
    match (existing, policy) {
        (Some(current), RankingPolicy::Best) if current.score > candidate.score => current.clone(),
        _ => candidate,
    }
}

fn sort_rankings(entries: &mut [RankingEntry]) {
    entries.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.executed_at.cmp(&b.executed_at))
            .then_with(|| a.display_name.cmp(&b.display_name))
    });
}

/// Append-mostly store of results with one upsert path for rankings.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Append a job result.
    async fn insert_result(&self, result: &JobResult) -> Result<(), StoreError>;

    /// Insert or replace the participant's ranking according to `policy`.
    /// Returns the entry now stored.
    async fn upsert_ranking(
        &self,
        entry: RankingEntry,
        policy: RankingPolicy,
    ) -> Result<RankingEntry, StoreError>;

    /// Results in insertion order, optionally for one participant only.
    async fn results(&self, participant_key: Option<&str>) -> Result<Vec<JobResult>, StoreError>;

    /// Rankings, highest score first.
    async fn rankings(&self) -> Result<Vec<RankingEntry>, StoreError>;
}
