use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{merge_ranking, sort_rankings, JobResult, RankingEntry, ResultStore};
use crate::config::RankingPolicy;
use crate::error::StoreError;

/// Process-local store, used when no database is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    results: RwLock<Vec<JobResult>>,
    rankings: RwLock<HashMap<String, RankingEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn insert_result(&self, result: &JobResult) -> Result<(), StoreError> {
        self.results.write().await.push(result.clone());
        Ok(())
    }

    async fn upsert_ranking(
        &self,
        entry: RankingEntry,
        policy: RankingPolicy,
    ) -> Result<RankingEntry, StoreError> {
        let mut rankings = self.rankings.write().await;
        let merged = merge_ranking(rankings.get(&entry.display_name), entry, policy);
        rankings.insert(merged.display_name.clone(), merged.clone());
        Ok(merged)
    }

    async fn results(&self, participant_key: Option<&str>) -> Result<Vec<JobResult>, StoreError> {
        let results = self.results.read().await;
        Ok(results
            .iter()
            .filter(|r| participant_key.map_or(true, |key| r.participant_key == key))
            .cloned()
            .collect())
    }

    async fn rankings(&self) -> Result<Vec<RankingEntry>, StoreError> {
        let mut entries: Vec<RankingEntry> = self.rankings.read().await.values().cloned().collect();
        sort_rankings(&mut entries);
        Ok(entries)
    }
}
