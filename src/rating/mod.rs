//! Availability rating of a contestant's cloud project.
//!
//! Each required role gets the best tier any supported resource kind reaches
//! for it. The project's tier is the weakest of those.

pub mod inventory;
pub mod kinds;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::RatingConfig;
use crate::error::RatingError;

pub use inventory::{HttpInventory, InventoryProvider, ResourceRecord, StaticInventory};
pub use kinds::ResourceKind;

/// Redundancy classification, ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    #[default]
    None = 0,
    Zonal = 1,
    Regional = 2,
    MultiRegional = 3,
}

impl Tier {
    /// Tier of instances spread over `regions` distinct regions and `zones`
    /// distinct zones.
    pub fn from_spread(regions: usize, zones: usize) -> Self {
        if regions >= 2 {
            Tier::MultiRegional
        } else if zones >= 2 {
            Tier::Regional
        } else if zones == 1 {
            Tier::Zonal
        } else {
            Tier::None
        }
    }

    /// Multiplier applied to the functional score.
    pub fn value(&self) -> u64 {
        *self as u64
    }

    pub fn from_value(value: u64) -> Option<Self> {
        match value {
            0 => Some(Tier::None),
            1 => Some(Tier::Zonal),
            2 => Some(Tier::Regional),
            3 => Some(Tier::MultiRegional),
            _ => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::None => write!(f, "NONE"),
            Tier::Zonal => write!(f, "ZONAL"),
            Tier::Regional => write!(f, "REGIONAL"),
            Tier::MultiRegional => write!(f, "MULTI_REGIONAL"),
        }
    }
}

/// Computes a project's tier from its inventory.
#[derive(Clone)]
pub struct AvailabilityRater {
    inventory: Arc<dyn InventoryProvider>,
    config: RatingConfig,
}

impl fmt::Debug for AvailabilityRater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AvailabilityRater")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AvailabilityRater {
    pub fn new(inventory: Arc<dyn InventoryProvider>, config: RatingConfig) -> Self {
        Self { inventory, config }
    }

    pub fn config(&self) -> &RatingConfig {
        &self.config
    }

    /// Rate `project_id` against the configured required roles.
    pub async fn rate_project(&self, project_id: &str) -> Result<Tier, RatingError> {
        self.rate(project_id, &self.config.required_roles).await
    }

    /// Rate `project_id`. One inventory call; no deadline beyond the
    /// provider's own request timeout.
    pub async fn rate(
        &self,
        project_id: &str,
        required_roles: &BTreeMap<String, String>,
    ) -> Result<Tier, RatingError> {
        if required_roles.is_empty() {
            return Err(RatingError::NoRequiredRoles);
        }

        let records = self.inventory.list_resources(project_id).await?;
        tracing::debug!(project = %project_id, resources = records.len(), "Fetched inventory");

        let tier = rate_records(&records, required_roles, &self.config.forbidden_kinds)?;
        tracing::info!(project = %project_id, tier = %tier, "Project rated");
        Ok(tier)
    }
}

/// Weakest-link tier of `records` over `required_roles`.
///
/// Fails when a forbidden kind is present or when any role has no
/// qualifying resource at all.
pub fn rate_records(
    records: &[ResourceRecord],
    required_roles: &BTreeMap<String, String>,
    forbidden_kinds: &[String],
) -> Result<Tier, RatingError> {
    if required_roles.is_empty() {
        return Err(RatingError::NoRequiredRoles);
    }

    if let Some(record) = records
        .iter()
        .find(|r| forbidden_kinds.iter().any(|k| k == &r.asset_kind))
    {
        return Err(RatingError::RuleViolation(record.asset_kind.clone()));
    }

    let mut overall = Tier::MultiRegional;
    for (key, value) in required_roles {
        let best = role_tier(records, key, value);
        if best == Tier::None {
            return Err(RatingError::RoleNotFound {
                key: key.clone(),
                value: value.clone(),
            });
        }
        overall = overall.min(best);
    }
    Ok(overall)
}

/// Best tier reached for `key=value` by any supported kind.
pub fn role_tier(records: &[ResourceRecord], key: &str, value: &str) -> Tier {
    ResourceKind::ALL
        .iter()
        .map(|kind| kind.rate(records, key, value))
        .max()
        .unwrap_or_default()
}
