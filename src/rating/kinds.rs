//! Tiering strategies, one per supported resource kind.
//!
//! Each strategy sees every record of the project and only considers the
//! records of its own asset kinds that carry the role label.

use std::collections::BTreeSet;

use super::inventory::ResourceRecord;
use super::Tier;

/// Resource kinds that count towards a role's tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Virtual machines. Location is a zone.
    ComputeInstance,
    /// Container cluster node pools. Location is a zone.
    NodePool,
    /// Managed app platform: an application record plus labelled services.
    AppPlatform,
    /// Serverless containers and functions. Location is a region.
    Serverless,
    /// Managed SQL, tiered by its own availability attribute.
    ManagedSql,
    /// Managed distributed SQL, tiered by its instance configuration name.
    DistributedSql,
}

pub const COMPUTE_INSTANCE: &str = "compute_instance";
pub const NODE_POOL: &str = "node_pool";
pub const APP_PLATFORM_APPLICATION: &str = "app_platform_application";
pub const APP_PLATFORM_SERVICE: &str = "app_platform_service";
pub const SERVERLESS_SERVICE: &str = "serverless_service";
pub const SERVERLESS_FUNCTION: &str = "serverless_function";
pub const MANAGED_SQL: &str = "managed_sql";
pub const DISTRIBUTED_SQL: &str = "distributed_sql";

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::ComputeInstance,
        ResourceKind::NodePool,
        ResourceKind::AppPlatform,
        ResourceKind::Serverless,
        ResourceKind::ManagedSql,
        ResourceKind::DistributedSql,
    ];

    /// Asset kind strings reported by the inventory for this kind.
    pub fn asset_kinds(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::ComputeInstance => &[COMPUTE_INSTANCE],
            ResourceKind::NodePool => &[NODE_POOL],
            ResourceKind::AppPlatform => &[APP_PLATFORM_APPLICATION, APP_PLATFORM_SERVICE],
            ResourceKind::Serverless => &[SERVERLESS_SERVICE, SERVERLESS_FUNCTION],
            ResourceKind::ManagedSql => &[MANAGED_SQL],
            ResourceKind::DistributedSql => &[DISTRIBUTED_SQL],
        }
    }

    /// Tier reached by the records of this kind labelled `key=value`.
    pub fn rate(&self, records: &[ResourceRecord], key: &str, value: &str) -> Tier {
        let kinds = self.asset_kinds();
        let own = || {
            records
                .iter()
                .filter(move |r| kinds.contains(&r.asset_kind.as_str()))
        };

        match self {
            ResourceKind::ComputeInstance | ResourceKind::NodePool => {
                let zones: BTreeSet<&str> = own()
                    .filter(|r| r.has_label(key, value) && is_running(r))
                    .map(|r| r.location.as_str())
                    .filter(|zone| !zone.is_empty())
                    .collect();
                let regions: BTreeSet<&str> = zones.iter().map(|z| region_of(z)).collect();
                Tier::from_spread(regions.len(), zones.len())
            }
            ResourceKind::AppPlatform => {
                let serving = own().any(|r| {
                    r.asset_kind == APP_PLATFORM_APPLICATION && r.status.eq_ignore_ascii_case("SERVING")
                });
                let labelled = own()
                    .any(|r| r.asset_kind == APP_PLATFORM_SERVICE && r.has_label(key, value));
                if serving && labelled {
                    Tier::Regional
                } else {
                    Tier::None
                }
            }
            ResourceKind::Serverless => {
                let regions: BTreeSet<&str> = own()
                    .filter(|r| r.has_label(key, value))
                    .map(|r| r.location.as_str())
                    .filter(|region| !region.is_empty())
                    .collect();
                match regions.len() {
                    0 => Tier::None,
                    1 => Tier::Regional,
                    _ => Tier::MultiRegional,
                }
            }
            ResourceKind::ManagedSql => {
                let mut instances = own()
                    .filter(|r| r.has_label(key, value) && r.status.eq_ignore_ascii_case("RUNNABLE"))
                    .peekable();
                if instances.peek().is_none() {
                    return Tier::None;
                }
                if instances.any(|r| {
                    r.attributes
                        .get("availabilityType")
                        .is_some_and(|t| t.eq_ignore_ascii_case("REGIONAL"))
                }) {
                    Tier::Regional
                } else {
                    Tier::Zonal
                }
            }
            ResourceKind::DistributedSql => {
                let mut configs = own().filter(|r| r.has_label(key, value)).peekable();
                if configs.peek().is_none() {
                    return Tier::None;
                }
                if configs.any(|r| !r.location.contains("regional")) {
                    Tier::MultiRegional
                } else {
                    Tier::Regional
                }
            }
        }
    }
}

/// Region of a zone name: its first two `-`-separated parts
/// (`us-central1-a` is in `us-central1`).
pub fn region_of(zone: &str) -> &str {
    match zone.match_indices('-').nth(1) {
        Some((idx, _)) => &zone[..idx],
        None => zone,
    }
}

fn is_running(record: &ResourceRecord) -> bool {
    record.status.eq_ignore_ascii_case("RUNNING")
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "service_role_webapp";

    fn vm(zone: &str) -> ResourceRecord {
        ResourceRecord::new(COMPUTE_INSTANCE, zone)
            .with_label(KEY, "true")
            .with_status("RUNNING")
    }

    #[test]
    fn region_of_zone() {
        assert_eq!(region_of("us-central1-a"), "us-central1");
        assert_eq!(region_of("asia-northeast1-b"), "asia-northeast1");
        assert_eq!(region_of("europe-west1"), "europe-west1");
        assert_eq!(region_of("global"), "global");
    }

    #[test]
    fn compute_counts_zones_and_regions() {
        let kind = ResourceKind::ComputeInstance;
        assert_eq!(kind.rate(&[], KEY, "true"), Tier::None);
        assert_eq!(kind.rate(&[vm("us-central1-a")], KEY, "true"), Tier::Zonal);
        assert_eq!(
            kind.rate(&[vm("us-central1-a"), vm("us-central1-a")], KEY, "true"),
            Tier::Zonal
        );
        assert_eq!(
            kind.rate(&[vm("us-central1-a"), vm("us-central1-b")], KEY, "true"),
            Tier::Regional
        );
        assert_eq!(
            kind.rate(&[vm("us-central1-a"), vm("europe-west1-b")], KEY, "true"),
            Tier::MultiRegional
        );
    }

    #[test]
    fn compute_ignores_stopped_unlabelled_and_other_kinds() {
        let kind = ResourceKind::ComputeInstance;
        let records = [
            vm("us-central1-a"),
            vm("us-central1-b").with_status("TERMINATED"),
            vm("europe-west1-b").with_label(KEY, "false"),
            ResourceRecord::new(NODE_POOL, "asia-east1-a")
                .with_label(KEY, "true")
                .with_status("RUNNING"),
        ];
        assert_eq!(kind.rate(&records, KEY, "true"), Tier::Zonal);
        assert_eq!(ResourceKind::NodePool.rate(&records, KEY, "true"), Tier::Zonal);
    }

    #[test]
    fn app_platform_needs_serving_application_and_labelled_service() {
        let kind = ResourceKind::AppPlatform;
        let app = ResourceRecord::new(APP_PLATFORM_APPLICATION, "us-central").with_status("SERVING");
        let service = ResourceRecord::new(APP_PLATFORM_SERVICE, "us-central").with_label(KEY, "true");

        assert_eq!(kind.rate(&[app.clone(), service.clone()], KEY, "true"), Tier::Regional);
        assert_eq!(kind.rate(&[service.clone()], KEY, "true"), Tier::None);
        assert_eq!(
            kind.rate(&[app.with_status("DISABLED"), service], KEY, "true"),
            Tier::None
        );
    }

    #[test]
    fn serverless_counts_regions() {
        let kind = ResourceKind::Serverless;
        let run = |loc: &str| ResourceRecord::new(SERVERLESS_SERVICE, loc).with_label(KEY, "true");
        let func = |loc: &str| ResourceRecord::new(SERVERLESS_FUNCTION, loc).with_label(KEY, "true");

        assert_eq!(kind.rate(&[run("us-central1")], KEY, "true"), Tier::Regional);
        assert_eq!(
            kind.rate(&[run("us-central1"), func("us-central1")], KEY, "true"),
            Tier::Regional
        );
        assert_eq!(
            kind.rate(&[run("us-central1"), func("asia-northeast1")], KEY, "true"),
            Tier::MultiRegional
        );
    }

    #[test]
    fn managed_sql_uses_availability_attribute() {
        let kind = ResourceKind::ManagedSql;
        let sql = |availability: &str| {
            ResourceRecord::new(MANAGED_SQL, "us-central1-a")
                .with_label("service_role_db", "true")
                .with_status("RUNNABLE")
                .with_attribute("availabilityType", availability)
        };

        assert_eq!(kind.rate(&[sql("ZONAL")], "service_role_db", "true"), Tier::Zonal);
        assert_eq!(
            kind.rate(&[sql("ZONAL"), sql("REGIONAL")], "service_role_db", "true"),
            Tier::Regional
        );
        assert_eq!(
            kind.rate(&[sql("REGIONAL").with_status("SUSPENDED")], "service_role_db", "true"),
            Tier::None
        );
    }

    #[test]
    fn distributed_sql_uses_configuration_name() {
        let kind = ResourceKind::DistributedSql;
        let spanner =
            |loc: &str| ResourceRecord::new(DISTRIBUTED_SQL, loc).with_label("service_role_db", "true");

        assert_eq!(
            kind.rate(&[spanner("regional-us-central1")], "service_role_db", "true"),
            Tier::Regional
        );
        assert_eq!(
            kind.rate(&[spanner("nam3")], "service_role_db", "true"),
            Tier::MultiRegional
        );
        assert_eq!(kind.rate(&[], "service_role_db", "true"), Tier::None);
    }
}
