//! Hosted zone and alias records for a published site.

use super::backend::{AliasRecord, DnsProvider, HostedZone, StoreError};
use super::website::website_domain;
use crate::config::extract_sitename;
use log::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsSetup {
    pub zone: HostedZone,
    /// The zone did not exist before this run.
    pub created_zone: bool,
    pub records: Vec<AliasRecord>,
}

/// Zone whose name equals `domain`, ignoring a trailing dot on either side.
pub fn find_zone<'z>(zones: &'z [HostedZone], domain: &str) -> Option<&'z HostedZone> {
    let domain = domain.trim_end_matches('.');
    zones
        .iter()
        .find(|zone| zone.name.trim_end_matches('.') == domain)
}

/// Create or reuse the hosted zone for `sitename` and point both the bare
/// domain and its `www` alias at the regional website endpoint.
pub fn setup_dns(
    dns: &impl DnsProvider,
    sitename: &str,
    region: &str,
) -> Result<DnsSetup, StoreError> {
    let domain = extract_sitename(sitename);
    let zones = dns.list_hosted_zones()?;
    let (zone, created_zone) = match find_zone(&zones, &domain) {
        Some(zone) => (zone.clone(), false),
        None => {
            info!("creating hosted zone for {domain}");
            (dns.create_hosted_zone(&domain)?, true)
        }
    };

    let target = website_domain(region);
    let records = vec![
        AliasRecord {
            name: domain.clone(),
            target: target.clone(),
        },
        AliasRecord {
            name: format!("www.{domain}"),
            target,
        },
    ];
    dns.upsert_alias_records(&zone.id, &records)?;

    Ok(DnsSetup {
        zone,
        created_zone,
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosting::memory::MemoryStore;

    #[test]
    fn find_zone_ignores_trailing_dot() {
        let zones = vec![
            HostedZone {
                id: "Z1".into(),
                name: "other.com.".into(),
            },
            HostedZone {
                id: "Z2".into(),
                name: "example.com.".into(),
            },
        ];
        assert_eq!(find_zone(&zones, "example.com").unwrap().id, "Z2");
        assert!(find_zone(&zones, "sub.example.com").is_none());
        assert!(find_zone(&zones, "ample.com").is_none());
    }

    #[test]
    fn creates_zone_once_and_upserts_both_names() {
        let dns = MemoryStore::new();
        let first = setup_dns(&dns, "www.example.com", "eu-west-1").unwrap();
        assert!(first.created_zone);

        let records = dns.records(&first.zone.id);
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["example.com", "www.example.com"]);
        assert!(records
            .iter()
            .all(|r| r.target == "s3-website-eu-west-1.amazonaws.com"));

        let second = setup_dns(&dns, "example.com", "eu-west-1").unwrap();
        assert!(!second.created_zone);
        assert_eq!(second.zone, first.zone);
        assert_eq!(dns.list_hosted_zones().unwrap().len(), 1);
    }
}
