//! Group flattener
//!
//! Resolves the raw member-name lists on each policy draft into flat axis
//! lists by depth-first expansion of groups. The visit stack is per
//! top-level name (enter/leave discipline), so a group may appear under any
//! number of policies; re-entering a name that is already on the stack is a
//! reference cycle and fails the whole load.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use drishti_common::error::{DrishtiError, DrishtiResult};
use drishti_common::types::Protocol;

use crate::model::{
    is_universal_name, AddressObject, ObjectCatalog, Policy, PolicyDraft, PolicySet, ServiceObject,
};
use crate::services;

/// Ad-hoc service syntax: `tcp_8080` or `udp_4000-4100`.
static ADHOC_SERVICE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(tcp|udp)_(\d{1,5})(?:-(\d{1,5}))?$").expect("valid regex"));

/// Flatten every draft in the set against its object catalog.
///
/// Returns the policies in source order with all groups expanded. Fails on
/// the first group-reference cycle.
pub fn flatten(set: PolicySet) -> DrishtiResult<Vec<Policy>> {
    let PolicySet { catalog, drafts } = set;
    drafts
        .into_iter()
        .map(|draft| flatten_draft(draft, &catalog))
        .collect()
}

fn flatten_draft(draft: PolicyDraft, catalog: &ObjectCatalog) -> DrishtiResult<Policy> {
    let src_addrs = flatten_address_axis(draft.src_addr_names.as_deref(), catalog, &draft.id)?;
    let dst_addrs = flatten_address_axis(draft.dst_addr_names.as_deref(), catalog, &draft.id)?;
    let services = flatten_service_axis(draft.service_names.as_deref(), catalog, &draft.id)?;

    Ok(Policy {
        id: draft.id,
        priority: draft.priority,
        name: draft.name,
        action: draft.action,
        enabled: draft.enabled,
        src_addrs,
        dst_addrs,
        services,
    })
}

/// An omitted axis (`None`) defaults to the universal sentinel; an explicit
/// empty list stays empty and the axis can never match.
fn flatten_address_axis(
    names: Option<&[String]>,
    catalog: &ObjectCatalog,
    policy_id: &str,
) -> DrishtiResult<Vec<AddressObject>> {
    let Some(names) = names else {
        return Ok(vec![AddressObject::Any]);
    };

    let mut out = Vec::new();
    for name in names {
        let mut stack = Vec::new();
        expand_address(name, catalog, policy_id, &mut stack, &mut out)?;
    }
    Ok(out)
}

fn expand_address(
    name: &str,
    catalog: &ObjectCatalog,
    policy_id: &str,
    stack: &mut Vec<String>,
    out: &mut Vec<AddressObject>,
) -> DrishtiResult<()> {
    if is_universal_name(name) {
        out.push(AddressObject::Any);
        return Ok(());
    }
    if stack.iter().any(|entry| entry == name) {
        return Err(DrishtiError::CycleDetected {
            name: name.to_string(),
            policy_id: policy_id.to_string(),
        });
    }

    if let Some(object) = catalog.addresses.get(name) {
        out.push(object.clone());
        return Ok(());
    }

    if let Some(members) = catalog.address_groups.get(name) {
        stack.push(name.to_string());
        for member in members {
            expand_address(member, catalog, policy_id, stack, out)?;
        }
        stack.pop();
        return Ok(());
    }

    warn!(
        policy_id,
        object = name,
        "unresolvable address reference dropped"
    );
    Ok(())
}

fn flatten_service_axis(
    names: Option<&[String]>,
    catalog: &ObjectCatalog,
    policy_id: &str,
) -> DrishtiResult<Vec<ServiceObject>> {
    let Some(names) = names else {
        return Ok(vec![ServiceObject::Any]);
    };

    let mut out = Vec::new();
    for name in names {
        let mut stack = Vec::new();
        expand_service(name, catalog, policy_id, &mut stack, &mut out)?;
    }
    Ok(out)
}

fn expand_service(
    name: &str,
    catalog: &ObjectCatalog,
    policy_id: &str,
    stack: &mut Vec<String>,
    out: &mut Vec<ServiceObject>,
) -> DrishtiResult<()> {
    if is_universal_name(name) {
        out.push(ServiceObject::Any);
        return Ok(());
    }
    if stack.iter().any(|entry| entry == name) {
        return Err(DrishtiError::CycleDetected {
            name: name.to_string(),
            policy_id: policy_id.to_string(),
        });
    }

    if let Some(objects) = catalog.services.get(name) {
        out.extend(objects.iter().cloned());
        return Ok(());
    }

    if let Some(members) = catalog.service_groups.get(name) {
        stack.push(name.to_string());
        for member in members {
            expand_service(member, catalog, policy_id, stack, out)?;
        }
        stack.pop();
        return Ok(());
    }

    // Not a configured object or group: fall back to the well-known
    // registry, then the ad-hoc proto_port[-port] syntax.
    if let Some(entries) = services::lookup(name) {
        for entry in entries {
            out.push(ServiceObject::Ports {
                name: name.to_string(),
                protocol: entry.protocol,
                start_port: entry.start_port,
                end_port: entry.end_port,
            });
        }
        return Ok(());
    }

    if let Some(object) = parse_adhoc_service(name) {
        out.push(object);
        return Ok(());
    }

    warn!(
        policy_id,
        object = name,
        "unresolvable service reference dropped"
    );
    Ok(())
}

fn parse_adhoc_service(name: &str) -> Option<ServiceObject> {
    let captures = ADHOC_SERVICE.captures(name)?;
    let protocol = match &captures[1] {
        "tcp" => Protocol::Tcp,
        _ => Protocol::Udp,
    };
    let start: u16 = captures[2].parse().ok()?;
    let end: u16 = match captures.get(3) {
        Some(m) => m.as_str().parse().ok()?,
        None => start,
    };
    ServiceObject::ports(name, protocol, start, end).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use drishti_common::types::Action;
    use ipnet::IpNet;

    fn net(s: &str) -> IpNet {
        s.parse().unwrap()
    }

    fn catalog() -> ObjectCatalog {
        let mut catalog = ObjectCatalog::new();
        catalog.add_address(AddressObject::ipmask("NET_A", net("10.0.0.0/24")));
        catalog.add_address(AddressObject::ipmask("NET_B", net("10.0.1.0/24")));
        catalog.add_address(AddressObject::ipmask("NET_C", net("192.168.0.0/16")));
        catalog.add_address_group(
            "GRP_AB",
            vec!["NET_A".to_string(), "NET_B".to_string()],
        );
        catalog.add_address_group(
            "GRP_NESTED",
            vec!["GRP_AB".to_string(), "NET_C".to_string()],
        );
        catalog.add_service(ServiceObject::ports("HTTP", Protocol::Tcp, 80, 80).unwrap());
        catalog.add_service(ServiceObject::ports("HTTPS", Protocol::Tcp, 443, 443).unwrap());
        catalog.add_service_group(
            "WEB",
            vec!["HTTP".to_string(), "HTTPS".to_string()],
        );
        catalog
    }

    fn draft(id: &str) -> PolicyDraft {
        PolicyDraft::new(id, 100, Action::Accept)
    }

    fn flatten_one(draft: PolicyDraft, catalog: ObjectCatalog) -> DrishtiResult<Policy> {
        let set = PolicySet {
            catalog,
            drafts: vec![draft],
        };
        flatten(set).map(|mut policies| policies.remove(0))
    }

    #[test]
    fn nested_groups_expand_in_declaration_order() {
        let policy = flatten_one(
            draft("1").with_src_addrs(vec!["GRP_NESTED".to_string()]),
            catalog(),
        )
        .unwrap();
        let names: Vec<&str> = policy.src_addrs.iter().map(AddressObject::name).collect();
        assert_eq!(names, vec!["NET_A", "NET_B", "NET_C"]);
    }

    #[test]
    fn omitted_axis_defaults_to_universal() {
        let policy = flatten_one(draft("1"), catalog()).unwrap();
        assert_eq!(policy.src_addrs, vec![AddressObject::Any]);
        assert_eq!(policy.dst_addrs, vec![AddressObject::Any]);
        assert_eq!(policy.services, vec![ServiceObject::Any]);
    }

    #[test]
    fn explicit_empty_axis_stays_empty() {
        let policy = flatten_one(draft("1").with_src_addrs(vec![]), catalog()).unwrap();
        assert!(policy.src_addrs.is_empty());
    }

    #[test]
    fn universal_member_expands_to_any() {
        let policy = flatten_one(
            draft("1").with_src_addrs(vec!["ALL".to_string()]),
            catalog(),
        )
        .unwrap();
        assert_eq!(policy.src_addrs, vec![AddressObject::Any]);
    }

    #[test]
    fn cycle_is_detected() {
        let mut catalog = catalog();
        catalog.add_address_group("A", vec!["B".to_string()]);
        catalog.add_address_group("B", vec!["A".to_string()]);

        let err = flatten_one(draft("42").with_src_addrs(vec!["A".to_string()]), catalog)
            .unwrap_err();
        match err {
            DrishtiError::CycleDetected { name, policy_id } => {
                assert_eq!(name, "A");
                assert_eq!(policy_id, "42");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn shared_group_is_not_a_cycle() {
        // the same group may appear under several top-level names
        let mut catalog = catalog();
        catalog.add_address_group("G1", vec!["GRP_AB".to_string()]);
        catalog.add_address_group("G2", vec!["GRP_AB".to_string()]);

        let policy = flatten_one(
            draft("1").with_src_addrs(vec!["G1".to_string(), "G2".to_string()]),
            catalog,
        )
        .unwrap();
        assert_eq!(policy.src_addrs.len(), 4);
    }

    #[test]
    fn unknown_address_is_dropped() {
        let policy = flatten_one(
            draft("1").with_src_addrs(vec!["MISSING".to_string(), "NET_A".to_string()]),
            catalog(),
        )
        .unwrap();
        let names: Vec<&str> = policy.src_addrs.iter().map(AddressObject::name).collect();
        assert_eq!(names, vec!["NET_A"]);
    }

    #[test]
    fn service_group_expands() {
        let policy = flatten_one(
            draft("1").with_services(vec!["WEB".to_string()]),
            catalog(),
        )
        .unwrap();
        let names: Vec<&str> = policy.services.iter().map(ServiceObject::name).collect();
        assert_eq!(names, vec!["HTTP", "HTTPS"]);
    }

    #[test]
    fn service_falls_back_to_well_known_registry() {
        let policy = flatten_one(
            draft("1").with_services(vec!["dns".to_string()]),
            catalog(),
        )
        .unwrap();
        assert_eq!(policy.services.len(), 2);
        assert!(policy.services.iter().all(|s| s.covers(
            match s {
                ServiceObject::Ports { protocol, .. } => *protocol,
                ServiceObject::Any => Protocol::Tcp,
            },
            53
        )));
    }

    #[test]
    fn service_falls_back_to_adhoc_syntax() {
        let policy = flatten_one(
            draft("1").with_services(vec!["tcp_8080".to_string(), "udp_4000-4100".to_string()]),
            catalog(),
        )
        .unwrap();
        assert_eq!(policy.services.len(), 2);
        assert!(policy.services[0].covers(Protocol::Tcp, 8080));
        assert!(policy.services[1].covers(Protocol::Udp, 4050));
        assert!(!policy.services[1].covers(Protocol::Udp, 4101));
    }

    #[test]
    fn bogus_adhoc_is_dropped() {
        let policy = flatten_one(
            draft("1").with_services(vec![
                "tcp_0".to_string(),
                "tcp_99999".to_string(),
                "icmp_8".to_string(),
                "tcp_90-80".to_string(),
            ]),
            catalog(),
        )
        .unwrap();
        assert!(policy.services.is_empty());
    }

    #[test]
    fn member_order_does_not_change_coverage() {
        let forward = flatten_one(
            draft("1").with_src_addrs(vec!["GRP_AB".to_string()]),
            catalog(),
        )
        .unwrap();

        let mut reversed_catalog = catalog();
        reversed_catalog.add_address_group(
            "GRP_AB",
            vec!["NET_B".to_string(), "NET_A".to_string()],
        );
        let reversed = flatten_one(
            draft("1").with_src_addrs(vec!["GRP_AB".to_string()]),
            reversed_catalog,
        )
        .unwrap();

        let probe: std::net::IpAddr = "10.0.1.77".parse().unwrap();
        assert_eq!(
            forward.src_addrs.iter().any(|a| a.covers(&probe)),
            reversed.src_addrs.iter().any(|a| a.covers(&probe)),
        );
    }
}
