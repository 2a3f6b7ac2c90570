//! FortiGate configuration parser
//!
//! Line-oriented state machine over the `edit` / `set` / `next` / `end`
//! structure. Only the five firewall sections below are consumed; every
//! other `config` block is skipped wholesale. Malformed objects are dropped
//! with a warning, keeping the rest of the configuration usable.

use anyhow::Result;
use ipnet::{IpNet, Ipv4Net};
use std::net::{IpAddr, Ipv4Addr};
use tracing::warn;

use drishti_common::types::{Action, Protocol};
use drishti_policy::model::{AddressObject, ObjectCatalog, PolicyDraft, PolicySet, ServiceObject};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Address,
    AddressGroup,
    ServiceCustom,
    ServiceGroup,
    Policy,
}

impl Section {
    fn from_path(path: &str) -> Option<Self> {
        match path {
            "firewall address" => Some(Section::Address),
            "firewall addrgrp" => Some(Section::AddressGroup),
            "firewall service custom" => Some(Section::ServiceCustom),
            "firewall service group" => Some(Section::ServiceGroup),
            "firewall policy" => Some(Section::Policy),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct AddressBuilder {
    name: String,
    kind: Option<String>,
    subnet: Option<IpNet>,
    start_ip: Option<IpAddr>,
    end_ip: Option<IpAddr>,
    fqdn: Option<String>,
}

impl AddressBuilder {
    fn finish(self) -> Option<AddressObject> {
        match self.kind.as_deref() {
            Some("fqdn") => {
                let domain = self.fqdn?;
                Some(AddressObject::fqdn(self.name, domain))
            }
            Some("iprange") => {
                let (start, end) = (self.start_ip?, self.end_ip?);
                match AddressObject::range(self.name.clone(), start, end) {
                    Ok(object) => Some(object),
                    Err(error) => {
                        warn!(object = %self.name, %error, "dropping invalid iprange address");
                        None
                    }
                }
            }
            // ipmask is the default type
            _ => {
                let network = self.subnet?;
                Some(AddressObject::ipmask(self.name, network))
            }
        }
    }
}

#[derive(Debug, Default)]
struct ServiceBuilder {
    name: String,
    tcp_ranges: Vec<(u16, u16)>,
    udp_ranges: Vec<(u16, u16)>,
}

#[derive(Debug, Default)]
struct GroupBuilder {
    name: String,
    members: Vec<String>,
}

#[derive(Debug)]
struct PolicyBuilder {
    id: String,
    priority: i64,
    name: String,
    action: Action,
    enabled: bool,
    srcaddr: Option<Vec<String>>,
    dstaddr: Option<Vec<String>>,
    service: Option<Vec<String>>,
}

impl PolicyBuilder {
    fn new(id: String, priority: i64) -> Self {
        Self {
            id,
            priority,
            name: String::new(),
            // FortiGate policies deny unless an action is set
            action: Action::Deny,
            enabled: true,
            srcaddr: None,
            dstaddr: None,
            service: None,
        }
    }

    fn finish(self) -> PolicyDraft {
        let mut draft = PolicyDraft::new(self.id, self.priority, self.action)
            .with_name(self.name)
            .with_enabled(self.enabled);
        draft.src_addr_names = self.srcaddr;
        draft.dst_addr_names = self.dstaddr;
        draft.service_names = self.service;
        draft
    }
}

#[derive(Debug, Default)]
enum Builder {
    #[default]
    None,
    Address(AddressBuilder),
    Service(ServiceBuilder),
    Group(GroupBuilder),
    Policy(PolicyBuilder),
}

/// Split a configuration line into tokens, honouring double quotes.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in line.trim().chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Derive a prefix length from a dotted netmask; non-contiguous masks are
/// rejected.
fn mask_to_prefix(mask: Ipv4Addr) -> Option<u8> {
    let bits = u32::from(mask);
    let ones = bits.leading_ones();
    let contiguous = bits == u32::MAX.checked_shl(32 - ones).unwrap_or(0);
    contiguous.then_some(ones as u8)
}

/// Parse `set subnet` arguments: either `<ip>/<prefix>` or `<ip> <netmask>`.
fn parse_subnet(args: &[String]) -> Option<IpNet> {
    match args {
        [one] if one.contains('/') => one.parse::<IpNet>().ok(),
        [ip, mask] => {
            let ip: Ipv4Addr = ip.parse().ok()?;
            let mask: Ipv4Addr = mask.parse().ok()?;
            let prefix = mask_to_prefix(mask)?;
            Ipv4Net::new(ip, prefix).ok().map(IpNet::from)
        }
        _ => None,
    }
}

/// Parse one `tcp-portrange` token: `low[-high]`, optionally with a
/// `:source-range` suffix that is ignored here.
fn parse_port_range(token: &str) -> Option<(u16, u16)> {
    let destination = token.split(':').next()?;
    let (start, end) = match destination.split_once('-') {
        Some((start, end)) => (start.parse().ok()?, end.parse().ok()?),
        None => {
            let port = destination.parse().ok()?;
            (port, port)
        }
    };
    (start >= 1 && start <= end).then_some((start, end))
}

/// Parse a FortiGate configuration dump into catalog tables and policy
/// drafts. Policy priority is the order of appearance.
pub fn parse_config(text: &str) -> Result<PolicySet> {
    let mut catalog = ObjectCatalog::new();
    let mut drafts = Vec::new();

    let mut section: Option<Section> = None;
    let mut skip_depth = 0usize;
    let mut builder = Builder::None;
    let mut policy_seq = 0i64;

    for line in text.lines() {
        let tokens = tokenize(line);
        let Some(keyword) = tokens.first() else {
            continue;
        };

        if skip_depth > 0 {
            match keyword.as_str() {
                "config" => skip_depth += 1,
                "end" => skip_depth -= 1,
                _ => {}
            }
            continue;
        }

        match keyword.as_str() {
            "config" => {
                let path = tokens[1..].join(" ");
                match Section::from_path(&path) {
                    Some(found) if section.is_none() => section = Some(found),
                    // nested or unrecognized block: skip to its end
                    _ => skip_depth = 1,
                }
            }
            "edit" if tokens.len() >= 2 => {
                let name = tokens[1].clone();
                builder = match section {
                    Some(Section::Address) => Builder::Address(AddressBuilder {
                        name,
                        ..AddressBuilder::default()
                    }),
                    Some(Section::ServiceCustom) => Builder::Service(ServiceBuilder {
                        name,
                        ..ServiceBuilder::default()
                    }),
                    Some(Section::AddressGroup) | Some(Section::ServiceGroup) => {
                        Builder::Group(GroupBuilder {
                            name,
                            members: Vec::new(),
                        })
                    }
                    Some(Section::Policy) => {
                        policy_seq += 1;
                        Builder::Policy(PolicyBuilder::new(name, policy_seq))
                    }
                    None => Builder::None,
                };
            }
            "set" if tokens.len() >= 2 => {
                apply_set(&mut builder, &tokens[1], &tokens[2..]);
            }
            "next" => {
                finish_builder(
                    std::mem::take(&mut builder),
                    section,
                    &mut catalog,
                    &mut drafts,
                );
            }
            "end" => {
                finish_builder(
                    std::mem::take(&mut builder),
                    section,
                    &mut catalog,
                    &mut drafts,
                );
                section = None;
            }
            _ => {}
        }
    }

    Ok(PolicySet { catalog, drafts })
}

fn apply_set(builder: &mut Builder, key: &str, args: &[String]) {
    match builder {
        Builder::Address(address) => match key {
            "type" => address.kind = args.first().cloned(),
            "subnet" => address.subnet = parse_subnet(args),
            "start-ip" => address.start_ip = args.first().and_then(|arg| arg.parse().ok()),
            "end-ip" => address.end_ip = args.first().and_then(|arg| arg.parse().ok()),
            "fqdn" => address.fqdn = args.first().cloned(),
            _ => {}
        },
        Builder::Service(service) => match key {
            "tcp-portrange" => service
                .tcp_ranges
                .extend(args.iter().filter_map(|token| parse_port_range(token))),
            "udp-portrange" => service
                .udp_ranges
                .extend(args.iter().filter_map(|token| parse_port_range(token))),
            _ => {}
        },
        Builder::Group(group) => {
            if key == "member" {
                group.members.extend(args.iter().cloned());
            }
        }
        Builder::Policy(policy) => match key {
            "name" => policy.name = args.first().cloned().unwrap_or_default(),
            "action" => {
                policy.action = match args.first().map(String::as_str) {
                    Some("accept") => Action::Accept,
                    _ => Action::Deny,
                };
            }
            "status" => policy.enabled = args.first().map(String::as_str) != Some("disable"),
            "srcaddr" => policy.srcaddr = Some(args.to_vec()),
            "dstaddr" => policy.dstaddr = Some(args.to_vec()),
            "service" => policy.service = Some(args.to_vec()),
            _ => {}
        },
        Builder::None => {}
    }
}

fn finish_builder(
    builder: Builder,
    section: Option<Section>,
    catalog: &mut ObjectCatalog,
    drafts: &mut Vec<PolicyDraft>,
) {
    match builder {
        Builder::None => {}
        Builder::Address(address) => {
            let name = address.name.clone();
            match address.finish() {
                Some(object) => catalog.add_address(object),
                None => warn!(object = %name, "dropping incomplete firewall address"),
            }
        }
        Builder::Service(service) => {
            if service.tcp_ranges.is_empty() && service.udp_ranges.is_empty() {
                warn!(object = %service.name, "dropping service without port ranges");
                return;
            }
            for (start, end) in &service.tcp_ranges {
                add_service(catalog, &service.name, Protocol::Tcp, *start, *end);
            }
            for (start, end) in &service.udp_ranges {
                add_service(catalog, &service.name, Protocol::Udp, *start, *end);
            }
        }
        Builder::Group(group) => match section {
            Some(Section::AddressGroup) => catalog.add_address_group(group.name, group.members),
            Some(Section::ServiceGroup) => catalog.add_service_group(group.name, group.members),
            _ => {}
        },
        Builder::Policy(policy) => drafts.push(policy.finish()),
    }
}

fn add_service(catalog: &mut ObjectCatalog, name: &str, protocol: Protocol, start: u16, end: u16) {
    match ServiceObject::ports(name, protocol, start, end) {
        Ok(object) => catalog.add_service(object),
        Err(error) => warn!(object = %name, %error, "dropping invalid service port range"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
config system global
    set hostname "fw-lab"
end
config firewall address
    edit "NET_A"
        set subnet 10.0.0.0 255.255.255.0
    next
    edit "NET_SLASH"
        set subnet 172.16.0.0/12
    next
    edit "RANGE_1"
        set type iprange
        set start-ip 10.0.0.1
        set end-ip 10.0.0.10
    next
    edit "WEB_FQDN"
        set type fqdn
        set fqdn "www.example.com"
    next
    edit "BAD_MASK"
        set subnet 10.1.0.0 255.0.255.0
    next
end
config firewall addrgrp
    edit "GRP_LAB"
        set member "NET_A" "RANGE_1"
    next
end
config firewall service custom
    edit "HTTP"
        set tcp-portrange 80
    next
    edit "DNS_SVC"
        set tcp-portrange 53
        set udp-portrange 53
    next
    edit "HI_PORTS"
        set tcp-portrange 8000-8080:1024-65535 9000
    next
end
config firewall service group
    edit "WEB_SVCS"
        set member "HTTP" "HI_PORTS"
    next
end
config firewall policy
    edit 1
        set name "lab to dmz"
        set srcaddr "GRP_LAB"
        set dstaddr "NET_SLASH"
        set action accept
        set service "WEB_SVCS"
    next
    edit 2
        set name "disabled catchall"
        set srcaddr "all"
        set dstaddr "all"
        set service "ALL"
        set status disable
    next
    edit 3
        set srcaddr "all"
        set dstaddr "all"
    next
end
"#;

    #[test]
    fn parses_address_forms() {
        let set = parse_config(SAMPLE).unwrap();
        let catalog = &set.catalog;

        match catalog.addresses.get("NET_A").unwrap() {
            AddressObject::Ipmask { network, .. } => {
                assert_eq!(network.to_string(), "10.0.0.0/24");
            }
            other => panic!("unexpected {other:?}"),
        }
        match catalog.addresses.get("NET_SLASH").unwrap() {
            AddressObject::Ipmask { network, .. } => {
                assert_eq!(network.to_string(), "172.16.0.0/12");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            catalog.addresses.get("RANGE_1").unwrap(),
            AddressObject::Range { .. }
        ));
        assert!(matches!(
            catalog.addresses.get("WEB_FQDN").unwrap(),
            AddressObject::Fqdn { .. }
        ));
        // non-contiguous netmask is rejected
        assert!(!catalog.addresses.contains_key("BAD_MASK"));
    }

    #[test]
    fn parses_groups() {
        let set = parse_config(SAMPLE).unwrap();
        assert_eq!(
            set.catalog.address_groups.get("GRP_LAB").unwrap(),
            &vec!["NET_A".to_string(), "RANGE_1".to_string()]
        );
        assert_eq!(
            set.catalog.service_groups.get("WEB_SVCS").unwrap(),
            &vec!["HTTP".to_string(), "HI_PORTS".to_string()]
        );
    }

    #[test]
    fn parses_services_with_multiple_ranges() {
        let set = parse_config(SAMPLE).unwrap();
        let catalog = &set.catalog;

        let dns = catalog.services.get("DNS_SVC").unwrap();
        assert_eq!(dns.len(), 2);
        assert!(dns.iter().any(|s| s.covers(Protocol::Tcp, 53)));
        assert!(dns.iter().any(|s| s.covers(Protocol::Udp, 53)));

        // source-port suffix is ignored, both ranges kept
        let hi = catalog.services.get("HI_PORTS").unwrap();
        assert_eq!(hi.len(), 2);
        assert!(hi.iter().any(|s| s.covers(Protocol::Tcp, 8080)));
        assert!(hi.iter().any(|s| s.covers(Protocol::Tcp, 9000)));
    }

    #[test]
    fn parses_policies_in_appearance_order() {
        let set = parse_config(SAMPLE).unwrap();
        assert_eq!(set.drafts.len(), 3);

        let first = &set.drafts[0];
        assert_eq!(first.id, "1");
        assert_eq!(first.priority, 1);
        assert_eq!(first.name, "lab to dmz");
        assert_eq!(first.action, Action::Accept);
        assert!(first.enabled);
        assert_eq!(first.src_addr_names.as_deref().unwrap(), ["GRP_LAB"]);
        assert_eq!(first.service_names.as_deref().unwrap(), ["WEB_SVCS"]);

        let second = &set.drafts[1];
        assert!(!second.enabled);
        assert_eq!(second.priority, 2);

        // action defaults to deny, omitted service stays omitted
        let third = &set.drafts[2];
        assert_eq!(third.action, Action::Deny);
        assert!(third.service_names.is_none());
    }

    #[test]
    fn unknown_sections_are_skipped() {
        let text = "config vpn ipsec phase1\n    edit \"tun0\"\n        set interface \"wan1\"\n    next\nend\nconfig firewall policy\n    edit 9\n        set action accept\n    next\nend\n";
        let set = parse_config(text).unwrap();
        assert_eq!(set.drafts.len(), 1);
        assert_eq!(set.drafts[0].id, "9");
    }

    #[test]
    fn quoted_names_keep_spaces() {
        let text = "config firewall address\n    edit \"branch office net\"\n        set subnet 192.168.50.0 255.255.255.0\n    next\nend\n";
        let set = parse_config(text).unwrap();
        assert!(set.catalog.addresses.contains_key("branch office net"));
    }

    #[test]
    fn mask_to_prefix_contiguity() {
        assert_eq!(mask_to_prefix("255.255.255.0".parse().unwrap()), Some(24));
        assert_eq!(mask_to_prefix("255.255.255.255".parse().unwrap()), Some(32));
        assert_eq!(mask_to_prefix("0.0.0.0".parse().unwrap()), Some(0));
        assert_eq!(mask_to_prefix("255.0.255.0".parse().unwrap()), None);
        assert_eq!(mask_to_prefix("0.255.255.255".parse().unwrap()), None);
    }

    #[test]
    fn port_range_tokens() {
        assert_eq!(parse_port_range("80"), Some((80, 80)));
        assert_eq!(parse_port_range("8000-8080"), Some((8000, 8080)));
        assert_eq!(parse_port_range("8000-8080:1024-65535"), Some((8000, 8080)));
        assert_eq!(parse_port_range("0"), None);
        assert_eq!(parse_port_range("90-80"), None);
        assert_eq!(parse_port_range("junk"), None);
    }
}
