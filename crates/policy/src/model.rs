//! Policy object model
//!
//! Address and service objects are sum types with a distinguished `Any`
//! variant for the universal sentinel. Membership predicates live here, next
//! to the data, so the evaluator stays a thin first-match loop.

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::net::IpAddr;

use drishti_common::error::{DrishtiError, DrishtiResult};
use drishti_common::net::{byte_compare, cidr_range};
use drishti_common::types::Protocol;

pub use drishti_common::types::Action;

/// Reserved name of the universal sentinel, matched case-insensitively.
pub const UNIVERSAL_NAME: &str = "all";

#[inline]
#[must_use]
pub fn is_universal_name(name: &str) -> bool {
    name.eq_ignore_ascii_case(UNIVERSAL_NAME)
}

/// A named L3 object, or the universal sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressObject {
    /// Matches every address.
    Any,
    /// A canonical CIDR; host bits are zeroed at construction.
    Ipmask { name: String, network: IpNet },
    /// An inclusive address range within one family.
    Range {
        name: String,
        start: IpAddr,
        end: IpAddr,
    },
    /// A domain name, kept for parsing fidelity; never matches statically.
    Fqdn { name: String, domain: String },
}

impl AddressObject {
    /// Build an ipmask object, canonicalizing away the host bits.
    #[must_use]
    pub fn ipmask<S: Into<String>>(name: S, network: IpNet) -> Self {
        AddressObject::Ipmask {
            name: name.into(),
            network: network.trunc(),
        }
    }

    /// Build an iprange object. The endpoints must share a family and
    /// satisfy `start <= end` bytewise.
    pub fn range<S: Into<String>>(name: S, start: IpAddr, end: IpAddr) -> DrishtiResult<Self> {
        if start.is_ipv4() != end.is_ipv4() {
            return Err(DrishtiError::InvalidNetwork(format!(
                "iprange endpoints mix address families: {start} - {end}"
            )));
        }
        if byte_compare(&start, &end) == Ordering::Greater {
            return Err(DrishtiError::InvalidNetwork(format!(
                "iprange start {start} is after end {end}"
            )));
        }
        Ok(AddressObject::Range {
            name: name.into(),
            start,
            end,
        })
    }

    #[must_use]
    pub fn fqdn<S: Into<String>>(name: S, domain: S) -> Self {
        AddressObject::Fqdn {
            name: name.into(),
            domain: domain.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            AddressObject::Any => UNIVERSAL_NAME,
            AddressObject::Ipmask { name, .. }
            | AddressObject::Range { name, .. }
            | AddressObject::Fqdn { name, .. } => name,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_any(&self) -> bool {
        matches!(self, AddressObject::Any)
    }

    /// Whether this object covers the given address.
    #[must_use]
    pub fn covers(&self, ip: &IpAddr) -> bool {
        match self {
            AddressObject::Any => true,
            AddressObject::Ipmask { network, .. } => network.contains(ip),
            AddressObject::Range { start, end, .. } => {
                start.is_ipv4() == ip.is_ipv4()
                    && byte_compare(ip, start) != Ordering::Less
                    && byte_compare(ip, end) != Ordering::Greater
            }
            AddressObject::Fqdn { .. } => false,
        }
    }

    /// Inclusive `[first, last]` bounds for range-bearing variants.
    /// `Any` and `Fqdn` carry no bounds.
    #[must_use]
    pub fn bounds(&self) -> Option<(IpAddr, IpAddr)> {
        match self {
            AddressObject::Any | AddressObject::Fqdn { .. } => None,
            AddressObject::Ipmask { network, .. } => Some(cidr_range(network)),
            AddressObject::Range { start, end, .. } => Some((*start, *end)),
        }
    }
}

/// A named L4 object, or the universal sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceObject {
    /// Matches every (protocol, port).
    Any,
    /// An inclusive port range scoped to one protocol.
    Ports {
        name: String,
        protocol: Protocol,
        start_port: u16,
        end_port: u16,
    },
}

impl ServiceObject {
    /// Build a port-range service. Ports must satisfy `1 <= start <= end`.
    pub fn ports<S: Into<String>>(
        name: S,
        protocol: Protocol,
        start_port: u16,
        end_port: u16,
    ) -> DrishtiResult<Self> {
        if start_port == 0 || start_port > end_port {
            return Err(DrishtiError::Input(format!(
                "invalid port range {start_port}-{end_port}"
            )));
        }
        Ok(ServiceObject::Ports {
            name: name.into(),
            protocol,
            start_port,
            end_port,
        })
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            ServiceObject::Any => UNIVERSAL_NAME,
            ServiceObject::Ports { name, .. } => name,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_any(&self) -> bool {
        matches!(self, ServiceObject::Any)
    }

    /// Whether this object covers the given (protocol, port).
    #[inline]
    #[must_use]
    pub fn covers(&self, protocol: Protocol, port: u16) -> bool {
        match self {
            ServiceObject::Any => true,
            ServiceObject::Ports {
                protocol: svc_protocol,
                start_port,
                end_port,
                ..
            } => *svc_protocol == protocol && (*start_port..=*end_port).contains(&port),
        }
    }
}

/// A fully flattened policy, ready for evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    /// Smaller priorities are evaluated first; ties keep source order.
    pub priority: i64,
    pub name: String,
    pub action: Action,
    pub enabled: bool,
    pub src_addrs: Vec<AddressObject>,
    pub dst_addrs: Vec<AddressObject>,
    pub services: Vec<ServiceObject>,
}

/// A parsed policy whose axis member lists are still raw names.
///
/// `None` means the source omitted the field entirely (defaults to the
/// universal sentinel); `Some(vec![])` means an explicitly empty list, which
/// stays empty and can never match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDraft {
    pub id: String,
    pub priority: i64,
    pub name: String,
    pub action: Action,
    pub enabled: bool,
    pub src_addr_names: Option<Vec<String>>,
    pub dst_addr_names: Option<Vec<String>>,
    pub service_names: Option<Vec<String>>,
}

impl PolicyDraft {
    #[must_use]
    pub fn new<S: Into<String>>(id: S, priority: i64, action: Action) -> Self {
        Self {
            id: id.into(),
            priority,
            name: String::new(),
            action,
            enabled: true,
            src_addr_names: None,
            dst_addr_names: None,
            service_names: None,
        }
    }

    #[must_use]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_src_addrs(mut self, names: Vec<String>) -> Self {
        self.src_addr_names = Some(names);
        self
    }

    #[must_use]
    pub fn with_dst_addrs(mut self, names: Vec<String>) -> Self {
        self.dst_addr_names = Some(names);
        self
    }

    #[must_use]
    pub fn with_services(mut self, names: Vec<String>) -> Self {
        self.service_names = Some(names);
        self
    }
}

/// Name-keyed object and group tables, as produced by a policy provider.
///
/// A service name maps to a list of objects: a single source-side service
/// may legitimately carry several protocol/port-range entries (tcp+udp DNS),
/// matching the shape the well-known registry returns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectCatalog {
    pub addresses: HashMap<String, AddressObject>,
    pub address_groups: HashMap<String, Vec<String>>,
    pub services: HashMap<String, Vec<ServiceObject>>,
    pub service_groups: HashMap<String, Vec<String>>,
}

impl ObjectCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_address(&mut self, object: AddressObject) {
        self.addresses.insert(object.name().to_string(), object);
    }

    pub fn add_address_group<S: Into<String>>(&mut self, name: S, members: Vec<String>) {
        self.address_groups.insert(name.into(), members);
    }

    pub fn add_service(&mut self, object: ServiceObject) {
        self.services
            .entry(object.name().to_string())
            .or_default()
            .push(object);
    }

    pub fn add_service_group<S: Into<String>>(&mut self, name: S, members: Vec<String>) {
        self.service_groups.insert(name.into(), members);
    }
}

/// Everything a policy provider hands to the flattener.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicySet {
    pub catalog: ObjectCatalog,
    pub drafts: Vec<PolicyDraft>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn ipmask_canonicalizes_host_bits() {
        let raw: IpNet = "10.0.0.57/24".parse().unwrap();
        let obj = AddressObject::ipmask("SRC", raw);
        match &obj {
            AddressObject::Ipmask { network, .. } => {
                assert_eq!(network.to_string(), "10.0.0.0/24");
            }
            other => panic!("unexpected variant {other:?}"),
        }
        assert!(obj.covers(&ip("10.0.0.1")));
        assert!(obj.covers(&ip("10.0.0.255")));
        assert!(!obj.covers(&ip("10.0.1.0")));
    }

    #[test]
    fn range_endpoints_are_inclusive() {
        let obj = AddressObject::range("R", ip("10.0.0.1"), ip("10.0.0.10")).unwrap();
        assert!(obj.covers(&ip("10.0.0.1")));
        assert!(obj.covers(&ip("10.0.0.5")));
        assert!(obj.covers(&ip("10.0.0.10")));
        assert!(!obj.covers(&ip("10.0.0.0")));
        assert!(!obj.covers(&ip("10.0.0.11")));
    }

    #[test]
    fn range_rejects_inverted_and_mixed_endpoints() {
        assert!(AddressObject::range("bad", ip("10.0.0.10"), ip("10.0.0.1")).is_err());
        assert!(AddressObject::range("mixed", ip("10.0.0.1"), ip("2001:db8::1")).is_err());
    }

    #[test]
    fn fqdn_never_covers() {
        let obj = AddressObject::fqdn("web", "example.com");
        assert!(!obj.covers(&ip("93.184.216.34")));
        assert!(obj.bounds().is_none());
    }

    #[test]
    fn any_covers_both_families() {
        assert!(AddressObject::Any.covers(&ip("10.0.0.1")));
        assert!(AddressObject::Any.covers(&ip("2001:db8::1")));
        assert!(AddressObject::Any.is_any());
    }

    #[test]
    fn range_does_not_cover_other_family() {
        let obj = AddressObject::range("R", ip("10.0.0.1"), ip("10.0.0.10")).unwrap();
        assert!(!obj.covers(&ip("::ffff:10.0.0.5")));
    }

    #[test]
    fn service_ports_are_protocol_scoped() {
        let dns = ServiceObject::ports("DNS", Protocol::Udp, 53, 53).unwrap();
        assert!(dns.covers(Protocol::Udp, 53));
        assert!(!dns.covers(Protocol::Tcp, 53));
        assert!(!dns.covers(Protocol::Udp, 54));

        let wide = ServiceObject::ports("HI", Protocol::Tcp, 8000, 8100).unwrap();
        assert!(wide.covers(Protocol::Tcp, 8000));
        assert!(wide.covers(Protocol::Tcp, 8100));
        assert!(!wide.covers(Protocol::Tcp, 8101));
    }

    #[test]
    fn service_port_validation() {
        assert!(ServiceObject::ports("z", Protocol::Tcp, 0, 80).is_err());
        assert!(ServiceObject::ports("z", Protocol::Tcp, 90, 80).is_err());
        assert!(ServiceObject::ports("z", Protocol::Tcp, 80, 80).is_ok());
    }

    #[test]
    fn universal_name_is_case_insensitive() {
        assert!(is_universal_name("all"));
        assert!(is_universal_name("ALL"));
        assert!(is_universal_name("All"));
        assert!(!is_universal_name("allow"));
    }

    #[test]
    fn catalog_collects_multi_entry_services() {
        let mut catalog = ObjectCatalog::new();
        catalog.add_service(ServiceObject::ports("DNS", Protocol::Tcp, 53, 53).unwrap());
        catalog.add_service(ServiceObject::ports("DNS", Protocol::Udp, 53, 53).unwrap());
        assert_eq!(catalog.services.get("DNS").map(Vec::len), Some(2));
    }
}
