//! CIDR-relation precheck
//!
//! Classifies a whole (source CIDR, destination CIDR) pair at a fixed
//! (port, protocol) without enumerating hosts. When the first policy that
//! touches the pair fully spans both CIDRs, every host pair inside shares
//! its fate; only a partial overlap forces per-host expansion.

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::fmt;

use drishti_common::net::{cidr_range, widen};
use drishti_common::types::{Action, Protocol};
use drishti_policy::model::AddressObject;

use crate::evaluator::{service_axis_covers, Evaluator};

/// How an address axis relates to a queried CIDR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    /// No element overlaps the CIDR.
    None,
    /// Elements overlap the CIDR but none spans it.
    Partial,
    /// Some element spans the whole CIDR.
    Full,
}

/// Classification of a CIDR pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrecheckOutcome {
    /// Every host pair is denied; the pair can be skipped.
    Skip,
    /// Every host pair is allowed by the same policy.
    AllowAll,
    /// The decision boundary lies inside the pair; enumerate hosts.
    Expand,
}

impl PrecheckOutcome {
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            PrecheckOutcome::Skip => "SKIP",
            PrecheckOutcome::AllowAll => "ALLOW_ALL",
            PrecheckOutcome::Expand => "EXPAND",
        }
    }
}

impl fmt::Display for PrecheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrecheckReason {
    Partial,
    AllowAll,
    Deny,
    ImplicitDeny,
}

impl PrecheckReason {
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            PrecheckReason::Partial => "PRECHECK_PARTIAL",
            PrecheckReason::AllowAll => "PRECHECK_ALLOW_ALL",
            PrecheckReason::Deny => "PRECHECK_DENY",
            PrecheckReason::ImplicitDeny => "PRECHECK_IMPLICIT_DENY",
        }
    }
}

impl fmt::Display for PrecheckReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a precheck query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecheckVerdict {
    pub outcome: PrecheckOutcome,
    pub policy_id: Option<String>,
    pub reason: PrecheckReason,
}

impl Evaluator {
    /// Classify a (source CIDR, destination CIDR) pair at the given
    /// (port, protocol) against the policy table in priority order.
    #[must_use]
    pub fn precheck(
        &self,
        src: &IpNet,
        dst: &IpNet,
        port: u16,
        protocol: Protocol,
    ) -> PrecheckVerdict {
        for policy in &self.policies {
            if !policy.enabled {
                continue;
            }
            if !service_axis_covers(&policy.services, protocol, port) {
                continue;
            }
            let src_coverage = axis_coverage(&policy.src_addrs, src);
            if src_coverage == Coverage::None {
                continue;
            }
            let dst_coverage = axis_coverage(&policy.dst_addrs, dst);
            if dst_coverage == Coverage::None {
                continue;
            }

            if src_coverage == Coverage::Partial || dst_coverage == Coverage::Partial {
                return PrecheckVerdict {
                    outcome: PrecheckOutcome::Expand,
                    policy_id: Some(policy.id.clone()),
                    reason: PrecheckReason::Partial,
                };
            }

            // Both axes fully span the pair; first match decides for every
            // host pair inside.
            return match policy.action {
                Action::Accept => PrecheckVerdict {
                    outcome: PrecheckOutcome::AllowAll,
                    policy_id: Some(policy.id.clone()),
                    reason: PrecheckReason::AllowAll,
                },
                Action::Deny => PrecheckVerdict {
                    outcome: PrecheckOutcome::Skip,
                    policy_id: Some(policy.id.clone()),
                    reason: PrecheckReason::Deny,
                },
            };
        }

        PrecheckVerdict {
            outcome: PrecheckOutcome::Skip,
            policy_id: None,
            reason: PrecheckReason::ImplicitDeny,
        }
    }
}

/// Relation of one address axis to a CIDR. IPv4 and IPv6 ranges never
/// overlap; the universal sentinel spans everything.
fn axis_coverage(axis: &[AddressObject], target: &IpNet) -> Coverage {
    let (first, last) = cidr_range(target);
    let target_is_v4 = first.is_ipv4();
    let first = widen(&first);
    let last = widen(&last);

    let mut overlaps = false;
    for object in axis {
        if object.is_any() {
            return Coverage::Full;
        }
        let Some((start, end)) = object.bounds() else {
            continue;
        };
        if start.is_ipv4() != target_is_v4 {
            continue;
        }
        let start = widen(&start);
        let end = widen(&end);
        if end < first || start > last {
            continue;
        }
        if start <= first && end >= last {
            return Coverage::Full;
        }
        overlaps = true;
    }

    if overlaps {
        Coverage::Partial
    } else {
        Coverage::None
    }
}
