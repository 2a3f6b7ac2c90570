//! Per-flow first-match evaluation

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use tracing::trace;

use drishti_common::types::{Action, Decision, Protocol, Reason, Task};
use drishti_policy::model::{AddressObject, Policy, ServiceObject};

/// Sorted, read-only policy table.
///
/// Construction performs a stable sort by ascending priority (equal
/// priorities keep source order); nothing is mutated afterwards, so the
/// table is shared across workers without locking.
#[derive(Debug)]
pub struct Evaluator {
    pub(crate) policies: Vec<Policy>,
}

/// The outcome of evaluating one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub decision: Decision,
    pub policy_id: Option<String>,
    pub policy_action: Option<Action>,
    pub reason: Reason,
}

impl Verdict {
    fn matched(policy: &Policy) -> Self {
        let (decision, reason) = match policy.action {
            Action::Accept => (Decision::Allow, Reason::MatchPolicyAccept),
            Action::Deny => (Decision::Deny, Reason::MatchPolicyDeny),
        };
        Self {
            decision,
            policy_id: Some(policy.id.clone()),
            policy_action: Some(policy.action),
            reason,
        }
    }

    fn implicit_deny() -> Self {
        Self {
            decision: Decision::Deny,
            policy_id: None,
            policy_action: None,
            reason: Reason::ImplicitDeny,
        }
    }
}

impl Evaluator {
    #[must_use]
    pub fn new(mut policies: Vec<Policy>) -> Self {
        policies.sort_by_key(|policy| policy.priority);
        Self { policies }
    }

    /// Policies in evaluation order.
    #[inline]
    #[must_use]
    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Evaluate one flow against the table: first enabled policy whose three
    /// axes all cover the task wins; otherwise the implicit deny applies.
    #[must_use]
    pub fn evaluate(&self, task: &Task) -> Verdict {
        for policy in &self.policies {
            if !policy.enabled {
                continue;
            }
            if address_axis_covers(&policy.src_addrs, &task.src_ip)
                && address_axis_covers(&policy.dst_addrs, &task.dst_ip)
                && service_axis_covers(&policy.services, task.protocol, task.port)
            {
                trace!(task = %task, policy_id = %policy.id, "policy matched");
                return Verdict::matched(policy);
            }
        }
        trace!(task = %task, "no policy matched");
        Verdict::implicit_deny()
    }
}

/// True iff the axis list is non-empty and some element covers the address.
/// An explicitly empty axis is vacuously false.
#[inline]
pub(crate) fn address_axis_covers(axis: &[AddressObject], ip: &IpAddr) -> bool {
    axis.iter().any(|object| object.covers(ip))
}

/// True iff the axis list is non-empty and some element covers the
/// (protocol, port) pair.
#[inline]
pub(crate) fn service_axis_covers(axis: &[ServiceObject], protocol: Protocol, port: u16) -> bool {
    axis.iter().any(|object| object.covers(protocol, port))
}
