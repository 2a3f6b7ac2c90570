//! Evaluation worker pool
//!
//! A fixed set of workers drains the shared task receiver, evaluates each
//! task against the shared immutable policy table, and forwards decorated
//! results. Workers exit when the task channel closes or the writer goes
//! away.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

use drishti_common::types::{
    SimulationResult, Task, META_DST_GN, META_DST_LOCATION, META_DST_SITE,
};
use drishti_evaluator::{Evaluator, Verdict};

/// Spawn `count` workers over the shared task receiver.
pub fn spawn_workers(
    count: usize,
    evaluator: Arc<Evaluator>,
    tasks: Arc<Mutex<mpsc::Receiver<Task>>>,
    results: mpsc::Sender<SimulationResult>,
) -> Vec<JoinHandle<u64>> {
    (0..count)
        .map(|worker_id| {
            let evaluator = evaluator.clone();
            let tasks = tasks.clone();
            let results = results.clone();
            tokio::spawn(async move {
                let mut processed = 0u64;
                loop {
                    let task = { tasks.lock().await.recv().await };
                    let Some(task) = task else { break };

                    let verdict = evaluator.evaluate(&task);
                    let result = decorate(task, verdict);
                    if results.send(result).await.is_err() {
                        // writer is gone; nothing left to do
                        break;
                    }
                    processed += 1;
                }
                debug!(worker_id, processed, "worker finished");
                processed
            })
        })
        .collect()
}

/// Combine a task and its verdict into the result record, projecting the
/// destination metadata into its fixed columns.
fn decorate(task: Task, verdict: Verdict) -> SimulationResult {
    let meta = |key: &str| task.dst_metadata.get(key).cloned().unwrap_or_default();
    SimulationResult {
        dst_gn: meta(META_DST_GN),
        dst_site: meta(META_DST_SITE),
        dst_location: meta(META_DST_LOCATION),
        src_segment: task.src_segment,
        dst_segment: task.dst_segment,
        service_label: task.service_label,
        protocol: task.protocol,
        port: task.port,
        decision: verdict.decision,
        matched_policy_id: verdict.policy_id.unwrap_or_default(),
        matched_policy_action: verdict
            .policy_action
            .map(|action| action.as_str().to_string())
            .unwrap_or_default(),
        reason: verdict.reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drishti_common::types::{Action, Decision, Protocol, Reason};
    use drishti_policy::model::{AddressObject, Policy, ServiceObject};
    use std::collections::HashMap;
    use std::net::IpAddr;

    fn accept_all() -> Policy {
        Policy {
            id: "1".to_string(),
            priority: 1,
            name: "accept all".to_string(),
            action: Action::Accept,
            enabled: true,
            src_addrs: vec![AddressObject::Any],
            dst_addrs: vec![AddressObject::Any],
            services: vec![ServiceObject::Any],
        }
    }

    fn task(port: u16) -> Task {
        let mut dst_metadata = HashMap::new();
        dst_metadata.insert(META_DST_GN.to_string(), "gn-7".to_string());
        dst_metadata.insert(META_DST_SITE.to_string(), "hq".to_string());
        Task {
            src_ip: "10.0.0.1".parse::<IpAddr>().unwrap(),
            src_segment: "10.0.0.0/24".to_string(),
            dst_ip: "192.168.1.1".parse::<IpAddr>().unwrap(),
            dst_segment: "192.168.1.0/24".to_string(),
            dst_metadata,
            port,
            protocol: Protocol::Tcp,
            service_label: "web".to_string(),
        }
    }

    #[test]
    fn decorate_projects_metadata_and_verdict() {
        let verdict = Verdict {
            decision: Decision::Allow,
            policy_id: Some("42".to_string()),
            policy_action: Some(Action::Accept),
            reason: Reason::MatchPolicyAccept,
        };
        let result = decorate(task(443), verdict);
        assert_eq!(result.dst_gn, "gn-7");
        assert_eq!(result.dst_site, "hq");
        // missing key projects to an empty column
        assert_eq!(result.dst_location, "");
        assert_eq!(result.matched_policy_id, "42");
        assert_eq!(result.matched_policy_action, "accept");
        assert!(result.is_allowed());
    }

    #[test]
    fn decorate_implicit_deny_leaves_policy_columns_empty() {
        let verdict = Verdict {
            decision: Decision::Deny,
            policy_id: None,
            policy_action: None,
            reason: Reason::ImplicitDeny,
        };
        let result = decorate(task(80), verdict);
        assert_eq!(result.matched_policy_id, "");
        assert_eq!(result.matched_policy_action, "");
        assert_eq!(result.reason, Reason::ImplicitDeny);
    }

    #[tokio::test]
    async fn workers_drain_the_channel_exactly_once() {
        let evaluator = Arc::new(Evaluator::new(vec![accept_all()]));
        let (task_tx, task_rx) = mpsc::channel(64);
        let (result_tx, mut result_rx) = mpsc::channel(64);
        let shared_rx = Arc::new(Mutex::new(task_rx));

        let handles = spawn_workers(4, evaluator, shared_rx, result_tx);

        for port in 1..=50u16 {
            task_tx.send(task(port)).await.unwrap();
        }
        drop(task_tx);

        let mut processed = 0u64;
        for handle in handles {
            processed += handle.await.unwrap();
        }
        assert_eq!(processed, 50);

        let mut received = 0;
        while result_rx.recv().await.is_some() {
            received += 1;
        }
        assert_eq!(received, 50);
    }
}
