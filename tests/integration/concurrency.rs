//! Concurrency tests for shared registry and ledger state
//!
//! These tests verify that concurrent writers converge to a consistent
//! view: parallel registrations of one hostname produce one agent, and
//! interleaved reports never lose a job.

use std::sync::Arc;

use custodia::{BackupStatus, storage::JobQuery};
use pretty_assertions::assert_eq;

use crate::helpers::*;

#[tokio::test]
async fn concurrent_registrations_of_same_hostname_yield_one_agent() {
    let storage = memory_storage();
    let registry = Arc::new(registry(&storage));

    let mut tasks = vec![];
    for _ in 0..16 {
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move {
            registry.register(register_request("shared-host")).await
        }));
    }

    let mut agent_ids = vec![];
    let mut created = 0;
    for task in tasks {
        let registration = task.await.unwrap().unwrap();
        if registration.created {
            created += 1;
        }
        agent_ids.push(registration.agent.agent_id);
    }

    // exactly one registration created the record, all see the same id
    assert_eq!(created, 1);
    agent_ids.dedup();
    assert_eq!(agent_ids.len(), 1);

    let all = registry.list(Default::default()).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn concurrent_job_reports_are_all_recorded() {
    let storage = memory_storage();
    let registry = registry(&storage);
    let ledger = Arc::new(ledger(&storage));

    let agent_id = registry
        .register(register_request("busy-host"))
        .await
        .unwrap()
        .agent
        .agent_id;

    let mut tasks = vec![];
    for i in 0..32 {
        let ledger = ledger.clone();
        let status = if i % 4 == 0 {
            BackupStatus::Failed
        } else {
            BackupStatus::Success
        };
        tasks.push(tokio::spawn(async move {
            ledger.record_job(agent_id, finished_job(status, 1)).await
        }));
    }

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let jobs = ledger
        .query(JobQuery {
            agent_id: Some(agent_id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(jobs.len(), 32);

    let stats = ledger.stats(agent_id).await.unwrap();
    assert_eq!(stats.total, 32);
    assert_eq!(stats.failed, 8);
    assert_eq!(stats.success, 24);
}

#[tokio::test]
async fn heartbeats_and_reads_do_not_starve_each_other() {
    let storage = memory_storage();
    let registry = Arc::new(registry(&storage));

    let agent_id = registry
        .register(register_request("chatty"))
        .await
        .unwrap()
        .agent
        .agent_id;

    let mut tasks = vec![];
    for _ in 0..8 {
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..50 {
                assert!(registry.heartbeat(agent_id).await.unwrap());
            }
        }));
    }
    for _ in 0..8 {
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..50 {
                assert!(registry.get(agent_id).await.unwrap().is_some());
            }
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }
}
