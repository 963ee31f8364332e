//! Tests for tokio spawner utilities and the read API

use hospital_capacity_sim::builders::HospitalBuilder;
use hospital_capacity_sim::config::HospitalConfig;
use hospital_capacity_sim::core::Spawn;
use hospital_capacity_sim::runtime::tokio_spawner::TokioSpawner;
use hospital_capacity_sim::runtime::{health, overview};
use hospital_capacity_sim::util::serde::{QueueName, ResourceKind};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[test]
fn test_owned_runtime_spawner() {
    let spawner = TokioSpawner::with_worker_threads(1).expect("runtime");
    let (tx, rx) = std::sync::mpsc::channel();
    spawner.spawn(async move {
        tx.send(7).unwrap();
    });
    assert_eq!(rx.recv().unwrap(), 7);
}

#[test]
fn test_overview_and_health() {
    let hospital = HospitalBuilder::new(HospitalConfig::default())
        .build()
        .expect("hospital");
    hospital.pool().acquire(ResourceKind::Er).unwrap();

    let view = overview(&hospital).expect("overview");
    assert_eq!(view.queues.len(), QueueName::ALL.len());
    assert!(view.queues.iter().all(|q| q.waiting == 0));
    let er = view
        .resources
        .iter()
        .find(|r| r.name == ResourceKind::Er)
        .unwrap();
    assert_eq!(er.available, 8);
    assert_eq!(view.patients, 0);

    let h = health(&hospital);
    assert!(h.ok);
    assert!(h.reason.is_none());
}
