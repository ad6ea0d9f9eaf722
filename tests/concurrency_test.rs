//! 并发解析测试

#![allow(clippy::uninlined_format_args)]

use futures_util::future;
use scopewire::{ContainerBuilder, ContainerError, Resolve, ResolveExt, Scope, ScopeManager};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct ConnectionPool {
    id: usize,
}

struct UnitOfWork {
    id: usize,
}

/// ledger -> journal -> ledger，两个进程级工厂互相依赖
fn crossed_builder() -> ContainerBuilder {
    let mut builder = ContainerBuilder::new();
    for (id, dependency) in [("ledger", "journal"), ("journal", "ledger")] {
        builder
            .bind_factory(id, move |container| {
                // 让两个线程各自占住自己的槽位
                std::thread::sleep(Duration::from_millis(50));
                container.get(dependency).map(|_| ())
            })
            .unwrap()
            .singleton(id)
            .unwrap();
    }
    builder
}

fn assert_all_cycles(results: Vec<scopewire::Result<()>>) {
    for result in results {
        assert!(
            matches!(result, Err(ContainerError::CircularDependency { .. })),
            "unexpected result: {:?}",
            result
        );
    }
}

fn pool_builder(constructions: Arc<AtomicUsize>) -> ContainerBuilder {
    let mut builder = ContainerBuilder::new();
    builder
        .bind_factory("pool", move |_| {
            // 放大竞争窗口
            std::thread::sleep(Duration::from_millis(5));
            Ok(ConnectionPool {
                id: constructions.fetch_add(1, Ordering::SeqCst),
            })
        })
        .unwrap()
        .singleton("pool")
        .unwrap();
    builder
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_singleton_constructed_once() {
    let constructions = Arc::new(AtomicUsize::new(0));
    let container = pool_builder(constructions.clone()).build();

    let tasks: Vec<_> = (0..50)
        .map(|_| {
            let container = container.clone();
            tokio::task::spawn_blocking(move || container.get_as::<ConnectionPool>("pool").unwrap())
        })
        .collect();

    let pools: Vec<Arc<ConnectionPool>> = future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(constructions.load(Ordering::SeqCst), 1);
    assert!(pools.iter().all(|pool| Arc::ptr_eq(pool, &pools[0])));
    assert_eq!(pools[0].id, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_ticks_are_isolated() {
    let next = Arc::new(AtomicUsize::new(0));
    let counter = next.clone();
    let mut builder = ContainerBuilder::new();
    builder
        .bind_factory("unit", move |_| {
            Ok(UnitOfWork {
                id: counter.fetch_add(1, Ordering::SeqCst),
            })
        })
        .unwrap()
        .scoped("unit")
        .unwrap();
    let container = builder.build();

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let container = container.clone();
            tokio::task::spawn_blocking(move || {
                ScopeManager::new(&container).run(Scope::Tick, |scope| {
                    let a = scope.get_as::<UnitOfWork>("unit").unwrap();
                    let b = scope.get_as::<UnitOfWork>("unit").unwrap();
                    assert!(Arc::ptr_eq(&a, &b));
                    a.id
                })
            })
        })
        .collect();

    let mut ids: Vec<usize> = future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 16);
    assert_eq!(next.load(Ordering::SeqCst), 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_compiled_singleton_under_contention() {
    let constructions = Arc::new(AtomicUsize::new(0));
    let compiled = Arc::new(pool_builder(constructions.clone()).compile().unwrap());

    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let compiled = compiled.clone();
            tokio::task::spawn_blocking(move || {
                let scope = compiled.create_scope(Scope::Tick);
                scope.get_as::<ConnectionPool>("pool").unwrap().id
            })
        })
        .collect();

    let ids: Vec<usize> = future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();
    assert!(ids.iter().all(|id| *id == 0));
    assert_eq!(constructions.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cycle_across_threads_fails_fast() {
    let container = crossed_builder().build();

    let tasks: Vec<_> = ["ledger", "journal"]
        .into_iter()
        .map(|id| {
            let container = container.clone();
            tokio::task::spawn_blocking(move || container.get(id).map(|_| ()))
        })
        .collect();

    let joined = tokio::time::timeout(Duration::from_secs(10), future::join_all(tasks))
        .await
        .expect("crossed singletons must not deadlock");
    assert_all_cycles(joined.into_iter().map(|r| r.unwrap()).collect());
    assert!(container.resolved_ids().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_compiled_cycle_across_threads_fails_fast() {
    let compiled = Arc::new(crossed_builder().compile().unwrap());

    let tasks: Vec<_> = ["ledger", "journal"]
        .into_iter()
        .map(|id| {
            let compiled = compiled.clone();
            tokio::task::spawn_blocking(move || compiled.get(id).map(|_| ()))
        })
        .collect();

    let joined = tokio::time::timeout(Duration::from_secs(10), future::join_all(tasks))
        .await
        .expect("crossed singletons must not deadlock");
    assert_all_cycles(joined.into_iter().map(|r| r.unwrap()).collect());
}
