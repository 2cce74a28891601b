use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use notepool::{
    ConnectionPool, ExhaustionPolicy, NoteService, Page, PoolConfig, QueryCache, StoreError,
};
use tempfile::TempDir;

fn service_with(policy: ExhaustionPolicy, max_connections: usize) -> Result<(TempDir, NoteService)> {
    let dir = tempfile::tempdir()?;
    let mut config = PoolConfig::new(dir.path().join("shared.db"));
    config.max_connections = max_connections;
    config.policy = policy;

    let service = NoteService::new(
        Arc::new(ConnectionPool::new(config)?),
        QueryCache::new(Duration::from_secs(300)),
    );
    service.schema().create_tables()?;
    Ok((dir, service))
}

#[test]
fn test_concurrent_writers_through_one_service() -> Result<()> {
    let (_dir, service) = service_with(ExhaustionPolicy::Transient, 2)?;

    thread::scope(|scope| {
        for worker in 0..6 {
            let service = &service;
            scope.spawn(move || {
                for i in 0..10 {
                    let note = service
                        .create_note(&format!("worker {worker} note {i}"))
                        .expect("concurrent create should succeed");
                    service
                        .create_action_item("follow up", Some(note.id))
                        .expect("concurrent item create should succeed");
                    service.list_notes(Page::new(5, 0)).expect("list should succeed");
                }
            });
        }
    });

    assert_eq!(service.count_notes()?, 60);
    assert_eq!(service.count_action_items(None)?, 60);
    assert_eq!(service.list_notes(Page::default())?.len(), 60);

    let status = service.pool().status();
    assert!(status.idle <= 2, "idle connections stay within the bound");
    assert_eq!(status.live, status.idle, "every connection was returned");

    Ok(())
}

#[test]
fn test_blocking_pool_serves_more_threads_than_connections() -> Result<()> {
    let policy = ExhaustionPolicy::Block {
        timeout: Duration::from_secs(10),
    };
    let (_dir, service) = service_with(policy, 1)?;

    thread::scope(|scope| {
        for worker in 0..4 {
            let service = &service;
            scope.spawn(move || {
                for i in 0..5 {
                    service
                        .create_note(&format!("{worker}-{i}"))
                        .expect("blocked caller should eventually get the connection");
                }
            });
        }
    });

    assert_eq!(service.count_notes()?, 20);
    assert!(service.pool().status().live <= 1);

    Ok(())
}

#[test]
fn test_blocking_pool_times_out_while_connection_is_held() -> Result<()> {
    let policy = ExhaustionPolicy::Block {
        timeout: Duration::from_millis(50),
    };
    let (_dir, service) = service_with(policy, 1)?;

    let held = service.pool().acquire()?;
    let err = service.create_note("waits too long").unwrap_err();
    drop(held);

    assert!(matches!(err, StoreError::Database { .. }));
    assert_eq!(service.count_notes()?, 0);

    Ok(())
}

#[test]
fn test_cleanup_between_bursts_keeps_the_service_usable() -> Result<()> {
    let (_dir, service) = service_with(ExhaustionPolicy::Transient, 3)?;

    for round in 0..3 {
        let note = service.create_note(&format!("round {round}"))?;
        assert_eq!(service.get_note(note.id)?, Some(note));
        service.cleanup();
        assert_eq!(service.cache().size(), 0);
        assert_eq!(service.pool().status().live, 0);
    }

    assert_eq!(service.count_notes()?, 3);
    Ok(())
}
