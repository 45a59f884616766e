//! Contention, ordering and shutdown tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use work_pool::prelude::*;
use work_pool::queue::TaskQueue;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_hundred_tasks_on_four_workers() {
    init_logger();
    let pool = ThreadPool::new(4).expect("Failed to create pool");
    let collected = Arc::new(parking_lot::Mutex::new(Vec::with_capacity(100)));

    for i in 0..100 {
        let collected = Arc::clone(&collected);
        pool.submit(move || collected.lock().push(i))
            .expect("Failed to submit task");
    }

    pool.join_timeout(Duration::from_secs(10))
        .expect("Pool should finish within 10 seconds");

    let mut collected = collected.lock().clone();
    collected.sort_unstable();
    assert_eq!(collected, (0..100).collect::<Vec<_>>());
}

#[test]
fn test_concurrent_submitters() {
    init_logger();
    let pool = ThreadPool::new(4).expect("Failed to create pool");
    let counter = Arc::new(AtomicUsize::new(0));
    let submitters = 8;
    let per_submitter = 500;

    crossbeam_utils::thread::scope(|s| {
        for _ in 0..submitters {
            let pool = &pool;
            let counter = Arc::clone(&counter);
            s.spawn(move |_| {
                for _ in 0..per_submitter {
                    let counter = Arc::clone(&counter);
                    pool.submit(move || {
                        counter.fetch_add(1, Ordering::Relaxed);
                    })
                    .expect("Failed to submit task");
                }
            });
        }
    })
    .expect("Submitter thread panicked");

    pool.join().expect("Failed to join pool");

    assert_eq!(counter.load(Ordering::Relaxed), submitters * per_submitter);
    assert_eq!(pool.total_submitted(), (submitters * per_submitter) as u64);
    assert_eq!(pool.total_completed(), (submitters * per_submitter) as u64);
}

#[test]
fn test_racing_consumers_remove_each_item_once() {
    let queue = TaskQueue::new();
    let items = 2_000;
    for _ in 0..items {
        queue.enqueue(Task::new(|| {})).unwrap();
    }
    queue.close();

    let removed = AtomicUsize::new(0);
    crossbeam_utils::thread::scope(|s| {
        for _ in 0..16 {
            s.spawn(|_| {
                while let Some(task) = queue.dequeue() {
                    task.run();
                    removed.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
    })
    .expect("Consumer thread panicked");

    assert_eq!(removed.load(Ordering::SeqCst), items);
    assert!(queue.is_empty());
}

#[test]
fn test_idle_pool_joins_promptly() {
    init_logger();
    let pool = ThreadPool::new(8).expect("Failed to create pool");

    // Idle workers are parked on the queue, closing it must wake them all
    thread::sleep(Duration::from_millis(50));
    pool.join_timeout(Duration::from_secs(5))
        .expect("Idle pool should stop within 5 seconds");
    assert_eq!(pool.state(), PoolState::Stopped);
}

#[test]
fn test_join_waits_for_queued_work() {
    init_logger();
    let pool = ThreadPool::new(2).expect("Failed to create pool");
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..20 {
        let counter = Arc::clone(&counter);
        pool.submit(move || {
            thread::sleep(Duration::from_millis(5));
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    pool.join().expect("Failed to join pool");
    assert_eq!(counter.load(Ordering::SeqCst), 20);
    assert_eq!(pool.pending_tasks(), 0);
}

#[test]
fn test_submit_from_inside_task() {
    init_logger();
    let pool = Arc::new(ThreadPool::new(2).expect("Failed to create pool"));
    let (tx, rx) = std::sync::mpsc::channel();

    let inner_pool = Arc::clone(&pool);
    pool.submit(move || {
        inner_pool
            .submit(move || tx.send("nested").unwrap())
            .unwrap();
    })
    .unwrap();

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok("nested"));
    pool.join().expect("Failed to join pool");
}

#[test]
fn test_stats_render_as_json() {
    let pool = ThreadPool::new(3).expect("Failed to create pool");
    for _ in 0..9 {
        pool.submit(|| {}).unwrap();
    }
    pool.join().unwrap();

    let json = serde_json::to_string(&pool.stats()).unwrap();
    assert!(json.contains("\"state\":\"stopped\""));
    assert!(json.contains("\"total_completed\":9"));
}
