use std::thread;

use quill_json::pool::{ContextProbe, ExecutionContext, Hybrid};
use quill_json::value::{read_value, write_value};
use quill_json::{PoolStrategy, Recycler, RecyclerPool};
use rstest::rstest;
use serde_json::json;

fn document(worker: usize, round: usize) -> serde_json::Value {
    json!({"worker": worker, "round": round, "payload": "x".repeat(round % 50)})
}

#[rstest]
#[case::non_recycling(Recycler::new(PoolStrategy::non_recycling(), PoolStrategy::non_recycling()))]
#[case::owner_confined(Recycler::new(PoolStrategy::owner_confined(), PoolStrategy::owner_confined()))]
#[case::bounded(Recycler::new(PoolStrategy::bounded(4), PoolStrategy::bounded(4)))]
#[case::striped(Recycler::new(PoolStrategy::striped(4), PoolStrategy::striped(4)))]
#[case::hybrid(Recycler::default())]
fn concurrent_callers_never_share_buffers(#[case] recycler: Recycler) {
    thread::scope(|scope| {
        for worker in 0..8 {
            let recycler = &recycler;
            scope.spawn(move || {
                for round in 0..100 {
                    let expected = document(worker, round);
                    let bytes = {
                        let mut writer = recycler.acquire_writer();
                        write_value(&mut writer, &expected).unwrap();
                        writer.finish().unwrap();
                        writer.as_bytes().to_vec()
                    };
                    let mut reader = recycler.acquire_reader(&bytes);
                    assert_eq!(read_value(&mut reader).unwrap(), expected);
                    reader.finish().unwrap();
                }
            });
        }
    });

    let writers = recycler.writer_pool().stats().snapshot();
    assert_eq!(writers.created + writers.reused, 800);
    if !matches!(recycler.writer_pool(), PoolStrategy::NonRecycling(_)) {
        assert!(writers.reused > 0);
    }
}

#[rstest]
fn owner_confined_retains_one_per_thread() {
    let recycler = Recycler::new(PoolStrategy::owner_confined(), PoolStrategy::owner_confined());
    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..10 {
                    let mut writer = recycler.acquire_writer();
                    writer.write_bool(true).unwrap();
                }
            });
        }
    });
    assert_eq!(recycler.writer_pool().stats().created(), 4);
}

#[rstest]
fn failed_documents_are_not_flushed() {
    let recycler = Recycler::default();
    let mut out = Vec::new();
    {
        let mut writer = recycler.acquire_writer_to(&mut out);
        writer.begin_array().unwrap();
        writer.write_i64(1).unwrap();
        if writer.name("oops").is_err() {
            writer.mark_incomplete();
        }
    }
    assert!(out.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn tasks_share_a_striped_hybrid_pool() {
    let pool = std::sync::Arc::new(Hybrid::<Vec<u8>>::with_probe(ContextProbe {
        supports_tasks: || true,
        current: || ExecutionContext::CooperativeTask,
    }));
    let mut handles = Vec::new();
    for task in 0..16u8 {
        let pool = std::sync::Arc::clone(&pool);
        handles.push(tokio::spawn(async move {
            for _ in 0..50 {
                let mut lease = pool.acquire();
                assert!(lease.stripe().is_some());
                lease.value_mut().clear();
                lease.value_mut().push(task);
                tokio::task::yield_now().await;
                assert_eq!(lease.value(), &[task]);
                pool.release(lease);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    let counts = pool.stats().snapshot();
    assert_eq!(counts.created + counts.reused, 800);
}

#[cfg(feature = "tokio")]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn runtime_tasks_are_detected_without_injection() {
    use quill_json::pool::current_context;

    let outside = thread::spawn(current_context).join().unwrap();
    assert_eq!(outside, ExecutionContext::OsThread);

    let pool = std::sync::Arc::new(Hybrid::<Vec<u8>>::new());
    let task_pool = std::sync::Arc::clone(&pool);
    let (context, seen, stripe) = tokio::spawn(async move {
        let lease = task_pool.acquire();
        let stripe = lease.stripe();
        task_pool.release(lease);
        (current_context(), task_pool.context(), stripe)
    })
    .await
    .unwrap();
    assert_eq!(context, ExecutionContext::CooperativeTask);
    assert_eq!(seen, ExecutionContext::CooperativeTask);
    assert!(stripe.is_some());

    let on_thread = thread::spawn(move || {
        let lease = pool.acquire();
        let stripe = lease.stripe();
        pool.release(lease);
        (pool.context(), stripe)
    })
    .join()
    .unwrap();
    assert_eq!(on_thread, (ExecutionContext::OsThread, None));
}
