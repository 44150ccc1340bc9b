use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use terrane_chunk::{
    GenerationId, GenerationRequest, GenerationResult, GeneratorCache, generate_chunk_geometry,
};
use terrane_runtime::{
    GenerateFn, GenerationBackend, PoolConfig, TaskError, TaskHandle, WorkerPool,
};
use terrane_world::{ChunkCoord, GeneratorSettings};

fn req(id: u64, x: i32, z: i32) -> GenerationRequest {
    GenerationRequest::new(
        GenerationId(id),
        ChunkCoord::new(x, z),
        50.0,
        4,
        GeneratorSettings::with_seed(42),
    )
}

/// Builder that blocks every task until the gate sender is dropped.
fn gated(panic_on_x: Option<i32>) -> (Sender<()>, GenerateFn) {
    let (tx, rx): (Sender<()>, Receiver<()>) = unbounded();
    let f: GenerateFn = Arc::new(move |cache: &mut GeneratorCache, r: &GenerationRequest| {
        let _ = rx.recv();
        if Some(r.chunk_x) == panic_on_x {
            panic!("generator blew up at {}", r.coord());
        }
        cache.generate(r)
    });
    (tx, f)
}

type Reply = Result<GenerationResult, TaskError>;

/// Pumps until every handle settles or the deadline passes.
fn settle_all(pool: &mut WorkerPool, handles: &mut [TaskHandle]) -> Vec<Reply> {
    let mut out: Vec<Option<Reply>> = (0..handles.len()).map(|_| None).collect();
    let deadline = Instant::now() + Duration::from_secs(20);
    while out.iter().any(Option::is_none) {
        assert!(Instant::now() < deadline, "tasks did not settle in time");
        pool.pump();
        for (slot, h) in out.iter_mut().zip(handles.iter_mut()) {
            if slot.is_none() {
                *slot = h.try_resolve();
            }
        }
        thread::sleep(Duration::from_millis(1));
    }
    out.into_iter().flatten().collect()
}

/// Waits until the pool reports `busy` workers running.
fn wait_busy(pool: &WorkerPool, busy: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while pool.stats().busy_workers != busy {
        assert!(Instant::now() < deadline, "workers never reached {busy} busy");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn finished_worker_takes_next_queued_task_without_pump() {
    let mut pool = WorkerPool::new(PoolConfig::with_workers(1)).unwrap();
    let first = pool.submit(req(1, 0, 0));
    let mut second = pool.submit(req(2, 1, 0));

    assert!(first.wait().is_ok_and(|g| g.success));
    let reply = second.wait_timeout(Duration::from_secs(5));
    assert!(
        reply.as_ref().is_some_and(|r| r.as_ref().is_ok_and(|g| g.success)),
        "queued task never ran: {:?}",
        pool.stats()
    );
    let s = pool.stats();
    assert_eq!((s.busy_workers, s.available_workers, s.queued_tasks), (0, 1, 0));
}

#[test]
fn cancel_out_of_range_rejects_only_far_queued_tasks() {
    let (gate, f) = gated(None);
    let mut pool = WorkerPool::with_generator(PoolConfig::with_workers(1), f).unwrap();

    let near = [(0, 0), (1, 0), (0, 1), (1, 1)];
    let mut handles = Vec::new();
    for (i, (x, z)) in near.iter().enumerate() {
        handles.push(pool.submit(req(i as u64, *x, *z)));
    }
    for i in 0..6 {
        handles.push(pool.submit(req(10 + i as u64, 10 + i, 0)));
    }
    wait_busy(&pool, 1);
    let s = pool.stats();
    assert_eq!((s.busy_workers, s.queued_tasks), (1, 9));

    assert_eq!(pool.cancel_out_of_range(0, 0, 3.0), 6);
    assert_eq!(pool.stats().queued_tasks, 3);
    drop(gate);

    let results = settle_all(&mut pool, &mut handles);
    for r in &results[..4] {
        assert!(r.as_ref().is_ok_and(|g| g.success));
    }
    for r in &results[4..] {
        assert_eq!(r, &Err(TaskError::Cancelled));
    }
}

#[test]
fn crashed_worker_is_replaced_and_queue_flushed() {
    let (gate, f) = gated(Some(99));
    let mut pool = WorkerPool::with_generator(PoolConfig::with_workers(1), f).unwrap();

    let mut handles = vec![
        pool.submit(req(1, 99, 0)),
        pool.submit(req(2, 0, 0)),
        pool.submit(req(3, 1, 0)),
    ];
    drop(gate);

    let results = settle_all(&mut pool, &mut handles);
    assert!(matches!(&results[0], Err(TaskError::WorkerCrashed(m)) if m.contains("blew up")));
    assert_eq!(results[1], Err(TaskError::QueueFlushed));
    assert_eq!(results[2], Err(TaskError::QueueFlushed));
    assert_eq!(pool.crash_count(), 1);
    assert_eq!(pool.stats().total_workers, 1);

    let mut after = [pool.submit(req(4, 2, 2))];
    let results = settle_all(&mut pool, &mut after);
    assert!(results[0].as_ref().is_ok_and(|g| g.success));
}

#[test]
fn dispose_rejects_queued_and_running() {
    let (gate, f) = gated(None);
    let mut pool = WorkerPool::with_generator(PoolConfig::with_workers(1), f).unwrap();
    let mut handles: Vec<TaskHandle> = (0..3).map(|i| pool.submit(req(i, i as i32, 0))).collect();

    pool.dispose();
    drop(gate);
    for h in handles.iter_mut() {
        assert_eq!(
            h.wait_timeout(Duration::from_secs(5)),
            Some(Err(TaskError::Disposed))
        );
    }
    let mut late = pool.submit(req(9, 0, 0));
    assert_eq!(late.try_resolve(), Some(Err(TaskError::Disposed)));
    assert_eq!(pool.stats().total_workers, 0);
}

#[test]
fn worker_output_matches_calling_thread() {
    let mut pool = WorkerPool::new(PoolConfig::with_workers(3)).unwrap();
    let coords: Vec<(i32, i32)> = (-2..2).flat_map(|x| (-1..1).map(move |z| (x, z))).collect();
    let mut handles: Vec<TaskHandle> = coords
        .iter()
        .enumerate()
        .map(|(i, (x, z))| pool.submit(req(i as u64, *x, *z)))
        .collect();
    let results = settle_all(&mut pool, &mut handles);
    for (i, (x, z)) in coords.iter().enumerate() {
        let sync = generate_chunk_geometry(&req(i as u64, *x, *z));
        assert_eq!(results[i].as_ref().ok(), Some(&sync));
    }
    let s = pool.stats();
    assert_eq!(s.queued_tasks, 0);
    assert_eq!(s.busy_workers, 0);
    assert_eq!(s.available_workers, 3);
}
