use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};
use terrane_chunk::{GenerationId, GenerationRequest, GenerationResult, GeneratorCache};
use terrane_world::ChunkCoord;

use crate::handle::{Resolver, TaskError, TaskHandle};
use crate::{BackendKind, GenerationBackend, PoolStats};

/// What a worker runs for each request. Each worker owns its cache.
pub type GenerateFn =
    Arc<dyn Fn(&mut GeneratorCache, &GenerationRequest) -> GenerationResult + Send + Sync>;

pub fn default_generate() -> GenerateFn {
    Arc::new(|cache: &mut GeneratorCache, req: &GenerationRequest| cache.generate(req))
}

#[derive(Clone, Debug)]
pub struct PoolConfig {
    pub workers: usize,
    pub thread_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let workers = thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1))
            .unwrap_or(4)
            .clamp(1, 8);
        Self {
            workers,
            thread_name: "terrane-gen".to_string(),
        }
    }
}

impl PoolConfig {
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            ..Self::default()
        }
    }
}

#[derive(Debug)]
pub enum PoolError {
    NoWorkers,
    Spawn(std::io::Error),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::NoWorkers => write!(f, "worker pool needs at least one worker"),
            PoolError::Spawn(e) => write!(f, "failed to spawn worker thread: {}", e),
        }
    }
}

impl std::error::Error for PoolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PoolError::Spawn(e) => Some(e),
            PoolError::NoWorkers => None,
        }
    }
}

impl From<std::io::Error> for PoolError {
    fn from(e: std::io::Error) -> Self {
        PoolError::Spawn(e)
    }
}

struct Job {
    request: GenerationRequest,
    resolver: Resolver,
}

struct WorkerEvent {
    worker: usize,
    message: String,
}

struct InFlight {
    id: GenerationId,
    coord: ChunkCoord,
    resolver: Resolver,
}

/// State a worker shares with the pool. `closed` is only read under the slot
/// lock so a job picked up during `dispose` is always rejected by one side.
#[derive(Default)]
struct Slot {
    in_flight: Option<InFlight>,
    closed: bool,
}

type SharedSlot = Arc<Mutex<Slot>>;

struct Worker {
    thread: Option<JoinHandle<()>>,
    slot: SharedSlot,
}

impl Worker {
    fn is_live(&self) -> bool {
        self.thread.is_some()
    }

    fn is_busy(&self) -> bool {
        self.is_live() && self.slot.lock().unwrap().in_flight.is_some()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn worker_loop(
    worker: usize,
    jobs: Receiver<Job>,
    slot: SharedSlot,
    events: Sender<WorkerEvent>,
    generate: GenerateFn,
) {
    let mut cache = GeneratorCache::new();
    while let Ok(Job { request, resolver }) = jobs.recv() {
        {
            let mut s = slot.lock().unwrap();
            if s.closed {
                resolver.reject(TaskError::Disposed);
                return;
            }
            s.in_flight = Some(InFlight {
                id: request.id,
                coord: request.coord(),
                resolver: resolver.clone(),
            });
        }
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| generate(&mut cache, &request)));
        // Cleared before settling so a resolved handle never sees this worker busy.
        slot.lock().unwrap().in_flight = None;
        match outcome {
            Ok(result) => {
                resolver.settle(Ok(result));
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                resolver.reject(TaskError::WorkerCrashed(message.clone()));
                let _ = events.send(WorkerEvent { worker, message });
                return;
            }
        }
    }
}

fn spawn_worker(
    index: usize,
    name: &str,
    jobs: &Receiver<Job>,
    events: &Sender<WorkerEvent>,
    generate: &GenerateFn,
) -> Result<Worker, PoolError> {
    let jobs = jobs.clone();
    let events = events.clone();
    let generate = Arc::clone(generate);
    let slot = SharedSlot::default();
    let worker_slot = Arc::clone(&slot);
    let thread = thread::Builder::new()
        .name(format!("{name}-{index}"))
        .spawn(move || worker_loop(index, jobs, worker_slot, events, generate))?;
    Ok(Worker {
        thread: Some(thread),
        slot,
    })
}

/// Fixed set of generation threads pulling from one shared FIFO job channel.
///
/// A worker takes the next queued job as soon as it finishes the previous one.
/// `submit`, `pump`, and `cancel_out_of_range` never wait on a worker.
pub struct WorkerPool {
    cfg: PoolConfig,
    generate: GenerateFn,
    workers: Vec<Worker>,
    // None once disposed; dropping it lets idle workers exit.
    job_tx: Option<Sender<Job>>,
    // The pool's own end of the job channel, used to pull queued jobs back out.
    job_rx: Receiver<Job>,
    event_tx: Sender<WorkerEvent>,
    event_rx: Receiver<WorkerEvent>,
    crashes: u64,
    disposed: bool,
}

impl WorkerPool {
    pub fn new(cfg: PoolConfig) -> Result<Self, PoolError> {
        Self::with_generator(cfg, default_generate())
    }

    pub fn with_generator(cfg: PoolConfig, generate: GenerateFn) -> Result<Self, PoolError> {
        if cfg.workers == 0 {
            return Err(PoolError::NoWorkers);
        }
        let (job_tx, job_rx) = unbounded::<Job>();
        let (event_tx, event_rx) = unbounded();
        let mut workers = Vec::with_capacity(cfg.workers);
        for i in 0..cfg.workers {
            // On error the job sender drops here and the spawned workers exit.
            workers.push(spawn_worker(i, &cfg.thread_name, &job_rx, &event_tx, &generate)?);
        }
        log::info!(target: "pool", "worker pool started with {} workers", cfg.workers);
        Ok(Self {
            cfg,
            generate,
            workers,
            job_tx: Some(job_tx),
            job_rx,
            event_tx,
            event_rx,
            crashes: 0,
            disposed: false,
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.cfg
    }

    /// Workers replaced after a panic since construction.
    pub fn crash_count(&self) -> u64 {
        self.crashes
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Pulls every job not yet picked up by a worker, in FIFO order.
    fn take_queued(&self) -> Vec<Job> {
        self.job_rx.try_iter().collect()
    }

    fn requeue(&self, jobs: Vec<Job>) {
        let Some(tx) = self.job_tx.as_ref() else {
            for job in jobs {
                job.resolver.reject(TaskError::Disposed);
            }
            return;
        };
        for job in jobs {
            // The pool holds a receiver, so the channel cannot be disconnected.
            let _ = tx.send(job);
        }
    }

    fn replace_worker(&mut self, index: usize, message: &str) {
        self.crashes += 1;
        if self.disposed {
            return;
        }
        let Some(w) = self.workers.get_mut(index) else {
            return;
        };
        log::warn!(target: "pool", "worker {} crashed: {}", index, message);
        // The worker rejected its own task before reporting.
        if let Some(t) = w.thread.take() {
            let _ = t.join();
        }
        let flushed = self.take_queued();
        for job in &flushed {
            job.resolver.reject(TaskError::QueueFlushed);
        }
        if !flushed.is_empty() {
            log::warn!(target: "pool", "flushed {} queued tasks after crash", flushed.len());
        }
        match spawn_worker(
            index,
            &self.cfg.thread_name,
            &self.job_rx,
            &self.event_tx,
            &self.generate,
        ) {
            Ok(fresh) => self.workers[index] = fresh,
            Err(e) => log::error!(target: "pool", "could not replace worker {}: {}", index, e),
        }
    }
}

impl GenerationBackend for WorkerPool {
    fn kind(&self) -> BackendKind {
        BackendKind::Workers
    }

    fn submit(&mut self, request: GenerationRequest) -> TaskHandle {
        let (resolver, handle) = TaskHandle::pending(request.id, request.coord());
        let Some(tx) = self.job_tx.as_ref() else {
            resolver.reject(TaskError::Disposed);
            return handle;
        };
        log::trace!(target: "pool", "queued {} {}", request.coord(), request.id);
        let _ = tx.send(Job { request, resolver });
        handle
    }

    fn pump(&mut self) {
        while let Ok(WorkerEvent { worker, message }) = self.event_rx.try_recv() {
            self.replace_worker(worker, &message);
        }
    }

    fn cancel_out_of_range(&mut self, center_x: i32, center_z: i32, max_distance: f32) -> usize {
        let center = ChunkCoord::new(center_x, center_z);
        let (far, near): (Vec<Job>, Vec<Job>) = self
            .take_queued()
            .into_iter()
            .partition(|job| job.request.coord().distance(center) > max_distance);
        self.requeue(near);
        for job in &far {
            job.resolver.reject(TaskError::Cancelled);
        }
        if !far.is_empty() {
            log::debug!(target: "pool", "cancelled {} queued tasks", far.len());
        }
        far.len()
    }

    fn stats(&self) -> PoolStats {
        let total = self.workers.iter().filter(|w| w.is_live()).count();
        let busy = self.workers.iter().filter(|w| w.is_busy()).count();
        PoolStats {
            total_workers: total,
            available_workers: total - busy,
            busy_workers: busy,
            queued_tasks: if self.disposed { 0 } else { self.job_rx.len() },
        }
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.job_tx = None;
        let queued = self.take_queued();
        for job in &queued {
            job.resolver.reject(TaskError::Disposed);
        }
        let mut running = 0;
        for w in &mut self.workers {
            {
                let mut s = w.slot.lock().unwrap();
                s.closed = true;
                if let Some(f) = s.in_flight.take() {
                    log::trace!(target: "pool", "rejecting running {} {}", f.coord, f.id);
                    f.resolver.reject(TaskError::Disposed);
                    running += 1;
                }
            }
            // Running jobs finish on their own; the thread exits on the closed channel.
            w.thread.take();
        }
        log::info!(
            target: "pool",
            "worker pool disposed ({} queued, {} running rejected)",
            queued.len(),
            running
        );
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.dispose();
    }
}
